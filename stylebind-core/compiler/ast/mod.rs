//! Syntax tree for the style-sheet subset
//!
//! Literal values are stored directly as [`TaggedValue`]s so that the
//! evaluator hands them to callbacks without another conversion step.

pub mod location;

pub use location::{LineIndex, SourceLocation, SourceText};

use stylebind_runtime::interop::Separator;
use stylebind_runtime::TaggedValue;

/// Parsed style sheet
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
}

/// `selector, selector { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub selectors: Vec<String>,
    pub items: Vec<RuleItem>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleItem {
    Declaration(Declaration),
    Rule(Rule),
}

/// `property: value;`
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: Expr,
    pub location: SourceLocation,
}

/// Value expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(TaggedValue),
    List {
        items: Vec<Expr>,
        separator: Separator,
    },
    Map(Vec<(Expr, Expr)>),
    Call(Call),
}

impl Expr {
    /// Collapse a single-item list to the item itself
    pub fn list(mut items: Vec<Expr>, separator: Separator) -> Self {
        if items.len() == 1 {
            if let Some(item) = items.pop() {
                return item;
            }
        }
        Self::List { items, separator }
    }
}

/// `name(arg, arg, ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Expr>,
    pub location: SourceLocation,
}
