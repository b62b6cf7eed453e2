//! Value model shared with the style-sheet compiler
//!
//! `TaggedValue` is the wire representation exchanged at the callback
//! boundary. It is a closed sum type: every consumer matches it exhaustively,
//! so a new variant is a compile-time obligation for the decoder, the encoder
//! and the CSS emitter alike.

use core::fmt;

/// Separator between the items of a list value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Separator {
    #[default]
    Comma,
    Space,
}

impl Separator {
    /// Text placed between rendered items
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Comma => ", ",
            Self::Space => " ",
        }
    }
}

/// A magnitude carrying a unit string (possibly empty)
///
/// The unit is carried verbatim. Conversion between units is the compiler
/// engine's job and never happens in this layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Number {
    pub value: f64,
    pub unit: String,
}

impl Number {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    /// Number without a unit
    pub fn unitless(value: f64) -> Self {
        Self::new(value, "")
    }
}

/// Wire color: 8-bit channels plus a fractional alpha in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Fully opaque color
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 1.0)
    }

    #[inline]
    pub fn is_opaque(&self) -> bool {
        self.a >= 1.0
    }
}

/// Discriminant of a [`TaggedValue`], used in mismatch diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Color,
    List,
    Map,
    Error,
    Warning,
}

impl ValueKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Color => "color",
            Self::List => "list",
            Self::Map => "map",
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compiler value exchanged with registered functions
#[derive(Debug, Clone)]
pub enum TaggedValue {
    Null,
    Bool(bool),
    Number(Number),
    String { text: String, quoted: bool },
    Color(Color),
    List {
        items: Vec<TaggedValue>,
        separator: Separator,
    },
    /// Entries in source order; equality ignores that order
    Map(Vec<(TaggedValue, TaggedValue)>),
    Error(String),
    Warning(String),
}

impl TaggedValue {
    pub fn number(value: f64, unit: impl Into<String>) -> Self {
        Self::Number(Number::new(value, unit))
    }

    pub fn quoted(text: impl Into<String>) -> Self {
        Self::String {
            text: text.into(),
            quoted: true,
        }
    }

    pub fn unquoted(text: impl Into<String>) -> Self {
        Self::String {
            text: text.into(),
            quoted: false,
        }
    }

    pub fn comma_list(items: Vec<TaggedValue>) -> Self {
        Self::List {
            items,
            separator: Separator::Comma,
        }
    }

    pub fn space_list(items: Vec<TaggedValue>) -> Self {
        Self::List {
            items,
            separator: Separator::Space,
        }
    }

    pub fn empty_list() -> Self {
        Self::comma_list(Vec::new())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Number(_) => ValueKind::Number,
            Self::String { .. } => ValueKind::String,
            Self::Color(_) => ValueKind::Color,
            Self::List { .. } => ValueKind::List,
            Self::Map(_) => ValueKind::Map,
            Self::Error(_) => ValueKind::Error,
            Self::Warning(_) => ValueKind::Warning,
        }
    }

    /// True for lists and maps
    #[inline]
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::List { .. } | Self::Map(_))
    }

    /// True for null, booleans, numbers, strings and colors
    #[inline]
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String { .. } | Self::Color(_)
        )
    }

    /// Items of a list value, `None` for every other variant
    pub fn as_list(&self) -> Option<&[TaggedValue]> {
        match self {
            Self::List { items, .. } => Some(items),
            _ => None,
        }
    }
}

impl PartialEq for TaggedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (
                Self::String { text: a, quoted: qa },
                Self::String { text: b, quoted: qb },
            ) => a == b && qa == qb,
            (Self::Color(a), Self::Color(b)) => a == b,
            (
                Self::List { items: a, separator: sa },
                Self::List { items: b, separator: sb },
            ) => sa == sb && a == b,
            (Self::Map(a), Self::Map(b)) => unordered_entries_eq(a, b),
            (Self::Error(a), Self::Error(b)) => a == b,
            (Self::Warning(a), Self::Warning(b)) => a == b,
            _ => false,
        }
    }
}

/// Multiset comparison of map entries
pub(crate) fn unordered_entries_eq<T: PartialEq>(a: &[(T, T)], b: &[(T, T)]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|entry| {
        let hit = b
            .iter()
            .enumerate()
            .find(|(i, candidate)| !used[*i] && *candidate == entry);
        match hit {
            Some((i, _)) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

impl From<bool> for TaggedValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Number> for TaggedValue {
    fn from(n: Number) -> Self {
        Self::Number(n)
    }
}

impl From<Color> for TaggedValue {
    fn from(c: Color) -> Self {
        Self::Color(c)
    }
}
