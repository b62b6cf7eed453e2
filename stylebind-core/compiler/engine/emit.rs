//! CSS text output
//!
//! Evaluated values are printed by [`Formatter`]; flattened rule blocks are
//! joined into a style sheet by [`render`].

use crate::compiler::frontend::OutputStyle;
use stylebind_runtime::interop::{Color, Number, Separator};
use stylebind_runtime::TaggedValue;
use thiserror::Error;

/// Digits beyond this are noise in an `f64`
const MAX_PRECISION: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error("{0} isn't a valid CSS value.")]
    InvalidValue(String),
    #[error("{0}")]
    ErrorValue(String),
}

/// One flattened rule with its printed declarations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssBlock {
    pub selectors: Vec<String>,
    pub declarations: Vec<CssDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssDeclaration {
    pub property: String,
    pub value: String,
}

/// Prints values as CSS text
#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    style: OutputStyle,
    precision: usize,
}

impl Formatter {
    pub fn new(style: OutputStyle, precision: usize) -> Self {
        Self {
            style,
            precision: precision.min(MAX_PRECISION),
        }
    }

    fn compressed(&self) -> bool {
        self.style == OutputStyle::Compressed
    }

    /// Text of a declaration value; `None` means the declaration is dropped
    pub fn value(&self, value: &TaggedValue) -> Result<Option<String>, EmitError> {
        if let TaggedValue::List { items, .. } = value {
            if items.is_empty() {
                return Err(EmitError::InvalidValue("()".to_string()));
            }
        }
        self.css(value)
    }

    fn css(&self, value: &TaggedValue) -> Result<Option<String>, EmitError> {
        let text = match value {
            TaggedValue::Null | TaggedValue::Warning(_) => return Ok(None),
            TaggedValue::Bool(b) => b.to_string(),
            TaggedValue::Number(n) => self.number(n),
            TaggedValue::String { text, quoted: true } => quote(text),
            TaggedValue::String { text, quoted: false } => text.clone(),
            TaggedValue::Color(c) => self.color(c),
            TaggedValue::List { items, separator } => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(part) = self.css(item)? {
                        parts.push(part);
                    }
                }
                if parts.is_empty() {
                    return Ok(None);
                }
                parts.join(self.separator(*separator))
            }
            TaggedValue::Map(_) => return Err(EmitError::InvalidValue(self.inspect(value))),
            TaggedValue::Error(message) => return Err(EmitError::ErrorValue(message.clone())),
        };
        Ok(Some(text))
    }

    pub fn separator(&self, separator: Separator) -> &'static str {
        match (separator, self.compressed()) {
            (Separator::Comma, false) => ", ",
            (Separator::Comma, true) => ",",
            (Separator::Space, _) => " ",
        }
    }

    pub fn number(&self, number: &Number) -> String {
        format!("{}{}", self.magnitude(number.value), number.unit)
    }

    fn magnitude(&self, value: f64) -> String {
        let mut text = format!("{:.*}", self.precision, value);
        if text.contains('.') {
            let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
            text.truncate(trimmed);
        }
        if text == "-0" {
            text = "0".to_string();
        }
        if self.compressed() {
            if let Some(rest) = text.strip_prefix("0.") {
                text = format!(".{}", rest);
            } else if let Some(rest) = text.strip_prefix("-0.") {
                text = format!("-.{}", rest);
            }
        }
        text
    }

    pub fn color(&self, color: &Color) -> String {
        if color.is_opaque() {
            let hex = format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b);
            if self.compressed() {
                if let Some(short) = shorten_hex(&hex) {
                    return short;
                }
            }
            return hex;
        }

        let alpha = self.magnitude(color.a.clamp(0.0, 1.0));
        if self.compressed() {
            format!("rgba({},{},{},{})", color.r, color.g, color.b, alpha)
        } else {
            format!("rgba({}, {}, {}, {})", color.r, color.g, color.b, alpha)
        }
    }

    /// Debug-style text used in error messages
    pub fn inspect(&self, value: &TaggedValue) -> String {
        match value {
            TaggedValue::Null => "null".to_string(),
            TaggedValue::List { items, .. } if items.is_empty() => "()".to_string(),
            TaggedValue::List { items, separator } => items
                .iter()
                .map(|item| match item {
                    TaggedValue::List { items, .. } if !items.is_empty() => {
                        format!("({})", self.inspect(item))
                    }
                    _ => self.inspect(item),
                })
                .collect::<Vec<_>>()
                .join(match separator {
                    Separator::Comma => ", ",
                    Separator::Space => " ",
                }),
            TaggedValue::Map(entries) => {
                let body = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", self.inspect(k), self.inspect(v)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({})", body)
            }
            TaggedValue::Error(message) | TaggedValue::Warning(message) => message.clone(),
            other => self.css(other).ok().flatten().unwrap_or_default(),
        }
    }
}

fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        if ch == '"' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// `#aabbcc` to `#abc` when every channel repeats its digit
fn shorten_hex(hex: &str) -> Option<String> {
    let digits = hex.strip_prefix('#')?.as_bytes();
    if digits.len() == 6 && digits[0] == digits[1] && digits[2] == digits[3] && digits[4] == digits[5]
    {
        Some(format!(
            "#{}{}{}",
            digits[0] as char, digits[2] as char, digits[4] as char
        ))
    } else {
        None
    }
}

/// Join flattened blocks into a style sheet; blocks without declarations are skipped
pub fn render(blocks: &[CssBlock], style: OutputStyle) -> String {
    let mut out = String::new();

    for block in blocks.iter().filter(|b| !b.declarations.is_empty()) {
        match style {
            OutputStyle::Expanded => {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&block.selectors.join(", "));
                out.push_str(" {\n");
                for decl in &block.declarations {
                    out.push_str(&format!("  {}: {};\n", decl.property, decl.value));
                }
                out.push_str("}\n");
            }
            OutputStyle::Compressed => {
                out.push_str(&block.selectors.join(","));
                out.push('{');
                let body = block
                    .declarations
                    .iter()
                    .map(|decl| format!("{}:{}", decl.property, decl.value))
                    .collect::<Vec<_>>()
                    .join(";");
                out.push_str(&body);
                out.push('}');
            }
        }
    }

    if style == OutputStyle::Compressed && !out.is_empty() {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expanded() -> Formatter {
        Formatter::new(OutputStyle::Expanded, 5)
    }

    fn compressed() -> Formatter {
        Formatter::new(OutputStyle::Compressed, 5)
    }

    #[test]
    fn test_number_precision() {
        let f = expanded();
        assert_eq!(f.number(&Number::new(3.0, "px")), "3px");
        assert_eq!(f.number(&Number::new(1.0 / 3.0, "em")), "0.33333em");
        assert_eq!(f.number(&Number::new(-0.000001, "")), "0");
        assert_eq!(compressed().number(&Number::new(0.5, "s")), ".5s");
        assert_eq!(Formatter::new(OutputStyle::Expanded, 2).number(&Number::new(1.005, "")), "1");
    }

    #[test]
    fn test_colors() {
        assert_eq!(expanded().color(&Color::rgb(0, 0x55, 0)), "#005500");
        assert_eq!(compressed().color(&Color::rgb(0, 0x55, 0)), "#050");
        assert_eq!(compressed().color(&Color::rgb(0, 0x55, 1)), "#005501");
        assert_eq!(
            expanded().color(&Color::rgba(10, 20, 30, 0.5)),
            "rgba(10, 20, 30, 0.5)"
        );
    }

    #[test]
    fn test_values() {
        let f = expanded();
        assert_eq!(f.value(&TaggedValue::Bool(false)), Ok(Some("false".to_string())));
        assert_eq!(f.value(&TaggedValue::Null), Ok(None));
        assert_eq!(f.value(&TaggedValue::quoted("a\"b")), Ok(Some("\"a\\\"b\"".to_string())));
        assert_eq!(
            f.value(&TaggedValue::space_list(vec![
                TaggedValue::number(1.0, "px"),
                TaggedValue::Null,
                TaggedValue::unquoted("solid"),
            ])),
            Ok(Some("1px solid".to_string()))
        );
        assert_eq!(
            compressed().value(&TaggedValue::comma_list(vec![
                TaggedValue::unquoted("a"),
                TaggedValue::unquoted("b"),
            ])),
            Ok(Some("a,b".to_string()))
        );
    }

    #[test]
    fn test_invalid_values() {
        let f = expanded();
        let map = TaggedValue::Map(vec![(TaggedValue::unquoted("a"), TaggedValue::number(1.0, ""))]);

        assert_eq!(
            f.value(&map).unwrap_err().to_string(),
            "(a: 1) isn't a valid CSS value."
        );
        assert_eq!(
            f.value(&TaggedValue::empty_list()).unwrap_err().to_string(),
            "() isn't a valid CSS value."
        );
    }

    #[test]
    fn test_render_styles() {
        let blocks = vec![
            CssBlock {
                selectors: vec!["a".into(), "b".into()],
                declarations: vec![
                    CssDeclaration { property: "color".into(), value: "red".into() },
                    CssDeclaration { property: "margin".into(), value: "0".into() },
                ],
            },
            CssBlock {
                selectors: vec!["empty".into()],
                declarations: vec![],
            },
            CssBlock {
                selectors: vec!["c".into()],
                declarations: vec![CssDeclaration { property: "x".into(), value: "y".into() }],
            },
        ];

        assert_eq!(
            render(&blocks, OutputStyle::Expanded),
            "a, b {\n  color: red;\n  margin: 0;\n}\n\nc {\n  x: y;\n}\n"
        );
        assert_eq!(
            render(&blocks, OutputStyle::Compressed),
            "a,b{color:red;margin:0}c{x:y}\n"
        );
        assert_eq!(render(&[], OutputStyle::Expanded), "");
    }
}
