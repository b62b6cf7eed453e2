//! Target shape descriptors
//!
//! A callback states the native shape it wants for an argument explicitly;
//! the decoder never inspects a destination at runtime to guess.

use core::fmt;

/// Scalar target kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Null,
    Bool,
    Number,
    String,
    Color,
}

impl ScalarKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Color => "color",
        }
    }
}

/// Requested native shape for a decode
#[derive(Debug, Clone, PartialEq)]
pub enum TargetShape {
    /// Whatever the value is; the result mirrors the wire variant
    Any,
    Scalar(ScalarKind),
    /// Fixed-arity tuple, zipped element-wise against a list
    Sequence(Vec<TargetShape>),
    /// Homogeneous list of one element shape
    List(Box<TargetShape>),
    Map {
        key: Box<TargetShape>,
        value: Box<TargetShape>,
    },
}

impl TargetShape {
    pub const BOOL: Self = Self::Scalar(ScalarKind::Bool);
    pub const NUMBER: Self = Self::Scalar(ScalarKind::Number);
    pub const STRING: Self = Self::Scalar(ScalarKind::String);
    pub const COLOR: Self = Self::Scalar(ScalarKind::Color);
    pub const NULL: Self = Self::Scalar(ScalarKind::Null);

    pub fn sequence(shapes: impl IntoIterator<Item = TargetShape>) -> Self {
        Self::Sequence(shapes.into_iter().collect())
    }

    pub fn list_of(element: TargetShape) -> Self {
        Self::List(Box::new(element))
    }

    pub fn map_of(key: TargetShape, value: TargetShape) -> Self {
        Self::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }
}

impl fmt::Display for TargetShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Scalar(kind) => f.write_str(kind.name()),
            Self::Sequence(shapes) => {
                f.write_str("(")?;
                for (i, shape) in shapes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", shape)?;
                }
                f.write_str(")")
            }
            Self::List(element) => write!(f, "list<{}>", element),
            Self::Map { key, value } => write!(f, "map<{}, {}>", key, value),
        }
    }
}
