//! Native-side values produced by the decoder and consumed by the encoder

use super::types::{unordered_entries_eq, Number};
use core::fmt;
use std::sync::Arc;

/// Text the null sentinel renders as
pub const NULL_SENTINEL: &str = "<nil>";

/// Native 8-bit RGBA color
///
/// Alpha uses the full `0..=255` range; see [`alpha_to_native`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, u8::MAX)
    }
}

/// Wire alpha (`0.0..=1.0`) to native alpha: clamp, scale by 255, round half away from zero
#[inline]
pub fn alpha_to_native(alpha: f64) -> u8 {
    if alpha.is_nan() {
        return 0;
    }
    (alpha.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Native alpha back to the wire scale
#[inline]
pub fn alpha_to_wire(alpha: u8) -> f64 {
    f64::from(alpha) / 255.0
}

/// Host function reference
///
/// Has no wire counterpart; it exists so that such values reach the encoder
/// and are rejected there.
#[derive(Clone)]
pub struct NativeFn(pub Arc<dyn Fn(&[NativeValue]) -> NativeValue + Send + Sync>);

impl NativeFn {
    pub fn new(f: impl Fn(&[NativeValue]) -> NativeValue + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeFn(..)")
    }
}

/// Dynamically typed native value
#[derive(Debug, Clone)]
pub enum NativeValue {
    /// Null sentinel, displayed as `<nil>`
    Null,
    Bool(bool),
    Number(Number),
    Str(String),
    Color(Rgba),
    Seq(Vec<NativeValue>),
    Map(Vec<(NativeValue, NativeValue)>),
    Function(NativeFn),
    /// Any other host value, identified by its type name
    Opaque(&'static str),
}

impl NativeValue {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    pub fn number(value: f64, unit: impl Into<String>) -> Self {
        Self::Number(Number::new(value, unit))
    }

    /// Name of the runtime shape, used in encode failures
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Color(_) => "color",
            Self::Seq(_) => "sequence",
            Self::Map(_) => "map",
            Self::Function(_) => "function",
            Self::Opaque(name) => *name,
        }
    }
}

impl PartialEq for NativeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Color(a), Self::Color(b)) => a == b,
            (Self::Seq(a), Self::Seq(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => unordered_entries_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(&a.0, &b.0),
            (Self::Opaque(a), Self::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str(NULL_SENTINEL),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}{}", n.value, n.unit),
            Self::Str(s) => f.write_str(s),
            Self::Color(c) => write!(f, "rgba({}, {}, {}, {})", c.r, c.g, c.b, c.a),
            Self::Seq(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
            Self::Function(_) => f.write_str("<function>"),
            Self::Opaque(name) => write!(f, "<{}>", name),
        }
    }
}
