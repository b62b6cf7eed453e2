//! Type marshaling - compiler values ↔ native values
//!
//! `decode` fills an explicitly requested [`TargetShape`]; `encode` turns a
//! native value back into a wire value. Both match every variant
//! exhaustively and report mismatches as errors, never panics.

use super::native::{alpha_to_native, alpha_to_wire, NativeValue, Rgba};
use super::shape::{ScalarKind, TargetShape};
use super::types::{Color, Number, TaggedValue, ValueKind};
use crate::logging::log_type_conversion;
use thiserror::Error;

/// Maximum nesting depth the encoder follows before giving up
pub const MAX_ENCODE_DEPTH: usize = 256;

/// Decode failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    TypeMismatch,
    ArityMismatch,
    UnsupportedShape,
}

/// Failure to decode a wire value into the requested shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{detail}")]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub detail: String,
}

impl DecodeError {
    pub fn type_mismatch(expected: impl std::fmt::Display, actual: ValueKind) -> Self {
        Self {
            kind: DecodeErrorKind::TypeMismatch,
            detail: format!("type mismatch: expected {}, found {}", expected, actual),
        }
    }

    pub fn arity_mismatch(expected: usize, actual: usize) -> Self {
        Self {
            kind: DecodeErrorKind::ArityMismatch,
            detail: format!("arity mismatch: expected {} values, found {}", expected, actual),
        }
    }

    pub fn unsupported_shape(detail: impl Into<String>) -> Self {
        Self {
            kind: DecodeErrorKind::UnsupportedShape,
            detail: format!("unsupported shape: {}", detail.into()),
        }
    }

    /// Prefix the detail with the position of the failing element
    fn at_index(mut self, index: usize) -> Self {
        self.detail = format!("element {}: {}", index, self.detail);
        self
    }
}

/// Encode failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeErrorKind {
    UnsupportedNativeType,
}

/// Failure to represent a native value on the wire
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported native type: {type_name}")]
pub struct EncodeError {
    pub kind: EncodeErrorKind,
    pub type_name: String,
}

impl EncodeError {
    pub fn unsupported(type_name: impl Into<String>) -> Self {
        Self {
            kind: EncodeErrorKind::UnsupportedNativeType,
            type_name: type_name.into(),
        }
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Decode a wire value into the requested shape
pub fn decode(value: &TaggedValue, shape: &TargetShape) -> Result<NativeValue, DecodeError> {
    log_type_conversion(value.kind(), shape);

    match shape {
        TargetShape::Any => decode_any(value),
        TargetShape::Scalar(kind) => decode_scalar(value, *kind),
        TargetShape::Sequence(shapes) => decode_sequence(value, shapes),
        TargetShape::List(element) => decode_list(value, element),
        TargetShape::Map { key, value: val } => decode_map(value, key, val),
    }
}

fn decode_any(value: &TaggedValue) -> Result<NativeValue, DecodeError> {
    match value {
        TaggedValue::Null => Ok(NativeValue::Null),
        TaggedValue::Bool(b) => Ok(NativeValue::Bool(*b)),
        TaggedValue::Number(n) => Ok(NativeValue::Number(n.clone())),
        TaggedValue::String { text, .. } => Ok(NativeValue::Str(text.clone())),
        TaggedValue::Color(c) => Ok(NativeValue::Color(color_to_native(c))),
        TaggedValue::List { items, .. } => items
            .iter()
            .map(decode_any)
            .collect::<Result<Vec<_>, DecodeError>>()
            .map(NativeValue::Seq),
        TaggedValue::Map(entries) => entries
            .iter()
            .map(|(k, v)| -> Result<_, DecodeError> { Ok((decode_any(k)?, decode_any(v)?)) })
            .collect::<Result<Vec<_>, DecodeError>>()
            .map(NativeValue::Map),
        TaggedValue::Error(_) | TaggedValue::Warning(_) => Err(DecodeError::unsupported_shape(
            format!("{} values cannot be passed to a function", value.kind()),
        )),
    }
}

fn decode_scalar(value: &TaggedValue, kind: ScalarKind) -> Result<NativeValue, DecodeError> {
    match (kind, value) {
        (ScalarKind::Null, TaggedValue::Null) => Ok(NativeValue::Null),
        (ScalarKind::Bool, TaggedValue::Bool(b)) => Ok(NativeValue::Bool(*b)),
        (ScalarKind::Number, TaggedValue::Number(n)) => Ok(NativeValue::Number(n.clone())),
        (ScalarKind::String, TaggedValue::String { text, .. }) => {
            Ok(NativeValue::Str(text.clone()))
        }
        (ScalarKind::Color, TaggedValue::Color(c)) => Ok(NativeValue::Color(color_to_native(c))),
        (kind, other) => Err(DecodeError::type_mismatch(kind.name(), other.kind())),
    }
}

fn decode_sequence(value: &TaggedValue, shapes: &[TargetShape]) -> Result<NativeValue, DecodeError> {
    let items = match value {
        TaggedValue::List { items, .. } => items.as_slice(),
        // Single-argument calls arrive bare, not wrapped in a list
        other if shapes.len() == 1 => std::slice::from_ref(other),
        other => return Err(DecodeError::type_mismatch("list", other.kind())),
    };

    if items.len() != shapes.len() {
        return Err(DecodeError::arity_mismatch(shapes.len(), items.len()));
    }

    items
        .iter()
        .zip(shapes)
        .enumerate()
        .map(|(i, (item, shape))| decode(item, shape).map_err(|e| e.at_index(i)))
        .collect::<Result<Vec<_>, DecodeError>>()
        .map(NativeValue::Seq)
}

fn decode_list(value: &TaggedValue, element: &TargetShape) -> Result<NativeValue, DecodeError> {
    let items = match value {
        TaggedValue::List { items, .. } => items.as_slice(),
        other => std::slice::from_ref(other),
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| decode(item, element).map_err(|e| e.at_index(i)))
        .collect::<Result<Vec<_>, DecodeError>>()
        .map(NativeValue::Seq)
}

fn decode_map(
    value: &TaggedValue,
    key: &TargetShape,
    val: &TargetShape,
) -> Result<NativeValue, DecodeError> {
    let pairs: Vec<(&TaggedValue, &TaggedValue)> = match value {
        TaggedValue::Map(entries) => entries.iter().map(|(k, v)| (k, v)).collect(),
        TaggedValue::List { items, .. } => items
            .iter()
            .map(|item| match item.as_list() {
                Some([k, v]) => Ok((k, v)),
                _ => Err(DecodeError::unsupported_shape(format!(
                    "map entry must be a key/value pair, found {}",
                    item.kind()
                ))),
            })
            .collect::<Result<_, _>>()?,
        other => return Err(DecodeError::type_mismatch("map", other.kind())),
    };

    pairs
        .into_iter()
        .map(|(k, v)| -> Result<_, DecodeError> { Ok((decode(k, key)?, decode(v, val)?)) })
        .collect::<Result<Vec<_>, DecodeError>>()
        .map(NativeValue::Map)
}

#[inline]
fn color_to_native(c: &Color) -> Rgba {
    Rgba::new(c.r, c.g, c.b, alpha_to_native(c.a))
}

#[inline]
fn color_to_wire(c: &Rgba) -> Color {
    Color::rgba(c.r, c.g, c.b, alpha_to_wire(c.a))
}

// ============================================================================
// Encoder
// ============================================================================

/// Encode a native value for return to the compiler
pub fn encode(native: &NativeValue) -> Result<TaggedValue, EncodeError> {
    encode_at(native, 0)
}

fn encode_at(native: &NativeValue, depth: usize) -> Result<TaggedValue, EncodeError> {
    if depth > MAX_ENCODE_DEPTH {
        return Err(EncodeError::unsupported(format!(
            "structure nested deeper than {} levels",
            MAX_ENCODE_DEPTH
        )));
    }

    match native {
        NativeValue::Null => Ok(TaggedValue::Null),
        NativeValue::Bool(b) => Ok(TaggedValue::Bool(*b)),
        NativeValue::Number(n) => Ok(TaggedValue::Number(n.clone())),
        NativeValue::Str(s) => Ok(TaggedValue::quoted(s.clone())),
        NativeValue::Color(c) => Ok(TaggedValue::Color(color_to_wire(c))),
        NativeValue::Seq(items) => items
            .iter()
            .map(|item| encode_at(item, depth + 1))
            .collect::<Result<Vec<_>, EncodeError>>()
            .map(TaggedValue::comma_list),
        NativeValue::Map(entries) => entries
            .iter()
            .map(|(k, v)| -> Result<_, EncodeError> {
                Ok((encode_at(k, depth + 1)?, encode_at(v, depth + 1)?))
            })
            .collect::<Result<Vec<_>, EncodeError>>()
            .map(TaggedValue::Map),
        NativeValue::Function(_) | NativeValue::Opaque(_) => {
            Err(EncodeError::unsupported(native.type_name()))
        }
    }
}

// ============================================================================
// Typed layer
// ============================================================================

/// Native types that can be produced by the decoder
pub trait Unmarshal: Sized {
    /// Shape requested from the decoder
    fn shape() -> TargetShape;

    /// Convert the decoded value; only sees values matching [`Self::shape`]
    fn from_native(value: NativeValue) -> Result<Self, DecodeError>;
}

/// Decode a wire value straight into a typed native value
pub fn unmarshal<T: Unmarshal>(value: &TaggedValue) -> Result<T, DecodeError> {
    T::from_native(decode(value, &T::shape())?)
}

/// Native types that can be handed to the encoder
pub trait Marshal {
    fn to_native(&self) -> NativeValue;
}

/// Encode a typed native value
pub fn marshal<T: Marshal + ?Sized>(value: &T) -> Result<TaggedValue, EncodeError> {
    encode(&value.to_native())
}

fn unexpected(expected: &str, found: &NativeValue) -> DecodeError {
    DecodeError {
        kind: DecodeErrorKind::TypeMismatch,
        detail: format!(
            "type mismatch: expected {}, found {}",
            expected,
            found.type_name()
        ),
    }
}

impl Unmarshal for NativeValue {
    fn shape() -> TargetShape {
        TargetShape::Any
    }

    fn from_native(value: NativeValue) -> Result<Self, DecodeError> {
        Ok(value)
    }
}

impl Unmarshal for bool {
    fn shape() -> TargetShape {
        TargetShape::BOOL
    }

    fn from_native(value: NativeValue) -> Result<Self, DecodeError> {
        match value {
            NativeValue::Bool(b) => Ok(b),
            other => Err(unexpected("bool", &other)),
        }
    }
}

impl Unmarshal for String {
    fn shape() -> TargetShape {
        TargetShape::STRING
    }

    fn from_native(value: NativeValue) -> Result<Self, DecodeError> {
        match value {
            NativeValue::Str(s) => Ok(s),
            other => Err(unexpected("string", &other)),
        }
    }
}

impl Unmarshal for Number {
    fn shape() -> TargetShape {
        TargetShape::NUMBER
    }

    fn from_native(value: NativeValue) -> Result<Self, DecodeError> {
        match value {
            NativeValue::Number(n) => Ok(n),
            other => Err(unexpected("number", &other)),
        }
    }
}

impl Unmarshal for Rgba {
    fn shape() -> TargetShape {
        TargetShape::COLOR
    }

    fn from_native(value: NativeValue) -> Result<Self, DecodeError> {
        match value {
            NativeValue::Color(c) => Ok(c),
            other => Err(unexpected("color", &other)),
        }
    }
}

impl<T: Unmarshal> Unmarshal for Vec<T> {
    fn shape() -> TargetShape {
        TargetShape::list_of(T::shape())
    }

    fn from_native(value: NativeValue) -> Result<Self, DecodeError> {
        match value {
            NativeValue::Seq(items) => items.into_iter().map(T::from_native).collect(),
            other => Err(unexpected("sequence", &other)),
        }
    }
}

macro_rules! unmarshal_tuple {
    ($len:expr => $($name:ident),+) => {
        impl<$($name: Unmarshal),+> Unmarshal for ($($name,)+) {
            fn shape() -> TargetShape {
                TargetShape::Sequence(vec![$($name::shape()),+])
            }

            fn from_native(value: NativeValue) -> Result<Self, DecodeError> {
                let items = match value {
                    NativeValue::Seq(items) => items,
                    other => return Err(unexpected("sequence", &other)),
                };
                if items.len() != $len {
                    return Err(DecodeError::arity_mismatch($len, items.len()));
                }
                let mut items = items.into_iter();
                Ok(($(
                    $name::from_native(items.next().unwrap_or(NativeValue::Null))?,
                )+))
            }
        }
    };
}

unmarshal_tuple!(1 => A);
unmarshal_tuple!(2 => A, B);
unmarshal_tuple!(3 => A, B, C);
unmarshal_tuple!(4 => A, B, C, D);

impl Marshal for NativeValue {
    fn to_native(&self) -> NativeValue {
        self.clone()
    }
}

impl Marshal for bool {
    fn to_native(&self) -> NativeValue {
        NativeValue::Bool(*self)
    }
}

impl Marshal for str {
    fn to_native(&self) -> NativeValue {
        NativeValue::Str(self.to_string())
    }
}

impl Marshal for String {
    fn to_native(&self) -> NativeValue {
        NativeValue::Str(self.clone())
    }
}

impl Marshal for f64 {
    fn to_native(&self) -> NativeValue {
        NativeValue::Number(Number::unitless(*self))
    }
}

impl Marshal for Number {
    fn to_native(&self) -> NativeValue {
        NativeValue::Number(self.clone())
    }
}

impl Marshal for Rgba {
    fn to_native(&self) -> NativeValue {
        NativeValue::Color(*self)
    }
}

impl<T: Marshal> Marshal for Vec<T> {
    fn to_native(&self) -> NativeValue {
        NativeValue::Seq(self.iter().map(Marshal::to_native).collect())
    }
}

impl<T: Marshal> Marshal for Option<T> {
    fn to_native(&self) -> NativeValue {
        match self {
            Some(v) => v.to_native(),
            None => NativeValue::Null,
        }
    }
}

impl<T: Marshal + ?Sized> Marshal for &T {
    fn to_native(&self) -> NativeValue {
        (**self).to_native()
    }
}
