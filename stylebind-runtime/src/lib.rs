//! Stylebind runtime - callback boundary between a style-sheet compiler and host code
//!
//! This crate holds the value model exchanged with registered functions, the
//! decoder and encoder that convert it to and from native values, and the
//! registry that validates and dispatches calls.

pub mod interop;
pub mod logging;

pub use interop::{
    decode, encode, marshal, unmarshal, CallArgs, CallContext, CallError, NativeValue, Registry,
    SessionInfo, Signature, TaggedValue, TargetShape,
};
