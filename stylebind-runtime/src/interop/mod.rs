//! Interoperability - values and calls across the compiler boundary
//!
//! Architecture:
//! - `types.rs` - wire value model (TaggedValue, Number, Color)
//! - `shape.rs` - target shape descriptors requested by callbacks
//! - `native.rs` - native values (NativeValue, Rgba, alpha scale)
//! - `marshal.rs` - decoder, encoder and the typed Marshal/Unmarshal layer
//! - `call.rs` - signature parsing, registry and dispatch

mod types;
mod shape;
mod native;
mod marshal;
mod call;

pub use types::{Color, Number, Separator, TaggedValue, ValueKind};
pub use shape::{ScalarKind, TargetShape};
pub use native::{alpha_to_native, alpha_to_wire, NativeFn, NativeValue, Rgba, NULL_SENTINEL};
pub use marshal::{
    decode, encode, marshal, unmarshal, DecodeError, DecodeErrorKind, EncodeError,
    EncodeErrorKind, Marshal, Unmarshal, MAX_ENCODE_DEPTH,
};
pub use call::{
    ArityError, CallArgs, CallContext, CallError, CallState, CallbackFailure, DispatchStats,
    NativeCallback, Registration, Registry, SessionInfo, Signature, SignatureParseError,
};
