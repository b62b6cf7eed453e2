//! Signature registry and call dispatch
//!
//! A host registers a native callback under a signature string such as
//! `foo($color, $amount)`. When the compiler reaches a call to `foo`, the
//! registry checks the call-site arity against the signature, hands the
//! callback a [`CallContext`] for the duration of that single synchronous
//! invocation, and returns whatever the callback left in the output slot.

use super::marshal::{decode, encode, DecodeError, EncodeError, Marshal, Unmarshal};
use super::native::NativeValue;
use super::shape::TargetShape;
use super::types::TaggedValue;
use crate::logging::{
    log_arity_fault, log_callback_call, log_callback_fault, log_callback_return, log_registration,
    perf,
};
use core::fmt;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Error type a callback reports failure with
pub type CallbackFailure = Box<dyn std::error::Error + Send + Sync>;

/// Host function bound to a signature
pub type NativeCallback =
    Box<dyn FnMut(&mut CallContext<'_>) -> Result<(), CallbackFailure> + Send>;

// ============================================================================
// Signatures
// ============================================================================

/// Malformed signature string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureParseError {
    #[error("signature `{signature}` is missing '('")]
    MissingOpenParen { signature: String },
    #[error("signature `{signature}` is missing ')'")]
    MissingCloseParen { signature: String },
    #[error("signature `{signature}` has no function name")]
    EmptyName { signature: String },
    #[error("signature `{signature}`: invalid function name `{name}`")]
    InvalidName { signature: String, name: String },
    #[error("signature `{signature}`: parameter {position} is empty")]
    EmptyParam { signature: String, position: usize },
    #[error("signature `{signature}`: invalid parameter `{param}`")]
    InvalidParam { signature: String, param: String },
    #[error("signature `{signature}`: unexpected `{rest}` after ')'")]
    TrailingInput { signature: String, rest: String },
}

/// Function name plus ordered parameter names
///
/// Parameters only matter for arity; they are stored without their sigil.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    name: String,
    params: Vec<String>,
}

impl Signature {
    /// Parse `name '(' (param (',' param)*)? ')'`
    pub fn parse(source: &str) -> Result<Self, SignatureParseError> {
        let signature = source.trim();
        let owned = || signature.to_string();

        let open = signature
            .find('(')
            .ok_or_else(|| SignatureParseError::MissingOpenParen { signature: owned() })?;

        let name = signature[..open].trim();
        if name.is_empty() {
            return Err(SignatureParseError::EmptyName { signature: owned() });
        }
        if !is_identifier(name) {
            return Err(SignatureParseError::InvalidName {
                signature: owned(),
                name: name.to_string(),
            });
        }

        let rest = &signature[open + 1..];
        let close = rest
            .find(')')
            .ok_or_else(|| SignatureParseError::MissingCloseParen { signature: owned() })?;

        let trailing = rest[close + 1..].trim();
        if !trailing.is_empty() {
            return Err(SignatureParseError::TrailingInput {
                signature: owned(),
                rest: trailing.to_string(),
            });
        }

        let inner = rest[..close].trim();
        let params = if inner.is_empty() {
            Vec::new()
        } else {
            inner
                .split(',')
                .enumerate()
                .map(|(i, raw)| {
                    let param = raw.trim();
                    if param.is_empty() {
                        return Err(SignatureParseError::EmptyParam {
                            signature: owned(),
                            position: i + 1,
                        });
                    }
                    let bare = param.strip_prefix('$').unwrap_or(param);
                    if is_identifier(bare) {
                        Ok(bare.to_string())
                    } else {
                        Err(SignatureParseError::InvalidParam {
                            signature: owned(),
                            param: param.to_string(),
                        })
                    }
                })
                .collect::<Result<Vec<_>, SignatureParseError>>()?
        };

        Ok(Self {
            name: name.to_string(),
            params,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Declared parameter count
    #[inline]
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '-' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl FromStr for Signature {
    type Err = SignatureParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "${}", param)?;
        }
        f.write_str(")")
    }
}

// ============================================================================
// Sessions and call arguments
// ============================================================================

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle identifying one compilation session
///
/// Every callback sees the handle of the session that invoked it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: u64,
    pub source_name: String,
}

impl SessionInfo {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            source_name: source_name.into(),
        }
    }
}

/// Arguments supplied at a call site, one entry per argument
///
/// Arity always comes from here, so a single list-valued argument is never
/// mistaken for several arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallArgs(Vec<TaggedValue>);

impl CallArgs {
    pub fn new(args: Vec<TaggedValue>) -> Self {
        Self(args)
    }

    /// Recover arguments from a packed raw value: a list counts its items,
    /// anything else is a single argument
    pub fn from_raw(raw: TaggedValue) -> Self {
        match raw {
            TaggedValue::List { items, .. } => Self(items),
            other => Self(vec![other]),
        }
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[TaggedValue] {
        &self.0
    }

    /// Pack for the callback: bare value for one argument, comma list otherwise
    pub fn into_raw(mut self) -> TaggedValue {
        if self.0.len() == 1 {
            self.0.pop().unwrap_or(TaggedValue::Null)
        } else {
            TaggedValue::comma_list(self.0)
        }
    }
}

impl From<Vec<TaggedValue>> for CallArgs {
    fn from(args: Vec<TaggedValue>) -> Self {
        Self(args)
    }
}

impl FromIterator<TaggedValue> for CallArgs {
    fn from_iter<I: IntoIterator<Item = TaggedValue>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Per-invocation state handed to a callback
///
/// Valid only for the duration of one synchronous invocation; nothing in it
/// may be retained after the callback returns.
pub struct CallContext<'a> {
    function: &'a str,
    session: &'a SessionInfo,
    raw: TaggedValue,
    arity: usize,
    output: Option<TaggedValue>,
    encode_failure: Option<EncodeError>,
}

impl<'a> CallContext<'a> {
    pub fn new(function: &'a str, session: &'a SessionInfo, args: CallArgs) -> Self {
        let arity = args.arity();
        Self {
            function,
            session,
            raw: args.into_raw(),
            arity,
            output: None,
            encode_failure: None,
        }
    }

    /// Name of the function being called
    pub fn function(&self) -> &str {
        self.function
    }

    pub fn session(&self) -> &SessionInfo {
        self.session
    }

    /// Packed argument value: bare for one argument, a list otherwise
    pub fn raw(&self) -> &TaggedValue {
        &self.raw
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Arguments one by one
    pub fn args(&self) -> &[TaggedValue] {
        if self.arity == 1 {
            std::slice::from_ref(&self.raw)
        } else {
            self.raw.as_list().unwrap_or(&[])
        }
    }

    /// Decode the packed argument value against an arbitrary shape
    pub fn decode(&self, shape: &TargetShape) -> Result<NativeValue, DecodeError> {
        decode(&self.raw, shape)
    }

    /// Decode each argument against its own shape
    pub fn decode_args(&self, shapes: &[TargetShape]) -> Result<Vec<NativeValue>, DecodeError> {
        if shapes.len() != self.arity {
            return Err(DecodeError::arity_mismatch(shapes.len(), self.arity));
        }
        self.args()
            .iter()
            .zip(shapes)
            .map(|(arg, shape)| decode(arg, shape))
            .collect()
    }

    /// Decode the arguments into a typed value; tuples take one argument per element
    pub fn unmarshal<T: Unmarshal>(&self) -> Result<T, DecodeError> {
        match T::shape() {
            TargetShape::Sequence(shapes) => {
                T::from_native(NativeValue::Seq(self.decode_args(&shapes)?))
            }
            shape => {
                if self.arity != 1 {
                    return Err(DecodeError::arity_mismatch(1, self.arity));
                }
                T::from_native(decode(&self.raw, &shape)?)
            }
        }
    }

    /// Place an already encoded value in the output slot, replacing any
    /// earlier output or failed encode
    pub fn set_output(&mut self, value: TaggedValue) {
        self.output = Some(value);
        self.encode_failure = None;
    }

    /// Encode a native value into the output slot
    ///
    /// A failure is remembered until a later output replaces it, so the call
    /// faults if the callback ignores the error and returns nothing usable.
    pub fn return_native(&mut self, native: &NativeValue) -> Result<(), EncodeError> {
        match encode(native) {
            Ok(value) => {
                self.set_output(value);
                Ok(())
            }
            Err(err) => {
                self.encode_failure = Some(err.clone());
                Err(err)
            }
        }
    }

    pub fn return_value<T: Marshal + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.return_native(&value.to_native())
    }

    /// Return an error value; the call faults with `message` as its cause
    pub fn fail(&mut self, message: impl Into<String>) {
        self.set_output(TaggedValue::Error(message.into()));
    }

    /// Return a warning value for the compiler to report
    pub fn warn(&mut self, message: impl Into<String>) {
        self.set_output(TaggedValue::Warning(message.into()));
    }

    fn finish(self) -> (Option<TaggedValue>, Option<EncodeError>) {
        (self.output, self.encode_failure)
    }
}

// ============================================================================
// Registry and dispatch
// ============================================================================

/// Lifecycle of a registered function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Registered,
    Invoked,
    Returned,
    Faulted,
}

/// Call-site argument count does not match the signature
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("function {function} only takes {expected} arguments; given {actual}")]
pub struct ArityError {
    pub function: String,
    pub expected: usize,
    pub actual: usize,
}

/// Dispatch failures
#[derive(Debug, Error)]
pub enum CallError {
    #[error("function {name} is not registered")]
    Unregistered { name: String },
    #[error(transparent)]
    Arity(#[from] ArityError),
    #[error("error in function {function}: {cause}")]
    Callback {
        function: String,
        #[source]
        cause: CallbackFailure,
    },
    #[error("function {function} returned an unsupported value: {source}")]
    Encode {
        function: String,
        #[source]
        source: EncodeError,
    },
}

impl CallError {
    /// Name of the function the failure belongs to
    pub fn function(&self) -> &str {
        match self {
            Self::Unregistered { name } => name,
            Self::Arity(err) => &err.function,
            Self::Callback { function, .. } | Self::Encode { function, .. } => function,
        }
    }
}

/// Dispatch counters for one registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub calls: usize,
    pub faults: usize,
    pub arity_failures: usize,
}

/// A signature bound to its callback
pub struct Registration {
    signature: Signature,
    callback: NativeCallback,
    state: CallState,
}

impl Registration {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn state(&self) -> CallState {
        self.state
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("signature", &self.signature)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Functions registered for one session, keyed by name
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<String, Registration>,
    stats: DispatchStats,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `signature` and bind `callback` under its name
    ///
    /// A later registration under the same name replaces the earlier one;
    /// the replaced signature is returned.
    pub fn register<F>(
        &mut self,
        signature: &str,
        callback: F,
    ) -> Result<Option<Signature>, SignatureParseError>
    where
        F: FnMut(&mut CallContext<'_>) -> Result<(), CallbackFailure> + Send + 'static,
    {
        let signature = Signature::parse(signature)?;
        Ok(self.insert(signature, Box::new(callback)))
    }

    /// Bind an already parsed signature
    pub fn insert(&mut self, signature: Signature, callback: NativeCallback) -> Option<Signature> {
        let name = signature.name().to_string();
        log_registration(&name, signature.arity(), self.entries.contains_key(&name));
        self.entries
            .insert(
                name,
                Registration {
                    signature,
                    callback,
                    state: CallState::Registered,
                },
            )
            .map(|previous| previous.signature)
    }

    pub fn get(&self, name: &str) -> Option<&Registration> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Check arity, invoke the callback and collect its output
    pub fn dispatch(
        &mut self,
        name: &str,
        args: CallArgs,
        session: &SessionInfo,
    ) -> Result<TaggedValue, CallError> {
        let _perf = perf::track(name);

        let registration = self
            .entries
            .get_mut(name)
            .ok_or_else(|| CallError::Unregistered {
                name: name.to_string(),
            })?;

        let expected = registration.signature.arity();
        let actual = args.arity();
        if expected != actual {
            self.stats.arity_failures += 1;
            log_arity_fault(name, expected, actual);
            return Err(ArityError {
                function: name.to_string(),
                expected,
                actual,
            }
            .into());
        }

        registration.state = CallState::Invoked;
        self.stats.calls += 1;
        log_callback_call(name, actual, session.id);

        let mut ctx = CallContext::new(name, session, args);
        let result = (registration.callback)(&mut ctx);
        let (output, encode_failure) = ctx.finish();

        let outcome = match (result, encode_failure) {
            (_, Some(source)) => Err(CallError::Encode {
                function: name.to_string(),
                source,
            }),
            (Err(cause), None) => Err(CallError::Callback {
                function: name.to_string(),
                cause,
            }),
            (Ok(()), None) => match output {
                Some(TaggedValue::Error(message)) => Err(CallError::Callback {
                    function: name.to_string(),
                    cause: message.into(),
                }),
                Some(value) => Ok(value),
                None => Ok(TaggedValue::Null),
            },
        };

        match &outcome {
            Ok(value) => {
                registration.state = CallState::Returned;
                log_callback_return(name, value.kind());
            }
            Err(err) => {
                registration.state = CallState::Faulted;
                self.stats.faults += 1;
                log_callback_fault(name, err);
            }
        }

        outcome
    }
}
