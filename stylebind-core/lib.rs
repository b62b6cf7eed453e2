//! Stylebind - host functions for a style-sheet compiler
//!
//! A style sheet is parsed and evaluated inside a [`Session`]; calls to
//! functions the host registered on that session are dispatched through the
//! callback runtime in `stylebind-runtime`, and everything else is printed as
//! plain CSS.

// Compiler modules
pub mod compiler {
    pub mod ast;
    pub mod errors;
    pub mod frontend;
    pub mod engine;
}

// Infrastructure (logging)
pub mod infrastructure;

// Re-export commonly used items for convenience
pub use compiler::{
    ast::{SourceLocation, SourceText, Stylesheet},
    engine::{compile, Session},
    errors::{Diagnostic, DiagnosticCollector, Severity},
    frontend::{parse_stylesheet, CompileConfig, Config, ConfigError, OutputStyle},
};

pub use infrastructure::{init_dev_logging, init_logging, LogConfig, LogFormat, LogOutput};

pub use stylebind_runtime::interop::{CallState, CallbackFailure, Color, Number, Rgba, Separator};
pub use stylebind_runtime::{
    CallArgs, CallContext, CallError, NativeValue, Registry, SessionInfo, Signature, TaggedValue,
    TargetShape,
};
