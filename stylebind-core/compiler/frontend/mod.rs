pub mod parser;
pub mod config;

pub use parser::{parse_stylesheet, parse_value, ParseError};
pub use config::{CompileConfig, Config, ConfigError, LogFormatName, LoggingConfig, OutputStyle};
