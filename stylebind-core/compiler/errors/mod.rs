use crate::compiler::ast::{SourceLocation, SourceText};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("Error"),
            Self::Warning => f.write_str("Warning"),
        }
    }
}

/// Positioned compile-time message
///
/// Renders as
///
/// ```text
/// Error > <source-name>:<line>
/// <message>
/// <context lines, each newline-terminated>
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{severity} > {source_name}:{line}\n{message}\n{source_snippet}")]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub source_name: String,
    pub source_snippet: String,
}

impl Diagnostic {
    /// Error at `location`, with `context_lines` lines of source either side
    pub fn error(
        message: impl Into<String>,
        location: SourceLocation,
        source: &SourceText,
        context_lines: usize,
    ) -> Self {
        Self::at(Severity::Error, message, location, source, context_lines)
    }

    pub fn warning(
        message: impl Into<String>,
        location: SourceLocation,
        source: &SourceText,
        context_lines: usize,
    ) -> Self {
        Self::at(Severity::Warning, message, location, source, context_lines)
    }

    fn at(
        severity: Severity,
        message: impl Into<String>,
        location: SourceLocation,
        source: &SourceText,
        context_lines: usize,
    ) -> Self {
        let source_snippet = source
            .context(location.line, context_lines)
            .into_iter()
            .fold(String::new(), |mut snippet, line| {
                snippet.push_str(line);
                snippet.push('\n');
                snippet
            });

        Self {
            severity,
            message: message.into(),
            line: location.line,
            column: location.column,
            source_name: source.name().to_string(),
            source_snippet,
        }
    }

    /// Text form used for terminal output
    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Collector for diagnostics raised during one compilation
#[derive(Debug, Clone)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
    max_diagnostics: usize,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::with_max(100)
    }

    pub fn with_max(max_diagnostics: usize) -> Self {
        Self {
            diagnostics: Vec::new(),
            max_diagnostics,
        }
    }

    /// Record a diagnostic; returns false once the limit is reached
    pub fn add(&mut self, diagnostic: Diagnostic) -> bool {
        if self.diagnostics.len() < self.max_diagnostics {
            self.diagnostics.push(diagnostic);
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
    }
}

impl Default for DiagnosticCollector {
    fn default() -> Self {
        Self::new()
    }
}
