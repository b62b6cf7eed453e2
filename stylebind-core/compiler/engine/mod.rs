//! Compilation sessions and evaluation
//!
//! A [`Session`] owns everything one compilation run needs: its handle, the
//! functions registered for it, configuration, and the warnings raised by
//! the last compile. Sessions share no state, so independent sessions may
//! compile on different threads at the same time.
//!
//! Calls to registered functions are dispatched synchronously in source
//! order. Unregistered names are printed back as plain CSS functions.

pub mod emit;

pub use emit::{render, CssBlock, CssDeclaration, EmitError, Formatter};

use crate::compiler::ast::{Call, Declaration, Expr, Rule, RuleItem, SourceLocation, SourceText};
use crate::compiler::errors::{Diagnostic, DiagnosticCollector};
use crate::compiler::frontend::{parse_stylesheet, Config};
use stylebind_runtime::interop::{CallbackFailure, Separator, SignatureParseError};
use stylebind_runtime::{CallArgs, CallContext, Registry, SessionInfo, Signature, TaggedValue};
use tracing::{debug, instrument, trace, warn};

/// One independent compilation run
#[derive(Debug)]
pub struct Session {
    info: SessionInfo,
    registry: Registry,
    config: Config,
    warnings: DiagnosticCollector,
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            info: SessionInfo::new(config.compile.source_name.clone()),
            registry: Registry::new(),
            config,
            warnings: DiagnosticCollector::new(),
        }
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Register a host function; a later registration of the same name wins
    pub fn register<F>(
        &mut self,
        signature: &str,
        callback: F,
    ) -> Result<Option<Signature>, SignatureParseError>
    where
        F: FnMut(&mut CallContext<'_>) -> Result<(), CallbackFailure> + Send + 'static,
    {
        self.registry.register(signature, callback)
    }

    /// Warnings raised by callbacks during the last compile
    pub fn warnings(&self) -> &[Diagnostic] {
        self.warnings.diagnostics()
    }

    pub fn compile(&mut self, source: &str) -> Result<String, Diagnostic> {
        compile(source, self)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile `source` with the functions registered in `session`
///
/// Any parse error, callback failure or unprintable value stops the
/// compilation and is returned as the only diagnostic; no partial output
/// is produced.
#[instrument(skip_all, fields(session = session.info.id, source_len = source.len()))]
pub fn compile(source: &str, session: &mut Session) -> Result<String, Diagnostic> {
    session.warnings.clear();

    let text = SourceText::new(session.info.source_name.clone(), source);
    let settings = session.config.compile.clone();

    let sheet = parse_stylesheet(source).map_err(|e| {
        Diagnostic::error(
            e.message.clone(),
            text.location(e.offset),
            &text,
            settings.context_lines,
        )
    })?;

    let mut evaluator = Evaluator {
        session,
        source: &text,
        formatter: Formatter::new(settings.output_style, settings.precision),
        context_lines: settings.context_lines,
        blocks: Vec::new(),
    };
    for rule in &sheet.rules {
        evaluator.rule(rule, &[])?;
    }
    let blocks = evaluator.blocks;

    let css = render(&blocks, settings.output_style);
    debug!(
        blocks = blocks.len(),
        warnings = session.warnings.len(),
        "Compiled stylesheet"
    );
    Ok(css)
}

struct Evaluator<'a> {
    session: &'a mut Session,
    source: &'a SourceText,
    formatter: Formatter,
    context_lines: usize,
    blocks: Vec<CssBlock>,
}

impl Evaluator<'_> {
    fn error(&self, message: impl Into<String>, location: SourceLocation) -> Diagnostic {
        Diagnostic::error(message, location, self.source, self.context_lines)
    }

    /// Flatten `rule` under `parents`, evaluating its items in source order
    fn rule(&mut self, rule: &Rule, parents: &[String]) -> Result<(), Diagnostic> {
        let selectors = resolve_selectors(parents, &rule.selectors);

        // The parent block precedes its nested blocks in the output
        let slot = self.blocks.len();
        self.blocks.push(CssBlock {
            selectors: selectors.clone(),
            declarations: Vec::new(),
        });

        for item in &rule.items {
            match item {
                RuleItem::Declaration(decl) => {
                    if let Some(printed) = self.declaration(decl)? {
                        self.blocks[slot].declarations.push(printed);
                    }
                }
                RuleItem::Rule(child) => self.rule(child, &selectors)?,
            }
        }
        Ok(())
    }

    fn declaration(&mut self, decl: &Declaration) -> Result<Option<CssDeclaration>, Diagnostic> {
        let value = self.eval(&decl.value)?;
        match self.formatter.value(&value) {
            Ok(Some(text)) => Ok(Some(CssDeclaration {
                property: decl.property.clone(),
                value: text,
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(self.error(e.to_string(), decl.location)),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<TaggedValue, Diagnostic> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::List { items, separator } => {
                let items = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>, Diagnostic>>()?;
                Ok(TaggedValue::List {
                    items,
                    separator: *separator,
                })
            }
            Expr::Map(entries) => {
                let entries = entries
                    .iter()
                    .map(|(k, v)| -> Result<_, Diagnostic> { Ok((self.eval(k)?, self.eval(v)?)) })
                    .collect::<Result<Vec<_>, Diagnostic>>()?;
                Ok(TaggedValue::Map(entries))
            }
            Expr::Call(call) => self.call(call),
        }
    }

    fn call(&mut self, call: &Call) -> Result<TaggedValue, Diagnostic> {
        let args = call
            .args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>, Diagnostic>>()?;

        if !self.session.registry.contains(&call.name) {
            return self.plain_function(call, &args);
        }

        let result = self
            .session
            .registry
            .dispatch(&call.name, CallArgs::new(args), &self.session.info);

        match result {
            Ok(TaggedValue::Warning(message)) => {
                warn!(function = %call.name, %message, "Callback returned a warning");
                let warning =
                    Diagnostic::warning(message, call.location, self.source, self.context_lines);
                self.session.warnings.add(warning);
                Ok(TaggedValue::Null)
            }
            Ok(value) => Ok(value),
            Err(err) => Err(self.error(err.to_string(), call.location)),
        }
    }

    /// `name(args)` printed verbatim for functions the host did not register
    fn plain_function(&self, call: &Call, args: &[TaggedValue]) -> Result<TaggedValue, Diagnostic> {
        trace!(function = %call.name, args = args.len(), "Passing through plain CSS function");

        let mut printed = Vec::with_capacity(args.len());
        for arg in args {
            match self.formatter.value(arg) {
                Ok(Some(text)) => printed.push(text),
                Ok(None) => {}
                Err(e) => return Err(self.error(e.to_string(), call.location)),
            }
        }

        Ok(TaggedValue::unquoted(format!(
            "{}({})",
            call.name,
            printed.join(self.formatter.separator(Separator::Comma))
        )))
    }
}

/// Combine nested selectors; `&` stands for the parent
fn resolve_selectors(parents: &[String], selectors: &[String]) -> Vec<String> {
    if parents.is_empty() {
        return selectors.to_vec();
    }
    parents
        .iter()
        .flat_map(|parent| {
            selectors.iter().map(move |selector| {
                if selector.contains('&') {
                    selector.replace('&', parent)
                } else {
                    format!("{} {}", parent, selector)
                }
            })
        })
        .collect()
}
