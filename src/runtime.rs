use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{error, trace, warn};

use crate::{
    ast::{Stmt, StmtKind},
    config::{Config, ERROR_HANDLER_VARIABLE, STRICT_VARIABLE},
    control::{Flow, Outcome, ResumeToken, Suspension},
    controller::{Continuation, RunState},
    diagnostics::{Diagnostic, QuillError, Result, SourceFile},
    environment::{Environment, EnvironmentRef},
    lexer::Lexer,
    parser::Parser,
    prelude,
    ready,
    registry::{Handler, Registry},
    value::{Value, ValueKind},
};

pub struct Interpreter {
    config: Config,
    registry: Registry,
    globals: EnvironmentRef,
    continuation: Continuation,
    active_source: Rc<SourceFile>,
    next_token: u64,
    pub(crate) call_depth: usize,
    intercepting: bool,
    last_error: Option<Diagnostic>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let source = Rc::new(SourceFile::new(config.source_name.clone(), ""));
        let mut registry = Registry::new();
        prelude::install(&mut registry);
        Self {
            config,
            registry,
            globals: Environment::new(),
            continuation: Continuation::new(Rc::clone(&source)),
            active_source: source,
            next_token: 0,
            call_depth: 0,
            intercepting: false,
            last_error: None,
        }
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

    pub fn register_keyword(&mut self, name: impl Into<String>) {
        self.registry.register_keyword(name);
    }

    pub fn register_handler(&mut self, name: impl Into<String>, handler: Handler) {
        self.registry.register_handler(name, handler);
    }

    pub fn globals(&self) -> EnvironmentRef {
        Rc::clone(&self.globals)
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        Environment::get(&self.globals, name)
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        Environment::set(&self.globals, name, value);
    }

    pub fn state(&self) -> RunState {
        self.continuation.state()
    }

    pub fn is_paused(&self) -> bool {
        self.continuation.is_paused()
    }

    pub fn pending_suspension(&self) -> Option<&Suspension> {
        self.continuation.pending_suspension()
    }

    pub fn last_error(&self) -> Option<&Diagnostic> {
        self.last_error.as_ref()
    }

    pub fn parse(&self, source: &str) -> Result<Vec<Stmt>> {
        let file = Rc::new(SourceFile::new(self.config.source_name.clone(), source));
        self.parse_file(&file, false)
    }

    pub fn parse_imported(&self, name: &str, text: &str) -> Result<Vec<Stmt>> {
        let file = Rc::new(SourceFile::new(name, text));
        self.parse_file(&file, true)
    }

    fn parse_file(&self, file: &Rc<SourceFile>, tag_origin: bool) -> Result<Vec<Stmt>> {
        let tokens = Lexer::new(&file.text, self.registry.keywords())
            .tokenize()
            .map_err(|diag| diag.with_source(Rc::clone(file)))?;
        let mut parser = Parser::new(tokens, &self.registry);
        if tag_origin {
            parser = parser.with_origin(Rc::clone(file));
        }
        let program = parser
            .parse_program()
            .map_err(|diag| diag.with_source(Rc::clone(file)))?;
        Ok(program)
    }

    /// Lexes, parses and runs `source` as a new program until it completes,
    /// fails or suspends. Failures are not returned; see [`Self::last_error`].
    pub fn execute(&mut self, source: &str) -> RunState {
        if let RunState::Suspended(token) = self.continuation.state() {
            warn!(%token, "discarding suspended program for a new execution");
        }
        let file = Rc::new(SourceFile::new(self.config.source_name.clone(), source));
        self.last_error = None;
        self.call_depth = 0;
        self.active_source = Rc::clone(&file);
        match self.parse_file(&file, false) {
            Ok(program) => {
                self.continuation.seed(program, file);
                self.pump()
            }
            Err(err) => {
                self.continuation.seed(Vec::new(), file);
                self.fail(err);
                RunState::Errored
            }
        }
    }

    /// Delivers the result of the pending host operation and continues with
    /// the next top-level statement.
    pub fn resume(&mut self, token: ResumeToken, value: Value) -> Result<RunState> {
        let target = self.continuation.resume(token)?;
        if let Some(name) = target {
            Environment::set(&self.globals, &name, value);
        }
        self.active_source = self.continuation.source();
        Ok(self.pump())
    }

    /// Starts a suspension for a host operation. Native handlers return the
    /// result; the host later calls [`Self::resume`] with the same token.
    pub fn suspend(&mut self, label: impl Into<String>, payload: Value) -> Outcome {
        self.next_token += 1;
        Outcome::Suspended(Suspension {
            token: ResumeToken(self.next_token),
            label: label.into(),
            payload,
        })
    }

    pub fn eval_source(&mut self, source: &str) -> Result<Outcome> {
        let file = Rc::new(SourceFile::new(self.config.source_name.clone(), source));
        let program = self.parse_file(&file, false)?;
        self.active_source = file;
        let globals = Rc::clone(&self.globals);
        self.run_statements(&program, &globals)
    }

    pub fn run_imported(&mut self, name: &str, text: &str) -> Result<Outcome> {
        let program = self.parse_imported(name, text)?;
        let globals = Rc::clone(&self.globals);
        self.run_statements(&program, &globals)
    }

    fn run_statements(&mut self, program: &[Stmt], env: &EnvironmentRef) -> Result<Outcome> {
        let mut last = Value::null();
        for stmt in program {
            if let StmtKind::Expression(expr) = &stmt.kind {
                last = ready!(self.evaluate(expr, env)?);
                continue;
            }
            match self.execute_statement(stmt, env)? {
                Flow::Normal => {}
                Flow::Return(value) => return Ok(Outcome::Value(value)),
                Flow::Suspend(suspension) => return Ok(Outcome::Suspended(suspension)),
                flow @ (Flow::Break | Flow::Continue) => {
                    let err = loop_control_error(&flow);
                    return Err(self.locate(err, stmt.line, stmt.origin.as_ref()));
                }
            }
        }
        Ok(Outcome::Value(last))
    }

    fn pump(&mut self) -> RunState {
        let program = self.continuation.program();
        let globals = Rc::clone(&self.globals);
        while let Some(stmt) = program.get(self.continuation.index()) {
            trace!(
                index = self.continuation.index(),
                line = stmt.line + 1,
                "executing top-level statement"
            );
            match self.execute_statement(stmt, &globals) {
                Ok(Flow::Normal) => self.continuation.advance(),
                Ok(Flow::Return(_)) => break,
                Ok(Flow::Suspend(suspension)) => {
                    let target = match &stmt.kind {
                        StmtKind::Assign { name, .. } => Some(name.clone()),
                        _ => None,
                    };
                    self.continuation.suspend(suspension, target);
                    return self.continuation.state();
                }
                Ok(flow @ (Flow::Break | Flow::Continue)) => {
                    let err = self.locate(loop_control_error(&flow), stmt.line, stmt.origin.as_ref());
                    self.fail(err);
                    return RunState::Errored;
                }
                Err(err) => {
                    self.fail(err);
                    return RunState::Errored;
                }
            }
        }
        self.continuation.complete();
        RunState::Completed
    }

    fn fail(&mut self, err: QuillError) {
        let diag = match err {
            QuillError::Diagnostic(diag) => diag,
            other => Diagnostic::runtime(other.to_string()),
        };
        let mut diag = diag.with_source(self.continuation.source());
        self.continuation.fail();
        self.call_depth = 0;
        if self.intercept(&diag) {
            diag.handled = true;
        } else {
            error!("{diag}");
        }
        self.last_error = Some(diag);
    }

    fn intercept(&mut self, diag: &Diagnostic) -> bool {
        if self.intercepting {
            return false;
        }
        let Some(handler) = Environment::get(&self.globals, ERROR_HANDLER_VARIABLE) else {
            return false;
        };
        if !matches!(handler.kind(), ValueKind::Function(_)) {
            return false;
        }
        self.intercepting = true;
        let scope = Environment::with_parent(Rc::clone(&self.globals));
        let record = error_record(diag);
        let result = self.call_value(&handler, &[record], &scope);
        self.intercepting = false;
        match result {
            Ok(_) => true,
            Err(err) => {
                error!("error handler `{ERROR_HANDLER_VARIABLE}` failed: {err}");
                false
            }
        }
    }

    pub(crate) fn strict(&self) -> bool {
        self.config.strict_types
            || Environment::get(&self.globals, STRICT_VARIABLE).is_some_and(|flag| flag.is_truthy())
    }

    pub(crate) fn locate(
        &self,
        err: impl Into<QuillError>,
        line: usize,
        origin: Option<&Rc<SourceFile>>,
    ) -> QuillError {
        match err.into() {
            QuillError::Diagnostic(diag) => {
                let source = origin
                    .cloned()
                    .unwrap_or_else(|| Rc::clone(&self.active_source));
                QuillError::Diagnostic(diag.with_line(line).with_source(source))
            }
            other => other,
        }
    }
}

pub fn error_record(diag: &Diagnostic) -> Value {
    let mut record = IndexMap::new();
    record.insert("message".to_string(), Value::string(diag.message.clone()));
    record.insert("kind".to_string(), Value::string(diag.kind.label()));
    record.insert(
        "line".to_string(),
        diag.line
            .map(|line| Value::number((line + 1) as f64))
            .unwrap_or_else(Value::null),
    );
    record.insert(
        "value".to_string(),
        diag.thrown
            .clone()
            .unwrap_or_else(|| Value::string(diag.message.clone())),
    );
    Value::object(record)
}

pub(crate) fn loop_control_error(flow: &Flow) -> Diagnostic {
    let keyword = match flow {
        Flow::Continue => "continue",
        _ => "break",
    };
    Diagnostic::runtime(format!("`{keyword}` used outside of a loop"))
}
