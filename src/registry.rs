use std::{fmt, rc::Rc};

use indexmap::{IndexMap, IndexSet};

use crate::{
    ast::{ExtensionNode, Stmt},
    control::{Flow, Outcome},
    diagnostics::{Diagnostic, Result},
    environment::EnvironmentRef,
    lexer::Token,
    parser::Parser,
    runtime::Interpreter,
    value::Value,
};

pub const BUILTIN_KEYWORDS: &[&str] = &[
    "function", "return", "class", "extends", "this", "if", "else", "while", "for", "break",
    "continue", "try", "catch", "finally", "throw",
];

pub type NativeFunction = Rc<dyn Fn(&mut Interpreter, &[Value], &EnvironmentRef) -> Result<Outcome>>;

pub type NativeMethod =
    Rc<dyn Fn(&mut Interpreter, &Value, &[Value], &EnvironmentRef) -> Result<Outcome>>;

pub type StatementParser = Rc<dyn Fn(&mut Parser<'_>, &Token) -> std::result::Result<Stmt, Diagnostic>>;

pub type StatementExecutor =
    Rc<dyn Fn(&mut Interpreter, &ExtensionNode, &EnvironmentRef) -> Result<Flow>>;

#[derive(Clone)]
pub enum Handler {
    Value(Value),
    Function(NativeFunction),
    Method(NativeMethod),
    Dual {
        function: NativeFunction,
        method: NativeMethod,
    },
    Statement(StatementParser),
    Executor(StatementExecutor),
}

impl Handler {
    pub fn value(value: impl Into<Value>) -> Self {
        Handler::Value(value.into())
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&mut Interpreter, &[Value], &EnvironmentRef) -> Result<Outcome> + 'static,
    {
        Handler::Function(Rc::new(f))
    }

    pub fn method<F>(f: F) -> Self
    where
        F: Fn(&mut Interpreter, &Value, &[Value], &EnvironmentRef) -> Result<Outcome> + 'static,
    {
        Handler::Method(Rc::new(f))
    }

    pub fn dual<F>(f: F) -> Self
    where
        F: Fn(&mut Interpreter, &[Value], &EnvironmentRef) -> Result<Outcome> + 'static,
    {
        let function: NativeFunction = Rc::new(f);
        let shared = Rc::clone(&function);
        let method: NativeMethod = Rc::new(
            move |interp: &mut Interpreter, target: &Value, args: &[Value], env: &EnvironmentRef| {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(target.clone());
                full.extend_from_slice(args);
                shared(interp, &full, env)
            },
        );
        Handler::Dual { function, method }
    }

    pub fn statement<F>(f: F) -> Self
    where
        F: Fn(&mut Parser<'_>, &Token) -> std::result::Result<Stmt, Diagnostic> + 'static,
    {
        Handler::Statement(Rc::new(f))
    }

    pub fn executor<F>(f: F) -> Self
    where
        F: Fn(&mut Interpreter, &ExtensionNode, &EnvironmentRef) -> Result<Flow> + 'static,
    {
        Handler::Executor(Rc::new(f))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Handler::Value(_) => "value",
            Handler::Function(_) => "function",
            Handler::Method(_) => "method",
            Handler::Dual { .. } => "dual",
            Handler::Statement(_) => "statement",
            Handler::Executor(_) => "executor",
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Value(value) => write!(f, "Handler::Value({value:?})"),
            other => write!(f, "Handler::{}", other.kind()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Registry {
    keywords: IndexSet<String>,
    handlers: IndexMap<String, Handler>,
    statements: IndexMap<String, Handler>,
    executors: IndexMap<String, Handler>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            keywords: BUILTIN_KEYWORDS.iter().map(|kw| kw.to_string()).collect(),
            handlers: IndexMap::new(),
            statements: IndexMap::new(),
            executors: IndexMap::new(),
        }
    }

    pub fn register_keyword(&mut self, name: impl Into<String>) {
        self.keywords.insert(name.into());
    }

    pub fn register_handler(&mut self, name: impl Into<String>, handler: Handler) {
        let name = name.into();
        match handler {
            Handler::Statement(_) => {
                self.keywords.insert(name.clone());
                self.statements.insert(name, handler);
            }
            Handler::Executor(_) => {
                self.executors.insert(name, handler);
            }
            _ => {
                self.handlers.insert(name, handler);
            }
        }
    }

    pub fn keywords(&self) -> &IndexSet<String> {
        &self.keywords
    }

    pub fn is_keyword(&self, name: &str) -> bool {
        self.keywords.contains(name)
    }

    pub fn is_builtin_keyword(name: &str) -> bool {
        BUILTIN_KEYWORDS.contains(&name)
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        match self.handlers.get(name)? {
            Handler::Value(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn function(&self, name: &str) -> Option<NativeFunction> {
        match self.handlers.get(name)? {
            Handler::Function(function) | Handler::Dual { function, .. } => {
                Some(Rc::clone(function))
            }
            _ => None,
        }
    }

    pub fn method(&self, name: &str) -> Option<NativeMethod> {
        match self.handlers.get(name)? {
            Handler::Method(method) | Handler::Dual { method, .. } => Some(Rc::clone(method)),
            _ => None,
        }
    }

    pub fn statement(&self, keyword: &str) -> Option<StatementParser> {
        match self.statements.get(keyword)? {
            Handler::Statement(parser) => Some(Rc::clone(parser)),
            _ => None,
        }
    }

    pub fn executor(&self, tag: &str) -> Option<StatementExecutor> {
        match self.executors.get(tag)? {
            Handler::Executor(executor) => Some(Rc::clone(executor)),
            _ => None,
        }
    }
}
