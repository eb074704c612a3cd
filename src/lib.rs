pub mod ast;
pub mod config;
pub mod control;
pub mod controller;
pub mod diagnostics;
pub mod environment;
pub mod evaluator;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod prelude;
pub mod registry;
pub mod repl;
pub mod runtime;
pub mod value;

pub use config::Config;
pub use control::{Flow, Outcome, ResumeToken, Suspension};
pub use controller::RunState;
pub use diagnostics::{Diagnostic, DiagnosticKind, QuillError, Result, SourceFile};
pub use environment::{Environment, EnvironmentRef};
pub use registry::{Handler, Registry};
pub use repl::Repl;
pub use runtime::Interpreter;
pub use value::Value;
