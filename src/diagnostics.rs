use std::{fmt, rc::Rc};

use thiserror::Error;

use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
    pub lines: Vec<String>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let lines = text.lines().map(str::to_string).collect();
        Self {
            name: name.into(),
            text,
            lines,
        }
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexer,
    Parser,
    Runtime,
    Throw,
}

impl DiagnosticKind {
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosticKind::Lexer => "LexError",
            DiagnosticKind::Parser => "ParseError",
            DiagnosticKind::Runtime => "RuntimeError",
            DiagnosticKind::Throw => "UserThrow",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetails {
    pub expected: Option<String>,
    pub got: Option<String>,
    pub variable: Option<String>,
    pub value: Option<String>,
    pub operator: Option<String>,
    pub suggestion: Option<String>,
}

impl ErrorDetails {
    fn fields(&self) -> [(&'static str, Option<&String>); 6] {
        [
            ("expected", self.expected.as_ref()),
            ("got", self.got.as_ref()),
            ("variable", self.variable.as_ref()),
            ("value", self.value.as_ref()),
            ("operator", self.operator.as_ref()),
            ("suggestion", self.suggestion.as_ref()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub line: Option<usize>,
    pub source: Option<Rc<SourceFile>>,
    pub details: ErrorDetails,
    pub notes: Vec<String>,
    pub thrown: Option<Value>,
    pub handled: bool,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
            source: None,
            details: ErrorDetails::default(),
            notes: Vec::new(),
            thrown: None,
            handled: false,
        }
    }

    pub fn lexer(message: impl Into<String>, line: usize) -> Self {
        Self::new(DiagnosticKind::Lexer, message).with_line(line)
    }

    pub fn parser(message: impl Into<String>, line: usize) -> Self {
        Self::new(DiagnosticKind::Parser, message).with_line(line)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Runtime, message)
    }

    /// Sets the line unless one was already recorded closer to the fault.
    pub fn with_line(mut self, line: usize) -> Self {
        if self.line.is_none() {
            self.line = Some(line);
        }
        self
    }

    pub fn with_source(mut self, source: Rc<SourceFile>) -> Self {
        if self.source.is_none() {
            self.source = Some(source);
        }
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.details.expected = Some(expected.into());
        self
    }

    pub fn with_got(mut self, got: impl Into<String>) -> Self {
        self.details.got = Some(got.into());
        self
    }

    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.details.variable = Some(variable.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.details.value = Some(value.into());
        self
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.details.operator = Some(operator.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.details.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_thrown(mut self, value: Value) -> Self {
        self.thrown = Some(value);
        self
    }

    pub fn window(&self) -> Vec<(usize, &str, bool)> {
        let (Some(source), Some(line)) = (self.source.as_deref(), self.line) else {
            return Vec::new();
        };
        let first = line.saturating_sub(1);
        (first..=line + 1)
            .filter_map(|idx| source.line(idx).map(|text| (idx + 1, text, idx == line)))
            .collect()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.label())?;
        if let Some(source) = &self.source {
            write!(f, " in {}", source.name)?;
        }
        if let Some(line) = self.line {
            write!(f, ", line {}", line + 1)?;
        }
        writeln!(f)?;
        let window = self.window();
        let width = window
            .iter()
            .map(|(number, _, _)| number.to_string().len())
            .max()
            .unwrap_or(1);
        for (number, text, offending) in window {
            let marker = if offending { '>' } else { ' ' };
            writeln!(f, "{marker} {number:>width$} | {text}")?;
        }
        write!(f, "{}", self.message)?;
        for (name, value) in self.details.fields() {
            if let Some(value) = value {
                write!(f, "\n  {name}: {value}")?;
            }
        }
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

#[derive(Debug, Error)]
pub enum QuillError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl QuillError {
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            QuillError::Diagnostic(diag) => Some(diag),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, QuillError>;
