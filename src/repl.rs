use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{
    config::Config,
    control::Outcome,
    diagnostics::{QuillError, Result},
    runtime::Interpreter,
};

pub struct Repl {
    interpreter: Interpreter,
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

impl Repl {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            interpreter: Interpreter::with_config(config),
        }
    }

    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().map_err(readline_error)?;
        loop {
            match editor.readline("quill> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed == ":quit" || trimmed == ":exit" {
                        break;
                    }
                    if trimmed.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(trimmed).ok();
                    self.handle_line(trimmed);
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(readline_error(err)),
            }
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &str) {
        if let Some(source) = line.strip_prefix(":ast") {
            match self.interpreter.parse(source.trim()) {
                Ok(program) => {
                    for stmt in program {
                        println!("{stmt:#?}");
                    }
                }
                Err(err) => eprintln!("{err}"),
            }
            return;
        }
        match self.interpreter.eval_source(line) {
            Ok(Outcome::Value(value)) if value.is_null() => {}
            Ok(Outcome::Value(value)) => println!("{value:?}"),
            Ok(Outcome::Suspended(suspension)) => {
                println!(
                    "suspended on `{}` ({}); nothing in the REPL resumes it",
                    suspension.label, suspension.token
                );
            }
            Err(err) => eprintln!("{err}"),
        }
    }
}

fn readline_error(err: ReadlineError) -> QuillError {
    QuillError::from(std::io::Error::new(std::io::ErrorKind::Other, err))
}
