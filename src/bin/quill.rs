use std::{fs, path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use quill::{Config, Interpreter, Outcome, QuillError, Repl, RunState};

#[derive(Parser)]
#[command(author, version, about = "Quill language interpreter")]
struct Args {
    /// TOML file with interpreter settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a Quill script file
    Run { script: PathBuf },
    /// Evaluate a snippet and print its last value
    Eval { source: String },
    /// Print the syntax tree of a script file
    Ast { script: PathBuf },
    /// Start an interactive REPL session
    Repl,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let args = Args::parse();
    match dispatch(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(args: Args) -> Result<ExitCode, QuillError> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    match args.command.unwrap_or(Command::Repl) {
        Command::Run { script } => run_script(script, config, args.config.is_some()),
        Command::Eval { source } => {
            let mut interpreter = Interpreter::with_config(config);
            match interpreter.eval_source(&source)? {
                Outcome::Value(value) if value.is_null() => {}
                Outcome::Value(value) => println!("{value}"),
                Outcome::Suspended(suspension) => {
                    eprintln!("suspended on `{}` with no host to resume it", suspension.label);
                    return Ok(ExitCode::FAILURE);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Ast { script } => {
            let source = fs::read_to_string(&script)?;
            let interpreter = Interpreter::with_config(config);
            for stmt in interpreter.parse(&source)? {
                println!("{stmt:#?}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Repl => {
            Repl::with_config(config).run()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_script(path: PathBuf, mut config: Config, configured: bool) -> Result<ExitCode, QuillError> {
    let source = fs::read_to_string(&path)?;
    if !configured {
        config.source_name = path.display().to_string();
    }
    let mut interpreter = Interpreter::with_config(config);
    match interpreter.execute(&source) {
        RunState::Completed => Ok(ExitCode::SUCCESS),
        RunState::Errored => {
            // Unhandled errors were already reported through tracing.
            let handled = interpreter.last_error().is_some_and(|diag| diag.handled);
            Ok(if handled {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        state => {
            if let Some(suspension) = interpreter.pending_suspension() {
                eprintln!(
                    "script suspended on `{}` ({}) with no host to resume it",
                    suspension.label, suspension.token
                );
            } else {
                eprintln!("script stopped in state {state:?}");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
