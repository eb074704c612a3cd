use quill::{DiagnosticKind, Handler, Interpreter, ResumeToken, RunState, Value};

/// An interpreter whose `wait(payload)` suspends until the test resumes it.
fn interpreter_with_wait() -> Interpreter {
    let mut interp = Interpreter::new();
    interp.register_handler(
        "wait",
        Handler::function(|interp, args, _| {
            let payload = args.first().cloned().unwrap_or_else(Value::null);
            Ok(interp.suspend("wait", payload))
        }),
    );
    interp
}

fn suspended_token(state: RunState) -> ResumeToken {
    match state {
        RunState::Suspended(token) => token,
        other => panic!("expected a suspended program, found {other:?}"),
    }
}

fn global(interp: &Interpreter, name: &str) -> Option<Value> {
    interp.get_global(name)
}

#[test]
fn fresh_interpreter_is_idle() {
    assert_eq!(Interpreter::new().state(), RunState::Idle);
}

#[test]
fn suspension_pauses_until_resumed() {
    let mut interp = interpreter_with_wait();
    let token = suspended_token(interp.execute("x = 1; y = wait(); x = 2"));

    assert!(interp.is_paused());
    assert_eq!(global(&interp, "x"), Some(Value::number(1.0)));
    assert_eq!(global(&interp, "y"), None);
    let pending = interp.pending_suspension().expect("pending operation");
    assert_eq!(pending.label, "wait");
    assert_eq!(pending.token, token);

    let state = interp.resume(token, Value::number(5.0)).unwrap();
    assert_eq!(state, RunState::Completed);
    assert!(!interp.is_paused());
    assert_eq!(global(&interp, "y"), Some(Value::number(5.0)));
    assert_eq!(global(&interp, "x"), Some(Value::number(2.0)));
    assert!(interp.pending_suspension().is_none());
}

#[test]
fn unresolved_operation_stays_suspended() {
    let mut interp = interpreter_with_wait();
    let token = suspended_token(interp.execute("x = 1\ny = wait()\nx = 2"));
    assert_eq!(interp.state(), RunState::Suspended(token));
    assert_eq!(global(&interp, "x"), Some(Value::number(1.0)));
}

#[test]
fn payload_reaches_the_host() {
    let mut interp = interpreter_with_wait();
    interp.execute("answer = wait(\"question\")");
    let pending = interp.pending_suspension().expect("pending operation");
    assert_eq!(pending.payload, Value::string("question"));
}

#[test]
fn successive_suspensions_get_fresh_tokens() {
    let mut interp = interpreter_with_wait();
    let first = suspended_token(interp.execute("a = wait(1)\nb = wait(2)\nc = a + b"));
    let second = suspended_token(interp.resume(first, Value::number(10.0)).unwrap());
    assert_ne!(first, second);
    assert_eq!(
        interp.pending_suspension().map(|s| s.payload.clone()),
        Some(Value::number(2.0))
    );

    assert_eq!(
        interp.resume(second, Value::number(20.0)).unwrap(),
        RunState::Completed
    );
    assert_eq!(global(&interp, "c"), Some(Value::number(30.0)));
}

#[test]
fn stale_token_is_rejected() {
    let mut interp = interpreter_with_wait();
    let first = suspended_token(interp.execute("a = wait()\nb = wait()"));
    let second = suspended_token(interp.resume(first, Value::null()).unwrap());

    let err = interp.resume(first, Value::null()).unwrap_err();
    assert!(err.to_string().contains("does not match"), "{err}");
    assert_eq!(interp.state(), RunState::Suspended(second));
}

#[test]
fn resume_after_completion_is_rejected() {
    let mut interp = interpreter_with_wait();
    let token = suspended_token(interp.execute("a = wait()"));
    interp.resume(token, Value::null()).unwrap();
    let err = interp.resume(token, Value::null()).unwrap_err();
    assert!(err.to_string().contains("not suspended"), "{err}");
}

#[test]
fn expression_statement_suspension_discards_the_value() {
    let mut interp = interpreter_with_wait();
    let token = suspended_token(interp.execute("wait()\ndone = true"));
    assert_eq!(
        interp.resume(token, Value::number(99.0)).unwrap(),
        RunState::Completed
    );
    assert_eq!(global(&interp, "done"), Some(Value::bool(true)));
}

#[test]
fn suspension_inside_a_call_abandons_the_rest_of_the_call() {
    let source = r#"
log = []
function work() {
  push(log, "before")
  r = wait()
  push(log, "after")
}
work()
push(log, "next")
"#;
    let mut interp = interpreter_with_wait();
    let token = suspended_token(interp.execute(source));
    assert_eq!(
        global(&interp, "log").map(|v| v.to_string()),
        Some("[\"before\"]".to_string())
    );

    assert_eq!(
        interp.resume(token, Value::number(1.0)).unwrap(),
        RunState::Completed
    );
    assert_eq!(
        global(&interp, "log").map(|v| v.to_string()),
        Some("[\"before\", \"next\"]".to_string())
    );
    assert_eq!(global(&interp, "r"), None);
}

#[test]
fn suspension_inside_a_loop_resumes_after_the_loop() {
    let mut interp = interpreter_with_wait();
    let token = suspended_token(interp.execute("for (i = 0; i < 3; i++) { wait() }\nend = i"));
    interp.resume(token, Value::null()).unwrap();
    assert_eq!(global(&interp, "end"), Some(Value::number(0.0)));
}

#[test]
fn finally_is_skipped_when_the_body_suspends() {
    let mut interp = interpreter_with_wait();
    let token = suspended_token(
        interp.execute("log = []\ntry { r = wait() } finally { push(log, \"finally\") }"),
    );
    assert_eq!(interp.resume(token, Value::number(3.0)).unwrap(), RunState::Completed);
    assert_eq!(global(&interp, "log").map(|v| v.to_string()), Some("[]".into()));
    assert_eq!(global(&interp, "r"), None);
}

#[test]
fn unrecovered_error_is_terminal() {
    let mut interp = interpreter_with_wait();
    assert_eq!(interp.execute("x = 1\nboom()\nx = 2"), RunState::Errored);
    assert!(interp.is_paused());
    assert_eq!(global(&interp, "x"), Some(Value::number(1.0)));

    let diag = interp.last_error().expect("error recorded");
    assert_eq!(diag.kind, DiagnosticKind::Runtime);
    assert!(diag.message.contains("undefined function `boom`"));
    assert_eq!(diag.line, Some(1));
    assert!(!diag.handled);
}

#[test]
fn error_after_resume_is_terminal() {
    let mut interp = interpreter_with_wait();
    let token = suspended_token(interp.execute("y = wait()\nz = y + missing"));
    assert_eq!(interp.resume(token, Value::number(1.0)).unwrap(), RunState::Errored);
    assert!(interp.last_error().is_some_and(|d| d.message.contains("`missing`")));
    assert!(interp.resume(token, Value::null()).is_err());
}

#[test]
fn lex_and_parse_errors_end_the_program() {
    let mut interp = Interpreter::new();
    assert_eq!(interp.execute("x = \"abc"), RunState::Errored);
    assert_eq!(
        interp.last_error().map(|d| d.kind),
        Some(DiagnosticKind::Lexer)
    );

    assert_eq!(interp.execute("x = * 2"), RunState::Errored);
    assert_eq!(
        interp.last_error().map(|d| d.kind),
        Some(DiagnosticKind::Parser)
    );
}

#[test]
fn new_execution_replaces_a_suspended_one() {
    let mut interp = interpreter_with_wait();
    let token = suspended_token(interp.execute("y = wait()"));
    assert_eq!(interp.execute("z = 1"), RunState::Completed);
    assert!(interp.resume(token, Value::null()).is_err());
    assert_eq!(global(&interp, "z"), Some(Value::number(1.0)));
}

#[test]
fn error_interceptor_handles_the_error() {
    let source = r#"
handled = null
function onError(err) { handled = [err.kind, err.line, err.message] }
boom()
"#;
    let mut interp = Interpreter::new();
    assert_eq!(interp.execute(source), RunState::Errored);
    assert_eq!(
        global(&interp, "handled").map(|v| v.to_string()),
        Some("[\"RuntimeError\", 4, \"undefined function `boom`\"]".to_string())
    );
    assert!(interp.last_error().is_some_and(|d| d.handled));
}

#[test]
fn failing_interceptor_is_not_reentered() {
    let source = "calls = 0\nfunction onError(err) { calls += 1; explode() }\nboom()";
    let mut interp = Interpreter::new();
    assert_eq!(interp.execute(source), RunState::Errored);
    assert_eq!(global(&interp, "calls"), Some(Value::number(1.0)));
    assert!(interp.last_error().is_some_and(|d| !d.handled));
}

#[test]
fn recursion_limit_is_a_runtime_error() {
    let mut interp = Interpreter::with_config(quill::Config {
        max_call_depth: 24,
        ..quill::Config::default()
    });
    assert_eq!(
        interp.execute("function down(n) { return down(n + 1) }\ndown(0)"),
        RunState::Errored
    );
    assert!(interp
        .last_error()
        .is_some_and(|d| d.message.contains("infinite recursion")));
    assert_eq!(interp.execute("ok = 1"), RunState::Completed);
}
