use quill::{
    ast::{ExtensionField, ExtensionNode, StmtKind},
    ready, Config, Diagnostic, DiagnosticKind, Flow, Handler, Interpreter, Outcome, QuillError,
    Value,
};

fn eval_with(interp: &mut Interpreter, source: &str) -> Value {
    match interp.eval_source(source) {
        Ok(Outcome::Value(value)) => value,
        Ok(Outcome::Suspended(suspension)) => panic!("unexpected suspension {suspension:?}"),
        Err(err) => panic!("evaluation failed:\n{err}"),
    }
}

fn eval(source: &str) -> Value {
    eval_with(&mut Interpreter::new(), source)
}

fn eval_error_with(interp: &mut Interpreter, source: &str) -> Diagnostic {
    match interp.eval_source(source) {
        Ok(outcome) => panic!("expected an error, got {outcome:?}"),
        Err(QuillError::Diagnostic(diag)) => diag,
        Err(other) => panic!("expected a diagnostic, got {other}"),
    }
}

fn eval_error(source: &str) -> Diagnostic {
    eval_error_with(&mut Interpreter::new(), source)
}

fn render(source: &str) -> String {
    eval(source).to_string()
}

#[test]
fn plus_concatenates_adds_and_joins() {
    assert_eq!(eval("1 + \"x\""), Value::string("1x"));
    assert_eq!(eval("\"x\" + 1"), Value::string("x1"));
    assert_eq!(eval("1 + 2"), Value::number(3.0));
    assert_eq!(render("[1, 2] + [3]"), "[1, 2, 3]");
}

#[test]
fn plus_rejects_other_combinations() {
    let diag = eval_error("true + 1");
    assert_eq!(diag.kind, DiagnosticKind::Runtime);
    assert!(diag.message.contains("cannot apply `+`"), "{}", diag.message);
}

#[test]
fn strict_mode_from_config_rejects_mixing() {
    let config = Config {
        strict_types: true,
        ..Config::default()
    };
    let mut interp = Interpreter::with_config(config);
    let diag = eval_error_with(&mut interp, "1 + \"x\"");
    assert_eq!(diag.details.expected.as_deref(), Some("number-ish"));
    assert_eq!(diag.details.operator.as_deref(), Some("+"));
    assert_eq!(diag.details.got.as_deref(), Some("string"));
    assert!(diag.details.suggestion.is_some());
}

#[test]
fn strict_mode_from_reserved_variable() {
    let diag = eval_error("__strict__ = true\n\"5\" - 1");
    assert!(diag.message.contains("strict mode"), "{}", diag.message);
    assert_eq!(diag.details.expected.as_deref(), Some("number"));
    assert_eq!(diag.line, Some(1));

    assert_eq!(eval("\"5\" - 1"), Value::number(4.0));
    assert_eq!(eval("\"6\" * \"7\""), Value::number(42.0));
}

#[test]
fn failed_coercion_is_a_conversion_error() {
    let diag = eval_error("\"abc\" - 1");
    assert!(diag.message.contains("cannot convert"), "{}", diag.message);
    assert_eq!(diag.details.operator.as_deref(), Some("-"));
}

#[test]
fn equality_never_coerces_across_types() {
    assert_eq!(eval("1 == \"1\""), Value::bool(false));
    assert_eq!(eval("1 === 1"), Value::bool(true));
    assert_eq!(eval("null == false"), Value::bool(false));
    assert_eq!(eval("\"a\" != \"b\""), Value::bool(true));
}

#[test]
fn structured_values_compare_by_identity() {
    assert_eq!(eval("[1] == [1]"), Value::bool(false));
    assert_eq!(eval("a = {k: 1}\nb = a\na === b"), Value::bool(true));
}

#[test]
fn logical_operators_short_circuit_and_return_operands() {
    assert_eq!(eval("null || \"fallback\""), Value::string("fallback"));
    assert_eq!(eval("0 && missing()"), Value::number(0.0));
    assert_eq!(eval("\"left\" || missing()"), Value::string("left"));
    assert_eq!(eval("1 && \"right\""), Value::string("right"));
}

#[test]
fn comparisons_and_ternary() {
    assert_eq!(eval("\"a\" < \"b\""), Value::bool(true));
    assert_eq!(eval("x = 5\nx > 3 ? \"big\" : \"small\""), Value::string("big"));
    assert!(eval_error("1 < \"2\"").message.contains("cannot apply `<`"));
    assert_eq!(eval("10 / 4"), Value::number(2.5));
    assert_eq!(eval("!0"), Value::bool(true));
    assert_eq!(eval("-(2 + 3)"), Value::number(-5.0));
}

#[test]
fn big_integers_stay_exact() {
    assert_eq!(render("10n * 10n + 5n"), "105");
    assert_eq!(render("7n / 2n"), "3");
    assert_eq!(
        render("123456789012345678901234567890n + 1n"),
        "123456789012345678901234567891"
    );
    assert!(eval_error("1n + 1").message.contains("cannot apply `+`"));
    assert!(eval_error("1n / 0n").message.contains("division by zero"));
}

#[test]
fn templates_evaluate_embedded_expressions() {
    assert_eq!(
        eval("name = \"quill\"\n`hi ${name}, ${1 + 2} ${ {n: 4}.n }`"),
        Value::string("hi quill, 3 4")
    );
}

#[test]
fn template_errors_point_at_the_fragment_line() {
    let diag = eval_error("x = 1\nmsg = `a\n${missing}`");
    assert!(diag.message.contains("undefined variable `missing`"));
    assert_eq!(diag.line, Some(2));
}

#[test]
fn calls_resolve_names_in_the_callers_scope() {
    let source = r#"
function show() { return secret }
function caller() {
  secret = "from caller"
  return show()
}
caller()
"#;
    assert_eq!(eval(source), Value::string("from caller"));

    let diag = eval_error("function show() { return secret }\nshow()");
    assert!(diag.message.contains("undefined variable `secret`"));
}

#[test]
fn assignment_inside_a_call_updates_globals() {
    assert_eq!(
        eval("count = 0\nfunction bump() { count += 1 }\nbump(); bump()\ncount"),
        Value::number(2.0)
    );
}

#[test]
fn locals_do_not_leak_out_of_calls() {
    let diag = eval_error("function f() { local = 1 }\nf()\nlocal");
    assert!(diag.message.contains("undefined variable `local`"));
}

#[test]
fn default_and_rest_parameters() {
    let source = "function f(a, b = 10, ...rest) { return [a, b, rest] }\n";
    assert_eq!(render(&format!("{source}f(1)")), "[1, 10, []]");
    assert_eq!(render(&format!("{source}f(1, 2, 3, 4)")), "[1, 2, [3, 4]]");
}

#[test]
fn arrow_functions_and_function_literals() {
    assert_eq!(eval("double = x => x * 2\ndouble(21)"), Value::number(42.0));
    assert_eq!(
        eval("add = (a, b = 1) => { return a + b }\nadd(4)"),
        Value::number(5.0)
    );
    assert_eq!(
        eval("apply = function (f, v) { return f(v) }\napply(n => n + 1, 1)"),
        Value::number(2.0)
    );
}

#[test]
fn recursion_works_within_the_depth_limit() {
    let source = r#"
function fact(n) {
  if (n <= 1) return 1
  return n * fact(n - 1)
}
fact(10)
"#;
    assert_eq!(eval(source), Value::number(3_628_800.0));
}

#[test]
fn runaway_recursion_is_reported_under_the_default_limit() {
    let diag = eval_error("function spin(n) { return spin(n + 1) }\nspin(0)");
    assert!(diag.message.contains("infinite recursion"), "{}", diag.message);
    assert!(diag.message.contains("exceeded 128 in `spin`"), "{}", diag.message);
    assert!(diag
        .to_string()
        .contains("note: the limit comes from `max_call_depth` (128)"));
}

#[test]
fn deep_recursion_within_a_raised_limit() {
    let config = Config {
        max_call_depth: 3000,
        ..Config::default()
    };
    let mut interp = Interpreter::with_config(config);
    let source = r#"
function down(n) {
  if (n == 0) return "bottom"
  return down(n - 1)
}
down(2000)
"#;
    assert_eq!(eval_with(&mut interp, source), Value::string("bottom"));
}

#[test]
fn runaway_recursion_is_reported() {
    let config = Config {
        max_call_depth: 32,
        ..Config::default()
    };
    let mut interp = Interpreter::with_config(config);
    let diag = eval_error_with(&mut interp, "function spin() { return spin() }\nspin()");
    assert!(diag.message.contains("infinite recursion"), "{}", diag.message);
    assert_eq!(diag.line, Some(0));

    assert_eq!(
        eval_with(&mut interp, "function one() { return 1 }\none()"),
        Value::number(1.0)
    );
}

#[test]
fn classes_inherit_and_bind_this() {
    let source = r#"
class Animal {
  constructor(name) { this.name = name }
  describe() { return this.name + " says " + this.sound() }
}
class Dog extends Animal {
  sound() { return "woof" }
}
d = Dog("rex")
d.describe()
"#;
    let mut interp = Interpreter::new();
    assert_eq!(eval_with(&mut interp, source), Value::string("rex says woof"));
    assert_eq!(eval_with(&mut interp, "type_of(d)"), Value::string("Dog"));
    assert_eq!(eval_with(&mut interp, "d.name"), Value::string("rex"));
}

#[test]
fn extending_a_non_class_fails() {
    let diag = eval_error("Base = 1\nclass Child extends Base {}");
    assert!(diag.message.contains("not a class"));
}

#[test]
fn object_methods_see_this() {
    let source = r#"
counter = { n: 1, inc: function () { this.n += 1; return this.n } }
counter.inc()
counter.inc()
"#;
    assert_eq!(eval(source), Value::number(3.0));
}

#[test]
fn classic_for_with_continue() {
    let source = r#"
total = 0
for (i = 0; i < 5; i++) {
  if (i == 3) continue
  total += i
}
total
"#;
    assert_eq!(eval(source), Value::number(7.0));
}

#[test]
fn while_with_break() {
    let source = "n = 0\nwhile (true) {\n  n++\n  if (n >= 4) break\n}\nn";
    assert_eq!(eval(source), Value::number(4.0));
}

#[test]
fn for_of_and_for_in() {
    assert_eq!(
        eval("sum = 0\nfor (v of [1, 2, 3]) sum += v\nsum"),
        Value::number(6.0)
    );
    assert_eq!(
        eval("out = \"\"\nfor (ch of \"abc\") out = ch + out\nout"),
        Value::string("cba")
    );
    assert_eq!(
        eval("names = []\nfor (k in {a: 1, b: 2}) push(names, k)\njoin(names, \"-\")"),
        Value::string("a-b")
    );
    assert_eq!(
        render("idx = []\nfor (i in [\"x\", \"y\"]) idx.push(i)\nidx"),
        "[0, 1]"
    );
}

#[test]
fn break_outside_loop_is_an_error() {
    let diag = eval_error("break");
    assert!(diag.message.contains("`break` used outside of a loop"));
}

#[test]
fn arrays_grow_on_write_and_fail_on_out_of_bounds_read() {
    assert_eq!(render("items = [1, 2]\nitems[3] = 9\nitems"), "[1, 2, null, 9]");
    let diag = eval_error("items = [1]\nitems[5]");
    assert!(diag.message.contains("out of bounds"), "{}", diag.message);
    assert_eq!(eval("o = {}\no.missing"), Value::null());
}

#[test]
fn writes_far_past_the_end_are_rejected() {
    let diag = eval_error("a = []\na[1e18] = 1");
    assert_eq!(diag.kind, DiagnosticKind::Runtime);
    assert!(diag.message.contains("too far past the end"), "{}", diag.message);
    assert_eq!(diag.details.value.as_deref(), Some("1000000000000000000"));
    assert_eq!(diag.line, Some(1));

    let limit = quill::evaluator::MAX_ARRAY_GROWTH;
    assert_eq!(
        eval(&format!("a = []\na[{limit}] = 1\nlen(a)")),
        Value::number((limit + 1) as f64)
    );
    assert!(eval_error(&format!("a = []\na[{}] = 1", limit + 1))
        .message
        .contains("too far past the end"));
}

#[test]
fn arrays_are_shared_by_reference() {
    assert_eq!(render("a = [1]\nb = a\npush(b, 2)\na"), "[1, 2]");
}

#[test]
fn spreads_in_literals() {
    assert_eq!(render("a = [1, 2]\n[0, ...a, 3]"), "[0, 1, 2, 3]");
    assert_eq!(
        eval("base = {x: 1}\nmerged = {...base, y: 2}\nmerged.x + merged.y"),
        Value::number(3.0)
    );
    assert_eq!(render("[...\"hi\"]"), "[\"h\", \"i\"]");
}

#[test]
fn increments_on_names_members_and_indexes() {
    assert_eq!(render("x = 5\ny = x++\nz = ++x\n[x, y, z]"), "[7, 5, 7]");
    assert_eq!(eval("o = {n: 1}\no.n++\no.n"), Value::number(2.0));
    assert_eq!(eval("a = [1, 2]\n--a[1]\na[1]"), Value::number(1.0));
}

#[test]
fn compound_member_assignment() {
    assert_eq!(eval("o = {n: 2}\no.n *= 5\no[\"n\"]"), Value::number(10.0));
    assert_eq!(eval("a = [1]\na[0] += 4\na[0]"), Value::number(5.0));
}

#[test]
fn catch_receives_thrown_message() {
    assert_eq!(
        eval("result = null\ntry { throw \"boom\" } catch (e) { result = e.message }\nresult"),
        Value::string("boom")
    );
    assert_eq!(
        eval("code = null; kind = null\ntry { throw {message: \"bad\", code: 7} } catch (e) { code = e.value.code; kind = e.kind }\n[code, kind]")
            .to_string(),
        "[7, \"UserThrow\"]"
    );
}

#[test]
fn catch_receives_runtime_errors() {
    let source = "info = null\ntry {\n  missing()\n} catch (e) {\n  info = [e.kind, e.line, e.message]\n}\ninfo";
    assert_eq!(
        render(source),
        "[\"RuntimeError\", 3, \"undefined function `missing`\"]"
    );
}

#[test]
fn finally_runs_after_body_and_catch() {
    assert_eq!(
        eval("log = []\ntry { push(log, \"body\") } finally { push(log, \"finally\") }\njoin(log, \",\")"),
        Value::string("body,finally")
    );
    assert_eq!(
        eval("log = []\ntry { throw 1 } catch { push(log, \"catch\") } finally { push(log, \"finally\") }\njoin(log, \",\")"),
        Value::string("catch,finally")
    );
    let source = r#"
trace = ""
function f() {
  try { return "try" } finally { trace = "ran" }
}
r = f()
[r, trace]
"#;
    assert_eq!(render(source), "[\"try\", \"ran\"]");
}

#[test]
fn uncaught_throw_keeps_the_value() {
    let diag = eval_error("throw {message: \"nope\"}");
    assert_eq!(diag.kind, DiagnosticKind::Throw);
    assert_eq!(diag.message, "nope");
    assert!(diag.thrown.is_some());
}

#[test]
fn undefined_function_reports_its_line() {
    let diag = eval_error("x = 1\nfoo()");
    assert_eq!(diag.kind, DiagnosticKind::Runtime);
    assert!(diag.message.contains("undefined function `foo`"));
    assert_eq!(diag.line, Some(1));
    let rendered = diag.to_string();
    assert!(rendered.starts_with("RuntimeError in main, line 2"), "{rendered}");
    assert!(rendered.contains("> 2 | foo()"), "{rendered}");
    assert!(rendered.contains("  1 | x = 1"), "{rendered}");
}

#[test]
fn builtin_used_as_variable_suggests_a_call() {
    let diag = eval_error("x = print");
    assert!(diag
        .details
        .suggestion
        .as_deref()
        .is_some_and(|s| s.contains("print(...)")));
}

#[test]
fn prelude_functions() {
    assert_eq!(eval("str(12) + \"!\""), Value::string("12!"));
    assert_eq!(eval("num(\"3.5\") * 2"), Value::number(7.0));
    assert_eq!(render("keys({a: 1, b: 2})"), "[\"a\", \"b\"]");
    assert_eq!(eval("pop([1, 2])"), Value::number(2.0));
    assert_eq!(eval("type_of(null)"), Value::string("null"));
    assert_eq!(eval("len(\"héllo\")"), Value::number(5.0));
    assert_eq!(eval("[1, 2, 3].len()"), Value::number(3.0));
    assert!(eval_error("num(\"x\")").message.contains("cannot convert"));
    assert!(eval_error("len()").message.contains("expected 1 arguments"));
}

#[test]
fn top_level_return_ends_evaluation() {
    assert_eq!(eval("x = 1\nreturn x + 1\nx = 5"), Value::number(2.0));
}

#[test]
fn host_functions_methods_and_values() {
    let mut interp = Interpreter::new();
    interp.register_handler(
        "double",
        Handler::function(|_, args, _| {
            let n = args.first().and_then(Value::as_number).unwrap_or(0.0);
            Ok(Outcome::Value(Value::number(n * 2.0)))
        }),
    );
    interp.register_handler(
        "shout",
        Handler::method(|_, target, _, _| {
            Ok(Outcome::Value(Value::string(format!(
                "{}!",
                target.to_string().to_uppercase()
            ))))
        }),
    );
    interp.register_handler("answer", Handler::value(42.0));

    assert_eq!(eval_with(&mut interp, "double(21)"), Value::number(42.0));
    assert_eq!(eval_with(&mut interp, "\"hi\".shout()"), Value::string("HI!"));
    assert_eq!(eval_with(&mut interp, "answer + 1"), Value::number(43.0));
    assert_eq!(eval_with(&mut interp, "answer = 1\nanswer"), Value::number(1.0));
}

#[test]
fn registry_functions_win_over_script_functions() {
    assert_eq!(
        eval("function len(x) { return 99 }\nlen([1])"),
        Value::number(1.0)
    );
}

#[test]
fn host_functions_can_call_script_closures() {
    let mut interp = Interpreter::new();
    interp.register_handler(
        "twice",
        Handler::function(|interp, args, env| {
            let f = args[0].clone();
            let first = ready!(interp.call_value(&f, &[Value::number(1.0)], env)?);
            interp.call_value(&f, &[first], env)
        }),
    );
    assert_eq!(eval_with(&mut interp, "twice(n => n * 10)"), Value::number(100.0));
}

fn register_repeat(interp: &mut Interpreter, with_executor: bool) {
    interp.register_handler(
        "repeat",
        Handler::statement(|parser, token| {
            let count = parser.parse_expression()?;
            let body = parser.parse_block()?;
            let node = ExtensionNode::new("repeat")
                .with("count", ExtensionField::Expr(count))
                .with("body", ExtensionField::Block(body));
            Ok(parser.stmt_at(StmtKind::Extension(node), token.line))
        }),
    );
    if with_executor {
        interp.register_handler(
            "repeat",
            Handler::executor(|interp, node, env| {
                let (Some(count), Some(body)) = (node.expr("count"), node.block("body")) else {
                    return Err(Diagnostic::runtime("malformed repeat statement").into());
                };
                let times = ready!(interp.evaluate(count, env)?).to_number() as usize;
                for _ in 0..times {
                    match interp.execute_block(body, env)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Normal)
            }),
        );
    }
}

#[test]
fn registered_statements_run_through_their_executor() {
    let mut interp = Interpreter::new();
    register_repeat(&mut interp, true);
    assert_eq!(
        eval_with(&mut interp, "x = 0\nrepeat 3 { x += 2 }\nx"),
        Value::number(6.0)
    );
    assert_eq!(
        eval_with(&mut interp, "y = 0\nrepeat 10 { y++; if (y == 4) break }\ny"),
        Value::number(4.0)
    );
}

#[test]
fn statement_without_executor_is_fatal() {
    let mut interp = Interpreter::new();
    register_repeat(&mut interp, false);
    let diag = eval_error_with(&mut interp, "repeat 1 { }");
    assert!(diag.message.contains("no executor registered for statement `repeat`"));
}

#[test]
fn imported_sources_are_cited_in_errors() {
    let mut interp = Interpreter::new();
    let err = interp
        .run_imported("lib.ql", "a = 1\nb = nope")
        .expect_err("import should fail");
    let diag = err.diagnostic().expect("diagnostic");
    assert_eq!(diag.source.as_ref().map(|s| s.name.as_str()), Some("lib.ql"));
    assert_eq!(diag.line, Some(1));

    interp
        .run_imported("util.ql", "function broken() {\n  return missing_var\n}")
        .expect("import defines a function");
    let diag = eval_error_with(&mut interp, "broken()");
    assert_eq!(diag.source.as_ref().map(|s| s.name.as_str()), Some("util.ql"));
    assert_eq!(diag.line, Some(1));
    assert!(diag.to_string().contains("> 2 |   return missing_var"));
}

#[test]
fn interpreters_do_not_share_state() {
    let mut first = Interpreter::new();
    let mut second = Interpreter::new();
    eval_with(&mut first, "shared = 1");
    first.register_keyword("only_first");
    assert!(second.get_global("shared").is_none());
    assert!(!second.registry().is_keyword("only_first"));
    assert!(eval_error_with(&mut second, "shared").message.contains("undefined variable"));
}

#[test]
fn blocks_and_branches_keep_new_names_local() {
    let mut interp = Interpreter::new();
    eval_with(
        &mut interp,
        "outer = 0\nif (true) { outer = 1; inner = 2 }\n{ hidden = 3; outer += 10 }",
    );
    assert_eq!(interp.get_global("outer"), Some(Value::number(11.0)));
    assert_eq!(interp.get_global("inner"), None);
    assert_eq!(interp.get_global("hidden"), None);

    let diag = eval_error("if (true) { z = 1 }\nz");
    assert!(diag.message.contains("undefined variable `z`"));
}

#[test]
fn loop_bodies_get_a_scope_per_iteration() {
    let mut interp = Interpreter::new();
    eval_with(
        &mut interp,
        "total = 0\nfor (v of [1, 2, 3]) { seen = v; total += v }\nn = 0\nwhile (n < 2) { step = n; n++ }",
    );
    assert_eq!(interp.get_global("total"), Some(Value::number(6.0)));
    assert_eq!(interp.get_global("n"), Some(Value::number(2.0)));
    for name in ["v", "seen", "step"] {
        assert_eq!(interp.get_global(name), None, "`{name}` leaked");
    }

    // The classic `for` header runs in the enclosing scope.
    assert_eq!(eval("for (i = 0; i < 3; i++) { }\ni"), Value::number(3.0));
}

#[test]
fn catch_binding_stays_inside_the_catch_block() {
    let mut interp = Interpreter::new();
    eval_with(
        &mut interp,
        "caught = null\ntry { throw \"x\" } catch (e) { caught = e.message; note = 1 } finally { cleanup = 1 }",
    );
    assert_eq!(interp.get_global("caught"), Some(Value::string("x")));
    for name in ["e", "note", "cleanup"] {
        assert_eq!(interp.get_global(name), None, "`{name}` leaked");
    }
}

#[test]
fn functions_declared_in_a_block_are_local_to_it() {
    let diag = eval_error("if (true) { function helper() { return 1 } }\nhelper()");
    assert!(diag.message.contains("undefined function `helper`"));
}
