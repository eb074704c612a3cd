use std::io::Write;

use indexmap::IndexMap;

use crate::{
    control::Outcome,
    diagnostics::{Diagnostic, Result},
    registry::{Handler, Registry},
    value::{Value, ValueKind},
};

type Callback = fn(&[Value]) -> Result<Value>;

pub fn install(registry: &mut Registry) {
    for (name, value) in [
        ("true", Value::bool(true)),
        ("false", Value::bool(false)),
        ("null", Value::null()),
    ] {
        registry.register_keyword(name);
        registry.register_handler(name, Handler::Value(value));
    }

    registry.register_handler("print", function("print", 0, usize::MAX, print));
    registry.register_handler("num", function("num", 1, 1, to_number));
    registry.register_handler("type_of", function("type_of", 1, 1, type_of));

    registry.register_handler("len", dual("len", 1, 1, len));
    registry.register_handler("str", dual("str", 1, 1, to_string));
    registry.register_handler("push", dual("push", 2, usize::MAX, push));
    registry.register_handler("pop", dual("pop", 1, 1, pop));
    registry.register_handler("join", dual("join", 1, 2, join));
    registry.register_handler("keys", dual("keys", 1, 1, keys));
}

fn function(name: &'static str, min: usize, max: usize, callback: Callback) -> Handler {
    Handler::function(move |_, args, _| {
        ensure_arity(args, min, max, name)?;
        Ok(Outcome::Value(callback(args)?))
    })
}

fn dual(name: &'static str, min: usize, max: usize, callback: Callback) -> Handler {
    Handler::dual(move |_, args, _| {
        ensure_arity(args, min, max, name)?;
        Ok(Outcome::Value(callback(args)?))
    })
}

fn ensure_arity(args: &[Value], min: usize, max: usize, name: &str) -> Result<()> {
    if args.len() < min || args.len() > max {
        let expected = match (min, max) {
            (min, max) if min == max => format!("{min}"),
            (min, usize::MAX) => format!("at least {min}"),
            (min, max) => format!("{min} to {max}"),
        };
        return Err(Diagnostic::runtime(format!(
            "`{name}` expected {expected} arguments but received {}",
            args.len()
        ))
        .with_expected(expected)
        .with_got(args.len().to_string())
        .into());
    }
    Ok(())
}

fn wrong_type(name: &str, expected: &str, value: &Value) -> crate::diagnostics::QuillError {
    Diagnostic::runtime(format!(
        "`{name}` expected {expected} but found {}",
        value.type_name()
    ))
    .with_expected(expected)
    .with_got(value.type_name())
    .into()
}

fn print(args: &[Value]) -> Result<Value> {
    let line = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    Ok(Value::null())
}

fn len(args: &[Value]) -> Result<Value> {
    let value = &args[0];
    let len = match value.kind() {
        ValueKind::String(s) => s.chars().count(),
        ValueKind::Array(items) => items.borrow().len(),
        ValueKind::Object(entries) => entries.borrow().len(),
        ValueKind::Instance(instance) => instance.fields.borrow().len(),
        _ => return Err(wrong_type("len", "string, array or object", value)),
    };
    Ok(Value::number(len as f64))
}

fn to_string(args: &[Value]) -> Result<Value> {
    Ok(Value::string(args[0].to_string()))
}

fn to_number(args: &[Value]) -> Result<Value> {
    let value = &args[0];
    let n = value.to_number();
    if n.is_nan() && value.as_number().is_none() {
        return Err(Diagnostic::runtime(format!("cannot convert {value:?} to a number"))
            .with_expected("numeric text, boolean, null or number")
            .with_got(value.type_name())
            .with_value(format!("{value:?}"))
            .into());
    }
    Ok(Value::number(n))
}

fn type_of(args: &[Value]) -> Result<Value> {
    let value = &args[0];
    Ok(Value::string(match value.kind() {
        ValueKind::Instance(instance) => instance.class.name.clone(),
        _ => value.type_name().to_string(),
    }))
}

fn push(args: &[Value]) -> Result<Value> {
    match args[0].kind() {
        ValueKind::Array(items) => {
            let mut items = items.borrow_mut();
            items.extend(args[1..].iter().cloned());
            Ok(Value::number(items.len() as f64))
        }
        _ => Err(wrong_type("push", "array", &args[0])),
    }
}

fn pop(args: &[Value]) -> Result<Value> {
    match args[0].kind() {
        ValueKind::Array(items) => Ok(items.borrow_mut().pop().unwrap_or_else(Value::null)),
        _ => Err(wrong_type("pop", "array", &args[0])),
    }
}

fn join(args: &[Value]) -> Result<Value> {
    let separator = match args.get(1) {
        Some(value) => match value.as_str() {
            Some(separator) => separator.to_string(),
            None => return Err(wrong_type("join", "string separator", value)),
        },
        None => ",".to_string(),
    };
    match args[0].kind() {
        ValueKind::Array(items) => Ok(Value::string(
            items
                .borrow()
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(&separator),
        )),
        _ => Err(wrong_type("join", "array", &args[0])),
    }
}

fn keys(args: &[Value]) -> Result<Value> {
    let names = |entries: &IndexMap<String, Value>| {
        Value::array(entries.keys().map(|key| Value::string(key.clone())).collect())
    };
    match args[0].kind() {
        ValueKind::Object(entries) => Ok(names(&entries.borrow())),
        ValueKind::Instance(instance) => Ok(names(&instance.fields.borrow())),
        _ => Err(wrong_type("keys", "object", &args[0])),
    }
}
