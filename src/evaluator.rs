use std::rc::Rc;

use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::Zero;

use crate::{
    ast::{ArrayItem, BinaryOp, Expr, ExprKind, FunctionDef, Literal, ObjectEntry, UnaryOp},
    control::{Flow, Outcome},
    diagnostics::{Diagnostic, QuillError, Result, SourceFile},
    environment::{Environment, EnvironmentRef},
    lexer::{Lexer, TemplateFragment},
    parser::Parser,
    ready,
    runtime::{loop_control_error, Interpreter},
    value::{ClassValue, Closure, Value, ValueKind},
};

// Remaining stack below which evaluation switches to a fresh segment.
pub(crate) const STACK_RED_ZONE: usize = 128 * 1024;
pub(crate) const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// How far past the end of an array a single write may extend it.
pub const MAX_ARRAY_GROWTH: usize = 4096;

pub(crate) enum Place {
    Property(Value, String),
    Element(Value, Value),
}

impl Interpreter {
    pub fn evaluate(&mut self, expr: &Expr, env: &EnvironmentRef) -> Result<Outcome> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.evaluate_kind(expr, env)
                .map_err(|err| self.locate(err, expr.line, expr.origin.as_ref()))
        })
    }

    fn evaluate_kind(&mut self, expr: &Expr, env: &EnvironmentRef) -> Result<Outcome> {
        let value = match &expr.kind {
            ExprKind::Literal(literal) => match literal {
                Literal::Number(n) => Value::number(*n),
                Literal::BigInt(n) => Value::bigint(n.clone()),
                Literal::String(s) => Value::string(s.clone()),
            },
            ExprKind::Identifier(name) => self.lookup(name, env)?,
            ExprKind::Keyword(keyword) => self.keyword_value(keyword, env)?,
            ExprKind::Unary { op, expr } => {
                let operand = ready!(self.evaluate(expr, env)?);
                self.unary(*op, &operand)?
            }
            ExprKind::Binary { op, left, right } => {
                let left = ready!(self.evaluate(left, env)?);
                match op {
                    BinaryOp::And if !left.is_truthy() => left,
                    BinaryOp::Or if left.is_truthy() => left,
                    BinaryOp::And | BinaryOp::Or => ready!(self.evaluate(right, env)?),
                    _ => {
                        let right = ready!(self.evaluate(right, env)?);
                        self.binary(*op, &left, &right)?
                    }
                }
            }
            ExprKind::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = ready!(self.evaluate(condition, env)?);
                let branch = if condition.is_truthy() {
                    then_branch
                } else {
                    else_branch
                };
                ready!(self.evaluate(branch, env)?)
            }
            ExprKind::Member { object, property } => {
                let object = ready!(self.evaluate(object, env)?);
                read_property(&object, property)?
            }
            ExprKind::Index { object, index } => {
                let object = ready!(self.evaluate(object, env)?);
                let index = ready!(self.evaluate(index, env)?);
                read_element(&object, &index)?
            }
            ExprKind::MethodCall {
                object,
                method,
                args,
            } => {
                let target = ready!(self.evaluate(object, env)?);
                let args = ready!(self.evaluate_args(args, env)?);
                return self.invoke_method(&target, method, &args, env);
            }
            ExprKind::Call { callee, args } => return self.call_expression(callee, args, env),
            ExprKind::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        ArrayItem::Item(expr) => values.push(ready!(self.evaluate(expr, env)?)),
                        ArrayItem::Spread(expr) => {
                            let spread = ready!(self.evaluate(expr, env)?);
                            spread_into_array(&mut values, &spread)?;
                        }
                    }
                }
                Value::array(values)
            }
            ExprKind::Object(entries) => {
                let mut fields = IndexMap::new();
                for entry in entries {
                    match entry {
                        ObjectEntry::KeyValue(key, expr) => {
                            let value = ready!(self.evaluate(expr, env)?);
                            fields.insert(key.clone(), value);
                        }
                        ObjectEntry::Shorthand(name) => {
                            fields.insert(name.clone(), self.lookup(name, env)?);
                        }
                        ObjectEntry::Spread(expr) => {
                            let spread = ready!(self.evaluate(expr, env)?);
                            spread_into_object(&mut fields, &spread)?;
                        }
                    }
                }
                Value::object(fields)
            }
            ExprKind::Template { strings, exprs } => {
                let mut text = String::new();
                for (idx, segment) in strings.iter().enumerate() {
                    text.push_str(segment);
                    if let Some(fragment) = exprs.get(idx) {
                        let parsed = self.parse_fragment(fragment, expr.origin.as_ref())?;
                        let value = ready!(self.evaluate(&parsed, env)?);
                        text.push_str(&value.to_string());
                    }
                }
                Value::string(text)
            }
            ExprKind::Function(def) => Value::function(Rc::clone(def), None),
            ExprKind::Increment {
                target,
                delta,
                prefix,
            } => return self.increment(target, *delta, *prefix, env),
        };
        Ok(Outcome::Value(value))
    }

    pub(crate) fn evaluate_args(
        &mut self,
        args: &[Expr],
        env: &EnvironmentRef,
    ) -> Result<Outcome<Vec<Value>>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(ready!(self.evaluate(arg, env)?));
        }
        Ok(Outcome::Value(values))
    }

    fn lookup(&self, name: &str, env: &EnvironmentRef) -> Result<Value> {
        if let Some(value) = Environment::get(env, name) {
            return Ok(value);
        }
        if let Some(value) = self.registry().value(name) {
            return Ok(value);
        }
        let mut diag =
            Diagnostic::runtime(format!("undefined variable `{name}`")).with_variable(name);
        if self.registry().function(name).is_some() {
            diag = diag.with_suggestion(format!("`{name}` is a built-in function; call it as `{name}(...)`"));
        }
        Err(diag.into())
    }

    fn keyword_value(&self, keyword: &str, env: &EnvironmentRef) -> Result<Value> {
        if keyword == "this" {
            return Environment::get(env, "this").ok_or_else(|| {
                Diagnostic::runtime("`this` used outside of a method or constructor").into()
            });
        }
        self.registry().value(keyword).ok_or_else(|| {
            Diagnostic::runtime(format!("keyword `{keyword}` cannot be used as a value")).into()
        })
    }

    fn parse_fragment(
        &self,
        fragment: &TemplateFragment,
        origin: Option<&Rc<SourceFile>>,
    ) -> Result<Expr> {
        let tokens =
            Lexer::starting_at(&fragment.source, self.registry().keywords(), fragment.line)
                .tokenize()?;
        let mut parser = Parser::new(tokens, self.registry());
        if let Some(origin) = origin {
            parser = parser.with_origin(Rc::clone(origin));
        }
        Ok(parser.parse_standalone_expression()?)
    }

    fn call_expression(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        env: &EnvironmentRef,
    ) -> Result<Outcome> {
        if let ExprKind::Identifier(name) = &callee.kind {
            if let Some(native) = self.registry().function(name) {
                let args = ready!(self.evaluate_args(args, env)?);
                return native(self, &args, env);
            }
            let Some(function) = Environment::get(env, name) else {
                return Err(Diagnostic::runtime(format!("undefined function `{name}`"))
                    .with_variable(name.clone())
                    .into());
            };
            let args = ready!(self.evaluate_args(args, env)?);
            return self.call_value(&function, &args, env);
        }
        let function = ready!(self.evaluate(callee, env)?);
        let args = ready!(self.evaluate_args(args, env)?);
        self.call_value(&function, &args, env)
    }

    pub fn call_value(
        &mut self,
        callee: &Value,
        args: &[Value],
        env: &EnvironmentRef,
    ) -> Result<Outcome> {
        match callee.kind() {
            ValueKind::Function(closure) => self.call_closure(closure, args, env),
            ValueKind::Class(class) => self.instantiate(Rc::clone(class), args, env),
            _ => Err(Diagnostic::runtime(format!(
                "value of type {} is not callable",
                callee.type_name()
            ))
            .with_expected("function")
            .with_got(callee.type_name())
            .with_value(format!("{callee:?}"))
            .into()),
        }
    }

    fn call_closure(
        &mut self,
        closure: &Closure,
        args: &[Value],
        env: &EnvironmentRef,
    ) -> Result<Outcome> {
        let limit = self.config().max_call_depth;
        if self.call_depth >= limit {
            let name = closure.def.name.as_deref().unwrap_or("anonymous");
            return Err(Diagnostic::runtime(format!(
                "infinite recursion: call depth exceeded {limit} in `{name}`"
            ))
            .with_suggestion("make sure the recursion reaches a base case")
            .with_note(format!("the limit comes from `max_call_depth` ({limit})"))
            .into());
        }
        let scope = Environment::with_parent(Rc::clone(env));
        if let Some(this) = &closure.this {
            scope.borrow_mut().define("this", this.clone());
        }
        self.call_depth += 1;
        let result = self.run_function_body(&closure.def, args, &scope);
        self.call_depth -= 1;
        result
    }

    fn run_function_body(
        &mut self,
        def: &FunctionDef,
        args: &[Value],
        scope: &EnvironmentRef,
    ) -> Result<Outcome> {
        for (idx, param) in def.params.iter().enumerate() {
            let value = match (args.get(idx), &param.default) {
                (Some(value), _) => value.clone(),
                (None, Some(default)) => ready!(self.evaluate(default, scope)?),
                (None, None) => Value::null(),
            };
            scope.borrow_mut().define(param.name.clone(), value);
        }
        if let Some(rest) = &def.rest {
            let extra = args.get(def.params.len()..).unwrap_or(&[]).to_vec();
            scope.borrow_mut().define(rest.clone(), Value::array(extra));
        }
        match self.execute_block(&def.body, scope)? {
            Flow::Normal => Ok(Outcome::Value(Value::null())),
            Flow::Return(value) => Ok(Outcome::Value(value)),
            Flow::Suspend(suspension) => Ok(Outcome::Suspended(suspension)),
            flow @ (Flow::Break | Flow::Continue) => Err(loop_control_error(&flow).into()),
        }
    }

    fn instantiate(
        &mut self,
        class: Rc<ClassValue>,
        args: &[Value],
        env: &EnvironmentRef,
    ) -> Result<Outcome> {
        let instance = Value::instance(Rc::clone(&class));
        if let Some(constructor) = class.find_method("constructor") {
            let closure = Closure {
                def: constructor,
                this: Some(instance.clone()),
            };
            ready!(self.call_closure(&closure, args, env)?);
        }
        Ok(Outcome::Value(instance))
    }

    fn invoke_method(
        &mut self,
        target: &Value,
        method: &str,
        args: &[Value],
        env: &EnvironmentRef,
    ) -> Result<Outcome> {
        if let Some(native) = self.registry().method(method) {
            return native(self, target, args, env);
        }
        match target.kind() {
            ValueKind::Instance(instance) => {
                let field = instance.fields.borrow().get(method).cloned();
                if let Some(field) = field {
                    return self.call_value(&field, args, env);
                }
                if let Some(def) = instance.class.find_method(method) {
                    let closure = Closure {
                        def,
                        this: Some(target.clone()),
                    };
                    return self.call_closure(&closure, args, env);
                }
            }
            ValueKind::Object(entries) => {
                let property = entries.borrow().get(method).cloned();
                if let Some(property) = property {
                    return match property.kind() {
                        ValueKind::Function(closure) if closure.this.is_none() => {
                            let bound = Closure {
                                def: Rc::clone(&closure.def),
                                this: Some(target.clone()),
                            };
                            self.call_closure(&bound, args, env)
                        }
                        _ => self.call_value(&property, args, env),
                    };
                }
            }
            _ => {}
        }
        Err(Diagnostic::runtime(format!(
            "undefined method `{method}` on {}",
            target.type_name()
        ))
        .with_variable(method)
        .with_got(target.type_name())
        .into())
    }

    fn increment(
        &mut self,
        target: &Expr,
        delta: i8,
        prefix: bool,
        env: &EnvironmentRef,
    ) -> Result<Outcome> {
        let (current, updated) = if let ExprKind::Identifier(name) = &target.kind {
            let current = Environment::get(env, name).ok_or_else(|| {
                Diagnostic::runtime(format!("undefined variable `{name}`")).with_variable(name)
            })?;
            let updated = self.step(&current, delta)?;
            Environment::set(env, name, updated.clone());
            (current, updated)
        } else {
            let place = ready!(self.resolve_place(target, env)?);
            let current = read_place(&place)?;
            let updated = self.step(&current, delta)?;
            write_place(&place, updated.clone())?;
            (current, updated)
        };
        Ok(Outcome::Value(if prefix { updated } else { current }))
    }

    fn step(&self, current: &Value, delta: i8) -> Result<Value> {
        let op = if delta > 0 { "++" } else { "--" };
        match current.kind() {
            ValueKind::Number(n) => Ok(Value::number(n + f64::from(delta))),
            ValueKind::BigInt(n) => Ok(Value::bigint(n + BigInt::from(delta))),
            _ if self.strict() => Err(strict_operand_error(op, current, "number")),
            _ => Ok(Value::number(coerce(current, op)? + f64::from(delta))),
        }
    }

    pub(crate) fn resolve_place(
        &mut self,
        target: &Expr,
        env: &EnvironmentRef,
    ) -> Result<Outcome<Place>> {
        match &target.kind {
            ExprKind::Member { object, property } => {
                let object = ready!(self.evaluate(object, env)?);
                Ok(Outcome::Value(Place::Property(object, property.clone())))
            }
            ExprKind::Index { object, index } => {
                let object = ready!(self.evaluate(object, env)?);
                let key = ready!(self.evaluate(index, env)?);
                Ok(Outcome::Value(Place::Element(object, key)))
            }
            _ => Err(Diagnostic::runtime("invalid assignment target").into()),
        }
    }

    fn unary(&self, op: UnaryOp, operand: &Value) -> Result<Value> {
        match (op, operand.kind()) {
            (UnaryOp::Not, _) => Ok(Value::bool(!operand.is_truthy())),
            (UnaryOp::Negate, ValueKind::Number(n)) => Ok(Value::number(-n)),
            (UnaryOp::Negate, ValueKind::BigInt(n)) => Ok(Value::bigint(-n)),
            (UnaryOp::Plus, ValueKind::Number(n)) => Ok(Value::number(*n)),
            (UnaryOp::Negate | UnaryOp::Plus, _) => {
                let symbol = if op == UnaryOp::Negate { "-" } else { "+" };
                if self.strict() {
                    return Err(strict_operand_error(symbol, operand, "number"));
                }
                let n = coerce(operand, symbol)?;
                Ok(Value::number(if op == UnaryOp::Negate { -n } else { n }))
            }
        }
    }

    pub(crate) fn binary(&self, op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
        match op {
            BinaryOp::Add => self.add(left, right),
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                self.arithmetic(op, left, right)
            }
            BinaryOp::Equal | BinaryOp::StrictEqual => Ok(Value::bool(left.equals(right))),
            BinaryOp::NotEqual | BinaryOp::StrictNotEqual => Ok(Value::bool(!left.equals(right))),
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
                compare(op, left, right)
            }
            BinaryOp::And => Ok(if left.is_truthy() { right } else { left }.clone()),
            BinaryOp::Or => Ok(if left.is_truthy() { left } else { right }.clone()),
        }
    }

    fn add(&self, left: &Value, right: &Value) -> Result<Value> {
        match (left.kind(), right.kind()) {
            (ValueKind::Number(a), ValueKind::Number(b)) => Ok(Value::number(a + b)),
            (ValueKind::BigInt(a), ValueKind::BigInt(b)) => Ok(Value::bigint(a + b)),
            (ValueKind::Array(a), ValueKind::Array(b)) => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                Ok(Value::array(items))
            }
            (ValueKind::String(_), _) | (_, ValueKind::String(_)) => {
                let mixes_number = left.as_number().is_some() || right.as_number().is_some();
                if mixes_number && self.strict() {
                    let offending = if left.as_str().is_some() { left } else { right };
                    return Err(strict_operand_error("+", offending, "number-ish"));
                }
                Ok(Value::string(format!("{left}{right}")))
            }
            _ => Err(operand_type_error("+", left, right)),
        }
    }

    fn arithmetic(&self, op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
        let symbol = op.symbol();
        match (left.kind(), right.kind()) {
            (ValueKind::BigInt(a), ValueKind::BigInt(b)) => return bigint_arithmetic(op, a, b),
            (ValueKind::BigInt(_), _) | (_, ValueKind::BigInt(_)) => {
                return Err(operand_type_error(symbol, left, right).map_diagnostic(|diag| {
                    diag.with_suggestion("bigint values only combine with other bigint values")
                }));
            }
            _ => {}
        }
        if self.strict() {
            for operand in [left, right] {
                if operand.as_number().is_none() {
                    return Err(strict_operand_error(symbol, operand, "number"));
                }
            }
        }
        let a = coerce(left, symbol)?;
        let b = coerce(right, symbol)?;
        Ok(Value::number(match op {
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            _ => a % b,
        }))
    }
}

trait MapDiagnostic {
    fn map_diagnostic(self, f: impl FnOnce(Diagnostic) -> Diagnostic) -> Self;
}

impl MapDiagnostic for QuillError {
    fn map_diagnostic(self, f: impl FnOnce(Diagnostic) -> Diagnostic) -> Self {
        match self {
            QuillError::Diagnostic(diag) => QuillError::Diagnostic(f(diag)),
            other => other,
        }
    }
}

fn coerce(value: &Value, op: &str) -> Result<f64> {
    let n = value.to_number();
    if n.is_nan() && value.as_number().is_none() {
        return Err(Diagnostic::runtime(format!(
            "cannot convert {} {value:?} to a number for `{op}`",
            value.type_name()
        ))
        .with_expected("number")
        .with_got(value.type_name())
        .with_value(format!("{value:?}"))
        .with_operator(op)
        .with_suggestion("convert the value explicitly with num()")
        .into());
    }
    Ok(n)
}

fn strict_operand_error(op: &str, operand: &Value, expected: &str) -> QuillError {
    Diagnostic::runtime(format!(
        "type error: `{op}` does not accept {} operands in strict mode",
        operand.type_name()
    ))
    .with_expected(expected)
    .with_got(operand.type_name())
    .with_value(format!("{operand:?}"))
    .with_operator(op)
    .with_suggestion("convert explicitly with num() or str()")
    .into()
}

fn operand_type_error(op: &str, left: &Value, right: &Value) -> QuillError {
    Diagnostic::runtime(format!(
        "cannot apply `{op}` to {} and {}",
        left.type_name(),
        right.type_name()
    ))
    .with_got(format!("{} and {}", left.type_name(), right.type_name()))
    .with_operator(op)
    .into()
}

fn bigint_arithmetic(op: BinaryOp, a: &BigInt, b: &BigInt) -> Result<Value> {
    if matches!(op, BinaryOp::Div | BinaryOp::Mod) && b.is_zero() {
        return Err(Diagnostic::runtime("bigint division by zero")
            .with_operator(op.symbol())
            .into());
    }
    Ok(Value::bigint(match op {
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    }))
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let ordering = match (left.kind(), right.kind()) {
        (ValueKind::Number(a), ValueKind::Number(b)) => a.partial_cmp(b),
        (ValueKind::String(a), ValueKind::String(b)) => Some(a.cmp(b)),
        (ValueKind::BigInt(a), ValueKind::BigInt(b)) => Some(a.cmp(b)),
        _ => return Err(operand_type_error(op.symbol(), left, right)),
    };
    let Some(ordering) = ordering else {
        return Ok(Value::bool(false));
    };
    Ok(Value::bool(match op {
        BinaryOp::Less => ordering.is_lt(),
        BinaryOp::LessEqual => ordering.is_le(),
        BinaryOp::Greater => ordering.is_gt(),
        _ => ordering.is_ge(),
    }))
}

fn spread_into_array(values: &mut Vec<Value>, spread: &Value) -> Result<()> {
    match spread.kind() {
        ValueKind::Array(items) => values.extend(items.borrow().iter().cloned()),
        ValueKind::String(text) => values.extend(text.chars().map(|ch| Value::string(ch))),
        _ => {
            return Err(Diagnostic::runtime(format!(
                "cannot spread {} into an array",
                spread.type_name()
            ))
            .with_expected("array or string")
            .with_got(spread.type_name())
            .into())
        }
    }
    Ok(())
}

fn spread_into_object(fields: &mut IndexMap<String, Value>, spread: &Value) -> Result<()> {
    match spread.kind() {
        ValueKind::Object(entries) => {
            fields.extend(entries.borrow().iter().map(|(k, v)| (k.clone(), v.clone())))
        }
        ValueKind::Instance(instance) => fields.extend(
            instance
                .fields
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        ),
        ValueKind::Null => {}
        _ => {
            return Err(Diagnostic::runtime(format!(
                "cannot spread {} into an object",
                spread.type_name()
            ))
            .with_expected("object")
            .with_got(spread.type_name())
            .into())
        }
    }
    Ok(())
}

pub(crate) fn read_property(object: &Value, property: &str) -> Result<Value> {
    match object.kind() {
        ValueKind::Object(entries) => Ok(entries
            .borrow()
            .get(property)
            .cloned()
            .unwrap_or_else(Value::null)),
        ValueKind::Instance(instance) => {
            if let Some(value) = instance.fields.borrow().get(property) {
                return Ok(value.clone());
            }
            Ok(instance
                .class
                .find_method(property)
                .map(|def| Value::function(def, Some(object.clone())))
                .unwrap_or_else(Value::null))
        }
        ValueKind::Array(items) if property == "length" => {
            Ok(Value::number(items.borrow().len() as f64))
        }
        ValueKind::String(text) if property == "length" => {
            Ok(Value::number(text.chars().count() as f64))
        }
        ValueKind::Class(class) if property == "name" => Ok(Value::string(class.name.clone())),
        _ => Err(Diagnostic::runtime(format!(
            "cannot read property `{property}` of {}",
            object.type_name()
        ))
        .with_variable(property)
        .with_got(object.type_name())
        .into()),
    }
}

pub(crate) fn read_element(object: &Value, index: &Value) -> Result<Value> {
    match (object.kind(), index.kind()) {
        (ValueKind::Array(items), ValueKind::Number(n)) => {
            let items = items.borrow();
            let position = element_position(*n)?;
            items.get(position).cloned().ok_or_else(|| {
                Diagnostic::runtime(format!(
                    "index {} is out of bounds for array of length {}",
                    position,
                    items.len()
                ))
                .with_value(position.to_string())
                .into()
            })
        }
        (ValueKind::String(text), ValueKind::Number(n)) => {
            let position = element_position(*n)?;
            Ok(text
                .chars()
                .nth(position)
                .map(|ch| Value::string(ch))
                .unwrap_or_else(Value::null))
        }
        (ValueKind::Object(_) | ValueKind::Instance(_), _) => {
            read_property(object, &index.to_string())
        }
        _ => Err(Diagnostic::runtime(format!(
            "cannot index {} with {}",
            object.type_name(),
            index.type_name()
        ))
        .with_got(index.type_name())
        .into()),
    }
}

fn element_position(n: f64) -> Result<usize> {
    if n < 0.0 || n.fract() != 0.0 || !n.is_finite() {
        return Err(Diagnostic::runtime(format!(
            "array index must be a non-negative integer, got {}",
            crate::value::format_number(n)
        ))
        .with_expected("non-negative integer")
        .with_value(crate::value::format_number(n))
        .into());
    }
    Ok(n as usize)
}

pub(crate) fn read_place(place: &Place) -> Result<Value> {
    match place {
        Place::Property(object, name) => read_property(object, name),
        Place::Element(object, key) => read_element(object, key),
    }
}

pub(crate) fn write_place(place: &Place, value: Value) -> Result<()> {
    let (object, key) = match place {
        Place::Property(object, name) => (object, Value::string(name.clone())),
        Place::Element(object, key) => (object, key.clone()),
    };
    match (object.kind(), key.kind()) {
        (ValueKind::Array(items), ValueKind::Number(n)) => {
            let position = element_position(*n)?;
            let mut items = items.borrow_mut();
            if position > items.len() + MAX_ARRAY_GROWTH {
                return Err(Diagnostic::runtime(format!(
                    "array index {} is too far past the end of an array of length {}",
                    crate::value::format_number(*n),
                    items.len()
                ))
                .with_expected(format!("index at most {}", items.len() + MAX_ARRAY_GROWTH))
                .with_value(crate::value::format_number(*n))
                .into());
            }
            if position >= items.len() {
                items.resize(position, Value::null());
                items.push(value);
            } else {
                items[position] = value;
            }
            Ok(())
        }
        (ValueKind::Object(entries), _) => {
            entries.borrow_mut().insert(key.to_string(), value);
            Ok(())
        }
        (ValueKind::Instance(instance), _) => {
            instance.fields.borrow_mut().insert(key.to_string(), value);
            Ok(())
        }
        _ => Err(Diagnostic::runtime(format!(
            "cannot assign to {} of {}",
            match place {
                Place::Property(_, name) => format!("property `{name}`"),
                Place::Element(..) => format!("index {key:?}"),
            },
            object.type_name()
        ))
        .with_got(object.type_name())
        .into()),
    }
}
