use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
    ast::{CatchClause, ClassDef, IterationMode, Stmt, StmtKind},
    control::Flow,
    diagnostics::{Diagnostic, DiagnosticKind, QuillError, Result},
    environment::{Environment, EnvironmentRef},
    evaluator::{read_place, write_place, STACK_GROW_SIZE, STACK_RED_ZONE},
    ready,
    runtime::{error_record, Interpreter},
    value::{ClassValue, Value, ValueKind},
};

impl Interpreter {
    pub fn execute_statement(&mut self, stmt: &Stmt, env: &EnvironmentRef) -> Result<Flow> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.execute_kind(stmt, env)
                .map_err(|err| self.locate(err, stmt.line, stmt.origin.as_ref()))
        })
    }

    pub fn execute_block(&mut self, statements: &[Stmt], env: &EnvironmentRef) -> Result<Flow> {
        for stmt in statements {
            match self.execute_statement(stmt, env)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    /// Runs a branch or loop body in its own child scope of `env`. Names it
    /// assigns for the first time stay local; existing outer names are
    /// updated in place.
    fn execute_scoped(&mut self, stmt: &Stmt, env: &EnvironmentRef) -> Result<Flow> {
        let scope = Environment::with_parent(Rc::clone(env));
        self.execute_in(stmt, &scope)
    }

    fn execute_in(&mut self, stmt: &Stmt, scope: &EnvironmentRef) -> Result<Flow> {
        match &stmt.kind {
            StmtKind::Block(statements) => self.execute_block(statements, scope),
            _ => self.execute_statement(stmt, scope),
        }
    }

    fn execute_kind(&mut self, stmt: &Stmt, env: &EnvironmentRef) -> Result<Flow> {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                ready!(self.evaluate(expr, env)?);
                Ok(Flow::Normal)
            }
            StmtKind::Assign { name, value } => {
                let value = ready!(self.evaluate(value, env)?);
                Environment::set(env, name, value);
                Ok(Flow::Normal)
            }
            StmtKind::CompoundAssign { name, op, value } => {
                let Some(current) = Environment::get(env, name) else {
                    return Err(Diagnostic::runtime(format!(
                        "undefined variable `{name}` in `{}=`",
                        op.symbol()
                    ))
                    .with_variable(name.clone())
                    .into());
                };
                let rhs = ready!(self.evaluate(value, env)?);
                let updated = self.binary(*op, &current, &rhs)?;
                Environment::set(env, name, updated);
                Ok(Flow::Normal)
            }
            StmtKind::MemberAssign { target, op, value } => {
                let place = ready!(self.resolve_place(target, env)?);
                let rhs = ready!(self.evaluate(value, env)?);
                let updated = match op {
                    Some(op) => {
                        let current = read_place(&place)?;
                        self.binary(*op, &current, &rhs)?
                    }
                    None => rhs,
                };
                write_place(&place, updated)?;
                Ok(Flow::Normal)
            }
            StmtKind::Block(statements) => {
                let scope = Environment::with_parent(Rc::clone(env));
                self.execute_block(statements, &scope)
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = ready!(self.evaluate(condition, env)?);
                if condition.is_truthy() {
                    self.execute_scoped(then_branch, env)
                } else if let Some(branch) = else_branch {
                    self.execute_scoped(branch, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::While { condition, body } => {
                loop {
                    let condition = ready!(self.evaluate(condition, env)?);
                    if !condition.is_truthy() {
                        break;
                    }
                    match self.execute_scoped(body, env)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::ForClassic {
                init,
                condition,
                update,
                body,
            } => {
                if let Some(init) = init {
                    if let flow @ (Flow::Suspend(_) | Flow::Return(_)) =
                        self.execute_statement(init, env)?
                    {
                        return Ok(flow);
                    }
                }
                loop {
                    if let Some(condition) = condition {
                        let condition = ready!(self.evaluate(condition, env)?);
                        if !condition.is_truthy() {
                            break;
                        }
                    }
                    match self.execute_scoped(body, env)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        other => return Ok(other),
                    }
                    if let Some(update) = update {
                        if let flow @ (Flow::Suspend(_) | Flow::Return(_)) =
                            self.execute_statement(update, env)?
                        {
                            return Ok(flow);
                        }
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::ForEach {
                binding,
                mode,
                iterable,
                body,
            } => {
                let iterable = ready!(self.evaluate(iterable, env)?);
                for item in iteration_items(&iterable, *mode)? {
                    let scope = Environment::with_parent(Rc::clone(env));
                    scope.borrow_mut().define(binding.clone(), item);
                    match self.execute_in(body, &scope)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => ready!(self.evaluate(expr, env)?),
                    None => Value::null(),
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Throw(expr) => {
                let value = ready!(self.evaluate(expr, env)?);
                Err(thrown_diagnostic(value).into())
            }
            StmtKind::Try {
                body,
                catch,
                finally,
            } => self.execute_try(body, catch.as_ref(), finally.as_deref(), env),
            StmtKind::Function(def) => {
                if let Some(name) = &def.name {
                    env.borrow_mut()
                        .define(name.clone(), Value::function(Rc::clone(def), None));
                }
                Ok(Flow::Normal)
            }
            StmtKind::Class(def) => {
                let class = self.build_class(def, env)?;
                env.borrow_mut()
                    .define(def.name.clone(), Value::class(Rc::new(class)));
                Ok(Flow::Normal)
            }
            StmtKind::Extension(node) => {
                let Some(executor) = self.registry().executor(&node.tag) else {
                    return Err(Diagnostic::runtime(format!(
                        "no executor registered for statement `{}`",
                        node.tag
                    ))
                    .into());
                };
                executor(self, node, env)
            }
        }
    }

    fn execute_try(
        &mut self,
        body: &[Stmt],
        catch: Option<&CatchClause>,
        finally: Option<&[Stmt]>,
        env: &EnvironmentRef,
    ) -> Result<Flow> {
        let mut outcome = self.execute_block(body, &Environment::with_parent(Rc::clone(env)));
        if let Some(clause) = catch {
            if let Err(err) = outcome {
                let diag = match err {
                    QuillError::Diagnostic(diag) => diag,
                    other => Diagnostic::runtime(other.to_string()),
                };
                let scope = Environment::with_parent(Rc::clone(env));
                if let Some(binding) = &clause.binding {
                    scope.borrow_mut().define(binding.clone(), error_record(&diag));
                }
                outcome = self.execute_block(&clause.body, &scope);
            }
        }
        if let Ok(Flow::Suspend(_)) = outcome {
            return outcome;
        }
        if let Some(finally) = finally {
            let scope = Environment::with_parent(Rc::clone(env));
            match self.execute_block(finally, &scope)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        outcome
    }

    fn build_class(&self, def: &ClassDef, env: &EnvironmentRef) -> Result<ClassValue> {
        let parent = match &def.parent {
            Some(name) => match Environment::get(env, name) {
                Some(value) => match value.kind() {
                    ValueKind::Class(class) => Some(Rc::clone(class)),
                    _ => {
                        return Err(Diagnostic::runtime(format!(
                            "`{name}` is not a class and cannot be extended"
                        ))
                        .with_expected("class")
                        .with_got(value.type_name())
                        .into())
                    }
                },
                None => {
                    return Err(Diagnostic::runtime(format!("undefined parent class `{name}`"))
                        .with_variable(name.clone())
                        .into())
                }
            },
            None => None,
        };
        let methods: IndexMap<_, _> = def
            .methods
            .iter()
            .filter_map(|method| Some((method.name.clone()?, Rc::clone(method))))
            .collect();
        Ok(ClassValue {
            name: def.name.clone(),
            parent,
            methods,
            annotations: def.annotations.clone(),
        })
    }
}

fn thrown_diagnostic(value: Value) -> Diagnostic {
    let message = match value.kind() {
        ValueKind::Object(entries) => entries
            .borrow()
            .get("message")
            .map(Value::to_string)
            .unwrap_or_else(|| value.to_string()),
        _ => value.to_string(),
    };
    Diagnostic::new(DiagnosticKind::Throw, message).with_thrown(value)
}

fn iteration_items(iterable: &Value, mode: IterationMode) -> Result<Vec<Value>> {
    let items = match (iterable.kind(), mode) {
        (ValueKind::Array(items), IterationMode::Of) => items.borrow().clone(),
        (ValueKind::Array(items), IterationMode::In) => (0..items.borrow().len())
            .map(|idx| Value::number(idx as f64))
            .collect(),
        (ValueKind::String(text), IterationMode::Of) => {
            text.chars().map(|ch| Value::string(ch)).collect()
        }
        (ValueKind::String(text), IterationMode::In) => (0..text.chars().count())
            .map(|idx| Value::number(idx as f64))
            .collect(),
        (ValueKind::Object(entries), IterationMode::In) => entries
            .borrow()
            .keys()
            .map(|key| Value::string(key.clone()))
            .collect(),
        (ValueKind::Instance(instance), IterationMode::In) => instance
            .fields
            .borrow()
            .keys()
            .map(|key| Value::string(key.clone()))
            .collect(),
        _ => {
            let keyword = match mode {
                IterationMode::Of => "of",
                IterationMode::In => "in",
            };
            return Err(Diagnostic::runtime(format!(
                "cannot iterate over {} with `for ... {keyword}`",
                iterable.type_name()
            ))
            .with_got(iterable.type_name())
            .into());
        }
    };
    Ok(items)
}
