use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::value::Value;

pub type EnvironmentRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    parent: Option<EnvironmentRef>,
    bindings: IndexMap<String, Value>,
}

impl Environment {
    pub fn new() -> EnvironmentRef {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn with_parent(parent: EnvironmentRef) -> EnvironmentRef {
        Rc::new(RefCell::new(Self {
            parent: Some(parent),
            bindings: IndexMap::new(),
        }))
    }

    pub fn parent(&self) -> Option<EnvironmentRef> {
        self.parent.clone()
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn has(env: &EnvironmentRef, name: &str) -> bool {
        Environment::owner(env, name).is_some()
    }

    pub fn get(env: &EnvironmentRef, name: &str) -> Option<Value> {
        let owner = Environment::owner(env, name)?;
        let scope = owner.borrow();
        scope.bindings.get(name).cloned()
    }

    pub fn set(env: &EnvironmentRef, name: &str, value: Value) {
        let target = Environment::owner(env, name).unwrap_or_else(|| Rc::clone(env));
        target.borrow_mut().define(name, value);
    }

    fn owner(env: &EnvironmentRef, name: &str) -> Option<EnvironmentRef> {
        let mut current = Rc::clone(env);
        loop {
            if current.borrow().bindings.contains_key(name) {
                return Some(current);
            }
            let parent = current.borrow().parent.clone();
            current = parent?;
        }
    }
}
