use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::ast::FunctionDef;

const MAX_RENDER_DEPTH: usize = 16;

#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

pub enum ValueKind {
    Null,
    Bool(bool),
    Number(f64),
    BigInt(BigInt),
    String(String),
    Array(RefCell<Vec<Value>>),
    Object(RefCell<IndexMap<String, Value>>),
    Function(Closure),
    Class(Rc<ClassValue>),
    Instance(Instance),
}

#[derive(Clone)]
pub struct Closure {
    pub def: Rc<FunctionDef>,
    pub this: Option<Value>,
}

pub struct ClassValue {
    pub name: String,
    pub parent: Option<Rc<ClassValue>>,
    pub methods: IndexMap<String, Rc<FunctionDef>>,
    pub annotations: Vec<String>,
}

impl ClassValue {
    pub fn find_method(&self, name: &str) -> Option<Rc<FunctionDef>> {
        match self.methods.get(name) {
            Some(def) => Some(Rc::clone(def)),
            None => self.parent.as_ref()?.find_method(name),
        }
    }
}

pub struct Instance {
    pub class: Rc<ClassValue>,
    pub fields: RefCell<IndexMap<String, Value>>,
}

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn null() -> Self {
        Self::new(ValueKind::Null)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn number(value: f64) -> Self {
        Self::new(ValueKind::Number(value))
    }

    pub fn bigint(value: BigInt) -> Self {
        Self::new(ValueKind::BigInt(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::new(ValueKind::Array(RefCell::new(values)))
    }

    pub fn object(entries: IndexMap<String, Value>) -> Self {
        Self::new(ValueKind::Object(RefCell::new(entries)))
    }

    pub fn function(def: Rc<FunctionDef>, this: Option<Value>) -> Self {
        Self::new(ValueKind::Function(Closure { def, this }))
    }

    pub fn class(class: Rc<ClassValue>) -> Self {
        Self::new(ValueKind::Class(class))
    }

    pub fn instance(class: Rc<ClassValue>) -> Self {
        Self::new(ValueKind::Instance(Instance {
            class,
            fields: RefCell::new(IndexMap::new()),
        }))
    }

    pub fn kind(&self) -> &ValueKind {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind(), ValueKind::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self.kind() {
            ValueKind::Null => false,
            ValueKind::Bool(b) => *b,
            ValueKind::Number(n) => *n != 0.0 && !n.is_nan(),
            ValueKind::BigInt(n) => !n.is_zero(),
            ValueKind::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind() {
            ValueKind::Null => "null",
            ValueKind::Bool(_) => "boolean",
            ValueKind::Number(_) => "number",
            ValueKind::BigInt(_) => "bigint",
            ValueKind::String(_) => "string",
            ValueKind::Array(_) => "array",
            ValueKind::Object(_) => "object",
            ValueKind::Function(_) => "function",
            ValueKind::Class(_) => "class",
            ValueKind::Instance(_) => "instance",
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(
            self.kind(),
            ValueKind::Array(_)
                | ValueKind::Object(_)
                | ValueKind::Function(_)
                | ValueKind::Class(_)
                | ValueKind::Instance(_)
        )
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.kind() {
            ValueKind::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.kind() {
            ValueKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self.kind() {
            ValueKind::Null => 0.0,
            ValueKind::Bool(b) => f64::from(u8::from(*b)),
            ValueKind::Number(n) => *n,
            ValueKind::BigInt(n) => n.to_f64().unwrap_or(f64::NAN),
            ValueKind::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    pub fn equals(&self, other: &Value) -> bool {
        if self.is_structured() || other.is_structured() {
            return Rc::ptr_eq(&self.0, &other.0);
        }
        match (self.kind(), other.kind()) {
            (ValueKind::Null, ValueKind::Null) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Number(a), ValueKind::Number(b)) => a == b,
            (ValueKind::BigInt(a), ValueKind::BigInt(b)) => a == b,
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            _ => false,
        }
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, nested: bool, depth: usize) -> fmt::Result {
        match self.kind() {
            ValueKind::Null => write!(f, "null"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Number(n) => write!(f, "{}", format_number(*n)),
            ValueKind::BigInt(n) => write!(f, "{n}"),
            ValueKind::String(s) if nested => write!(f, "{s:?}"),
            ValueKind::String(s) => write!(f, "{s}"),
            ValueKind::Array(_) | ValueKind::Object(_) | ValueKind::Instance(_)
                if depth >= MAX_RENDER_DEPTH =>
            {
                write!(f, "...")
            }
            ValueKind::Array(values) => {
                write!(f, "[")?;
                for (idx, value) in values.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    value.render(f, true, depth + 1)?;
                }
                write!(f, "]")
            }
            ValueKind::Object(entries) => render_entries(f, &entries.borrow(), depth),
            ValueKind::Instance(instance) => {
                write!(f, "{} ", instance.class.name)?;
                render_entries(f, &instance.fields.borrow(), depth)
            }
            ValueKind::Function(closure) => write!(
                f,
                "<function {}>",
                closure.def.name.as_deref().unwrap_or("anonymous")
            ),
            ValueKind::Class(class) => write!(f, "<class {}>", class.name),
        }
    }
}

fn render_entries(
    f: &mut fmt::Formatter<'_>,
    entries: &IndexMap<String, Value>,
    depth: usize,
) -> fmt::Result {
    write!(f, "{{")?;
    for (idx, (key, value)) in entries.iter().enumerate() {
        if idx > 0 {
            write!(f, ",")?;
        }
        write!(f, " {key}: ")?;
        value.render(f, true, depth + 1)?;
    }
    if entries.is_empty() {
        write!(f, "}}")
    } else {
        write!(f, " }}")
    }
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        String::from(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == 0.0 {
        "0".into()
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, false, 0)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, true, 0)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::string(value)
    }
}
