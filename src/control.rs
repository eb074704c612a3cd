use std::fmt;

use crate::value::Value;

/// Identifies one pending host operation. The host hands it back to
/// [`crate::Interpreter::resume`] together with the resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResumeToken(pub(crate) u64);

impl ResumeToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Suspension {
    pub token: ResumeToken,
    pub label: String,
    pub payload: Value,
}

#[derive(Debug, Clone)]
pub enum Outcome<T = Value> {
    Value(T),
    Suspended(Suspension),
}

impl<T> From<Suspension> for Outcome<T> {
    fn from(suspension: Suspension) -> Self {
        Outcome::Suspended(suspension)
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Outcome::Value(value)
    }
}

#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
    Suspend(Suspension),
}

impl From<Suspension> for Flow {
    fn from(suspension: Suspension) -> Self {
        Flow::Suspend(suspension)
    }
}

#[macro_export]
macro_rules! ready {
    ($outcome:expr) => {
        match $outcome {
            $crate::control::Outcome::Value(value) => value,
            $crate::control::Outcome::Suspended(suspension) => {
                return Ok(::std::convert::From::from(suspension));
            }
        }
    };
}
