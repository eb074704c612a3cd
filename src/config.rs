use std::path::Path;

use serde::Deserialize;

use crate::diagnostics::Result;

pub const STRICT_VARIABLE: &str = "__strict__";

pub const ERROR_HANDLER_VARIABLE: &str = "onError";

/// Interpreter settings. Every field is optional in TOML.
///
/// ```toml
/// source_name = "game"
/// strict_types = true
/// max_call_depth = 64
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub source_name: String,
    pub strict_types: bool,
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_name: "main".into(),
            strict_types: false,
            max_call_depth: 128,
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
