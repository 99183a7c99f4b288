//! The request shape a function invocation arrives in.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One function invocation as delivered by the runtime.
///
/// `variables` holds the execution context (credentials, trigger kind,
/// event data); `payload` is the caller's request body, either as a JSON
/// value or as the raw string the runtime forwards.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct FunctionRequest {
    #[serde(default)]
    pub variables: HashMap<String, String>,

    #[serde(default)]
    pub payload: Option<Value>,
}

impl FunctionRequest {
    /// Look up a context variable, treating empty values as absent.
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Fill in variables the invocation did not set itself.
    pub fn with_defaults<'a, I>(mut self, defaults: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in defaults {
            if self.variable(name).is_none() && !value.is_empty() {
                self.variables.insert(name.to_string(), value.to_string());
            }
        }
        self
    }
}
