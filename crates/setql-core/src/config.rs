//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What the resolver does when several overloads match a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Log a warning and take the first match in declaration order.
    #[default]
    PickFirst,
    /// Report an overload resolution error.
    Reject,
}

/// Configuration for the [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Record an evaluation trace tree for every statement.
    pub trace: bool,

    /// Handling of ambiguous overloads.
    pub ambiguity: AmbiguityPolicy,

    /// Run the type checker before evaluation. When disabled, calls reach
    /// the evaluator without an overload index and are resolved at run time.
    pub type_check: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trace: false,
            ambiguity: AmbiguityPolicy::PickFirst,
            type_check: true,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON. Missing keys take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Enable or disable trace recording.
    pub fn trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Set the ambiguity policy.
    pub fn ambiguity(mut self, policy: AmbiguityPolicy) -> Self {
        self.ambiguity = policy;
        self
    }

    /// Enable or disable the type-check pass.
    pub fn type_check(mut self, enabled: bool) -> Self {
        self.type_check = enabled;
        self
    }
}
