//! Configuration for binding resolution, model calls and retries

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatch::retry::RetryPolicy;

/// Per-call options handed to the model invoker
///
/// The core never interprets these beyond merging; each invoker decides
/// which fields it honours.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallOptions {
    /// Target model identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Randomness (0.0-1.0, higher = more random)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Stop generation when these sequences are encountered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Upper bound for a single invoker call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    /// Invoker-specific settings
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CallOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the top_p value
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set stop sequences
    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = Some(stop_sequences);
        self
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set an invoker-specific value
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Fill every unset field from `fallback`
    pub fn merged_over(mut self, fallback: &CallOptions) -> Self {
        if self.model.is_none() {
            self.model = fallback.model.clone();
        }
        if self.temperature.is_none() {
            self.temperature = fallback.temperature;
        }
        if self.max_tokens.is_none() {
            self.max_tokens = fallback.max_tokens;
        }
        if self.top_p.is_none() {
            self.top_p = fallback.top_p;
        }
        if self.stop_sequences.is_none() {
            self.stop_sequences = fallback.stop_sequences.clone();
        }
        if self.timeout.is_none() {
            self.timeout = fallback.timeout;
        }
        for (key, value) in &fallback.extra {
            self.extra
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }
}

/// Policy applied when resolving method bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    /// Reject declared parameters that the template never references
    pub strict_parameters: bool,
    /// Maximum nesting depth of parameter and return types
    pub max_type_depth: usize,
    /// Append output format instructions for enumerated and structured returns
    pub format_instructions: bool,
}

impl ResolveOptions {
    /// Set parameter strictness
    pub fn with_strict_parameters(mut self, strict: bool) -> Self {
        self.strict_parameters = strict;
        self
    }

    /// Set the maximum type depth
    pub fn with_max_type_depth(mut self, depth: usize) -> Self {
        self.max_type_depth = depth;
        self
    }

    /// Enable or disable format instructions
    pub fn with_format_instructions(mut self, enabled: bool) -> Self {
        self.format_instructions = enabled;
        self
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            strict_parameters: false,
            max_type_depth: 16,
            format_instructions: true,
        }
    }
}

/// Top-level configuration for a call dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Retry policy for transport failures
    pub retry: RetryPolicy,
    /// Default per-call timeout; per-call options take precedence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_timeout: Option<Duration>,
    /// Options used when neither the call nor the interface sets them
    pub default_options: CallOptions,
    /// Maximum characters of raw response kept in decode diagnostics
    pub diagnostic_limit: usize,
}

impl DispatcherConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the default call timeout
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Set the default call options
    pub fn with_default_options(mut self, options: CallOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Set the diagnostic truncation limit
    pub fn with_diagnostic_limit(mut self, limit: usize) -> Self {
        self.diagnostic_limit = limit;
        self
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            call_timeout: None,
            default_options: CallOptions::default(),
            diagnostic_limit: 512,
        }
    }
}
