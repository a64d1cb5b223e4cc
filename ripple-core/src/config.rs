//! Runtime Configuration
//!
//! Tunables for the propagation engine. Configuration is installed per
//! thread with [`Runtime::configure`](crate::reactive::Runtime::configure),
//! matching the thread-local scope of the runtime itself.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default cap on how often one effect may run during a single flush.
pub const DEFAULT_MAX_EFFECT_RERUNS: usize = 100;

/// Settings for the reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of times a single effect may run within one flush.
    ///
    /// An effect that writes to its own dependencies without reaching a
    /// fixed point is dropped from the flush once it hits this limit.
    pub max_effect_reruns: usize,

    /// Log every signal write at `trace` level.
    pub trace_writes: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_effect_reruns: DEFAULT_MAX_EFFECT_RERUNS,
            trace_writes: false,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Override the effect re-run cap.
    pub fn with_max_effect_reruns(mut self, max: usize) -> Self {
        self.max_effect_reruns = max;
        self
    }
}
