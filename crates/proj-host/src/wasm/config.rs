//! Configuration for the module host.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::diagnostics::DEFAULT_WRITE_TAIL_CHARS;
use crate::error::{BridgeError, Result};
use crate::shim::ShimVariant;

/// Marshaling strategy used to call the module's transform export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeStrategy {
    /// Raw pointer passing with a last-error slot
    #[default]
    Raw,
    /// Typed exports returning values and error strings directly
    Typed,
}

impl BridgeStrategy {
    /// Short name used in reports and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            BridgeStrategy::Raw => "raw",
            BridgeStrategy::Typed => "typed",
        }
    }
}

impl std::str::FromStr for BridgeStrategy {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(BridgeStrategy::Raw),
            "typed" => Ok(BridgeStrategy::Typed),
            other => Err(BridgeError::Config(format!("unknown bridge strategy '{}'", other))),
        }
    }
}

/// Configuration for the module host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Which export generation to drive
    pub strategy: BridgeStrategy,

    /// Use the instrumented shims and attach reports to failures
    pub diagnostics: bool,

    /// Characters of module output kept by the diagnostics ledger
    /// (at most 500)
    pub write_tail_chars: usize,

    /// Maximum linear memory in bytes (default = 256MB)
    pub max_memory: usize,

    /// Enable fuel-based execution limiting
    pub fuel_limit: Option<u64>,

    /// Cranelift optimization level (0-2)
    pub optimization_level: u8,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            strategy: BridgeStrategy::Raw,
            diagnostics: false,
            write_tail_chars: DEFAULT_WRITE_TAIL_CHARS,
            max_memory: 256 * 1024 * 1024, // 256 MB
            fuel_limit: None,
            optimization_level: 2,
        }
    }
}

impl HostConfig {
    /// Config with the diagnostics overlay enabled.
    pub fn diagnostic() -> Self {
        Self {
            diagnostics: true,
            optimization_level: 0, // Faster compilation
            ..Default::default()
        }
    }

    /// Config with tight resource limits.
    pub fn minimal() -> Self {
        Self {
            max_memory: 64 * 1024 * 1024,    // 64 MB
            fuel_limit: Some(1_000_000_000), // 1B fuel units
            ..Default::default()
        }
    }

    /// Load a config from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parse a config from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| BridgeError::Config(e.to_string()))?;
        let chars = config.write_tail_chars;
        Ok(config.write_tail_chars(chars))
    }

    /// Shim variant implied by this config.
    pub fn shim_variant(&self) -> ShimVariant {
        if self.diagnostics {
            ShimVariant::Instrumented {
                write_tail_chars: self.write_tail_chars.min(DEFAULT_WRITE_TAIL_CHARS),
            }
        } else {
            ShimVariant::Plain
        }
    }

    /// Builder: set strategy
    pub fn strategy(mut self, strategy: BridgeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Builder: enable diagnostics
    pub fn diagnostics(mut self, enable: bool) -> Self {
        self.diagnostics = enable;
        self
    }

    /// Builder: set retained write tail (max 500)
    pub fn write_tail_chars(mut self, chars: usize) -> Self {
        self.write_tail_chars = chars.min(DEFAULT_WRITE_TAIL_CHARS);
        self
    }

    /// Builder: set max memory
    pub fn max_memory(mut self, bytes: usize) -> Self {
        self.max_memory = bytes;
        self
    }

    /// Builder: set fuel limit
    pub fn fuel_limit(mut self, fuel: u64) -> Self {
        self.fuel_limit = Some(fuel);
        self
    }

    /// Builder: set optimization level
    pub fn optimize(mut self, level: u8) -> Self {
        self.optimization_level = level.min(2);
        self
    }
}
