//! Per-host call ledger for diagnosing module failures.
//!
//! The ledger belongs to one host instance; two hosts in the same process
//! never share counters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default bound on retained `fd_write` text, in characters.
pub const DEFAULT_WRITE_TAIL_CHARS: usize = 500;

/// Mutable ledger updated by the instrumented shims.
#[derive(Debug, Clone)]
pub struct CallLedger {
    calls: BTreeMap<String, u64>,
    last_write: String,
    write_tail_chars: usize,
    bridge_errors: u64,
    last_bridge_error: Option<String>,
}

/// Copy of the ledger handed out to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Invocation count per shim function name
    pub calls: BTreeMap<String, u64>,
    /// Trailing decoded text written by the module
    pub last_write: String,
    /// Marshaling errors seen by the bridge
    pub bridge_errors: u64,
    /// Most recent marshaling error message
    pub last_bridge_error: Option<String>,
}

impl CallLedger {
    /// Create an empty ledger keeping at most `write_tail_chars` of output.
    pub fn new(write_tail_chars: usize) -> Self {
        Self {
            calls: BTreeMap::new(),
            last_write: String::new(),
            write_tail_chars,
            bridge_errors: 0,
            last_bridge_error: None,
        }
    }

    /// Count one call of `name`.
    pub fn record_call(&mut self, name: &str) {
        *self.calls.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Append decoded write output, trimming to the trailing bound.
    pub fn record_write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.last_write.push_str(text);
        let chars = self.last_write.chars().count();
        if chars > self.write_tail_chars {
            let skip = chars - self.write_tail_chars;
            let cut = self
                .last_write
                .char_indices()
                .nth(skip)
                .map(|(i, _)| i)
                .unwrap_or(self.last_write.len());
            self.last_write.drain(..cut);
        }
    }

    /// Count a marshaling error reported by the bridge.
    pub fn record_bridge_error(&mut self, message: &str) {
        self.bridge_errors += 1;
        self.last_bridge_error = Some(message.to_string());
    }

    /// Invocation count for one function.
    pub fn count(&self, name: &str) -> u64 {
        self.calls.get(name).copied().unwrap_or(0)
    }

    /// Copy the current state.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            calls: self.calls.clone(),
            last_write: self.last_write.clone(),
            bridge_errors: self.bridge_errors,
            last_bridge_error: self.last_bridge_error.clone(),
        }
    }
}

impl Default for CallLedger {
    fn default() -> Self {
        Self::new(DEFAULT_WRITE_TAIL_CHARS)
    }
}

impl LedgerSnapshot {
    /// Total shim invocations across all functions.
    pub fn total_calls(&self) -> u64 {
        self.calls.values().sum()
    }
}
