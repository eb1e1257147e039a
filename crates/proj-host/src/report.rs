//! Diagnostic reports attached to failed transforms.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::diagnostics::LedgerSnapshot;
use crate::wasm::{BridgeStrategy, Provenance};

/// Debugging context for one failed transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    /// Normalized source identifier
    pub from: String,
    /// Normalized target identifier
    pub to: String,
    /// Hex of the source identifier's UTF-8 bytes
    pub from_hex: String,
    /// Hex of the target identifier's UTF-8 bytes
    pub to_hex: String,
    /// Bridge generation used for the call
    pub strategy: BridgeStrategy,
    /// Shim ledger at the time of failure
    pub ledger: Option<LedgerSnapshot>,
    /// Module binary provenance
    pub module: Provenance,
}

impl DiagnosticReport {
    /// Build a report for a call between `from` and `to`.
    pub fn new(
        from: &str,
        to: &str,
        strategy: BridgeStrategy,
        ledger: Option<LedgerSnapshot>,
        module: Provenance,
    ) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            from_hex: hex::encode(from.as_bytes()),
            to_hex: hex::encode(to.as_bytes()),
            strategy,
            ledger,
            module,
        }
    }
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ledger = self
            .ledger
            .as_ref()
            .and_then(|l| serde_json::to_string(l).ok())
            .unwrap_or_else(|| "null".to_string());
        write!(
            f,
            "[from={:?}, to={:?}, from_hex={}, to_hex={}, strategy={}, shims={}, wasm_size={}, wasm_head={}, wasm_sha256={}]",
            self.from,
            self.to,
            self.from_hex,
            self.to_hex,
            self.strategy.as_str(),
            ledger,
            self.module.size,
            self.module.head_hex,
            self.module.sha256
        )
    }
}
