//! Host-facing transform operation.
//!
//! [`TransformHost`] owns the single loaded module for its lifetime. When
//! the module lacks a required export the host stays constructible but
//! disabled: every transform returns [`EXPORTS_MISSING_MESSAGE`] without
//! calling into the module.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::bridge::{bridge_for, MarshalingBridge};
use crate::diagnostics::LedgerSnapshot;
use crate::error::{BridgeError, Result};
use crate::normalize::normalize_crs;
use crate::report::DiagnosticReport;
use crate::wasm::{Capability, HostConfig, LoadedModule, ModuleImage, ModuleLoader, Provenance};

/// Message reported while the host is disabled by missing exports.
pub const EXPORTS_MISSING_MESSAGE: &str = "required wasm exports are missing; rebuild the module and reload";

/// Successful transform, serialized as `{"input": [...], "output": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformOutput {
    /// Coordinates passed in
    pub input: Vec<f64>,
    /// Coordinates returned by the module
    pub output: Vec<f64>,
}

/// Failed transform with optional debugging context.
#[derive(Error, Debug)]
#[error("{message}{}", report_suffix(.report))]
pub struct TransformFailure {
    /// Human-readable failure
    pub message: String,
    /// Underlying bridge error
    pub error: BridgeError,
    /// Report attached when diagnostics are enabled
    pub report: Option<DiagnosticReport>,
}

fn report_suffix(report: &Option<DiagnosticReport>) -> String {
    match report {
        Some(r) => format!(" {}", r),
        None => String::new(),
    }
}

enum HostStatus {
    Ready {
        module: Box<LoadedModule>,
        bridge: Box<dyn MarshalingBridge>,
    },
    Disabled {
        missing: Vec<Capability>,
    },
}

/// Runs transforms through one loaded module.
pub struct TransformHost {
    status: HostStatus,
    config: HostConfig,
    provenance: Provenance,
}

impl TransformHost {
    /// Load a module file and prepare it for transforms.
    pub fn from_file(path: impl AsRef<Path>, config: HostConfig) -> Result<Self> {
        let loader = ModuleLoader::new(config)?;
        let image = loader.load_module(path)?;
        Self::from_image(&loader, &image)
    }

    /// Load module bytes and prepare them for transforms.
    pub fn from_bytes(name: &str, bytes: &[u8], config: HostConfig) -> Result<Self> {
        let loader = ModuleLoader::new(config)?;
        let image = loader.load_module_bytes(name, bytes)?;
        Self::from_image(&loader, &image)
    }

    /// Instantiate a compiled image.
    ///
    /// Missing capabilities disable the host instead of failing; any
    /// other load error is returned.
    pub fn from_image(loader: &ModuleLoader, image: &ModuleImage) -> Result<Self> {
        let status = match loader.instantiate(image) {
            Ok(module) => {
                let bridge = bridge_for(module.exports());
                tracing::info!(
                    "module '{}' ready ({} bridge)",
                    module.name(),
                    bridge.strategy().as_str()
                );
                HostStatus::Ready {
                    module: Box::new(module),
                    bridge,
                }
            }
            Err(BridgeError::MissingCapabilities(missing)) => {
                tracing::warn!(
                    "module '{}' disabled, missing: {}",
                    image.name(),
                    Capability::list(&missing)
                );
                HostStatus::Disabled { missing }
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            status,
            config: loader.config().clone(),
            provenance: image.provenance().clone(),
        })
    }

    /// Whether transforms can be attempted.
    pub fn is_ready(&self) -> bool {
        matches!(self.status, HostStatus::Ready { .. })
    }

    /// Message explaining why the host is disabled, if it is.
    pub fn disabled_reason(&self) -> Option<String> {
        match &self.status {
            HostStatus::Disabled { missing } => Some(disabled_message(missing)),
            HostStatus::Ready { .. } => None,
        }
    }

    /// Whether the loaded module offers the 3-D transform.
    pub fn supports_transform3(&self) -> bool {
        match &self.status {
            HostStatus::Ready { module, .. } => module.exports().has_transform3(),
            HostStatus::Disabled { .. } => false,
        }
    }

    /// Provenance of the module binary.
    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Copy of the diagnostics ledger, when instrumented.
    pub fn ledger(&self) -> Option<LedgerSnapshot> {
        match &self.status {
            HostStatus::Ready { module, .. } => module.ledger(),
            HostStatus::Disabled { .. } => None,
        }
    }

    /// Transform `(x, y)` between two reference systems.
    pub fn run_transform(
        &mut self,
        from: &str,
        to: &str,
        x: f64,
        y: f64,
    ) -> std::result::Result<TransformOutput, TransformFailure> {
        self.run(from, to, vec![x, y], |bridge, module, from, to| {
            bridge.transform2(module, from, to, x, y).map(|v| v.to_vec())
        })
    }

    /// Transform `(x, y, z)` between two reference systems.
    pub fn run_transform3(
        &mut self,
        from: &str,
        to: &str,
        x: f64,
        y: f64,
        z: f64,
    ) -> std::result::Result<TransformOutput, TransformFailure> {
        self.run(from, to, vec![x, y, z], |bridge, module, from, to| {
            bridge.transform3(module, from, to, [x, y, z]).map(|v| v.to_vec())
        })
    }

    fn run(
        &mut self,
        from: &str,
        to: &str,
        input: Vec<f64>,
        call: impl FnOnce(&mut dyn MarshalingBridge, &mut LoadedModule, &str, &str) -> Result<Vec<f64>>,
    ) -> std::result::Result<TransformOutput, TransformFailure> {
        let (module, bridge) = match &mut self.status {
            HostStatus::Ready { module, bridge } => (module, bridge),
            HostStatus::Disabled { missing } => {
                return Err(TransformFailure {
                    message: disabled_message(missing),
                    error: BridgeError::MissingCapabilities(missing.clone()),
                    report: None,
                });
            }
        };

        let from = normalize_crs(from);
        let to = normalize_crs(to);

        let outcome = module
            .refuel()
            .and_then(|()| call(bridge.as_mut(), module.as_mut(), &from, &to));
        match outcome {
            Ok(output) => Ok(TransformOutput { input, output }),
            Err(error) => {
                let message = error.to_string();
                tracing::debug!("transform {} -> {} failed: {}", from, to, message);
                module.record_bridge_error(&message);
                let report = self.config.diagnostics.then(|| {
                    DiagnosticReport::new(
                        &from,
                        &to,
                        bridge.strategy(),
                        module.ledger(),
                        self.provenance.clone(),
                    )
                });
                Err(TransformFailure {
                    message,
                    error,
                    report,
                })
            }
        }
    }
}

fn disabled_message(missing: &[Capability]) -> String {
    format!("{} (missing: {})", EXPORTS_MISSING_MESSAGE, Capability::list(missing))
}
