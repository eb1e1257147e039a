//! # proj-host
//!
//! Host bridge for a coordinate-transformation engine compiled to
//! WebAssembly.
//!
//! The module is instantiated once under wasmtime with a small set of
//! emulated system imports, its exports are validated into a capability
//! descriptor, and transforms are driven through a marshaling bridge that
//! stages strings in module memory and reads back `f64` coordinates.
//!
//! ## Layers
//!
//! | Layer | Module | Role |
//! |-------|--------|------|
//! | Shims | [`shim`] | `wasi_snapshot_preview1` and `env` imports |
//! | Runtime | [`wasm`] | Engine, linker, capability descriptor |
//! | Bridge | [`bridge`] | Raw or typed marshaling, scratch scopes |
//! | Host | [`host`] | Normalization, disabled state, reports |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use proj_host::{HostConfig, TransformHost};
//!
//! let mut host = TransformHost::from_file("proj.wasm", HostConfig::default())?;
//! let out = host.run_transform("epsg:4326", "EPSG:3857", 2.35, 48.85)?;
//! println!("{}", serde_json::to_string(&out)?);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bridge;
pub mod diagnostics;
pub mod error;
pub mod host;
pub mod normalize;
pub mod report;
pub mod shim;
pub mod wasm;

// Re-export main types
pub use bridge::{MarshalingBridge, RawBridge, TypedBridge, UNKNOWN_ERROR};
pub use diagnostics::{CallLedger, LedgerSnapshot};
pub use error::{BridgeError, ProcExit, Result};
pub use host::{TransformFailure, TransformHost, TransformOutput, EXPORTS_MISSING_MESSAGE};
pub use normalize::normalize_crs;
pub use report::DiagnosticReport;
pub use shim::{HostShims, ShimVariant};
pub use wasm::{BridgeStrategy, Capability, HostConfig, LoadedModule, ModuleImage, ModuleLoader, Provenance};
