//! WebAssembly runtime for the transformation module.
//!
//! ## Load Sequence
//!
//! 1. Compile the binary and record its [`Provenance`]
//! 2. Link the shim imports ([`ShimFunctions`])
//! 3. Instantiate and run `_initialize` if exported
//! 4. Publish the module memory to the shims
//! 5. Resolve the [`ExportSet`] for the configured [`BridgeStrategy`]
//!
//! ## Isolation
//!
//! - **Memory**: the module only sees its own linear memory, capped by
//!   [`HostConfig::max_memory`]
//! - **Imports**: only the shim namespaces are linked; there is no real
//!   filesystem, environment or clock access beyond wall time
//! - **Execution**: optional fuel metering via [`HostConfig::fuel_limit`]

mod capabilities;
mod config;
mod host_functions;
mod runtime;

pub use capabilities::{
    Capability, ExportSet, RawExports, RawTransform2, RawTransform3, StrategyExports, TypedExports,
    TypedTransform2, TypedTransform3,
};
pub use config::{BridgeStrategy, HostConfig};
pub use host_functions::{ShimFunctions, ENV_MODULE, WASI_MODULE};
pub use runtime::{HostState, LoadedModule, ModuleImage, ModuleLoader, Provenance};
