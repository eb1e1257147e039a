//! Module loading using wasmtime.
//!
//! The module's imports are served by our own shims rather than
//! `wasmtime-wasi`: the module only expects a handful of WASI functions
//! and must never see a real filesystem or environment.

use super::capabilities::ExportSet;
use super::config::HostConfig;
use super::host_functions::ShimFunctions;
use crate::diagnostics::LedgerSnapshot;
use crate::error::{BridgeError, Result};
use crate::shim::{HostShims, ShimVariant};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use wasmtime::*;

/// Host state for the module store.
pub struct HostState {
    memory: Option<Memory>,
    shims: Box<dyn HostShims>,
    limits: StoreLimits,
}

impl HostState {
    /// Create state with the given shims and no memory reference yet.
    pub fn new(shims: Box<dyn HostShims>, limits: StoreLimits) -> Self {
        Self {
            memory: None,
            shims,
            limits,
        }
    }

    /// Published memory reference, if any.
    pub fn memory(&self) -> Option<Memory> {
        self.memory
    }

    /// Publish the module's memory. Allowed once per store.
    pub fn publish_memory(&mut self, memory: Memory) -> Result<()> {
        if self.memory.is_some() {
            tracing::warn!("rejecting second memory publish");
            return Err(BridgeError::MemoryAlreadyPublished);
        }
        self.memory = Some(memory);
        Ok(())
    }

    /// Shim implementation serving this store.
    pub fn shims_mut(&mut self) -> &mut dyn HostShims {
        self.shims.as_mut()
    }

    /// Copy of the diagnostics ledger, when instrumented.
    pub fn ledger(&self) -> Option<LedgerSnapshot> {
        self.shims.ledger()
    }
}

/// Where a module binary came from, for error reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Size of the binary in bytes
    pub size: usize,
    /// Hex of the first 16 bytes
    pub head_hex: String,
    /// SHA-256 of the whole binary, hex encoded
    pub sha256: String,
}

impl Provenance {
    /// Compute provenance for raw module bytes.
    pub fn of(bytes: &[u8]) -> Self {
        let head = &bytes[..bytes.len().min(16)];
        Self {
            size: bytes.len(),
            head_hex: hex::encode(head),
            sha256: hex::encode(Sha256::digest(bytes)),
        }
    }
}

/// Compiles modules and instantiates them against the shims.
pub struct ModuleLoader {
    engine: Engine,
    config: HostConfig,
}

/// A compiled module with its provenance.
pub struct ModuleImage {
    module: Module,
    name: String,
    provenance: Provenance,
}

/// An instantiated, initialized and validated module.
pub struct LoadedModule {
    store: Store<HostState>,
    instance: Instance,
    exports: ExportSet,
    fuel_limit: Option<u64>,
    name: String,
    provenance: Provenance,
}

impl ModuleLoader {
    /// Create a loader with the given configuration.
    pub fn new(config: HostConfig) -> Result<Self> {
        let mut engine_config = Config::new();

        engine_config.cranelift_opt_level(match config.optimization_level {
            0 => OptLevel::None,
            1 => OptLevel::Speed,
            _ => OptLevel::SpeedAndSize,
        });

        if config.fuel_limit.is_some() {
            engine_config.consume_fuel(true);
        }

        let engine = Engine::new(&engine_config)
            .map_err(|e| BridgeError::Runtime(format!("engine creation failed: {}", e)))?;

        Ok(Self { engine, config })
    }

    /// Load and compile a module from a file.
    pub fn load_module(&self, path: impl AsRef<Path>) -> Result<ModuleImage> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        let bytes = std::fs::read(path)?;
        self.load_module_bytes(&name, &bytes)
    }

    /// Compile a module from bytes.
    pub fn load_module_bytes(&self, name: &str, bytes: &[u8]) -> Result<ModuleImage> {
        let provenance = Provenance::of(bytes);
        let module = Module::new(&self.engine, bytes)
            .map_err(|e| BridgeError::Runtime(format!("module creation failed: {}", e)))?;

        tracing::debug!(
            "compiled module '{}' ({} bytes, sha256={})",
            name,
            provenance.size,
            provenance.sha256
        );

        Ok(ModuleImage {
            module,
            name: name.to_string(),
            provenance,
        })
    }

    /// Instantiate a module with the shims bound, run its initializer,
    /// publish its memory and resolve the capability descriptor.
    pub fn instantiate(&self, image: &ModuleImage) -> Result<LoadedModule> {
        let variant = self.config.shim_variant();
        self.instantiate_with(image, variant.build())
    }

    /// Like [`ModuleLoader::instantiate`] with an explicit shim set.
    pub fn instantiate_with(&self, image: &ModuleImage, shims: Box<dyn HostShims>) -> Result<LoadedModule> {
        let limits = StoreLimitsBuilder::new()
            .memory_size(self.config.max_memory)
            .build();
        let mut store = Store::new(&self.engine, HostState::new(shims, limits));
        store.limiter(|state| &mut state.limits);

        if let Some(fuel) = self.config.fuel_limit {
            store
                .set_fuel(fuel)
                .map_err(|e| BridgeError::Runtime(format!("fuel setup failed: {}", e)))?;
        }

        let mut linker: Linker<HostState> = Linker::new(&self.engine);
        ShimFunctions::register(&mut linker)?;

        let instance = linker
            .instantiate(&mut store, &image.module)
            .map_err(|e| BridgeError::Runtime(format!("instantiation failed: {}", e)))?;

        // Runs before the memory reference exists, so any shim that needs
        // memory answers ENOSYS during initialization.
        if instance.get_export(&mut store, "_initialize").is_some() {
            let init = instance
                .get_typed_func::<(), ()>(&mut store, "_initialize")
                .map_err(|e| BridgeError::Runtime(format!("bad _initialize export: {}", e)))?;
            init.call(&mut store, ()).map_err(BridgeError::from_call)?;
            tracing::debug!("ran _initialize for '{}'", image.name);
        }

        if let Some(memory) = instance.get_memory(&mut store, "memory") {
            store.data_mut().publish_memory(memory)?;
        }

        let exports = ExportSet::resolve(&instance, &mut store, self.config.strategy)?;
        tracing::debug!(
            "resolved {} exports for '{}'",
            self.config.strategy.as_str(),
            image.name
        );

        Ok(LoadedModule {
            store,
            instance,
            exports,
            fuel_limit: self.config.fuel_limit,
            name: image.name.clone(),
            provenance: image.provenance.clone(),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Shim variant the loader will install.
    pub fn shim_variant(&self) -> ShimVariant {
        self.config.shim_variant()
    }
}

impl ModuleImage {
    /// Get the module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provenance of the module bytes.
    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Get exported function names.
    pub fn exports(&self) -> impl Iterator<Item = &str> {
        self.module.exports().filter_map(|e| {
            if matches!(e.ty(), ExternType::Func(_)) {
                Some(e.name())
            } else {
                None
            }
        })
    }

    /// Get `(namespace, name)` of every import.
    pub fn imports(&self) -> impl Iterator<Item = (&str, &str)> {
        self.module.imports().map(|i| (i.module(), i.name()))
    }
}

impl LoadedModule {
    /// Get the module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provenance of the module bytes.
    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Resolved capability descriptor.
    pub fn exports(&self) -> &ExportSet {
        &self.exports
    }

    /// Store driving this instance.
    pub fn store_mut(&mut self) -> &mut Store<HostState> {
        &mut self.store
    }

    /// Copy of the diagnostics ledger, when instrumented.
    pub fn ledger(&self) -> Option<LedgerSnapshot> {
        self.store.data().ledger()
    }

    /// Forward a marshaling failure to the shims' ledger.
    pub fn record_bridge_error(&mut self, message: &str) {
        self.store.data_mut().shims_mut().record_bridge_error(message);
    }

    /// Write bytes to linear memory at the given offset.
    pub fn write_memory(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        let memory = self.exports.memory;
        let mem_data = memory.data_mut(&mut self.store);
        let len = data.len() as u32;
        let dest = (offset as usize)
            .checked_add(data.len())
            .and_then(|end| mem_data.get_mut(offset as usize..end))
            .ok_or(BridgeError::OutOfBounds { offset, len })?;
        dest.copy_from_slice(data);
        Ok(())
    }

    /// Read bytes from linear memory at the given offset.
    pub fn read_memory(&self, offset: u32, len: u32) -> Result<Vec<u8>> {
        let mem_data = self.exports.memory.data(&self.store);
        (offset as usize)
            .checked_add(len as usize)
            .and_then(|end| mem_data.get(offset as usize..end))
            .map(|s| s.to_vec())
            .ok_or(BridgeError::OutOfBounds { offset, len })
    }

    /// Call a no-argument export returning `i32`.
    pub fn call_i32(&mut self, name: &str) -> Result<i32> {
        let func = self
            .instance
            .get_typed_func::<(), i32>(&mut self.store, name)
            .map_err(|e| BridgeError::Unsupported(format!("{}: {}", name, e)))?;
        func.call(&mut self.store, ()).map_err(BridgeError::from_call)
    }

    /// Reset fuel to the configured limit.
    ///
    /// The limit is a per-call budget: the host refuels before every
    /// transform. Does nothing when metering is off.
    pub fn refuel(&mut self) -> Result<()> {
        if let Some(fuel) = self.fuel_limit {
            self.store
                .set_fuel(fuel)
                .map_err(|e| BridgeError::Runtime(format!("fuel setup failed: {}", e)))?;
        }
        Ok(())
    }

    /// Get remaining fuel (if fuel metering enabled).
    pub fn remaining_fuel(&self) -> Option<u64> {
        self.store.get_fuel().ok()
    }
}
