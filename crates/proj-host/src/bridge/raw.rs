//! Raw pointer-passing bridge.
//!
//! ## Call Protocol
//!
//! ```text
//! from = malloc(len(from)); to = malloc(len(to)); out = malloc(8 * N)
//! rc = transformN_known_crs_raw(from, from_len, to, to_len, x, y[, z], out)
//! rc == 0  -> out holds N little-endian f64
//! rc != 0  -> message at (last_error_message_ptr(), last_error_message_len())
//! ```

use wasmtime::Store;

use super::scratch::{ScratchAllocation, ScratchScope, TokenSource};
use super::{decode_coords, offset, MarshalingBridge, COORD_SIZE};
use crate::error::{BridgeError, Result};
use crate::wasm::{BridgeStrategy, HostState, LoadedModule, RawExports};

/// Message used when the module leaves the last-error slot empty.
pub const UNKNOWN_ERROR: &str = "unknown wasm error";

/// Staged string arguments: `[from_ptr, from_len, to_ptr, to_len]`.
type StringArgs = [i32; 4];

/// Bridge for `transform2_known_crs_raw` style exports.
pub struct RawBridge {
    exports: RawExports,
    tokens: TokenSource,
}

impl RawBridge {
    /// Create a bridge over resolved raw exports.
    pub fn new(exports: RawExports) -> Self {
        Self {
            exports,
            tokens: TokenSource::default(),
        }
    }

    /// Open a scope for a sequence of staged values.
    pub fn begin_scope(&mut self) -> ScratchScope {
        ScratchScope::new(self.tokens.next_token())
    }

    /// Release every allocation of `scope` through `free`, if exported.
    pub fn release_scope(&self, module: &mut LoadedModule, scope: ScratchScope) {
        match &self.exports.free {
            Some(free) => {
                let store = module.store_mut();
                scope.release_with(|a| free.call(&mut *store, a.ptr as i32));
            }
            None => {
                tracing::trace!(
                    "module has no free export; leaving {} allocations to its arena",
                    scope.len()
                );
                scope.release_with(|_| Ok::<(), BridgeError>(()));
            }
        }
    }

    /// Allocate `len` bytes in module memory.
    fn reserve(&self, module: &mut LoadedModule, scope: &mut ScratchScope, len: u32) -> Result<ScratchAllocation> {
        let ptr = self
            .exports
            .malloc
            .call(module.store_mut(), len as i32)
            .map_err(BridgeError::from_call)?;
        if ptr == 0 && len > 0 {
            return Err(BridgeError::Allocation(len));
        }
        Ok(scope.track(offset(ptr), len, 1))
    }

    /// Stage `text` as UTF-8 bytes in module memory.
    ///
    /// The empty string yields a zero-length allocation.
    pub fn encode(&self, module: &mut LoadedModule, scope: &mut ScratchScope, text: &str) -> Result<ScratchAllocation> {
        let bytes = text.as_bytes();
        let alloc = self.reserve(module, scope, bytes.len() as u32)?;
        if !bytes.is_empty() {
            module.write_memory(alloc.ptr, bytes)?;
        }
        Ok(alloc)
    }

    /// Read a staged allocation back as UTF-8.
    pub fn decode(&self, module: &LoadedModule, alloc: &ScratchAllocation) -> Result<String> {
        if alloc.len == 0 {
            return Ok(String::new());
        }
        let bytes = module.read_memory(alloc.ptr, alloc.len)?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Read the module's last-error slot.
    ///
    /// Falls back to [`UNKNOWN_ERROR`] when the slot is empty or cannot be
    /// read; this never fails.
    pub fn decode_error(&self, module: &mut LoadedModule) -> String {
        let store = module.store_mut();
        let ptr = self.exports.last_error_ptr.call(&mut *store, ());
        let len = self.exports.last_error_len.call(&mut *store, ());
        let (ptr, len) = match (ptr, len) {
            (Ok(ptr), Ok(len)) if ptr != 0 && len > 0 => (offset(ptr), offset(len)),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("last-error slot unreadable: {}", e);
                return UNKNOWN_ERROR.to_string();
            }
            _ => return UNKNOWN_ERROR.to_string(),
        };
        match module.read_memory(ptr, len) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                tracing::warn!("last-error slot out of bounds: {}", e);
                UNKNOWN_ERROR.to_string()
            }
        }
    }

    /// Stage inputs, call the export and decode `N` coordinates.
    fn invoke<const N: usize>(
        &mut self,
        module: &mut LoadedModule,
        from: &str,
        to: &str,
        call: impl FnOnce(&mut Store<HostState>, StringArgs, i32) -> wasmtime::Result<i32>,
    ) -> Result<[f64; N]> {
        let mut scope = self.begin_scope();
        let outcome = self.invoke_in_scope::<N>(module, &mut scope, from, to, call);
        self.release_scope(module, scope);
        outcome
    }

    fn invoke_in_scope<const N: usize>(
        &self,
        module: &mut LoadedModule,
        scope: &mut ScratchScope,
        from: &str,
        to: &str,
        call: impl FnOnce(&mut Store<HostState>, StringArgs, i32) -> wasmtime::Result<i32>,
    ) -> Result<[f64; N]> {
        let from_arg = self.encode(module, scope, from)?;
        let to_arg = self.encode(module, scope, to)?;
        let out = self.reserve(module, scope, N as u32 * COORD_SIZE)?;

        let args = [
            from_arg.ptr as i32,
            from_arg.len as i32,
            to_arg.ptr as i32,
            to_arg.len as i32,
        ];
        let rc = call(module.store_mut(), args, out.ptr as i32).map_err(BridgeError::from_call)?;
        if rc != 0 {
            tracing::debug!("transform returned status {}", rc);
            return Err(BridgeError::Transform(self.decode_error(module)));
        }

        let bytes = module.read_memory(out.ptr, out.len)?;
        decode_coords::<N>(&bytes)
    }
}

impl MarshalingBridge for RawBridge {
    fn strategy(&self) -> BridgeStrategy {
        BridgeStrategy::Raw
    }

    fn transform2(&mut self, module: &mut LoadedModule, from: &str, to: &str, x: f64, y: f64) -> Result<[f64; 2]> {
        let func = self.exports.transform2.clone();
        self.invoke::<2>(module, from, to, |store, [fp, fl, tp, tl], out| {
            func.call(store, (fp, fl, tp, tl, x, y, out))
        })
    }

    fn transform3(
        &mut self,
        module: &mut LoadedModule,
        from: &str,
        to: &str,
        [x, y, z]: [f64; 3],
    ) -> Result<[f64; 3]> {
        let func = self
            .exports
            .transform3
            .clone()
            .ok_or_else(|| BridgeError::Unsupported("transform3_known_crs_raw".to_string()))?;
        self.invoke::<3>(module, from, to, |store, [fp, fl, tp, tl], out| {
            func.call(store, (fp, fl, tp, tl, x, y, z, out))
        })
    }
}
