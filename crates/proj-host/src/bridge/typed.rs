//! Typed-export bridge (wasm-bindgen style ABI).
//!
//! ## Call Protocol
//!
//! ```text
//! from = __wbindgen_malloc(len, 1); to = __wbindgen_malloc(len, 1)
//! ret  = __wbindgen_malloc(16, 4)
//! transformN_known_crs(ret, from, from_len, to, to_len, x, y[, z])
//! ret -> [value_ptr: i32, value_len: i32, err_ptr: i32, err_len: i32]
//! ```
//!
//! A non-zero `err_len` means the module returned an error string; the
//! value buffer is ignored.
//!
//! ## Ownership
//!
//! String arguments pass to the module at the call, which frees them
//! itself. The host releases only the return area and the buffers the
//! module hands back, through `__wbindgen_free`. Arguments staged for a
//! call that never happens stay with the host.

use wasmtime::Store;

use super::raw::UNKNOWN_ERROR;
use super::scratch::{ScratchAllocation, ScratchScope, TokenSource};
use super::{decode_coords, offset, MarshalingBridge, COORD_SIZE};
use crate::error::{BridgeError, Result};
use crate::wasm::{BridgeStrategy, HostState, LoadedModule, TypedExports};

/// Size of the return area written by the module.
const RET_AREA_SIZE: u32 = 16;

/// Staged string arguments: `[from_ptr, from_len, to_ptr, to_len]`.
type StringArgs = [i32; 4];

/// Bridge for `transform2_known_crs` style exports.
pub struct TypedBridge {
    exports: TypedExports,
    tokens: TokenSource,
}

impl TypedBridge {
    /// Create a bridge over resolved typed exports.
    pub fn new(exports: TypedExports) -> Self {
        Self {
            exports,
            tokens: TokenSource::default(),
        }
    }

    /// Open a scope for a sequence of staged values.
    pub fn begin_scope(&mut self) -> ScratchScope {
        ScratchScope::new(self.tokens.next_token())
    }

    /// Release every allocation of `scope` through `__wbindgen_free`.
    pub fn release_scope(&self, module: &mut LoadedModule, scope: ScratchScope) {
        let free = &self.exports.free;
        let store = module.store_mut();
        scope.release_with(|a| free.call(&mut *store, (a.ptr as i32, a.len as i32, a.align as i32)));
    }

    fn reserve(
        &self,
        module: &mut LoadedModule,
        scope: &mut ScratchScope,
        len: u32,
        align: u32,
    ) -> Result<ScratchAllocation> {
        let ptr = self
            .exports
            .malloc
            .call(module.store_mut(), (len as i32, align as i32))
            .map_err(BridgeError::from_call)?;
        if ptr == 0 && len > 0 {
            return Err(BridgeError::Allocation(len));
        }
        Ok(scope.track(offset(ptr), len, align))
    }

    /// Stage `text` as UTF-8 bytes in module memory.
    pub fn encode(&self, module: &mut LoadedModule, scope: &mut ScratchScope, text: &str) -> Result<ScratchAllocation> {
        let bytes = text.as_bytes();
        let alloc = self.reserve(module, scope, bytes.len() as u32, 1)?;
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
        Ok(String::from_utf8(module.read_memory(alloc.ptr, alloc.len)?)?)
    }

    fn invoke<const N: usize>(
        &mut self,
        module: &mut LoadedModule,
        from: &str,
        to: &str,
        call: impl FnOnce(&mut Store<HostState>, i32, StringArgs) -> wasmtime::Result<()>,
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
        call: impl FnOnce(&mut Store<HostState>, i32, StringArgs) -> wasmtime::Result<()>,
    ) -> Result<[f64; N]> {
        let from_arg = self.encode(module, scope, from)?;
        let to_arg = self.encode(module, scope, to)?;
        let ret = self.reserve(module, scope, RET_AREA_SIZE, 4)?;

        let args = [
            from_arg.ptr as i32,
            from_arg.len as i32,
            to_arg.ptr as i32,
            to_arg.len as i32,
        ];
        scope.hand_over(&from_arg);
        scope.hand_over(&to_arg);
        call(module.store_mut(), ret.ptr as i32, args).map_err(BridgeError::from_call)?;

        let area = module.read_memory(ret.ptr, RET_AREA_SIZE)?;
        let word = |i: usize| i32::from_le_bytes([area[i * 4], area[i * 4 + 1], area[i * 4 + 2], area[i * 4 + 3]]);
        let (value_ptr, value_len, err_ptr, err_len) = (word(0), word(1), word(2), word(3));

        if err_len != 0 {
            let message = match module.read_memory(offset(err_ptr), offset(err_len)) {
                Ok(bytes) => {
                    scope.track(offset(err_ptr), offset(err_len), 1);
                    String::from_utf8_lossy(&bytes).into_owned()
                }
                Err(e) => {
                    // Never hand an out-of-range pointer to the allocator.
                    tracing::warn!("error string out of bounds: {}", e);
                    UNKNOWN_ERROR.to_string()
                }
            };
            return Err(BridgeError::Transform(message));
        }

        let byte_len = offset(value_len)
            .checked_mul(COORD_SIZE)
            .ok_or(BridgeError::OutOfBounds {
                offset: offset(value_ptr),
                len: u32::MAX,
            })?;
        let value = scope.track(offset(value_ptr), byte_len, COORD_SIZE);
        let bytes = module.read_memory(value.ptr, value.len)?;
        decode_coords::<N>(&bytes)
    }
}

impl MarshalingBridge for TypedBridge {
    fn strategy(&self) -> BridgeStrategy {
        BridgeStrategy::Typed
    }

    fn transform2(&mut self, module: &mut LoadedModule, from: &str, to: &str, x: f64, y: f64) -> Result<[f64; 2]> {
        let func = self.exports.transform2.clone();
        self.invoke::<2>(module, from, to, |store, ret, [fp, fl, tp, tl]| {
            func.call(store, (ret, fp, fl, tp, tl, x, y))
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
            .ok_or_else(|| BridgeError::Unsupported("transform3_known_crs".to_string()))?;
        self.invoke::<3>(module, from, to, |store, ret, [fp, fl, tp, tl]| {
            func.call(store, (ret, fp, fl, tp, tl, x, y, z))
        })
    }
}
