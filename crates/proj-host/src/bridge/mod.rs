//! Marshaling bridge between host values and module memory.
//!
//! Two generations of the module ABI are supported behind one trait:
//!
//! - [`RawBridge`]: strings staged with `malloc`, an `f64` output buffer
//!   written by the module, errors fetched from the last-error slot.
//! - [`TypedBridge`]: wasm-bindgen style exports that return the values
//!   or an error string through a return area.
//!
//! Bridges take `&mut self` for each call, so one bridge never has two
//! transforms in flight over the same scratch buffers.

mod raw;
mod scratch;
mod typed;

pub use raw::{RawBridge, UNKNOWN_ERROR};
pub use scratch::{OwnerToken, ScratchAllocation, ScratchScope, TokenSource};
pub use typed::TypedBridge;

use crate::error::{BridgeError, Result};
use crate::wasm::{BridgeStrategy, ExportSet, LoadedModule, StrategyExports};

/// Size in bytes of one encoded coordinate (`f64`, little-endian).
pub const COORD_SIZE: u32 = 8;

/// Host-side driver for a module's transform exports.
pub trait MarshalingBridge {
    /// Which export generation this bridge drives.
    fn strategy(&self) -> BridgeStrategy;

    /// Transform `(x, y)` from `from` to `to`.
    fn transform2(&mut self, module: &mut LoadedModule, from: &str, to: &str, x: f64, y: f64) -> Result<[f64; 2]>;

    /// Transform `(x, y, z)` when the module offers the 3-D entry point.
    fn transform3(
        &mut self,
        module: &mut LoadedModule,
        from: &str,
        to: &str,
        xyz: [f64; 3],
    ) -> Result<[f64; 3]>;
}

/// Build the bridge matching a resolved export set.
pub fn bridge_for(exports: &ExportSet) -> Box<dyn MarshalingBridge> {
    match &exports.functions {
        StrategyExports::Raw(raw) => Box::new(RawBridge::new(raw.clone())),
        StrategyExports::Typed(typed) => Box::new(TypedBridge::new(typed.clone())),
    }
}

/// Decode `N` little-endian `f64` values, rejecting non-finite results.
pub fn decode_coords<const N: usize>(bytes: &[u8]) -> Result<[f64; N]> {
    if bytes.len() != N * COORD_SIZE as usize {
        return Err(BridgeError::Transform(format!(
            "expected {} coordinates, module returned {} bytes",
            N,
            bytes.len()
        )));
    }
    let mut out = [0.0f64; N];
    for (slot, chunk) in out.iter_mut().zip(bytes.chunks_exact(COORD_SIZE as usize)) {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(chunk);
        *slot = f64::from_le_bytes(raw);
    }
    if out.iter().any(|v| !v.is_finite()) {
        return Err(BridgeError::NonFiniteResult(out.to_vec()));
    }
    Ok(out)
}

/// Convert a module-returned `i32` pointer or length to an offset.
pub(crate) fn offset(value: i32) -> u32 {
    value as u32
}
