//! Capability descriptor resolved once from the module's exports.
//!
//! Every export the bridge needs is looked up by its one canonical name
//! and checked against its expected signature. A missing or misshapen
//! export is reported as a [`Capability`]; all of them are collected
//! before failing.

use std::fmt;

use wasmtime::{AsContextMut, Instance, Memory, TypedFunc};

use super::config::BridgeStrategy;
use crate::error::{BridgeError, Result};

/// Something the bridge needs from the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Exported linear memory `memory`
    Memory,
    /// Scratch allocator
    Allocator,
    /// Release half of the allocator contract
    Release,
    /// 2-D transform entry point
    Transform,
    /// Last-error pointer getter
    LastErrorPtr,
    /// Last-error length getter
    LastErrorLen,
}

impl Capability {
    /// Export name that provides this capability under `strategy`.
    pub fn export_name(self, strategy: BridgeStrategy) -> &'static str {
        match (self, strategy) {
            (Capability::Memory, _) => "memory",
            (Capability::Allocator, BridgeStrategy::Raw) => "malloc",
            (Capability::Allocator, BridgeStrategy::Typed) => "__wbindgen_malloc",
            (Capability::Release, BridgeStrategy::Raw) => "free",
            (Capability::Release, BridgeStrategy::Typed) => "__wbindgen_free",
            (Capability::Transform, BridgeStrategy::Raw) => "transform2_known_crs_raw",
            (Capability::Transform, BridgeStrategy::Typed) => "transform2_known_crs",
            (Capability::LastErrorPtr, _) => "last_error_message_ptr",
            (Capability::LastErrorLen, _) => "last_error_message_len",
        }
    }

    /// Comma-separated list for error messages.
    pub fn list(caps: &[Capability]) -> String {
        caps.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Memory => "memory",
            Capability::Allocator => "allocator",
            Capability::Release => "release",
            Capability::Transform => "transform",
            Capability::LastErrorPtr => "last-error pointer",
            Capability::LastErrorLen => "last-error length",
        };
        f.write_str(name)
    }
}

/// Raw transform: `(from_ptr, from_len, to_ptr, to_len, x, y, out_ptr) -> status`
pub type RawTransform2 = TypedFunc<(i32, i32, i32, i32, f64, f64, i32), i32>;
/// Raw 3-D transform: `(from_ptr, from_len, to_ptr, to_len, x, y, z, out_ptr) -> status`
pub type RawTransform3 = TypedFunc<(i32, i32, i32, i32, f64, f64, f64, i32), i32>;
/// Typed transform: `(retptr, from_ptr, from_len, to_ptr, to_len, x, y)`
pub type TypedTransform2 = TypedFunc<(i32, i32, i32, i32, i32, f64, f64), ()>;
/// Typed 3-D transform: `(retptr, from_ptr, from_len, to_ptr, to_len, x, y, z)`
pub type TypedTransform3 = TypedFunc<(i32, i32, i32, i32, i32, f64, f64, f64), ()>;

/// Exports driven by the raw pointer-passing bridge.
#[derive(Clone)]
pub struct RawExports {
    /// `malloc(len) -> ptr`
    pub malloc: TypedFunc<i32, i32>,
    /// `free(ptr)`, absent for arena-style allocators
    pub free: Option<TypedFunc<i32, ()>>,
    /// `transform2_known_crs_raw`
    pub transform2: RawTransform2,
    /// `transform3_known_crs_raw`, optional
    pub transform3: Option<RawTransform3>,
    /// `last_error_message_ptr() -> ptr`
    pub last_error_ptr: TypedFunc<(), i32>,
    /// `last_error_message_len() -> len`
    pub last_error_len: TypedFunc<(), i32>,
}

/// Exports driven by the typed bridge.
#[derive(Clone)]
pub struct TypedExports {
    /// `__wbindgen_malloc(len, align) -> ptr`
    pub malloc: TypedFunc<(i32, i32), i32>,
    /// `__wbindgen_free(ptr, len, align)`
    pub free: TypedFunc<(i32, i32, i32), ()>,
    /// `transform2_known_crs`
    pub transform2: TypedTransform2,
    /// `transform3_known_crs`, optional
    pub transform3: Option<TypedTransform3>,
}

/// Export table for one bridge strategy.
#[derive(Clone)]
pub enum StrategyExports {
    /// Raw pointer passing
    Raw(RawExports),
    /// Typed exports
    Typed(TypedExports),
}

/// Fully resolved capability descriptor.
#[derive(Clone)]
pub struct ExportSet {
    /// Module linear memory
    pub memory: Memory,
    /// Strategy-specific functions
    pub functions: StrategyExports,
}

/// Collects lookups and remembers what was missing.
struct Resolver<'a, S> {
    instance: &'a Instance,
    store: S,
    strategy: BridgeStrategy,
    missing: Vec<Capability>,
}

impl<'a, S: AsContextMut> Resolver<'a, S> {
    fn func<P, R>(&mut self, cap: Capability) -> Option<TypedFunc<P, R>>
    where
        P: wasmtime::WasmParams,
        R: wasmtime::WasmResults,
    {
        let name = cap.export_name(self.strategy);
        match self.instance.get_typed_func::<P, R>(&mut self.store, name) {
            Ok(f) => Some(f),
            Err(e) => {
                tracing::debug!("export '{}' unusable: {}", name, e);
                self.missing.push(cap);
                None
            }
        }
    }

    fn optional<P, R>(&mut self, name: &str) -> Option<TypedFunc<P, R>>
    where
        P: wasmtime::WasmParams,
        R: wasmtime::WasmResults,
    {
        // Absent is fine; present with the wrong signature is logged.
        self.instance.get_export(&mut self.store, name)?;
        match self.instance.get_typed_func::<P, R>(&mut self.store, name) {
            Ok(f) => Some(f),
            Err(e) => {
                tracing::warn!("ignoring optional export '{}': {}", name, e);
                None
            }
        }
    }

    fn memory(&mut self) -> Option<Memory> {
        let found = self.instance.get_memory(&mut self.store, "memory");
        if found.is_none() {
            self.missing.push(Capability::Memory);
        }
        found
    }
}

impl ExportSet {
    /// Resolve the descriptor for `strategy`, failing with every missing
    /// capability at once.
    pub fn resolve(
        instance: &Instance,
        store: impl AsContextMut,
        strategy: BridgeStrategy,
    ) -> Result<Self> {
        let mut r = Resolver {
            instance,
            store,
            strategy,
            missing: Vec::new(),
        };

        let memory = r.memory();
        let functions = match strategy {
            BridgeStrategy::Raw => {
                let malloc = r.func(Capability::Allocator);
                let transform2 = r.func(Capability::Transform);
                let last_error_ptr = r.func(Capability::LastErrorPtr);
                let last_error_len = r.func(Capability::LastErrorLen);
                let free = r.optional("free");
                let transform3 = r.optional("transform3_known_crs_raw");
                match (malloc, transform2, last_error_ptr, last_error_len) {
                    (Some(malloc), Some(transform2), Some(last_error_ptr), Some(last_error_len)) => {
                        Some(StrategyExports::Raw(RawExports {
                            malloc,
                            free,
                            transform2,
                            transform3,
                            last_error_ptr,
                            last_error_len,
                        }))
                    }
                    _ => None,
                }
            }
            BridgeStrategy::Typed => {
                let malloc = r.func(Capability::Allocator);
                let free = r.func(Capability::Release);
                let transform2 = r.func(Capability::Transform);
                let transform3 = r.optional("transform3_known_crs");
                match (malloc, free, transform2) {
                    (Some(malloc), Some(free), Some(transform2)) => {
                        Some(StrategyExports::Typed(TypedExports {
                            malloc,
                            free,
                            transform2,
                            transform3,
                        }))
                    }
                    _ => None,
                }
            }
        };

        match (memory, functions) {
            (Some(memory), Some(functions)) if r.missing.is_empty() => {
                Ok(ExportSet { memory, functions })
            }
            _ => Err(BridgeError::MissingCapabilities(r.missing)),
        }
    }

    /// Whether the optional 3-D transform is available.
    pub fn has_transform3(&self) -> bool {
        match &self.functions {
            StrategyExports::Raw(raw) => raw.transform3.is_some(),
            StrategyExports::Typed(typed) => typed.transform3.is_some(),
        }
    }
}
