//! Linker registration of the shim import namespaces.
//!
//! ## Import Modules
//!
//! ```wat
//! (import "wasi_snapshot_preview1" "fd_write" (func (param i32 i32 i32 i32) (result i32)))
//! (import "env" "__syscall_getcwd" (func (param i32 i32) (result i32)))
//! ```
//!
//! Each registered closure only converts argument types and forwards to
//! the store's [`HostShims`]; all behavior lives in [`crate::shim`].

use wasmtime::{Caller, Linker};

use super::runtime::HostState;
use crate::error::{BridgeError, Result};
use crate::shim::{HostShims, MemoryView, Syscall};

/// WASI preview1 namespace.
pub const WASI_MODULE: &str = "wasi_snapshot_preview1";

/// Emscripten syscall namespace.
pub const ENV_MODULE: &str = "env";

/// Registers every shim function with a linker.
pub struct ShimFunctions;

impl ShimFunctions {
    /// Register both import namespaces with the wasmtime linker.
    pub fn register(linker: &mut Linker<HostState>) -> Result<()> {
        Self::register_wasi(linker)?;
        Self::register_syscalls(linker)?;
        Ok(())
    }

    // ========================================================================
    // wasi_snapshot_preview1
    // ========================================================================

    fn register_wasi(linker: &mut Linker<HostState>) -> Result<()> {
        linker
            .func_wrap(
                WASI_MODULE,
                "proc_exit",
                |mut caller: Caller<'_, HostState>, code: i32| -> wasmtime::Result<()> {
                    let exit = caller.data_mut().shims_mut().proc_exit(code);
                    Err(wasmtime::Error::new(exit))
                },
            )
            .map_err(|e| link_error("proc_exit", e))?;

        linker
            .func_wrap(
                WASI_MODULE,
                "environ_sizes_get",
                |mut caller: Caller<'_, HostState>, count_ptr: i32, buf_size_ptr: i32| -> i32 {
                    with_shims(&mut caller, |shims, mem| {
                        shims.environ_sizes_get(mem, count_ptr as u32, buf_size_ptr as u32)
                    })
                },
            )
            .map_err(|e| link_error("environ_sizes_get", e))?;

        linker
            .func_wrap(
                WASI_MODULE,
                "environ_get",
                |mut caller: Caller<'_, HostState>, environ_ptr: i32, environ_buf_ptr: i32| -> i32 {
                    caller
                        .data_mut()
                        .shims_mut()
                        .environ_get(environ_ptr as u32, environ_buf_ptr as u32)
                },
            )
            .map_err(|e| link_error("environ_get", e))?;

        linker
            .func_wrap(
                WASI_MODULE,
                "fd_close",
                |mut caller: Caller<'_, HostState>, fd: i32| -> i32 {
                    caller.data_mut().shims_mut().fd_close(fd)
                },
            )
            .map_err(|e| link_error("fd_close", e))?;

        linker
            .func_wrap(
                WASI_MODULE,
                "clock_time_get",
                |mut caller: Caller<'_, HostState>, clock_id: i32, precision: i64, time_ptr: i32| -> i32 {
                    with_shims(&mut caller, |shims, mem| {
                        shims.clock_time_get(mem, clock_id, precision as u64, time_ptr as u32)
                    })
                },
            )
            .map_err(|e| link_error("clock_time_get", e))?;

        linker
            .func_wrap(
                WASI_MODULE,
                "fd_sync",
                |mut caller: Caller<'_, HostState>, fd: i32| -> i32 {
                    caller.data_mut().shims_mut().fd_sync(fd)
                },
            )
            .map_err(|e| link_error("fd_sync", e))?;

        linker
            .func_wrap(
                WASI_MODULE,
                "fd_seek",
                |mut caller: Caller<'_, HostState>,
                 fd: i32,
                 offset: i64,
                 whence: i32,
                 new_offset_ptr: i32|
                 -> i32 {
                    with_shims(&mut caller, |shims, mem| {
                        shims.fd_seek(mem, fd, offset, whence, new_offset_ptr as u32)
                    })
                },
            )
            .map_err(|e| link_error("fd_seek", e))?;

        linker
            .func_wrap(
                WASI_MODULE,
                "fd_read",
                |mut caller: Caller<'_, HostState>, fd: i32, iovs: i32, iovs_len: i32, nread_ptr: i32| -> i32 {
                    with_shims(&mut caller, |shims, mem| {
                        shims.fd_read(mem, fd, iovs as u32, iovs_len as u32, nread_ptr as u32)
                    })
                },
            )
            .map_err(|e| link_error("fd_read", e))?;

        linker
            .func_wrap(
                WASI_MODULE,
                "fd_write",
                |mut caller: Caller<'_, HostState>, fd: i32, iovs: i32, iovs_len: i32, nwritten_ptr: i32| -> i32 {
                    with_shims(&mut caller, |shims, mem| {
                        shims.fd_write(mem, fd, iovs as u32, iovs_len as u32, nwritten_ptr as u32)
                    })
                },
            )
            .map_err(|e| link_error("fd_write", e))?;

        linker
            .func_wrap(
                WASI_MODULE,
                "fd_fdstat_get",
                |mut caller: Caller<'_, HostState>, fd: i32, stat_ptr: i32| -> i32 {
                    with_shims(&mut caller, |shims, mem| shims.fd_fdstat_get(mem, fd, stat_ptr as u32))
                },
            )
            .map_err(|e| link_error("fd_fdstat_get", e))?;

        Ok(())
    }

    // ========================================================================
    // env syscall table
    // ========================================================================

    fn register_syscalls(linker: &mut Linker<HostState>) -> Result<()> {
        for call in Syscall::ALL {
            let name = call.name();
            let registered = match (call, call.i32_params()) {
                (Syscall::Ftruncate64, _) => linker.func_wrap(
                    ENV_MODULE,
                    name,
                    move |mut caller: Caller<'_, HostState>, _fd: i32, _length: i64| -> i32 {
                        caller.data_mut().shims_mut().syscall(call)
                    },
                ),
                (_, 1) => linker.func_wrap(
                    ENV_MODULE,
                    name,
                    move |mut caller: Caller<'_, HostState>, _a: i32| -> i32 {
                        caller.data_mut().shims_mut().syscall(call)
                    },
                ),
                (_, 2) => linker.func_wrap(
                    ENV_MODULE,
                    name,
                    move |mut caller: Caller<'_, HostState>, _a: i32, _b: i32| -> i32 {
                        caller.data_mut().shims_mut().syscall(call)
                    },
                ),
                (_, 3) => linker.func_wrap(
                    ENV_MODULE,
                    name,
                    move |mut caller: Caller<'_, HostState>, _a: i32, _b: i32, _c: i32| -> i32 {
                        caller.data_mut().shims_mut().syscall(call)
                    },
                ),
                _ => linker.func_wrap(
                    ENV_MODULE,
                    name,
                    move |mut caller: Caller<'_, HostState>, _a: i32, _b: i32, _c: i32, _d: i32| -> i32 {
                        caller.data_mut().shims_mut().syscall(call)
                    },
                ),
            };
            registered.map_err(|e| link_error(name, e))?;
        }
        Ok(())
    }
}

// ============================================================================
// Memory Access Helpers
// ============================================================================

/// Run `f` with the store's shims and a view of the published memory.
///
/// Before the loader publishes the memory reference the view is absent,
/// which the shims answer with `ENOSYS`.
fn with_shims<R>(
    caller: &mut Caller<'_, HostState>,
    f: impl FnOnce(&mut dyn HostShims, &mut MemoryView<'_>) -> R,
) -> R {
    match caller.data().memory() {
        Some(memory) => {
            let (data, state) = memory.data_and_store_mut(caller);
            let mut view = MemoryView::new(data);
            f(state.shims_mut(), &mut view)
        }
        None => {
            let mut view = MemoryView::absent();
            f(caller.data_mut().shims_mut(), &mut view)
        }
    }
}

fn link_error(name: &str, e: wasmtime::Error) -> BridgeError {
    BridgeError::Runtime(format!("failed to register {}: {}", name, e))
}
