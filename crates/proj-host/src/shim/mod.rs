//! Import shims that stand in for the operating system.
//!
//! The module's C runtime imports two namespaces:
//!
//! - `wasi_snapshot_preview1`: process exit, environment, clock and
//!   descriptor I/O ([`wasi`])
//! - `env`: Emscripten-style filesystem syscalls probed at startup
//!   ([`syscall`])
//!
//! Both are served by one [`HostShims`] implementation chosen when the
//! host is constructed: [`PlainShims`] or the counting
//! [`InstrumentedShims`] wrapper.
//!
//! ## Memory Convention
//!
//! All pointers are `u32` offsets into linear memory and all multi-byte
//! values are little-endian. An iovec is 8 bytes:
//! ```text
//! [buf_ptr: u32, buf_len: u32]
//! ```

mod instrumented;
mod memory;
pub mod syscall;
mod utf8;
mod wasi;

pub use instrumented::InstrumentedShims;
pub use memory::MemoryView;
pub use syscall::Syscall;
pub use utf8::StreamDecoder;
pub use wasi::PlainShims;

use crate::diagnostics::LedgerSnapshot;
use crate::error::ProcExit;

/// Status codes returned across the shim boundary.
pub mod errno {
    /// WASI success.
    pub const SUCCESS: i32 = 0;
    /// WASI `EFAULT`: pointer outside linear memory.
    pub const EFAULT: i32 = 21;
    /// WASI `ENOSYS`: function not supported.
    pub const ENOSYS: i32 = 52;
    /// Negative Linux `ENOSYS` expected by the musl/Emscripten syscall layer.
    pub const SYSCALL_ENOSYS: i32 = -38;
}

/// Size of the `fdstat` record zero-filled by `fd_fdstat_get`.
pub const FDSTAT_SIZE: u32 = 24;

/// Host implementation of every imported shim function.
///
/// Functions that touch memory receive a [`MemoryView`] that is absent
/// until the loader publishes the module's memory; they must answer
/// [`errno::ENOSYS`] in that case.
pub trait HostShims: Send {
    /// `proc_exit(code)`: there is no process to end, so the call is
    /// turned into a host-level failure.
    fn proc_exit(&mut self, code: i32) -> ProcExit;

    /// `environ_sizes_get(count_ptr, buf_size_ptr) -> errno`
    fn environ_sizes_get(&mut self, mem: &mut MemoryView<'_>, count_ptr: u32, buf_size_ptr: u32) -> i32;

    /// `environ_get(environ_ptr, environ_buf_ptr) -> errno`
    fn environ_get(&mut self, environ_ptr: u32, environ_buf_ptr: u32) -> i32;

    /// `fd_close(fd) -> errno`
    fn fd_close(&mut self, fd: i32) -> i32;

    /// `clock_time_get(id, precision, time_ptr) -> errno`
    fn clock_time_get(&mut self, mem: &mut MemoryView<'_>, clock_id: i32, precision: u64, time_ptr: u32) -> i32;

    /// `fd_sync(fd) -> errno`
    fn fd_sync(&mut self, fd: i32) -> i32;

    /// `fd_seek(fd, offset, whence, new_offset_ptr) -> errno`
    fn fd_seek(&mut self, mem: &mut MemoryView<'_>, fd: i32, offset: i64, whence: i32, new_offset_ptr: u32) -> i32;

    /// `fd_read(fd, iovs, iovs_len, nread_ptr) -> errno`
    fn fd_read(&mut self, mem: &mut MemoryView<'_>, fd: i32, iovs: u32, iovs_len: u32, nread_ptr: u32) -> i32;

    /// `fd_write(fd, iovs, iovs_len, nwritten_ptr) -> errno`
    fn fd_write(&mut self, mem: &mut MemoryView<'_>, fd: i32, iovs: u32, iovs_len: u32, nwritten_ptr: u32) -> i32;

    /// `fd_fdstat_get(fd, stat_ptr) -> errno`
    fn fd_fdstat_get(&mut self, mem: &mut MemoryView<'_>, fd: i32, stat_ptr: u32) -> i32;

    /// Any entry of the `env` syscall table.
    fn syscall(&mut self, call: Syscall) -> i32;

    /// Note a marshaling failure observed by the bridge.
    fn record_bridge_error(&mut self, _message: &str) {}

    /// Copy of the call ledger, if this variant keeps one.
    fn ledger(&self) -> Option<LedgerSnapshot> {
        None
    }
}

/// Shim variant selected at host construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShimVariant {
    /// Deterministic emulation only
    Plain,
    /// Emulation plus call ledger, keeping at most `write_tail_chars`
    /// characters of written text
    Instrumented {
        /// Bound on the retained write payload
        write_tail_chars: usize,
    },
}

impl ShimVariant {
    /// Build the boxed shim implementation for this variant.
    pub fn build(self) -> Box<dyn HostShims> {
        match self {
            ShimVariant::Plain => Box::new(PlainShims::new()),
            ShimVariant::Instrumented { write_tail_chars } => {
                Box::new(InstrumentedShims::new(PlainShims::new(), write_tail_chars))
            }
        }
    }
}
