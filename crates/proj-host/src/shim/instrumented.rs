//! Counting wrapper around the plain shims.

use super::{HostShims, MemoryView, PlainShims, Syscall};
use crate::diagnostics::{CallLedger, LedgerSnapshot};
use crate::error::ProcExit;

/// Shim variant that records every call in a [`CallLedger`].
///
/// The counter is bumped before delegating; return values and memory
/// effects are exactly those of [`PlainShims`].
#[derive(Debug)]
pub struct InstrumentedShims {
    inner: PlainShims,
    ledger: CallLedger,
}

impl InstrumentedShims {
    /// Wrap `inner`, retaining at most `write_tail_chars` of written text.
    pub fn new(inner: PlainShims, write_tail_chars: usize) -> Self {
        Self {
            inner,
            ledger: CallLedger::new(write_tail_chars),
        }
    }

    /// Live ledger (read-only).
    pub fn ledger_ref(&self) -> &CallLedger {
        &self.ledger
    }
}

impl HostShims for InstrumentedShims {
    fn proc_exit(&mut self, code: i32) -> ProcExit {
        self.ledger.record_call("proc_exit");
        self.inner.proc_exit(code)
    }

    fn environ_sizes_get(&mut self, mem: &mut MemoryView<'_>, count_ptr: u32, buf_size_ptr: u32) -> i32 {
        self.ledger.record_call("environ_sizes_get");
        self.inner.environ_sizes_get(mem, count_ptr, buf_size_ptr)
    }

    fn environ_get(&mut self, environ_ptr: u32, environ_buf_ptr: u32) -> i32 {
        self.ledger.record_call("environ_get");
        self.inner.environ_get(environ_ptr, environ_buf_ptr)
    }

    fn fd_close(&mut self, fd: i32) -> i32 {
        self.ledger.record_call("fd_close");
        self.inner.fd_close(fd)
    }

    fn clock_time_get(&mut self, mem: &mut MemoryView<'_>, clock_id: i32, precision: u64, time_ptr: u32) -> i32 {
        self.ledger.record_call("clock_time_get");
        self.inner.clock_time_get(mem, clock_id, precision, time_ptr)
    }

    fn fd_sync(&mut self, fd: i32) -> i32 {
        self.ledger.record_call("fd_sync");
        self.inner.fd_sync(fd)
    }

    fn fd_seek(&mut self, mem: &mut MemoryView<'_>, fd: i32, offset: i64, whence: i32, new_offset_ptr: u32) -> i32 {
        self.ledger.record_call("fd_seek");
        self.inner.fd_seek(mem, fd, offset, whence, new_offset_ptr)
    }

    fn fd_read(&mut self, mem: &mut MemoryView<'_>, fd: i32, iovs: u32, iovs_len: u32, nread_ptr: u32) -> i32 {
        self.ledger.record_call("fd_read");
        self.inner.fd_read(mem, fd, iovs, iovs_len, nread_ptr)
    }

    fn fd_write(&mut self, mem: &mut MemoryView<'_>, fd: i32, iovs: u32, iovs_len: u32, nwritten_ptr: u32) -> i32 {
        self.ledger.record_call("fd_write");
        let (rc, text) = self.inner.fd_write_decoded(mem, fd, iovs, iovs_len, nwritten_ptr);
        self.ledger.record_write(&text);
        rc
    }

    fn fd_fdstat_get(&mut self, mem: &mut MemoryView<'_>, fd: i32, stat_ptr: u32) -> i32 {
        self.ledger.record_call("fd_fdstat_get");
        self.inner.fd_fdstat_get(mem, fd, stat_ptr)
    }

    fn syscall(&mut self, call: Syscall) -> i32 {
        self.ledger.record_call(call.name());
        self.inner.syscall(call)
    }

    fn record_bridge_error(&mut self, message: &str) {
        self.ledger.record_bridge_error(message);
    }

    fn ledger(&self) -> Option<LedgerSnapshot> {
        Some(self.ledger.snapshot())
    }
}
