//! Plain `wasi_snapshot_preview1` emulation.
//!
//! Nothing here touches a real OS: there are no environment variables,
//! every readable descriptor is empty, and writes are decoded and handed
//! to `tracing`.

use std::time::{SystemTime, UNIX_EPOCH};

use super::errno::{ENOSYS, SUCCESS};
use super::{HostShims, MemoryView, StreamDecoder, Syscall, FDSTAT_SIZE};
use crate::error::ProcExit;

/// Deterministic shim implementation with no bookkeeping.
#[derive(Debug, Default)]
pub struct PlainShims {
    decoder: StreamDecoder,
}

impl PlainShims {
    /// Create the plain shim set.
    pub fn new() -> Self {
        Self::default()
    }

    /// `fd_write` returning the status together with the text decoded by
    /// this call.
    pub(crate) fn fd_write_decoded(
        &mut self,
        mem: &mut MemoryView<'_>,
        fd: i32,
        iovs: u32,
        iovs_len: u32,
        nwritten_ptr: u32,
    ) -> (i32, String) {
        if !mem.is_present() {
            return (ENOSYS, String::new());
        }

        let mut total: u32 = 0;
        let mut text = String::new();
        for i in 0..iovs_len {
            let base = match i.checked_mul(8).and_then(|off| iovs.checked_add(off)) {
                Some(base) => base,
                None => return (super::errno::EFAULT, text),
            };
            let (ptr, len) = match (mem.read_u32(base), mem.read_u32(base.wrapping_add(4))) {
                (Ok(ptr), Ok(len)) => (ptr, len),
                (Err(e), _) | (_, Err(e)) => return (e, text),
            };
            total = total.wrapping_add(len);
            if len > 0 {
                match mem.slice(ptr, len) {
                    Ok(bytes) => text.push_str(&self.decoder.push(bytes)),
                    Err(e) => return (e, text),
                }
            }
        }

        if !text.is_empty() {
            tracing::debug!(target: "proj_host::module", fd, "{}", text);
        }

        match mem.write_u32(nwritten_ptr, total) {
            Ok(()) => (SUCCESS, text),
            Err(e) => (e, text),
        }
    }
}

fn status(result: Result<(), i32>) -> i32 {
    match result {
        Ok(()) => SUCCESS,
        Err(e) => e,
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

impl HostShims for PlainShims {
    fn proc_exit(&mut self, code: i32) -> ProcExit {
        tracing::debug!("module requested proc_exit({})", code);
        ProcExit(code)
    }

    fn environ_sizes_get(&mut self, mem: &mut MemoryView<'_>, count_ptr: u32, buf_size_ptr: u32) -> i32 {
        status(
            mem.write_u32(count_ptr, 0)
                .and_then(|_| mem.write_u32(buf_size_ptr, 0)),
        )
    }

    fn environ_get(&mut self, _environ_ptr: u32, _environ_buf_ptr: u32) -> i32 {
        SUCCESS
    }

    fn fd_close(&mut self, _fd: i32) -> i32 {
        SUCCESS
    }

    fn clock_time_get(&mut self, mem: &mut MemoryView<'_>, _clock_id: i32, _precision: u64, time_ptr: u32) -> i32 {
        status(mem.write_u64(time_ptr, now_ns()))
    }

    fn fd_sync(&mut self, _fd: i32) -> i32 {
        ENOSYS
    }

    fn fd_seek(&mut self, mem: &mut MemoryView<'_>, _fd: i32, _offset: i64, _whence: i32, new_offset_ptr: u32) -> i32 {
        status(mem.write_u64(new_offset_ptr, 0))
    }

    fn fd_read(&mut self, mem: &mut MemoryView<'_>, _fd: i32, _iovs: u32, _iovs_len: u32, nread_ptr: u32) -> i32 {
        status(mem.write_u32(nread_ptr, 0))
    }

    fn fd_write(&mut self, mem: &mut MemoryView<'_>, fd: i32, iovs: u32, iovs_len: u32, nwritten_ptr: u32) -> i32 {
        self.fd_write_decoded(mem, fd, iovs, iovs_len, nwritten_ptr).0
    }

    fn fd_fdstat_get(&mut self, mem: &mut MemoryView<'_>, _fd: i32, stat_ptr: u32) -> i32 {
        status(mem.zero(stat_ptr, FDSTAT_SIZE))
    }

    fn syscall(&mut self, call: Syscall) -> i32 {
        tracing::trace!("unsupported syscall {}", call.name());
        super::errno::SYSCALL_ENOSYS
    }
}

#[cfg(test)]
mod tests {
    use super::super::errno::EFAULT;
    use super::*;

    /// Lay out iovecs at offset 0 pointing at payloads from offset 64.
    fn write_iovs(buf: &mut [u8], payloads: &[&[u8]]) -> u32 {
        let mut data_off = 64usize;
        for (i, p) in payloads.iter().enumerate() {
            let base = i * 8;
            buf[base..base + 4].copy_from_slice(&(data_off as u32).to_le_bytes());
            buf[base + 4..base + 8].copy_from_slice(&(p.len() as u32).to_le_bytes());
            buf[data_off..data_off + p.len()].copy_from_slice(p);
            data_off += p.len();
        }
        payloads.len() as u32
    }

    #[test]
    fn test_absent_memory_fails_closed() {
        let mut shims = PlainShims::new();
        let mut mem = MemoryView::absent();
        assert_eq!(shims.environ_sizes_get(&mut mem, 0, 4), ENOSYS);
        assert_eq!(shims.clock_time_get(&mut mem, 0, 0, 0), ENOSYS);
        assert_eq!(shims.fd_seek(&mut mem, 1, 0, 0, 0), ENOSYS);
        assert_eq!(shims.fd_read(&mut mem, 0, 0, 0, 0), ENOSYS);
        assert_eq!(shims.fd_write(&mut mem, 1, 0, 0, 0), ENOSYS);
        assert_eq!(shims.fd_fdstat_get(&mut mem, 1, 0), ENOSYS);
    }

    #[test]
    fn test_environment_is_empty() {
        let mut buf = [0xAAu8; 16];
        let mut shims = PlainShims::new();
        let mut mem = MemoryView::new(&mut buf);
        assert_eq!(shims.environ_sizes_get(&mut mem, 0, 4), SUCCESS);
        assert_eq!(mem.read_u32(0), Ok(0));
        assert_eq!(mem.read_u32(4), Ok(0));
        assert_eq!(shims.environ_get(0, 0), SUCCESS);
    }

    #[test]
    fn test_clock_returns_wall_time_ns() {
        let mut buf = [0u8; 8];
        let before = now_ns();
        {
            let mut shims = PlainShims::new();
            let mut mem = MemoryView::new(&mut buf);
            assert_eq!(shims.clock_time_get(&mut mem, 0, 1000, 0), SUCCESS);
        }
        let written = u64::from_le_bytes(buf);
        assert!(written >= before);
        assert!(written - before < 60 * 1_000_000_000);
    }

    #[test]
    fn test_read_and_seek_report_zero() {
        let mut buf = [0xFFu8; 16];
        {
            let mut shims = PlainShims::new();
            let mut mem = MemoryView::new(&mut buf);
            assert_eq!(shims.fd_read(&mut mem, 0, 0, 1, 0), SUCCESS);
            assert_eq!(shims.fd_seek(&mut mem, 3, 100, 0, 8), SUCCESS);
        }
        assert_eq!(&buf[0..4], &[0, 0, 0, 0]);
        assert_eq!(&buf[8..16], &[0u8; 8]);
    }

    #[test]
    fn test_fdstat_zero_fills_24_bytes() {
        let mut buf = [0xFFu8; 32];
        {
            let mut shims = PlainShims::new();
            let mut mem = MemoryView::new(&mut buf);
            assert_eq!(shims.fd_fdstat_get(&mut mem, 1, 4), SUCCESS);
        }
        assert_eq!(&buf[4..28], &[0u8; 24]);
        assert_eq!(buf[28], 0xFF);
    }

    #[test]
    fn test_fd_write_reports_full_length() {
        let mut buf = [0u8; 128];
        let n = write_iovs(&mut buf, &[b"hello", b" world"]);
        let mut shims = PlainShims::new();
        let mut mem = MemoryView::new(&mut buf);
        let (rc, text) = shims.fd_write_decoded(&mut mem, 1, 0, n, 120);
        assert_eq!(rc, SUCCESS);
        assert_eq!(text, "hello world");
        assert_eq!(mem.read_u32(120), Ok(11));
    }

    #[test]
    fn test_fd_write_bad_iovec_is_efault() {
        let mut buf = [0u8; 16];
        buf[0..4].copy_from_slice(&1000u32.to_le_bytes());
        buf[4..8].copy_from_slice(&4u32.to_le_bytes());
        let mut shims = PlainShims::new();
        let mut mem = MemoryView::new(&mut buf);
        assert_eq!(shims.fd_write(&mut mem, 1, 0, 1, 8), EFAULT);
    }

    #[test]
    fn test_fd_sync_unsupported_and_close_ok() {
        let mut shims = PlainShims::new();
        assert_eq!(shims.fd_sync(1), ENOSYS);
        assert_eq!(shims.fd_close(1), SUCCESS);
    }

    #[test]
    fn test_proc_exit_carries_code() {
        let mut shims = PlainShims::new();
        assert_eq!(shims.proc_exit(7), ProcExit(7));
    }
}
