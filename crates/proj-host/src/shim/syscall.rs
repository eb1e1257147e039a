//! `env` syscall table.
//!
//! The module's libc references these filesystem syscalls and probes some
//! of them at startup. They only have to resolve at link time; every entry
//! answers `-ENOSYS` without looking at its arguments.

/// Syscalls imported from the `env` namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Syscall {
    /// `__syscall_faccessat(dirfd, path, mode, flags)`
    Faccessat,
    /// `__syscall_chmod(path, mode)`
    Chmod,
    /// `__syscall_fchmod(fd, mode)`
    Fchmod,
    /// `__syscall_fchown32(fd, owner, group)`
    Fchown32,
    /// `__syscall_ftruncate64(fd, length: i64)`
    Ftruncate64,
    /// `__syscall_getcwd(buf, size)`
    Getcwd,
    /// `__syscall_readlinkat(dirfd, path, buf, bufsiz)`
    Readlinkat,
    /// `__syscall_rmdir(path)`
    Rmdir,
    /// `__syscall_unlinkat(dirfd, path, flags)`
    Unlinkat,
    /// `__syscall_utimensat(dirfd, path, times, flags)`
    Utimensat,
}

impl Syscall {
    /// Every table entry, in registration order.
    pub const ALL: [Syscall; 10] = [
        Syscall::Faccessat,
        Syscall::Chmod,
        Syscall::Fchmod,
        Syscall::Fchown32,
        Syscall::Ftruncate64,
        Syscall::Getcwd,
        Syscall::Readlinkat,
        Syscall::Rmdir,
        Syscall::Unlinkat,
        Syscall::Utimensat,
    ];

    /// Import name inside the `env` namespace.
    pub fn name(self) -> &'static str {
        match self {
            Syscall::Faccessat => "__syscall_faccessat",
            Syscall::Chmod => "__syscall_chmod",
            Syscall::Fchmod => "__syscall_fchmod",
            Syscall::Fchown32 => "__syscall_fchown32",
            Syscall::Ftruncate64 => "__syscall_ftruncate64",
            Syscall::Getcwd => "__syscall_getcwd",
            Syscall::Readlinkat => "__syscall_readlinkat",
            Syscall::Rmdir => "__syscall_rmdir",
            Syscall::Unlinkat => "__syscall_unlinkat",
            Syscall::Utimensat => "__syscall_utimensat",
        }
    }

    /// Number of `i32` parameters (`ftruncate64` also takes an `i64`).
    pub fn i32_params(self) -> usize {
        match self {
            Syscall::Rmdir => 1,
            Syscall::Chmod | Syscall::Fchmod | Syscall::Getcwd | Syscall::Ftruncate64 => 2,
            Syscall::Fchown32 | Syscall::Unlinkat => 3,
            Syscall::Faccessat | Syscall::Readlinkat | Syscall::Utimensat => 4,
        }
    }
}
