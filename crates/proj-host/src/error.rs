//! Error types for the host bridge.

use thiserror::Error;

use crate::wasm::Capability;

/// Host bridge error type
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Engine creation, compilation or instantiation failed
    #[error("WASM runtime error: {0}")]
    Runtime(String),

    /// Module is missing exports the selected bridge strategy needs
    #[error("missing module capabilities: {}", Capability::list(.0))]
    MissingCapabilities(Vec<Capability>),

    /// The memory reference was published more than once
    #[error("module memory already published")]
    MemoryAlreadyPublished,

    /// Linear memory access outside the current buffer
    #[error("memory access out of bounds: offset={offset}, len={len}")]
    OutOfBounds {
        /// Start offset of the access
        offset: u32,
        /// Length of the access in bytes
        len: u32,
    },

    /// Module allocator failed or returned an unusable pointer
    #[error("scratch allocation of {0} bytes failed")]
    Allocation(u32),

    /// The module reported a transform failure
    #[error("{0}")]
    Transform(String),

    /// The module returned success but a non-finite coordinate
    #[error("module returned non-finite coordinate {0:?}")]
    NonFiniteResult(Vec<f64>),

    /// The module called `proc_exit`
    #[error("WASI proc_exit({0})")]
    ProcExit(i32),

    /// The module trapped during a call
    #[error("module trapped: {0}")]
    Trap(String),

    /// Bytes crossing the boundary were not valid UTF-8
    #[error("invalid UTF-8 from module: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Operation not offered by the loaded module
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Convert an error raised by a wasmtime call into a bridge error.
    ///
    /// `proc_exit` surfaces as a trap carrying [`ProcExit`]; it is
    /// recovered here so callers can tell it apart from other traps.
    pub fn from_call(err: wasmtime::Error) -> Self {
        if let Some(exit) = err.downcast_ref::<ProcExit>() {
            return BridgeError::ProcExit(exit.0);
        }
        BridgeError::Trap(format!("{:#}", err))
    }
}

/// Host-level failure raised by the `proc_exit` shim.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("WASI proc_exit({0})")]
pub struct ProcExit(pub i32);

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
