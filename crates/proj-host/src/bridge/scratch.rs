//! Scratch allocations inside module memory and their release contract.
//!
//! Every allocation made for one bridge call is tracked by a
//! [`ScratchScope`] carrying a unique [`OwnerToken`]. The bridge releases
//! the scope on every exit path of the call, so nothing staged for a
//! failed transform outlives it.

/// Identifies the scope that owns an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerToken(u64);

impl OwnerToken {
    /// Raw token value.
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Hands out increasing owner tokens.
#[derive(Debug, Default)]
pub struct TokenSource {
    next: u64,
}

impl TokenSource {
    /// Next unused token.
    pub fn next_token(&mut self) -> OwnerToken {
        self.next += 1;
        OwnerToken(self.next)
    }
}

/// A `(ptr, len)` region in linear memory staged for one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchAllocation {
    /// Offset in linear memory
    pub ptr: u32,
    /// Length in bytes
    pub len: u32,
    /// Alignment requested from the allocator
    pub align: u32,
    owner: OwnerToken,
}

impl ScratchAllocation {
    /// Scope that owns this allocation.
    pub fn owner(&self) -> OwnerToken {
        self.owner
    }
}

/// Allocations made during one bridge call.
#[derive(Debug)]
pub struct ScratchScope {
    owner: OwnerToken,
    live: Vec<ScratchAllocation>,
}

impl ScratchScope {
    /// Open a scope owned by `owner`.
    pub fn new(owner: OwnerToken) -> Self {
        Self {
            owner,
            live: Vec::new(),
        }
    }

    /// Owner token of this scope.
    pub fn owner(&self) -> OwnerToken {
        self.owner
    }

    /// Record a region returned by the module allocator.
    pub fn track(&mut self, ptr: u32, len: u32, align: u32) -> ScratchAllocation {
        let alloc = ScratchAllocation {
            ptr,
            len,
            align,
            owner: self.owner,
        };
        self.live.push(alloc);
        alloc
    }

    /// Whether `alloc` belongs to this scope and is still live.
    pub fn owns(&self, alloc: &ScratchAllocation) -> bool {
        alloc.owner == self.owner && self.live.contains(alloc)
    }

    /// Stop tracking `alloc` because the module now owns it.
    ///
    /// Returns false when `alloc` was not live in this scope.
    pub fn hand_over(&mut self, alloc: &ScratchAllocation) -> bool {
        if alloc.owner != self.owner {
            return false;
        }
        match self.live.iter().position(|a| a == alloc) {
            Some(i) => {
                self.live.remove(i);
                true
            }
            None => false,
        }
    }

    /// Number of live allocations.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether no allocation is live.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Release every allocation with `release`, newest first.
    ///
    /// A failing release is logged and does not stop the others. Returns
    /// how many releases succeeded.
    pub fn release_with<E: std::fmt::Display>(
        mut self,
        mut release: impl FnMut(&ScratchAllocation) -> Result<(), E>,
    ) -> usize {
        let mut released = 0;
        while let Some(alloc) = self.live.pop() {
            match release(&alloc) {
                Ok(()) => released += 1,
                Err(e) => tracing::warn!(
                    "failed to release scratch {:#x}+{} (owner {}): {}",
                    alloc.ptr,
                    alloc.len,
                    self.owner.0,
                    e
                ),
            }
        }
        released
    }
}

impl Drop for ScratchScope {
    fn drop(&mut self) {
        if !self.live.is_empty() {
            tracing::warn!(
                "scratch scope {} dropped with {} unreleased allocations",
                self.owner.0,
                self.live.len()
            );
        }
    }
}
