//! Bounds-checked view over module linear memory used by the shims.

use super::errno;

/// Borrowed view of linear memory as seen by one shim call.
///
/// The view is absent until the loader publishes the memory reference;
/// callers must check [`MemoryView::is_present`] and answer `ENOSYS`
/// otherwise.
pub struct MemoryView<'a> {
    data: Option<&'a mut [u8]>,
}

impl<'a> MemoryView<'a> {
    /// View over a live memory buffer.
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data: Some(data) }
    }

    /// View used before the memory reference is published.
    pub fn absent() -> Self {
        Self { data: None }
    }

    /// Whether the memory reference has been published.
    pub fn is_present(&self) -> bool {
        self.data.is_some()
    }

    /// Borrow `len` bytes at `ptr`.
    pub fn slice(&self, ptr: u32, len: u32) -> Result<&[u8], i32> {
        let data = self.data.as_deref().ok_or(errno::ENOSYS)?;
        let start = ptr as usize;
        let end = start.checked_add(len as usize).ok_or(errno::EFAULT)?;
        data.get(start..end).ok_or(errno::EFAULT)
    }

    /// Mutably borrow `len` bytes at `ptr`.
    pub fn slice_mut(&mut self, ptr: u32, len: u32) -> Result<&mut [u8], i32> {
        let data = self.data.as_deref_mut().ok_or(errno::ENOSYS)?;
        let start = ptr as usize;
        let end = start.checked_add(len as usize).ok_or(errno::EFAULT)?;
        data.get_mut(start..end).ok_or(errno::EFAULT)
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&self, ptr: u32) -> Result<u32, i32> {
        let bytes = self.slice(ptr, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Write a little-endian `u32`.
    pub fn write_u32(&mut self, ptr: u32, value: u32) -> Result<(), i32> {
        self.slice_mut(ptr, 4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Write a little-endian `u64`.
    pub fn write_u64(&mut self, ptr: u32, value: u64) -> Result<(), i32> {
        self.slice_mut(ptr, 8)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Zero-fill `len` bytes at `ptr`.
    pub fn zero(&mut self, ptr: u32, len: u32) -> Result<(), i32> {
        self.slice_mut(ptr, len)?.fill(0);
        Ok(())
    }
}
