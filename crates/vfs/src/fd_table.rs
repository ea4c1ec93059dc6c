//! TEAM_168: File Descriptor Table.
//!
//! Per-process file descriptor management for syscalls.
//!
//! TEAM_438: Slots go through a `Reserved` state while an open is in
//! progress, so the table lock is dropped before any filesystem or driver
//! callback runs and no other open can claim the same index meanwhile.

extern crate alloc;

use alloc::vec::Vec;

use los_utils::Mutex;

use crate::error::{VfsError, VfsResult};
use crate::file::FileRef;

/// TEAM_168: Default maximum number of open file descriptors per process.
pub const MAX_FDS: usize = 256;

/// State of one descriptor slot.
#[derive(Clone, Default)]
pub enum FdSlot {
    #[default]
    Free,
    /// Claimed by an open that has not finished yet
    Reserved,
    Open(FileRef),
}

impl FdSlot {
    pub fn is_free(&self) -> bool {
        matches!(self, FdSlot::Free)
    }
}

/// TEAM_168: Per-process file descriptor table.
pub struct FdTable {
    /// Grows on demand up to `capacity`
    entries: Vec<FdSlot>,
    capacity: usize,
}

/// Descriptor table as stored in a process.
pub type SharedFdTable = Mutex<FdTable>;

impl FdTable {
    pub fn new() -> Self {
        Self::with_capacity(MAX_FDS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// TEAM_168: Claim the lowest free slot (POSIX behavior).
    pub fn reserve(&mut self) -> VfsResult<usize> {
        if let Some(fd) = self.entries.iter().position(FdSlot::is_free) {
            self.entries[fd] = FdSlot::Reserved;
            return Ok(fd);
        }
        if self.entries.len() < self.capacity {
            self.entries.push(FdSlot::Reserved);
            return Ok(self.entries.len() - 1);
        }
        log::warn!("[FD] table full ({} slots)", self.capacity);
        Err(VfsError::OutOfDescriptors)
    }

    /// Publish `file` in a slot previously returned by [`reserve`](Self::reserve).
    pub fn install(&mut self, fd: usize, file: FileRef) -> VfsResult<()> {
        match self.entries.get_mut(fd) {
            Some(slot @ FdSlot::Reserved) => {
                *slot = FdSlot::Open(file);
                Ok(())
            }
            _ => Err(VfsError::BadDescriptor),
        }
    }

    /// Give back a reservation after a failed open.
    pub fn unreserve(&mut self, fd: usize) {
        if let Some(slot @ FdSlot::Reserved) = self.entries.get_mut(fd) {
            *slot = FdSlot::Free;
        }
    }

    /// TEAM_168: Get the open file in `fd`.
    pub fn get(&self, fd: usize) -> VfsResult<FileRef> {
        match self.entries.get(fd) {
            Some(FdSlot::Open(file)) => Ok(file.clone()),
            _ => Err(VfsError::BadDescriptor),
        }
    }

    /// Empty `fd` and hand back what it held.
    pub fn take(&mut self, fd: usize) -> VfsResult<FileRef> {
        match self.entries.get_mut(fd) {
            Some(slot @ FdSlot::Open(_)) => match core::mem::take(slot) {
                FdSlot::Open(file) => Ok(file),
                _ => Err(VfsError::BadDescriptor),
            },
            _ => Err(VfsError::BadDescriptor),
        }
    }

    /// TEAM_168: Check if a file descriptor is valid.
    pub fn is_valid(&self, fd: usize) -> bool {
        matches!(self.entries.get(fd), Some(FdSlot::Open(_)))
    }

    /// Number of slots holding an open file.
    pub fn open_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|s| matches!(s, FdSlot::Open(_)))
            .count()
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}
