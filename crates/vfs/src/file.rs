//! TEAM_202: File (Open File Handle) Implementation
//!
//! A File represents an open file description: the resolved location, the
//! inode, the operations bound at open time and the shared byte offset.
//! Descriptors produced by `dup` point at the same File and share its
//! offset and open count.

extern crate alloc;

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::dentry::DentryId;
use crate::error::{VfsError, VfsResult};
use crate::inode::InodeRef;
use crate::mount::MountId;
use crate::namei::PathLoc;
use crate::ops::{FileOps, SeekWhence};

/// TEAM_202: Reference to an open file
pub type FileRef = Arc<File>;

/// TEAM_202: Open File Handle
pub struct File {
    pub dentry: DentryId,
    pub mount: MountId,
    pub inode: InodeRef,
    /// File-specific operations (may differ from inode ops for devices)
    ops: Option<Arc<dyn FileOps>>,
    /// Current read/write position
    pos: AtomicU64,
    /// Descriptors referring to this file
    count: AtomicUsize,
}

impl File {
    /// TEAM_202: Create a new open file bound to the inode's file operations
    pub fn new(loc: PathLoc, inode: InodeRef) -> Self {
        Self {
            dentry: loc.dentry,
            mount: loc.mount,
            ops: inode.file_ops().cloned(),
            inode,
            pos: AtomicU64::new(0),
            count: AtomicUsize::new(1),
        }
    }

    pub fn location(&self) -> PathLoc {
        PathLoc {
            dentry: self.dentry,
            mount: self.mount,
        }
    }

    pub fn ops(&self) -> Option<&Arc<dyn FileOps>> {
        self.ops.as_ref()
    }

    /// Replace the operations table; used by device open dispatch.
    pub fn set_ops(&mut self, ops: Arc<dyn FileOps>) {
        self.ops = Some(ops);
    }

    pub fn pos(&self) -> u64 {
        self.pos.load(Ordering::Acquire)
    }

    pub fn set_pos(&self, pos: u64) {
        self.pos.store(pos, Ordering::Release);
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub(crate) fn get(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop one reference; returns how many remain.
    pub(crate) fn put(&self) -> usize {
        match self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(prev) => prev - 1,
            Err(_) => 0,
        }
    }

    /// TEAM_202: Read from the file at the current offset
    pub fn read(&self, buf: &mut [u8]) -> VfsResult<usize> {
        let ops = self.ops.as_ref().ok_or(VfsError::InvalidOperation)?;
        let pos = self.pos();
        let n = ops.read(self, buf, pos).map_err(unsupported_as_invalid)?;
        self.pos.fetch_add(n as u64, Ordering::AcqRel);
        Ok(n)
    }

    /// TEAM_202: Write to the file at the current offset
    pub fn write(&self, buf: &[u8]) -> VfsResult<usize> {
        let ops = self.ops.as_ref().ok_or(VfsError::InvalidOperation)?;
        let pos = self.pos();
        let n = ops.write(self, buf, pos).map_err(unsupported_as_invalid)?;
        self.pos.fetch_add(n as u64, Ordering::AcqRel);
        Ok(n)
    }

    /// TEAM_202: Seek, preferring the driver's llseek
    pub fn seek(&self, offset: i64, whence: SeekWhence) -> VfsResult<u64> {
        let custom = match self.ops.as_ref() {
            Some(ops) => ops.llseek(self, offset, whence),
            None => Err(VfsError::NotSupported),
        };
        let new_pos = match custom {
            Err(VfsError::NotSupported) => self.generic_seek(offset, whence)?,
            other => other?,
        };
        // Offsets travel back to userspace as a signed off_t
        if i64::try_from(new_pos).is_err() {
            return Err(VfsError::InvalidArgument);
        }
        self.set_pos(new_pos);
        Ok(new_pos)
    }

    fn generic_seek(&self, offset: i64, whence: SeekWhence) -> VfsResult<u64> {
        let base = match whence {
            SeekWhence::Set => 0,
            SeekWhence::Cur => self.pos(),
            SeekWhence::End => self.inode.size(),
        };
        base.checked_add_signed(offset)
            .ok_or(VfsError::InvalidArgument)
    }

    /// Run the driver's release hook. Missing hook is not an error.
    pub(crate) fn release(&self) -> VfsResult<()> {
        match self.ops.as_ref() {
            Some(ops) => match ops.release(&self.inode, self) {
                Err(VfsError::NotSupported) => Ok(()),
                result => result,
            },
            None => Ok(()),
        }
    }
}

fn unsupported_as_invalid(err: VfsError) -> VfsError {
    match err {
        VfsError::NotSupported => VfsError::InvalidOperation,
        other => other,
    }
}

impl core::fmt::Debug for File {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("File")
            .field("ino", &self.inode.ino)
            .field("pos", &self.pos())
            .field("count", &self.count())
            .field("has_ops", &self.ops.is_some())
            .finish()
    }
}
