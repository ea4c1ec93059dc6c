//! TEAM_202: VFS Operation Traits
//!
//! Defines the traits that filesystems and drivers implement to integrate
//! with the VFS. Each trait is a capability set: every method has a default
//! that reports `VfsError::NotSupported`, and the VFS picks its fallback
//! behaviour when it sees that error.

extern crate alloc;

use alloc::sync::Arc;

use bitflags::bitflags;

use crate::attr::Kstat;
use crate::device::DevId;
use crate::error::{VfsError, VfsResult};
use crate::file::File;
use crate::inode::{Inode, InodeRef, Timespec};
use crate::mount::Mount;
use crate::superblock::Superblock;

bitflags! {
    /// TEAM_434: Which fields of a [`SetAttr`] are valid.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AttrMask: u32 {
        const MODE = 1 << 0;
        const UID = 1 << 1;
        const GID = 1 << 2;
        const SIZE = 1 << 3;
        const ATIME = 1 << 4;
        const MTIME = 1 << 5;
        const CTIME = 1 << 6;
    }
}

/// TEAM_202: Attributes that can be set on an inode
///
/// Only the fields named in `valid` are meaningful.
#[derive(Clone, Copy, Debug, Default)]
pub struct SetAttr {
    pub valid: AttrMask,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime: Timespec,
    pub mtime: Timespec,
    pub ctime: Timespec,
}

impl SetAttr {
    /// Change request that only sets the size.
    pub fn size(size: u64) -> Self {
        Self {
            valid: AttrMask::SIZE,
            size,
            ..Self::default()
        }
    }
}

/// TEAM_202: Inode Operations Trait
///
/// Filesystems implement this trait to provide inode-level operations.
/// Not all operations need to be implemented - default implementations
/// return `VfsError::NotSupported`.
pub trait InodeOps: Send + Sync {
    /// Look up a child by name in directory `dir`.
    ///
    /// `NotFound` means the backing store has no such entry; the path walk
    /// treats it and `NotSupported` the same way and falls through to create.
    fn lookup(&self, _dir: &Inode, _name: &str) -> VfsResult<InodeRef> {
        Err(VfsError::NotSupported)
    }

    /// Whether `lookup` can find entries again after their dentries are
    /// evicted. When it cannot, the dentry cache is the only record of a
    /// name, so children of such directories stay cached.
    fn can_lookup(&self) -> bool {
        false
    }

    /// Create a child of `dir` with the given full mode (type | perms)
    fn create(&self, _dir: &Inode, _name: &str, _mode: u32) -> VfsResult<InodeRef> {
        Err(VfsError::NotSupported)
    }

    /// Create a special file (device, fifo, socket) in `dir`
    fn mknod(&self, _dir: &Inode, _name: &str, _mode: u32, _dev: DevId) -> VfsResult<InodeRef> {
        Err(VfsError::NotSupported)
    }

    /// Release blocks past the inode's current size.
    ///
    /// The VFS never calls this; a filesystem's own `setattr` may.
    fn truncate(&self, _inode: &Inode) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    /// Apply an attribute change. Unsupported means the VFS applies it
    /// to the in-memory inode itself.
    fn setattr(&self, _inode: &Inode, _attr: &SetAttr) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    /// Fill a stat record. Unsupported means the VFS derives it from the
    /// inode fields.
    fn getattr(&self, _mnt: &Mount, _inode: &Inode) -> VfsResult<Kstat> {
        Err(VfsError::NotSupported)
    }
}

/// TEAM_202: File Operations Trait
///
/// Operations on an open file handle. These may differ from inode operations
/// for special files (devices, sockets, etc.).
pub trait FileOps: Send + Sync {
    /// Called once when a file is opened, before the descriptor is published
    fn open(&self, _inode: &Inode, _file: &mut File) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    /// Called once when the last reference to an open file goes away
    fn release(&self, _inode: &Inode, _file: &File) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    /// Read at `pos`; the caller advances the file position
    fn read(&self, _file: &File, _buf: &mut [u8], _pos: u64) -> VfsResult<usize> {
        Err(VfsError::NotSupported)
    }

    /// Write at `pos`; the caller advances the file position
    fn write(&self, _file: &File, _buf: &[u8], _pos: u64) -> VfsResult<usize> {
        Err(VfsError::NotSupported)
    }

    /// Compute a new position. Unsupported selects the generic seek.
    fn llseek(&self, _file: &File, _offset: i64, _whence: SeekWhence) -> VfsResult<u64> {
        Err(VfsError::NotSupported)
    }
}

/// TEAM_202: Seek origin
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SeekWhence {
    /// Seek from beginning of file
    Set = 0,
    /// Seek from current position
    Cur = 1,
    /// Seek from end of file
    End = 2,
}

impl SeekWhence {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(SeekWhence::Set),
            1 => Some(SeekWhence::Cur),
            2 => Some(SeekWhence::End),
            _ => None,
        }
    }
}

/// TEAM_434: Per-volume operations.
pub trait SuperOps: Send + Sync {
    /// Allocate a fresh in-memory inode on this volume
    fn alloc_inode(&self, _sb: &Arc<Superblock>, _mode: u32) -> VfsResult<InodeRef> {
        Err(VfsError::NotSupported)
    }

    /// Fill `inode` from the backing store
    fn read_inode(&self, _inode: &Inode) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    /// Persist `inode` to the backing store
    fn write_inode(&self, _inode: &Inode) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    /// Flush volume metadata
    fn write_super(&self, _sb: &Superblock) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }
}

/// Super operations for volumes that keep everything in memory.
pub struct NoSuperOps;

impl SuperOps for NoSuperOps {}

/// TEAM_434: A mountable filesystem type.
///
/// `mount` builds a volume for `dev_name`, whose root inode must already be
/// set on the returned superblock.
pub trait FileSystemType: Send + Sync {
    /// Name used to select this type at mount time
    fn name(&self) -> &str;

    fn mount(&self, dev_name: &str) -> VfsResult<Arc<Superblock>>;

    /// Tear down a volume after it has been detached from the tree
    fn unmount(&self, _sb: &Superblock) -> VfsResult<()> {
        Ok(())
    }
}
