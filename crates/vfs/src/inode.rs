//! TEAM_202: Inode Implementation
//!
//! The inode is the core abstraction for files, directories, and other
//! filesystem objects in the VFS.
//!
//! TEAM_434: Mutable metadata moved behind one lock so a setattr or
//! truncate is observed as a whole by concurrent stat callers.

extern crate alloc;

use alloc::boxed::Box;
use alloc::sync::{Arc, Weak};
use core::any::Any;

use los_utils::RwLock;

use crate::device::DevId;
use crate::error::{VfsError, VfsResult};
use crate::mode;
use crate::ops::{FileOps, InodeOps};
use crate::superblock::Superblock;

/// TEAM_202: Reference to an inode
pub type InodeRef = Arc<Inode>;

/// Seconds and nanoseconds since the epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timespec {
    pub sec: i64,
    pub nsec: u32,
}

impl Timespec {
    pub const fn new(sec: i64, nsec: u32) -> Self {
        Self { sec, nsec }
    }
}

/// TEAM_434: Mutable inode metadata
#[derive(Clone, Copy, Debug, Default)]
pub struct InodeMeta {
    /// File type and permissions (S_IFMT | mode bits)
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    /// Size in bytes
    pub size: u64,
    /// Allocated 512-byte sectors, as tracked by the filesystem
    pub blocks: u64,
    /// Preferred I/O size; 0 means "use the volume block size"
    pub blksize: u32,
    pub flags: u32,
    pub atime: Timespec,
    pub mtime: Timespec,
    pub ctime: Timespec,
}

/// TEAM_202: In-memory representation of a file or directory.
///
/// Every file, directory, symlink, device, etc. is represented by an inode.
/// The inode contains metadata and a reference to filesystem-specific
/// operations and data.
pub struct Inode {
    /// Unique identifier within the filesystem
    pub ino: u64,
    /// Device number (for block/char devices)
    pub rdev: DevId,
    meta: RwLock<InodeMeta>,
    /// Operations table for this inode
    pub ops: Arc<dyn InodeOps>,
    /// Default operations for files opened on this inode
    fops: Option<Arc<dyn FileOps>>,
    /// Back-reference to the owning volume
    sb: Weak<Superblock>,
    /// Filesystem-specific private data
    private: Box<dyn Any + Send + Sync>,
}

impl Inode {
    /// TEAM_202: Create a new inode on `sb`
    pub fn new(sb: &Arc<Superblock>, ino: u64, mode: u32, ops: Arc<dyn InodeOps>) -> Self {
        Self {
            ino,
            rdev: DevId::default(),
            meta: RwLock::new(InodeMeta {
                mode,
                nlink: 1,
                ..InodeMeta::default()
            }),
            ops,
            fops: None,
            sb: Arc::downgrade(sb),
            private: Box::new(()),
        }
    }

    pub fn with_file_ops(mut self, fops: Arc<dyn FileOps>) -> Self {
        self.fops = Some(fops);
        self
    }

    pub fn with_rdev(mut self, rdev: DevId) -> Self {
        self.rdev = rdev;
        self
    }

    pub fn with_private<T: Any + Send + Sync>(mut self, private: T) -> Self {
        self.private = Box::new(private);
        self
    }

    /// Snapshot of the current metadata.
    pub fn meta(&self) -> InodeMeta {
        *self.meta.read()
    }

    /// Apply `f` to the metadata under the write lock.
    pub fn update_meta<R>(&self, f: impl FnOnce(&mut InodeMeta) -> R) -> R {
        f(&mut self.meta.write())
    }

    pub fn mode(&self) -> u32 {
        self.meta.read().mode
    }

    pub fn size(&self) -> u64 {
        self.meta.read().size
    }

    pub fn set_size(&self, size: u64) {
        self.meta.write().size = size;
    }

    /// TEAM_202: Check if this is a regular file
    pub fn is_file(&self) -> bool {
        mode::is_reg(self.mode())
    }

    /// TEAM_202: Check if this is a directory
    pub fn is_dir(&self) -> bool {
        mode::is_dir(self.mode())
    }

    /// TEAM_202: Check if this is a character device
    pub fn is_chr(&self) -> bool {
        mode::is_chr(self.mode())
    }

    /// File operations installed by the filesystem, if any.
    pub fn file_ops(&self) -> Option<&Arc<dyn FileOps>> {
        self.fops.as_ref()
    }

    /// The volume this inode lives on.
    ///
    /// Fails with `IoError` once the volume has been torn down.
    pub fn superblock(&self) -> VfsResult<Arc<Superblock>> {
        self.sb.upgrade().ok_or(VfsError::IoError)
    }

    /// TEAM_202: Get filesystem-specific data
    pub fn private<T: 'static>(&self) -> Option<&T> {
        self.private.downcast_ref::<T>()
    }

    // ========================================================================
    // Operations delegation
    // ========================================================================

    /// Look up a child in this directory
    pub fn lookup(&self, name: &str) -> VfsResult<InodeRef> {
        self.ops.lookup(self, name)
    }

    /// Create a child in this directory
    pub fn create(&self, name: &str, mode: u32) -> VfsResult<InodeRef> {
        self.ops.create(self, name, mode)
    }

    /// Create a special file in this directory
    pub fn mknod(&self, name: &str, mode: u32, dev: DevId) -> VfsResult<InodeRef> {
        self.ops.mknod(self, name, mode, dev)
    }
}

impl core::fmt::Debug for Inode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let meta = self.meta();
        f.debug_struct("Inode")
            .field("ino", &self.ino)
            .field("rdev", &self.rdev)
            .field("mode", &meta.mode)
            .field("nlink", &meta.nlink)
            .field("size", &meta.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{S_IFCHR, S_IFDIR, S_IFREG};

    struct NoOps;
    impl InodeOps for NoOps {}

    fn volume() -> Arc<Superblock> {
        Superblock::builder("testfs", "none").build().unwrap()
    }

    #[test]
    fn test_new_inode_defaults() {
        let sb = volume();
        let inode = Inode::new(&sb, 7, S_IFREG | 0o644, Arc::new(NoOps));
        let meta = inode.meta();
        assert_eq!(inode.ino, 7);
        assert_eq!(meta.nlink, 1);
        assert_eq!(meta.size, 0);
        assert_eq!(meta.blksize, 0);
        assert!(inode.is_file());
        assert!(inode.file_ops().is_none());
    }

    #[test]
    fn test_type_predicates() {
        let sb = volume();
        let dir = Inode::new(&sb, 1, S_IFDIR | 0o755, Arc::new(NoOps));
        let chr = Inode::new(&sb, 2, S_IFCHR | 0o600, Arc::new(NoOps)).with_rdev(DevId::new(4, 1));
        assert!(dir.is_dir());
        assert!(chr.is_chr());
        assert_eq!(chr.rdev.major(), 4);
    }

    #[test]
    fn test_superblock_backref_dies_with_volume() {
        let sb = volume();
        let inode = Inode::new(&sb, 1, S_IFREG, Arc::new(NoOps));
        assert!(inode.superblock().is_ok());
        drop(sb);
        assert_eq!(inode.superblock().unwrap_err(), VfsError::IoError);
    }

    #[test]
    fn test_missing_ops_report_not_supported() {
        let sb = volume();
        let dir = Inode::new(&sb, 1, S_IFDIR, Arc::new(NoOps));
        assert_eq!(dir.lookup("x").unwrap_err(), VfsError::NotSupported);
        assert_eq!(dir.create("x", S_IFREG).unwrap_err(), VfsError::NotSupported);
    }

    #[test]
    fn test_private_downcast() {
        let sb = volume();
        let inode = Inode::new(&sb, 1, S_IFREG, Arc::new(NoOps)).with_private(42u32);
        assert_eq!(inode.private::<u32>(), Some(&42));
        assert_eq!(inode.private::<u64>(), None);
    }
}
