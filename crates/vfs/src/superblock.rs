//! TEAM_202: Superblock Implementation
//!
//! The superblock represents a mounted filesystem instance.
//!
//! TEAM_434: Concrete struct with a `SuperOps` table instead of a trait
//! object, so the VFS can read block geometry without a virtual call.

extern crate alloc;

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use core::any::Any;

use los_utils::Once;

use crate::device::DevId;
use crate::error::{VfsError, VfsResult};
use crate::inode::{Inode, InodeRef};
use crate::ops::{NoSuperOps, SuperOps};

/// TEAM_202: Reference to a superblock
pub type SuperblockRef = Arc<Superblock>;

/// Block size used when a filesystem does not pick one.
pub const DEFAULT_BLOCK_SIZE: u32 = 4096;

/// Smallest block size a volume may declare (one sector).
pub const MIN_BLOCK_SIZE: u32 = 512;

/// TEAM_202: One mounted volume
pub struct Superblock {
    /// Block size in bytes, a power of two no smaller than 512
    pub block_size: u32,
    pub blocksize_bits: u8,
    /// Filesystem magic number
    pub magic: u64,
    /// Device number reported as `st_dev` for every inode on the volume
    pub dev: DevId,
    /// Name of the [`FileSystemType`](crate::ops::FileSystemType) that built it
    pub fs_name: String,
    /// Source the volume was mounted from
    pub dev_name: String,
    ops: Arc<dyn SuperOps>,
    root: Once<InodeRef>,
    private: Box<dyn Any + Send + Sync>,
}

impl Superblock {
    pub fn builder(fs_name: &str, dev_name: &str) -> SuperblockBuilder {
        SuperblockBuilder {
            fs_name: String::from(fs_name),
            dev_name: String::from(dev_name),
            block_size: DEFAULT_BLOCK_SIZE,
            magic: 0,
            dev: DevId::default(),
            ops: Arc::new(NoSuperOps),
            private: Box::new(()),
        }
    }

    /// Install the root inode. Only the first call succeeds.
    pub fn set_root(&self, root: InodeRef) -> VfsResult<()> {
        let mut installed = false;
        self.root.call_once(|| {
            installed = true;
            root
        });
        if installed {
            Ok(())
        } else {
            Err(VfsError::AlreadyExists)
        }
    }

    /// Root inode of the volume, `IoError` if the filesystem never set one.
    pub fn root(&self) -> VfsResult<InodeRef> {
        self.root.get().cloned().ok_or(VfsError::IoError)
    }

    pub fn ops(&self) -> &Arc<dyn SuperOps> {
        &self.ops
    }

    /// TEAM_202: Get filesystem-specific data
    pub fn private<T: 'static>(&self) -> Option<&T> {
        self.private.downcast_ref::<T>()
    }

    pub fn alloc_inode(self: &Arc<Self>, mode: u32) -> VfsResult<InodeRef> {
        self.ops.alloc_inode(self, mode)
    }

    pub fn read_inode(&self, inode: &Inode) -> VfsResult<()> {
        self.ops.read_inode(inode)
    }

    pub fn write_inode(&self, inode: &Inode) -> VfsResult<()> {
        self.ops.write_inode(inode)
    }

    pub fn write_super(&self) -> VfsResult<()> {
        self.ops.write_super(self)
    }
}

impl core::fmt::Debug for Superblock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Superblock")
            .field("fs_name", &self.fs_name)
            .field("dev_name", &self.dev_name)
            .field("block_size", &self.block_size)
            .field("dev", &self.dev)
            .finish()
    }
}

/// Builder for [`Superblock`]; validates geometry in [`build`](Self::build).
pub struct SuperblockBuilder {
    fs_name: String,
    dev_name: String,
    block_size: u32,
    magic: u64,
    dev: DevId,
    ops: Arc<dyn SuperOps>,
    private: Box<dyn Any + Send + Sync>,
}

impl SuperblockBuilder {
    pub fn block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn magic(mut self, magic: u64) -> Self {
        self.magic = magic;
        self
    }

    pub fn dev(mut self, dev: DevId) -> Self {
        self.dev = dev;
        self
    }

    pub fn ops(mut self, ops: Arc<dyn SuperOps>) -> Self {
        self.ops = ops;
        self
    }

    pub fn private<T: Any + Send + Sync>(mut self, private: T) -> Self {
        self.private = Box::new(private);
        self
    }

    pub fn build(self) -> VfsResult<Arc<Superblock>> {
        if self.block_size < MIN_BLOCK_SIZE || !self.block_size.is_power_of_two() {
            log::warn!(
                "[VFS] {}: rejecting block size {}",
                self.fs_name,
                self.block_size
            );
            return Err(VfsError::InvalidArgument);
        }
        Ok(Arc::new(Superblock {
            blocksize_bits: self.block_size.trailing_zeros() as u8,
            block_size: self.block_size,
            magic: self.magic,
            dev: self.dev,
            fs_name: self.fs_name,
            dev_name: self.dev_name,
            ops: self.ops,
            root: Once::new(),
            private: self.private,
        }))
    }
}
