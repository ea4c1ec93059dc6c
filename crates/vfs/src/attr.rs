//! TEAM_439: Attribute and truncate dispatch
//!
//! Both directions prefer the filesystem's callback and fall back to the
//! in-memory inode when the callback reports `NotSupported`.

use crate::device::DevId;
use crate::error::{VfsError, VfsResult};
use crate::inode::{Inode, Timespec};
use crate::mount::Mount;
use crate::ops::{AttrMask, SetAttr};
use crate::superblock::Superblock;

/// TEAM_439: Kernel-side stat record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Kstat {
    pub dev: DevId,
    pub ino: u64,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: DevId,
    pub size: u64,
    pub atime: Timespec,
    pub mtime: Timespec,
    pub ctime: Timespec,
    pub blksize: u32,
    /// 512-byte sectors
    pub blocks: u64,
}

/// Copy the inode's own fields into a stat record.
pub fn generic_fillattr(sb: &Superblock, inode: &Inode) -> Kstat {
    let meta = inode.meta();
    Kstat {
        dev: sb.dev,
        ino: inode.ino,
        mode: meta.mode,
        nlink: meta.nlink,
        uid: meta.uid,
        gid: meta.gid,
        rdev: inode.rdev,
        size: meta.size,
        atime: meta.atime,
        mtime: meta.mtime,
        ctime: meta.ctime,
        blksize: meta.blksize,
        blocks: meta.blocks,
    }
}

/// Sectors covering `size` bytes when allocated in whole `block_size` blocks.
pub const fn fallback_blocks(size: u64, block_size: u32) -> u64 {
    let bs = block_size as u64;
    size.div_ceil(bs) * (bs / 512)
}

/// Stat `inode` as seen through `mnt`.
pub fn do_getattr(mnt: &Mount, inode: &Inode) -> VfsResult<Kstat> {
    match inode.ops.getattr(mnt, inode) {
        Err(VfsError::NotSupported) => {}
        result => return result,
    }

    let mut stat = generic_fillattr(&mnt.sb, inode);
    if stat.blksize == 0 {
        let bs = mnt.sb.block_size;
        stat.blocks = fallback_blocks(stat.size, bs);
        stat.blksize = bs;
    }
    Ok(stat)
}

/// Apply the valid fields of `attr` to the in-memory inode.
///
/// Size changes do not reclaim or zero anything.
pub fn simple_setattr(inode: &Inode, attr: &SetAttr) {
    inode.update_meta(|meta| {
        if attr.valid.contains(AttrMask::MODE) {
            meta.mode = (meta.mode & crate::mode::S_IFMT) | crate::mode::permissions(attr.mode);
        }
        if attr.valid.contains(AttrMask::UID) {
            meta.uid = attr.uid;
        }
        if attr.valid.contains(AttrMask::GID) {
            meta.gid = attr.gid;
        }
        if attr.valid.contains(AttrMask::SIZE) {
            meta.size = attr.size;
        }
        if attr.valid.contains(AttrMask::ATIME) {
            meta.atime = attr.atime;
        }
        if attr.valid.contains(AttrMask::MTIME) {
            meta.mtime = attr.mtime;
        }
        if attr.valid.contains(AttrMask::CTIME) {
            meta.ctime = attr.ctime;
        }
    });
}

/// Route an attribute change to the filesystem or the generic fallback.
pub fn notify_change(inode: &Inode, attr: &SetAttr) -> VfsResult<()> {
    match inode.ops.setattr(inode, attr) {
        Err(VfsError::NotSupported) => {
            simple_setattr(inode, attr);
            Ok(())
        }
        result => result,
    }
}

/// Set the size of a non-directory inode.
pub fn do_truncate(inode: &Inode, length: u64) -> VfsResult<()> {
    if inode.is_dir() {
        return Err(VfsError::IsADirectory);
    }
    notify_change(inode, &SetAttr::size(length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_blocks() {
        assert_eq!(fallback_blocks(0, 1024), 0);
        assert_eq!(fallback_blocks(1, 1024), 2);
        assert_eq!(fallback_blocks(1024, 1024), 2);
        assert_eq!(fallback_blocks(1025, 1024), 4);
        assert_eq!(fallback_blocks(1, 512), 1);
        assert_eq!(fallback_blocks(4097, 4096), 16);
    }

    #[test]
    fn test_fallback_blocks_bounds() {
        for bs in [512u32, 1024, 4096] {
            for size in [0u64, 1, 511, 512, 513, 4095, 4096, 4097, 1 << 20] {
                let bytes = fallback_blocks(size, bs) * 512;
                assert!(bytes >= size);
                assert!(bytes < size + u64::from(bs));
            }
        }
    }
}
