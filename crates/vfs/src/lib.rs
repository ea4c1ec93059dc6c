//! TEAM_430: Virtual Filesystem (VFS) core.
//!
//! Lets one path namespace span several mounted volumes and device types.
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │  syscall: sys_open, sys_stat, sys_truncate, ...  │
//! └──────────────────────────────────────────────────┘
//!                         │
//! ┌──────────────────────────────────────────────────┐
//! │  dispatch: open / close / dup / stat / truncate  │
//! │  namei:    path walk + mount overlay             │
//! │  dentry / mount / fd_table                       │
//! └──────────────────────────────────────────────────┘
//!                         │
//! ┌──────────────────────────────────────────────────┐
//! │  InodeOps / FileOps / SuperOps / FileSystemType  │
//! │  implemented by filesystems and char drivers     │
//! └──────────────────────────────────────────────────┘
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

/// Per-segment path walk tracing, compiled in with the `verbose` feature.
#[cfg(feature = "verbose")]
macro_rules! verbose {
    ($($arg:tt)*) => {
        log::trace!($($arg)*)
    };
}

#[cfg(not(feature = "verbose"))]
macro_rules! verbose {
    ($($arg:tt)*) => {};
}

pub mod attr;
pub mod dentry;
pub mod device;
mod dispatch;
pub mod error;
pub mod fd_table;
pub mod file;
pub mod inode;
pub mod mode;
pub mod mount;
pub mod namei;
pub mod ops;
pub mod process;
pub mod superblock;
pub mod syscall;
mod vfs;

pub use attr::Kstat;
pub use dentry::{Dentry, DentryId};
pub use device::{CharDevice, DevId};
pub use error::{VfsError, VfsResult};
pub use fd_table::{FdTable, MAX_FDS};
pub use file::{File, FileRef};
pub use inode::{Inode, InodeMeta, InodeRef, Timespec};
pub use mode::FileType;
pub use mount::MountId;
pub use namei::{Intent, NAME_MAX, PathLoc};
pub use ops::{AttrMask, FileOps, FileSystemType, InodeOps, SeekWhence, SetAttr, SuperOps};
pub use process::{FsContext, Process, ProcessContext};
pub use superblock::Superblock;
pub use vfs::{Vfs, VfsConfig};
