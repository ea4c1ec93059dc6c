//! TEAM_440: What the VFS needs from the calling process
//!
//! The scheduler owns processes; the VFS only sees a namespace root and a
//! descriptor table through [`ProcessContext`].

use crate::dentry::DentryId;
use crate::fd_table::{FdTable, SharedFdTable};
use crate::mount::MountId;
use crate::namei::PathLoc;

/// Namespace root a process resolves absolute paths against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FsContext {
    pub root: DentryId,
    pub root_mount: MountId,
}

impl FsContext {
    pub fn root_loc(&self) -> PathLoc {
        PathLoc {
            dentry: self.root,
            mount: self.root_mount,
        }
    }
}

/// TEAM_440: Per-process state consumed by the VFS
pub trait ProcessContext {
    fn fs(&self) -> FsContext;
    fn fd_table(&self) -> &SharedFdTable;
}

/// Minimal process: a namespace root and a descriptor table.
pub struct Process {
    fs: FsContext,
    fd_table: SharedFdTable,
}

impl Process {
    pub fn new(fs: FsContext, max_fds: usize) -> Self {
        Self {
            fs,
            fd_table: SharedFdTable::new(FdTable::with_capacity(max_fds)),
        }
    }

    /// Switch the namespace root (chroot).
    pub fn set_fs(&mut self, fs: FsContext) {
        self.fs = fs;
    }
}

impl ProcessContext for Process {
    fn fs(&self) -> FsContext {
        self.fs
    }

    fn fd_table(&self) -> &SharedFdTable {
        &self.fd_table
    }
}
