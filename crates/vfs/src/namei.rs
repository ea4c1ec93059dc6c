//! TEAM_441: Path resolution
//!
//! Walks an absolute path one segment at a time. A segment already in the
//! dentry cache is reused; otherwise the directory inode's `lookup` is
//! asked, and if that finds nothing and the caller asked for creation,
//! `create` is called (directory for intermediate segments, the caller's
//! leaf type for the last one). After every step the mount table is
//! consulted and the walk continues on top of whatever is mounted there.
//!
//! The whole walk runs under the dentry tree write lock and the mount
//! table read lock. Filesystem `lookup`/`create` callbacks therefore must
//! not call back into the VFS.

use crate::dentry::{DentryId, DentryTree};
use crate::error::{VfsError, VfsResult};
use crate::inode::{Inode, InodeRef};
use crate::mode::FileType;
use crate::mount::{MountId, MountTable};
use crate::process::FsContext;
use crate::vfs::Vfs;

/// Longest accepted path segment, in bytes.
pub const NAME_MAX: usize = 255;

/// A resolved location: a cached dentry and the mount it was reached through.
///
/// Only pinned dentries (those backing an open file) are guaranteed to
/// outlive the lock the walk ran under; anything else may be pruned, after
/// which using the location fails with `NotFound`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PathLoc {
    pub dentry: DentryId,
    pub mount: MountId,
}

/// What the walk does with a segment nobody has.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    /// Fail with `NotFound`
    Lookup,
    /// Create it; `leaf` is the type of the final segment
    Create { leaf: FileType },
}

impl Vfs {
    /// Resolve `path` without creating anything.
    pub fn lookup_path(&self, ctx: &FsContext, path: &str) -> VfsResult<PathLoc> {
        self.resolve(ctx, path, Intent::Lookup)
    }

    /// Resolve `path`, creating missing directories and a regular leaf.
    pub fn resolve_or_create_path(&self, ctx: &FsContext, path: &str) -> VfsResult<PathLoc> {
        self.resolve(
            ctx,
            path,
            Intent::Create {
                leaf: FileType::Regular,
            },
        )
    }

    pub fn resolve(&self, ctx: &FsContext, path: &str, intent: Intent) -> VfsResult<PathLoc> {
        let mut tree = self.dcache.write();
        let mounts = self.mounts.read();
        self.walk_locked(&mut tree, &mounts, ctx, path, intent)
    }

    pub(crate) fn walk_locked(
        &self,
        tree: &mut DentryTree,
        mounts: &MountTable,
        ctx: &FsContext,
        path: &str,
        intent: Intent,
    ) -> VfsResult<PathLoc> {
        if !path.starts_with('/') {
            return Err(VfsError::InvalidArgument);
        }

        // A trailing slash names a directory
        let dir_only = path.len() > 1 && path.ends_with('/');
        let intent = match intent {
            Intent::Create { .. } if dir_only => Intent::Create {
                leaf: FileType::Directory,
            },
            other => other,
        };

        let mut loc = follow_mounts(mounts, ctx.root_loc())?;
        let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();

        while let Some(name) = segments.next() {
            if name.len() > NAME_MAX {
                return Err(VfsError::NameTooLong);
            }
            let dir = tree.get(loc.dentry)?.inode.clone();
            if !dir.is_dir() {
                return Err(VfsError::NotADirectory);
            }

            match name {
                "." => continue,
                ".." => {
                    loc = follow_mounts(mounts, dotdot(tree, mounts, ctx, loc)?)?;
                    continue;
                }
                _ => {}
            }

            let child = match tree.find_child(loc.dentry, name) {
                Some(child) => child,
                None => {
                    let last = segments.peek().is_none();
                    let inode = materialize(&dir, name, intent, last)?;
                    tree.attach(loc.dentry, name, inode)?
                }
            };
            verbose!("[NAMEI] {} -> slot {}", name, child.slot());

            loc = follow_mounts(
                mounts,
                PathLoc {
                    dentry: child,
                    mount: loc.mount,
                },
            )?;
        }

        if dir_only && !tree.get(loc.dentry)?.inode.is_dir() {
            return Err(VfsError::NotADirectory);
        }
        if let Some(limit) = self.config().dcache_soft_limit {
            if tree.len() > limit {
                let pruned = prune_locked(tree, mounts, Some(loc.dentry));
                log::debug!("[DCACHE] over soft limit {}: pruned {}", limit, pruned);
            }
        }
        Ok(loc)
    }
}

/// Find or create the backing inode for `name` in `dir`.
fn materialize(dir: &Inode, name: &str, intent: Intent, last: bool) -> VfsResult<InodeRef> {
    match dir.lookup(name) {
        Ok(inode) => return Ok(inode),
        Err(VfsError::NotFound | VfsError::NotSupported) => {}
        Err(e) => return Err(e),
    }

    let Intent::Create { leaf } = intent else {
        return Err(VfsError::NotFound);
    };
    let mode = if last {
        leaf.default_mode()
    } else {
        FileType::Directory.default_mode()
    };
    match dir.create(name, mode) {
        Err(VfsError::NotSupported) => Err(VfsError::NotFound),
        Err(e) => {
            log::warn!("[NAMEI] create {} failed: {}", name, e);
            Err(e)
        }
        ok => ok,
    }
}

/// Step onto whatever is mounted at `loc`, repeatedly.
pub(crate) fn follow_mounts(mounts: &MountTable, mut loc: PathLoc) -> VfsResult<PathLoc> {
    while let Some(id) = mounts.lookup_mnt(loc.dentry) {
        loc = PathLoc {
            dentry: mounts.get(id)?.root,
            mount: id,
        };
    }
    Ok(loc)
}

/// Parent of `loc`, crossing out of mounted volumes. Stays put at the
/// namespace root.
fn dotdot(
    tree: &DentryTree,
    mounts: &MountTable,
    ctx: &FsContext,
    mut loc: PathLoc,
) -> VfsResult<PathLoc> {
    loop {
        if loc.dentry == ctx.root {
            return Ok(loc);
        }
        let mnt = mounts.get(loc.mount)?;
        if loc.dentry == mnt.root {
            match (mnt.parent, mnt.mountpoint) {
                (Some(parent), Some(mountpoint)) => {
                    loc = PathLoc {
                        dentry: mountpoint,
                        mount: parent,
                    };
                    continue;
                }
                _ => return Ok(loc),
            }
        }
        let parent = tree.get(loc.dentry)?.parent.ok_or(VfsError::IoError)?;
        return Ok(PathLoc {
            dentry: parent,
            mount: loc.mount,
        });
    }
}

/// Evict unpinned leaves, never touching mount points or `keep`.
pub(crate) fn prune_locked(
    tree: &mut DentryTree,
    mounts: &MountTable,
    keep: Option<DentryId>,
) -> usize {
    tree.prune(|id, _| Some(id) == keep || mounts.is_mountpoint(id))
}
