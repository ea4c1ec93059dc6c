//! TEAM_201: Mount Table
//!
//! TEAM_437: A mount binds a volume's root dentry over a mount-point
//! dentry of its parent mount. The table is keyed by mount-point dentry so
//! the path walk can ask "is something mounted here" in O(1) at every step.

extern crate alloc;

use alloc::string::String;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

use los_utils::{Arena, ArenaId, HashMap};

use crate::dentry::DentryId;
use crate::error::{VfsError, VfsResult};
use crate::ops::FileSystemType;
use crate::superblock::Superblock;

/// Stable handle to a mount.
pub type MountId = ArenaId;

/// TEAM_201: One mounted volume in the namespace
pub struct Mount {
    pub sb: Arc<Superblock>,
    /// Root dentry of the mounted volume
    pub root: DentryId,
    /// Covered dentry in the parent mount (None for the namespace root)
    pub mountpoint: Option<DentryId>,
    pub parent: Option<MountId>,
    /// Source device or label
    pub dev_name: String,
    /// Type that built the volume; `unmount` goes back to it
    pub fs: Option<Arc<dyn FileSystemType>>,
    /// Open files living on this mount
    users: AtomicUsize,
}

impl Mount {
    /// `covers` is the parent mount and the dentry in it that gets covered.
    pub fn new(
        sb: Arc<Superblock>,
        root: DentryId,
        covers: Option<(MountId, DentryId)>,
        dev_name: &str,
    ) -> Self {
        Self {
            sb,
            root,
            mountpoint: covers.map(|(_, d)| d),
            parent: covers.map(|(m, _)| m),
            dev_name: String::from(dev_name),
            fs: None,
            users: AtomicUsize::new(0),
        }
    }

    /// TEAM_445: Remember the filesystem type that produced `sb`.
    #[must_use]
    pub fn with_fs(mut self, fs: Arc<dyn FileSystemType>) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn users(&self) -> usize {
        self.users.load(Ordering::Acquire)
    }

    pub fn get_user(&self) {
        self.users.fetch_add(1, Ordering::AcqRel);
    }

    pub fn put_user(&self) {
        let _ = self
            .users
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

impl core::fmt::Debug for Mount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mount")
            .field("fs", &self.sb.fs_name)
            .field("dev_name", &self.dev_name)
            .field("mountpoint", &self.mountpoint)
            .field("users", &self.users())
            .finish()
    }
}

/// TEAM_201: Global mount table
#[derive(Default)]
pub struct MountTable {
    mounts: Arena<Mount>,
    by_mountpoint: HashMap<DentryId, MountId>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `mount`. `Busy` if its mount point is already covered.
    pub fn insert(&mut self, mount: Mount) -> VfsResult<MountId> {
        let mountpoint = mount.mountpoint;
        if mountpoint.is_some_and(|mp| self.by_mountpoint.contains_key(&mp)) {
            return Err(VfsError::Busy);
        }
        let id = self.mounts.insert(mount);
        if let Some(mp) = mountpoint {
            self.by_mountpoint.insert(mp, id);
        }
        Ok(id)
    }

    /// Mount covering `dentry`, if any.
    pub fn lookup_mnt(&self, dentry: DentryId) -> Option<MountId> {
        self.by_mountpoint.get(&dentry).copied()
    }

    pub fn get(&self, id: MountId) -> VfsResult<&Mount> {
        self.mounts.get(id).ok_or(VfsError::NotFound)
    }

    pub fn remove(&mut self, id: MountId) -> VfsResult<Mount> {
        let mount = self.mounts.remove(id).ok_or(VfsError::NotFound)?;
        if let Some(mp) = mount.mountpoint {
            self.by_mountpoint.remove(&mp);
        }
        Ok(mount)
    }

    pub fn is_mountpoint(&self, dentry: DentryId) -> bool {
        self.by_mountpoint.contains_key(&dentry)
    }

    pub fn has_children(&self, id: MountId) -> bool {
        self.mounts.iter().any(|(_, m)| m.parent == Some(id))
    }

    /// Whether any live mount was built by the filesystem type `fs_name`.
    pub fn uses_fs(&self, fs_name: &str) -> bool {
        self.mounts.iter().any(|(_, m)| m.sb.fs_name == fs_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MountId, &Mount)> {
        self.mounts.iter()
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}
