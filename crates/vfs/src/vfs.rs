//! TEAM_442: The VFS handle
//!
//! Owns the dentry cache, the mount table and both registries. The kernel
//! creates one at boot; tests create as many as they like.

extern crate alloc;

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use los_utils::{Mutex, Once, RwLock};

use crate::dentry::{Dentry, DentryId, DentryTree};
use crate::device::{CharDevRegistry, CharDevice};
use crate::error::{VfsError, VfsResult};
use crate::fd_table::MAX_FDS;
use crate::inode::InodeRef;
use crate::mode::FileType;
use crate::mount::{Mount, MountId, MountTable};
use crate::namei::{Intent, PathLoc, prune_locked};
use crate::ops::FileSystemType;
use crate::process::{FsContext, Process};
use crate::superblock::Superblock;

/// Runtime knobs.
#[derive(Clone, Copy, Debug)]
pub struct VfsConfig {
    /// Descriptor table capacity for processes made by [`Vfs::new_process`]
    pub max_fds: usize,
    /// Prune the dentry cache after a walk leaves more entries than this
    pub dcache_soft_limit: Option<usize>,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            max_fds: MAX_FDS,
            dcache_soft_limit: None,
        }
    }
}

/// TEAM_442: Virtual filesystem instance
///
/// Lock order: `dcache` → `mounts` → inode metadata. Registry mutexes are
/// leaf locks.
pub struct Vfs {
    config: VfsConfig,
    pub(crate) dcache: RwLock<DentryTree>,
    pub(crate) mounts: RwLock<MountTable>,
    filesystems: Mutex<Vec<Arc<dyn FileSystemType>>>,
    chrdevs: CharDevRegistry,
    root: Once<FsContext>,
}

impl Vfs {
    pub fn new() -> Self {
        Self::with_config(VfsConfig::default())
    }

    pub fn with_config(config: VfsConfig) -> Self {
        Self {
            config,
            dcache: RwLock::new(DentryTree::new()),
            mounts: RwLock::new(MountTable::new()),
            filesystems: Mutex::new(Vec::new()),
            chrdevs: CharDevRegistry::new(),
            root: Once::new(),
        }
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    // ========================================================================
    // Filesystem registry
    // ========================================================================

    pub fn register_filesystem(&self, fs: Arc<dyn FileSystemType>) -> VfsResult<()> {
        let mut filesystems = self.filesystems.lock();
        if filesystems.iter().any(|f| f.name() == fs.name()) {
            return Err(VfsError::AlreadyExists);
        }
        log::debug!("[VFS] registered filesystem {}", fs.name());
        filesystems.push(fs);
        Ok(())
    }

    /// Remove a filesystem type. `Busy` while any volume it built is
    /// mounted.
    pub fn unregister_filesystem(&self, name: &str) -> VfsResult<()> {
        // TEAM_445: Holding the mount table across the check and the removal
        // orders this against `attach_volume`, which re-checks registration
        // under the same lock.
        let mounts = self.mounts.read();
        let mut filesystems = self.filesystems.lock();
        let index = filesystems
            .iter()
            .position(|f| f.name() == name)
            .ok_or(VfsError::NotFound)?;
        if mounts.uses_fs(name) {
            return Err(VfsError::Busy);
        }
        filesystems.remove(index);
        drop(filesystems);
        drop(mounts);
        log::debug!("[VFS] unregistered filesystem {}", name);
        Ok(())
    }

    fn is_registered(&self, name: &str) -> bool {
        self.filesystems.lock().iter().any(|f| f.name() == name)
    }

    fn find_filesystem(&self, name: &str) -> VfsResult<Arc<dyn FileSystemType>> {
        self.filesystems
            .lock()
            .iter()
            .find(|f| f.name() == name)
            .cloned()
            .ok_or(VfsError::NotFound)
    }

    // ========================================================================
    // Character devices
    // ========================================================================

    pub fn chrdevs(&self) -> &CharDevRegistry {
        &self.chrdevs
    }

    pub fn register_chrdev(&self, device: CharDevice) -> VfsResult<()> {
        self.chrdevs.register(device)
    }

    pub fn unregister_chrdev(&self, major: u32) -> VfsResult<CharDevice> {
        self.chrdevs.unregister(major)
    }

    // ========================================================================
    // Mounts
    // ========================================================================

    /// Mount the root volume and create the namespace root `/`.
    pub fn init_root(&self, fs_name: &str, dev_name: &str) -> VfsResult<FsContext> {
        if self.root.is_completed() {
            return Err(VfsError::Busy);
        }
        let fs = self.find_filesystem(fs_name)?;
        let sb = fs.mount(dev_name)?;
        let root_inode = match volume_root(&sb) {
            Ok(inode) => inode,
            Err(e) => {
                let _ = fs.unmount(&sb);
                return Err(e);
            }
        };

        let mut tree = self.dcache.write();
        let mut mounts = self.mounts.write();
        let refused = if self.root.is_completed() {
            Some(VfsError::Busy)
        } else if !self.is_registered(fs.name()) {
            Some(VfsError::NotFound)
        } else {
            None
        };
        if let Some(e) = refused {
            drop(mounts);
            drop(tree);
            let _ = fs.unmount(&sb);
            return Err(e);
        }
        let root = tree.alloc_root("/", root_inode, sb.clone());
        let root_mount = mounts.insert(Mount::new(sb, root, None, dev_name).with_fs(fs))?;
        let ctx = *self.root.call_once(|| FsContext { root, root_mount });

        log::debug!("[VFS] root is {} ({})", fs_name, dev_name);
        Ok(ctx)
    }

    /// Namespace set up by [`init_root`](Self::init_root).
    pub fn root_context(&self) -> VfsResult<FsContext> {
        self.root.get().copied().ok_or(VfsError::NotFound)
    }

    /// A process rooted at the namespace root with an empty descriptor table.
    pub fn new_process(&self) -> VfsResult<Process> {
        Ok(Process::new(self.root_context()?, self.config.max_fds))
    }

    /// Mount a new `fs_name` volume built from `dev_name` on `path`.
    ///
    /// Missing directories on the way to `path` are created. Mounting over
    /// something that is already a mount root fails with `Busy`.
    pub fn mount(
        &self,
        ctx: &FsContext,
        fs_name: &str,
        dev_name: &str,
        path: &str,
    ) -> VfsResult<MountId> {
        let fs = self.find_filesystem(fs_name)?;
        let target = self.resolve(
            ctx,
            path,
            Intent::Create {
                leaf: FileType::Directory,
            },
        )?;
        {
            let tree = self.dcache.read();
            let mounts = self.mounts.read();
            if !tree.get(target.dentry)?.inode.is_dir() {
                return Err(VfsError::NotADirectory);
            }
            if mounts.get(target.mount)?.root == target.dentry {
                return Err(VfsError::Busy);
            }
        }

        let sb = fs.mount(dev_name)?;
        let result = self.attach_volume(target, &fs, &sb, dev_name);
        if result.is_err() {
            let _ = fs.unmount(&sb);
        }
        let id = result?;
        log::debug!("[VFS] mounted {} ({}) on {}", fs_name, dev_name, path);
        Ok(id)
    }

    fn attach_volume(
        &self,
        target: PathLoc,
        fs: &Arc<dyn FileSystemType>,
        sb: &Arc<Superblock>,
        dev_name: &str,
    ) -> VfsResult<MountId> {
        let root_inode = volume_root(sb)?;
        let mut tree = self.dcache.write();
        let mut mounts = self.mounts.write();
        // The type may have been unregistered since it was looked up
        if !self.is_registered(fs.name()) {
            return Err(VfsError::NotFound);
        }
        // The target may have been pruned since it was resolved
        tree.get(target.dentry)?;

        let root = tree.alloc_root("/", root_inode, sb.clone());
        let mount = Mount::new(sb.clone(), root, Some((target.mount, target.dentry)), dev_name)
            .with_fs(fs.clone());
        mounts.insert(mount).inspect_err(|_| {
            tree.remove_subtree(root);
        })
    }

    /// Detach the volume whose root `path` names.
    pub fn umount(&self, ctx: &FsContext, path: &str) -> VfsResult<()> {
        let loc = self.lookup_path(ctx, path)?;
        let mount = {
            let mut tree = self.dcache.write();
            let mut mounts = self.mounts.write();
            let mnt = mounts.get(loc.mount)?;
            if mnt.root != loc.dentry || mnt.mountpoint.is_none() {
                return Err(VfsError::InvalidArgument);
            }
            if mounts.has_children(loc.mount) || mnt.users() > 0 {
                log::warn!("[VFS] umount {}: busy ({} open files)", path, mnt.users());
                return Err(VfsError::Busy);
            }
            let mount = mounts.remove(loc.mount)?;
            let dropped = tree.remove_subtree(mount.root);
            log::debug!("[VFS] unmounted {}: dropped {} dentries", path, dropped);
            mount
        };

        match mount.sb.write_super() {
            Ok(()) | Err(VfsError::NotSupported) => {}
            Err(e) => log::warn!("[VFS] umount {}: write_super failed: {}", path, e),
        }
        match &mount.fs {
            Some(fs) => fs.unmount(&mount.sb),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Dentry cache
    // ========================================================================

    /// Evict every unpinned leaf dentry that is not a mount point.
    pub fn prune_dentries(&self) -> usize {
        let mut tree = self.dcache.write();
        let mounts = self.mounts.read();
        let pruned = prune_locked(&mut tree, &mounts, None);
        log::debug!("[DCACHE] pruned {} dentries, {} left", pruned, tree.len());
        pruned
    }

    pub fn dentry_count(&self) -> usize {
        self.dcache.read().len()
    }

    pub fn mount_count(&self) -> usize {
        self.mounts.read().len()
    }

    /// Run `f` on a cached dentry.
    pub fn with_dentry<R>(&self, id: DentryId, f: impl FnOnce(&Dentry) -> R) -> VfsResult<R> {
        let tree = self.dcache.read();
        Ok(f(tree.get(id)?))
    }

    /// Names of the cached children of `id`, in insertion order.
    pub fn child_names(&self, id: DentryId) -> VfsResult<Vec<String>> {
        let tree = self.dcache.read();
        tree.get(id)?
            .children()
            .iter()
            .map(|&c| tree.get(c).map(|d| d.name.clone()))
            .collect()
    }

    pub fn inode_at(&self, loc: PathLoc) -> VfsResult<InodeRef> {
        self.with_dentry(loc.dentry, |d| d.inode.clone())
    }

    /// Source device of a mount.
    pub fn mount_source(&self, id: MountId) -> VfsResult<String> {
        Ok(self.mounts.read().get(id)?.dev_name.clone())
    }

    /// Namespace path of `loc`, crossing mount points.
    pub fn absolute_path(&self, loc: PathLoc) -> VfsResult<String> {
        let tree = self.dcache.read();
        let mounts = self.mounts.read();

        let mut names = Vec::new();
        let mut loc = loc;
        loop {
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
                    _ => break,
                }
            }
            let dentry = tree.get(loc.dentry)?;
            names.push(dentry.name.as_str());
            loc.dentry = dentry.parent.ok_or(VfsError::IoError)?;
        }

        let mut path = String::new();
        for name in names.iter().rev() {
            path.push('/');
            path.push_str(name);
        }
        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

/// Root inode of a freshly built volume; must be a directory.
fn volume_root(sb: &Superblock) -> VfsResult<InodeRef> {
    let root = sb.root()?;
    if !root.is_dir() {
        log::warn!("[VFS] {} ({}): root is not a directory", sb.fs_name, sb.dev_name);
        return Err(VfsError::NotADirectory);
    }
    Ok(root)
}
