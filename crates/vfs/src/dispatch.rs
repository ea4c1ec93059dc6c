//! TEAM_203: VFS Dispatch Layer
//!
//! Descriptor- and path-based operations as syscalls see them.
//!
//! TEAM_443: Descriptor tables are locked only to reserve, install, look up
//! or take a slot. Filesystem and driver callbacks always run with the
//! table unlocked.

use crate::attr::{Kstat, do_getattr, do_truncate};
use crate::dentry::DentryTree;
use crate::device::{DevId, chrdev_open};
use crate::error::{VfsError, VfsResult};
use crate::file::{File, FileRef};
use crate::inode::InodeRef;
use crate::mode::FileType;
use crate::mount::MountTable;
use crate::namei::{Intent, NAME_MAX, PathLoc};
use crate::ops::SeekWhence;
use crate::process::{FsContext, ProcessContext};
use crate::vfs::Vfs;

impl Vfs {
    /// Open `path`, creating it (and missing parents) if needed.
    pub fn open<P: ProcessContext + ?Sized>(&self, proc: &P, path: &str) -> VfsResult<usize> {
        self.do_open(
            proc,
            path,
            Intent::Create {
                leaf: FileType::Regular,
            },
        )
    }

    /// Open `path` only if it already exists.
    pub fn open_existing<P: ProcessContext + ?Sized>(
        &self,
        proc: &P,
        path: &str,
    ) -> VfsResult<usize> {
        self.do_open(proc, path, Intent::Lookup)
    }

    fn do_open<P: ProcessContext + ?Sized>(
        &self,
        proc: &P,
        path: &str,
        intent: Intent,
    ) -> VfsResult<usize> {
        let fd = proc.fd_table().lock().reserve()?;
        let file = match self.open_file(&proc.fs(), path, intent) {
            Ok(file) => file,
            Err(e) => {
                proc.fd_table().lock().unreserve(fd);
                return Err(e);
            }
        };
        proc.fd_table().lock().install(fd, file)?;
        log::trace!("[VFS] open {} -> fd {}", path, fd);
        Ok(fd)
    }

    fn open_file(&self, ctx: &FsContext, path: &str, intent: Intent) -> VfsResult<FileRef> {
        let (loc, inode) = {
            let mut tree = self.dcache.write();
            let mounts = self.mounts.read();
            let loc = self.walk_locked(&mut tree, &mounts, ctx, path, intent)?;
            (loc, pin_location(&tree, &mounts, loc)?)
        };

        let mut file = File::new(loc, inode.clone());
        let result = if inode.is_chr() {
            chrdev_open(self.chrdevs(), &inode, &mut file)
        } else {
            match file.ops().cloned() {
                Some(ops) => match ops.open(&inode, &mut file) {
                    Err(VfsError::NotSupported) => Ok(()),
                    result => result,
                },
                None => Ok(()),
            }
        };

        if let Err(e) = result {
            log::warn!("[VFS] open {} failed: {}", path, e);
            self.unpin(loc);
            return Err(e);
        }
        Ok(FileRef::new(file))
    }

    fn unpin(&self, loc: PathLoc) {
        if let Ok(dentry) = self.dcache.read().get(loc.dentry) {
            dentry.unpin();
        }
        if let Ok(mount) = self.mounts.read().get(loc.mount) {
            mount.put_user();
        }
    }

    /// Drop one descriptor's reference; the last one releases the file.
    fn fput(&self, file: &File) -> VfsResult<()> {
        if file.put() > 0 {
            return Ok(());
        }
        let result = file.release();
        self.unpin(file.location());
        result
    }

    pub fn close<P: ProcessContext + ?Sized>(&self, proc: &P, fd: usize) -> VfsResult<()> {
        let file = proc.fd_table().lock().take(fd)?;
        self.fput(&file)
    }

    /// Duplicate `fd` into the lowest free slot; both share one open file.
    pub fn dup<P: ProcessContext + ?Sized>(&self, proc: &P, fd: usize) -> VfsResult<usize> {
        let mut table = proc.fd_table().lock();
        let file = table.get(fd)?;
        let new_fd = table.reserve()?;
        table.install(new_fd, file.clone())?;
        file.get();
        Ok(new_fd)
    }

    fn file<P: ProcessContext + ?Sized>(&self, proc: &P, fd: usize) -> VfsResult<FileRef> {
        proc.fd_table().lock().get(fd)
    }

    pub fn read<P: ProcessContext + ?Sized>(
        &self,
        proc: &P,
        fd: usize,
        buf: &mut [u8],
    ) -> VfsResult<usize> {
        self.file(proc, fd)?.read(buf)
    }

    pub fn write<P: ProcessContext + ?Sized>(
        &self,
        proc: &P,
        fd: usize,
        buf: &[u8],
    ) -> VfsResult<usize> {
        self.file(proc, fd)?.write(buf)
    }

    pub fn lseek<P: ProcessContext + ?Sized>(
        &self,
        proc: &P,
        fd: usize,
        offset: i64,
        whence: SeekWhence,
    ) -> VfsResult<u64> {
        self.file(proc, fd)?.seek(offset, whence)
    }

    /// Resolve without creating and return the inode.
    fn lookup_inode(&self, ctx: &FsContext, path: &str) -> VfsResult<(PathLoc, InodeRef)> {
        let mut tree = self.dcache.write();
        let mounts = self.mounts.read();
        let loc = self.walk_locked(&mut tree, &mounts, ctx, path, Intent::Lookup)?;
        Ok((loc, tree.get(loc.dentry)?.inode.clone()))
    }

    pub fn stat<P: ProcessContext + ?Sized>(&self, proc: &P, path: &str) -> VfsResult<Kstat> {
        let (loc, inode) = self.lookup_inode(&proc.fs(), path)?;
        let mounts = self.mounts.read();
        do_getattr(mounts.get(loc.mount)?, &inode)
    }

    pub fn fstat<P: ProcessContext + ?Sized>(&self, proc: &P, fd: usize) -> VfsResult<Kstat> {
        let file = self.file(proc, fd)?;
        let mounts = self.mounts.read();
        do_getattr(mounts.get(file.mount)?, &file.inode)
    }

    pub fn truncate<P: ProcessContext + ?Sized>(
        &self,
        proc: &P,
        path: &str,
        length: u64,
    ) -> VfsResult<()> {
        let (_, inode) = self.lookup_inode(&proc.fs(), path)?;
        do_truncate(&inode, length)
    }

    pub fn ftruncate<P: ProcessContext + ?Sized>(
        &self,
        proc: &P,
        fd: usize,
        length: u64,
    ) -> VfsResult<()> {
        let file = self.file(proc, fd)?;
        do_truncate(&file.inode, length)
    }

    /// Create a special file at `path` through the parent's `mknod`.
    pub fn mknod<P: ProcessContext + ?Sized>(
        &self,
        proc: &P,
        path: &str,
        mode: u32,
        dev: DevId,
    ) -> VfsResult<()> {
        if !path.starts_with('/') {
            return Err(VfsError::InvalidArgument);
        }
        let (dir, name) = path
            .trim_end_matches('/')
            .rsplit_once('/')
            .ok_or(VfsError::InvalidArgument)?;
        if name.is_empty() || name == "." || name == ".." {
            return Err(VfsError::InvalidArgument);
        }
        if name.len() > NAME_MAX {
            return Err(VfsError::NameTooLong);
        }
        let dir = if dir.is_empty() { "/" } else { dir };

        let mut tree = self.dcache.write();
        let mounts = self.mounts.read();
        let parent = self.walk_locked(
            &mut tree,
            &mounts,
            &proc.fs(),
            dir,
            Intent::Create {
                leaf: FileType::Directory,
            },
        )?;
        let dir_inode = tree.get(parent.dentry)?.inode.clone();
        if !dir_inode.is_dir() {
            return Err(VfsError::NotADirectory);
        }
        if tree.find_child(parent.dentry, name).is_some() {
            return Err(VfsError::AlreadyExists);
        }

        let inode = dir_inode.mknod(name, mode, dev)?;
        tree.attach(parent.dentry, name, inode)?;
        log::debug!(
            "[VFS] mknod {} mode {:o} dev {}:{}",
            path,
            mode,
            dev.major(),
            dev.minor()
        );
        Ok(())
    }
}

/// Pin the dentry and take a mount user for an open file. Nothing is taken
/// unless both still exist.
fn pin_location(tree: &DentryTree, mounts: &MountTable, loc: PathLoc) -> VfsResult<InodeRef> {
    let mount = mounts.get(loc.mount)?;
    let dentry = tree.get(loc.dentry)?;
    dentry.pin();
    mount.get_user();
    Ok(dentry.inode.clone())
}
