//! Shared fixtures: an in-memory filesystem with switchable capabilities
//! and a character driver that counts calls.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use los_vfs::mode::{S_IFDIR, is_reg};
use los_vfs::ops::NoSuperOps;
use los_vfs::{
    AttrMask, DevId, File, FileOps, FileSystemType, FsContext, Inode, InodeOps, InodeRef, Kstat,
    Process, SetAttr, SuperOps, Superblock, Vfs, VfsConfig, VfsError, VfsResult,
};
use los_vfs::mount::Mount;

/// Which optional callbacks the mock filesystem answers.
#[derive(Clone, Copy, Debug)]
pub struct Caps {
    pub lookup: bool,
    pub create: bool,
    pub mknod: bool,
    pub setattr: bool,
    pub getattr: bool,
}

impl Caps {
    /// Creates nodes but cannot find anything it did not just create.
    pub const CREATE_ONLY: Caps = Caps {
        lookup: false,
        create: true,
        mknod: false,
        setattr: false,
        getattr: false,
    };

    pub const NONE: Caps = Caps {
        lookup: false,
        create: false,
        mknod: false,
        setattr: false,
        getattr: false,
    };

    pub const FULL: Caps = Caps {
        lookup: true,
        create: true,
        mknod: true,
        setattr: true,
        getattr: true,
    };
}

/// Callback log shared by every volume of one [`MemFs`].
#[derive(Default)]
pub struct Stats {
    pub creates: Mutex<Vec<(String, u32)>>,
    pub mknods: Mutex<Vec<(String, u32, DevId)>>,
    pub setattrs: Mutex<Vec<SetAttr>>,
    pub lookups: AtomicUsize,
    pub getattrs: AtomicUsize,
    pub opens: AtomicUsize,
    pub releases: AtomicUsize,
    pub unmounts: AtomicUsize,
    pub write_supers: AtomicUsize,
}

pub const GETATTR_BLKSIZE: u32 = 777;
pub const GETATTR_BLOCKS: u64 = 42;

pub struct MemFs {
    name: &'static str,
    block_size: u32,
    caps: Caps,
    volumes: AtomicU32,
    pub stats: Arc<Stats>,
}

impl MemFs {
    pub fn new(name: &'static str, caps: Caps) -> Self {
        Self {
            name,
            block_size: 1024,
            caps,
            volumes: AtomicU32::new(0),
            stats: Arc::new(Stats::default()),
        }
    }

    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn created_names(&self) -> Vec<String> {
        self.stats.creates.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn created_modes(&self) -> Vec<u32> {
        self.stats.creates.lock().unwrap().iter().map(|(_, m)| *m).collect()
    }
}

struct Volume {
    caps: Caps,
    stats: Arc<Stats>,
    next_ino: AtomicU64,
    entries: Mutex<HashMap<(u64, String), InodeRef>>,
}

struct MemInodeOps {
    vol: Arc<Volume>,
}

impl MemInodeOps {
    fn new_inode(&self, dir: &Inode, mode: u32) -> VfsResult<Inode> {
        let sb = dir.superblock()?;
        let ino = self.vol.next_ino.fetch_add(1, Ordering::Relaxed);
        let mut inode = Inode::new(&sb, ino, mode, dir.ops.clone());
        if is_reg(mode) {
            inode = inode
                .with_file_ops(Arc::new(MemFile {
                    stats: self.vol.stats.clone(),
                }))
                .with_private(Mutex::new(Vec::<u8>::new()));
        }
        Ok(inode)
    }

    fn remember(&self, dir: &Inode, name: &str, inode: InodeRef) -> InodeRef {
        self.vol
            .entries
            .lock()
            .unwrap()
            .insert((dir.ino, name.to_string()), inode.clone());
        inode
    }
}

impl InodeOps for MemInodeOps {
    fn can_lookup(&self) -> bool {
        self.vol.caps.lookup
    }

    fn lookup(&self, dir: &Inode, name: &str) -> VfsResult<InodeRef> {
        if !self.vol.caps.lookup {
            return Err(VfsError::NotSupported);
        }
        self.vol.stats.lookups.fetch_add(1, Ordering::Relaxed);
        self.vol
            .entries
            .lock()
            .unwrap()
            .get(&(dir.ino, name.to_string()))
            .cloned()
            .ok_or(VfsError::NotFound)
    }

    fn create(&self, dir: &Inode, name: &str, mode: u32) -> VfsResult<InodeRef> {
        if !self.vol.caps.create {
            return Err(VfsError::NotSupported);
        }
        self.vol.stats.creates.lock().unwrap().push((name.to_string(), mode));
        let inode = Arc::new(self.new_inode(dir, mode)?);
        Ok(self.remember(dir, name, inode))
    }

    fn mknod(&self, dir: &Inode, name: &str, mode: u32, dev: DevId) -> VfsResult<InodeRef> {
        if !self.vol.caps.mknod {
            return Err(VfsError::NotSupported);
        }
        self.vol.stats.mknods.lock().unwrap().push((name.to_string(), mode, dev));
        let inode = Arc::new(self.new_inode(dir, mode)?.with_rdev(dev));
        Ok(self.remember(dir, name, inode))
    }

    fn setattr(&self, inode: &Inode, attr: &SetAttr) -> VfsResult<()> {
        if !self.vol.caps.setattr {
            return Err(VfsError::NotSupported);
        }
        self.vol.stats.setattrs.lock().unwrap().push(*attr);
        if attr.valid.contains(AttrMask::SIZE) {
            inode.set_size(attr.size);
        }
        Ok(())
    }

    fn getattr(&self, mnt: &Mount, inode: &Inode) -> VfsResult<Kstat> {
        if !self.vol.caps.getattr {
            return Err(VfsError::NotSupported);
        }
        self.vol.stats.getattrs.fetch_add(1, Ordering::Relaxed);
        Ok(Kstat {
            dev: mnt.sb.dev,
            ino: inode.ino,
            mode: inode.mode(),
            size: inode.size(),
            blksize: GETATTR_BLKSIZE,
            blocks: GETATTR_BLOCKS,
            ..Kstat::default()
        })
    }
}

/// Regular-file operations backed by a byte vector in the inode.
struct MemFile {
    stats: Arc<Stats>,
}

fn contents(file: &File) -> VfsResult<&Mutex<Vec<u8>>> {
    file.inode.private::<Mutex<Vec<u8>>>().ok_or(VfsError::IoError)
}

impl FileOps for MemFile {
    fn open(&self, _inode: &Inode, _file: &mut File) -> VfsResult<()> {
        self.stats.opens.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn release(&self, _inode: &Inode, _file: &File) -> VfsResult<()> {
        self.stats.releases.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn read(&self, file: &File, buf: &mut [u8], pos: u64) -> VfsResult<usize> {
        let data = contents(file)?.lock().unwrap();
        let start = (pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write(&self, file: &File, buf: &[u8], pos: u64) -> VfsResult<usize> {
        let mut data = contents(file)?.lock().unwrap();
        let end = pos as usize + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[pos as usize..end].copy_from_slice(buf);
        file.inode.set_size(data.len() as u64);
        Ok(buf.len())
    }
}

struct MemSuper {
    stats: Arc<Stats>,
}

impl SuperOps for MemSuper {
    fn write_super(&self, _sb: &Superblock) -> VfsResult<()> {
        self.stats.write_supers.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl FileSystemType for MemFs {
    fn name(&self) -> &str {
        self.name
    }

    fn mount(&self, dev_name: &str) -> VfsResult<Arc<Superblock>> {
        let minor = self.volumes.fetch_add(1, Ordering::Relaxed);
        let sb = Superblock::builder(self.name, dev_name)
            .block_size(self.block_size)
            .dev(DevId::new(8, minor))
            .ops(Arc::new(MemSuper {
                stats: self.stats.clone(),
            }))
            .build()?;
        let vol = Arc::new(Volume {
            caps: self.caps,
            stats: self.stats.clone(),
            next_ino: AtomicU64::new(2),
            entries: Mutex::new(HashMap::new()),
        });
        let root = Inode::new(&sb, 1, S_IFDIR | 0o755, Arc::new(MemInodeOps { vol }));
        sb.set_root(Arc::new(root))?;
        Ok(sb)
    }

    fn unmount(&self, _sb: &Superblock) -> VfsResult<()> {
        self.stats.unmounts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Filesystem whose volumes have a regular file as root.
pub struct BrokenRootFs;

impl FileSystemType for BrokenRootFs {
    fn name(&self) -> &str {
        "broken"
    }

    fn mount(&self, dev_name: &str) -> VfsResult<Arc<Superblock>> {
        struct NoOps;
        impl InodeOps for NoOps {}

        let sb = Superblock::builder("broken", dev_name)
            .ops(Arc::new(NoSuperOps))
            .build()?;
        let root = Inode::new(&sb, 1, los_vfs::mode::S_IFREG | 0o644, Arc::new(NoOps));
        sb.set_root(Arc::new(root))?;
        Ok(sb)
    }
}

/// Character driver counting its open and release calls.
pub struct CountingDevice {
    pub opens: AtomicUsize,
    pub releases: AtomicUsize,
    has_open: bool,
}

pub const DEVICE_BYTES: &[u8] = b"dev";

impl CountingDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            opens: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            has_open: true,
        })
    }

    pub fn without_open() -> Arc<Self> {
        Arc::new(Self {
            opens: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            has_open: false,
        })
    }
}

impl FileOps for CountingDevice {
    fn open(&self, _inode: &Inode, _file: &mut File) -> VfsResult<()> {
        if !self.has_open {
            return Err(VfsError::NotSupported);
        }
        self.opens.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn release(&self, _inode: &Inode, _file: &File) -> VfsResult<()> {
        self.releases.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn read(&self, _file: &File, buf: &mut [u8], _pos: u64) -> VfsResult<usize> {
        let n = buf.len().min(DEVICE_BYTES.len());
        buf[..n].copy_from_slice(&DEVICE_BYTES[..n]);
        Ok(n)
    }
}

/// A VFS with one registered [`MemFs`] mounted as root and one process.
pub struct Harness {
    pub vfs: Vfs,
    pub fs: Arc<MemFs>,
    pub ctx: FsContext,
    pub proc: Process,
}

pub fn setup(caps: Caps) -> Harness {
    setup_with(caps, VfsConfig::default())
}

pub fn setup_with(caps: Caps, config: VfsConfig) -> Harness {
    let vfs = Vfs::with_config(config);
    let fs = Arc::new(MemFs::new("memfs", caps));
    vfs.register_filesystem(fs.clone()).unwrap();
    let ctx = vfs.init_root("memfs", "ram0").unwrap();
    let proc = vfs.new_process().unwrap();
    Harness { vfs, fs, ctx, proc }
}

impl Harness {
    /// Register another [`MemFs`] type under `name`.
    pub fn add_fs(&self, name: &'static str, caps: Caps) -> Arc<MemFs> {
        let fs = Arc::new(MemFs::new(name, caps));
        self.vfs.register_filesystem(fs.clone()).unwrap();
        fs
    }

    pub fn inode(&self, path: &str) -> InodeRef {
        let loc = self.vfs.lookup_path(&self.ctx, path).unwrap();
        self.vfs.inode_at(loc).unwrap()
    }
}
