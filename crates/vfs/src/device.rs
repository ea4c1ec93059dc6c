//! TEAM_435: Character device registry
//!
//! Maps a major number to the driver that services every device node with
//! that major. Opening such a node swaps the open file's operations for the
//! driver's before the driver's own `open` runs.

extern crate alloc;

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use los_utils::Mutex;

use crate::error::{VfsError, VfsResult};
use crate::file::File;
use crate::inode::Inode;
use crate::ops::FileOps;

/// Bits of a [`DevId`] taken by the minor number.
pub const MINORBITS: u32 = 20;
const MINORMASK: u32 = (1 << MINORBITS) - 1;

/// Packed (major, minor) device number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DevId(u32);

impl DevId {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self((major << MINORBITS) | (minor & MINORMASK))
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn major(self) -> u32 {
        self.0 >> MINORBITS
    }

    pub const fn minor(self) -> u32 {
        self.0 & MINORMASK
    }
}

/// A registered character driver.
#[derive(Clone)]
pub struct CharDevice {
    pub major: u32,
    pub name: String,
    pub fops: Arc<dyn FileOps>,
}

impl CharDevice {
    pub fn new(major: u32, name: &str, fops: Arc<dyn FileOps>) -> Self {
        Self {
            major,
            name: String::from(name),
            fops,
        }
    }
}

impl core::fmt::Debug for CharDevice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CharDevice")
            .field("major", &self.major)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Registered character drivers in insertion order.
#[derive(Default)]
pub struct CharDevRegistry {
    devices: Mutex<Vec<CharDevice>>,
}

impl CharDevRegistry {
    pub const fn new() -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&self, device: CharDevice) -> VfsResult<()> {
        let mut devices = self.devices.lock();
        if devices.iter().any(|d| d.major == device.major) {
            log::warn!("[CHRDEV] major {} already taken", device.major);
            return Err(VfsError::AlreadyExists);
        }
        log::debug!("[CHRDEV] registered {} (major {})", device.name, device.major);
        devices.push(device);
        Ok(())
    }

    pub fn unregister(&self, major: u32) -> VfsResult<CharDevice> {
        let mut devices = self.devices.lock();
        let index = devices
            .iter()
            .position(|d| d.major == major)
            .ok_or(VfsError::NotFound)?;
        let device = devices.remove(index);
        log::debug!("[CHRDEV] unregistered {} (major {})", device.name, major);
        Ok(device)
    }

    pub fn lookup(&self, major: u32) -> Option<CharDevice> {
        self.devices.lock().iter().find(|d| d.major == major).cloned()
    }

    pub fn len(&self) -> usize {
        self.devices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bind `file` to the driver for `inode.rdev` and run the driver's `open`.
///
/// The registry lock is not held while the driver runs.
pub fn chrdev_open(registry: &CharDevRegistry, inode: &Inode, file: &mut File) -> VfsResult<()> {
    let major = inode.rdev.major();
    let Some(device) = registry.lookup(major) else {
        log::warn!("[CHRDEV] open of ino {}: no driver for major {}", inode.ino, major);
        return Err(VfsError::NoDevice);
    };

    file.set_ops(device.fops.clone());
    match device.fops.open(inode, file) {
        Err(VfsError::NotSupported) => Err(VfsError::InvalidOperation),
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullDev;
    impl FileOps for NullDev {}

    #[test]
    fn test_devid_split() {
        let dev = DevId::new(5, 1);
        assert_eq!(dev.major(), 5);
        assert_eq!(dev.minor(), 1);
        assert_eq!(DevId::from_raw(dev.raw()), dev);
        // Minor overflow does not bleed into the major
        assert_eq!(DevId::new(1, u32::MAX).major(), 1);
    }

    #[test]
    fn test_duplicate_major_rejected() {
        let registry = CharDevRegistry::new();
        registry.register(CharDevice::new(4, "tty", Arc::new(NullDev))).unwrap();
        assert_eq!(
            registry.register(CharDevice::new(4, "ttyS", Arc::new(NullDev))),
            Err(VfsError::AlreadyExists)
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(4).unwrap().name, "tty");
    }

    #[test]
    fn test_unregister() {
        let registry = CharDevRegistry::new();
        registry.register(CharDevice::new(1, "mem", Arc::new(NullDev))).unwrap();
        assert_eq!(registry.unregister(2).unwrap_err(), VfsError::NotFound);
        assert_eq!(registry.unregister(1).unwrap().name, "mem");
        assert!(registry.is_empty());
        assert!(registry.lookup(1).is_none());
    }

    #[test]
    fn test_lookup_insertion_order() {
        let registry = CharDevRegistry::new();
        registry.register(CharDevice::new(10, "misc", Arc::new(NullDev))).unwrap();
        registry.register(CharDevice::new(5, "tty", Arc::new(NullDev))).unwrap();
        assert_eq!(registry.lookup(5).unwrap().name, "tty");
        assert_eq!(registry.lookup(10).unwrap().name, "misc");
    }
}
