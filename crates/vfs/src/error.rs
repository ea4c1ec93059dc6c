//! TEAM_202: VFS Error Types
//!
//! TEAM_432: Migrated to `define_kernel_error!` so every variant carries
//! its subsystem code and the negative errno the syscall layer returns.

use los_error::define_kernel_error;

define_kernel_error! {
    /// VFS error codes (0x06xx).
    pub enum VfsError(0x06) {
        /// Resolution dead end with nothing the filesystem could create
        NotFound = 0x01 => "No such file or directory" [ENOENT],
        /// Duplicate registration or name
        AlreadyExists = 0x02 => "File exists" [EEXIST],
        /// Device file whose major number has no registered driver
        NoDevice = 0x03 => "No such device" [ENODEV],
        /// Device without a usable open, or file without read/write
        InvalidOperation = 0x04 => "Invalid operation" [EINVAL],
        /// Descriptor slot is empty or out of range
        BadDescriptor = 0x05 => "Bad file descriptor" [EBADF],
        /// Process descriptor table is full
        OutOfDescriptors = 0x06 => "Too many open files" [EMFILE],
        /// Capability not provided by the filesystem or driver
        NotSupported = 0x07 => "Operation not supported" [EOPNOTSUPP],
        NotADirectory = 0x08 => "Not a directory" [ENOTDIR],
        IsADirectory = 0x09 => "Is a directory" [EISDIR],
        Busy = 0x0A => "Device or resource busy" [EBUSY],
        InvalidArgument = 0x0B => "Invalid argument" [EINVAL],
        NameTooLong = 0x0C => "File name too long" [ENAMETOOLONG],
        IoError = 0x0D => "I/O error" [EIO],
    }
}

/// TEAM_202: Result type for VFS operations
pub type VfsResult<T> = Result<T, VfsError>;
