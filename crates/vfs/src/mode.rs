//! TEAM_201: POSIX File Mode Constants
//!
//! The high bits of an inode mode carry the file type, the low twelve bits
//! the permission and set-id bits. The VFS never enforces permissions; it
//! only passes them through to the filesystem and back out through stat.

/// Bit mask for extracting file type
pub const S_IFMT: u32 = 0o170000;
pub const S_IFSOCK: u32 = 0o140000;
pub const S_IFLNK: u32 = 0o120000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFBLK: u32 = 0o060000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFIFO: u32 = 0o010000;

/// Permission bits applied to directories the path walk creates.
pub const DEFAULT_DIR_PERMS: u32 = 0o755;
/// Permission bits applied to leaf files the path walk creates.
pub const DEFAULT_FILE_PERMS: u32 = 0o644;

/// TEAM_433: Decoded file type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
    Fifo,
    CharDevice,
    Directory,
    BlockDevice,
    Regular,
    Symlink,
    Socket,
}

impl FileType {
    /// Decode the type bits of `mode`. Returns `None` for an unknown type.
    pub const fn from_mode(mode: u32) -> Option<Self> {
        match mode & S_IFMT {
            S_IFIFO => Some(Self::Fifo),
            S_IFCHR => Some(Self::CharDevice),
            S_IFDIR => Some(Self::Directory),
            S_IFBLK => Some(Self::BlockDevice),
            S_IFREG => Some(Self::Regular),
            S_IFLNK => Some(Self::Symlink),
            S_IFSOCK => Some(Self::Socket),
            _ => None,
        }
    }

    /// The `S_IF*` bits for this type.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Fifo => S_IFIFO,
            Self::CharDevice => S_IFCHR,
            Self::Directory => S_IFDIR,
            Self::BlockDevice => S_IFBLK,
            Self::Regular => S_IFREG,
            Self::Symlink => S_IFLNK,
            Self::Socket => S_IFSOCK,
        }
    }

    /// Mode the resolver hands to `create` for a node of this type.
    pub const fn default_mode(self) -> u32 {
        match self {
            Self::Directory => S_IFDIR | DEFAULT_DIR_PERMS,
            other => other.bits() | DEFAULT_FILE_PERMS,
        }
    }
}

#[inline]
pub const fn is_reg(mode: u32) -> bool {
    (mode & S_IFMT) == S_IFREG
}

#[inline]
pub const fn is_dir(mode: u32) -> bool {
    (mode & S_IFMT) == S_IFDIR
}

#[inline]
pub const fn is_chr(mode: u32) -> bool {
    (mode & S_IFMT) == S_IFCHR
}

#[inline]
pub const fn is_lnk(mode: u32) -> bool {
    (mode & S_IFMT) == S_IFLNK
}

/// Extract just the file type from mode
#[inline]
pub const fn file_type(mode: u32) -> u32 {
    mode & S_IFMT
}

/// Extract just the permission bits from mode
#[inline]
pub const fn permissions(mode: u32) -> u32 {
    mode & 0o7777
}

/// Create a mode with file type and permissions
#[inline]
pub const fn make_mode(file_type: FileType, perms: u32) -> u32 {
    file_type.bits() | (perms & 0o7777)
}
