//! TEAM_444: Syscall-shaped entry points
//!
//! Each `sys_*` returns a non-negative result or a negative errno. User
//! memory has already been copied in and validated by the caller.

use los_error::{errno, neg_errno};

use crate::attr::Kstat;
use crate::device::DevId;
use crate::error::VfsResult;
use crate::ops::SeekWhence;
use crate::process::ProcessContext;
use crate::vfs::Vfs;

fn to_ret<T>(result: VfsResult<T>, f: impl FnOnce(T) -> i64) -> i64 {
    match result {
        Ok(v) => f(v),
        Err(e) => e.errno(),
    }
}

fn status(result: VfsResult<()>) -> i64 {
    to_ret(result, |()| 0)
}

/// TEAM_444: sys_open - open (creating if absent), returns fd.
pub fn sys_open<P: ProcessContext + ?Sized>(vfs: &Vfs, proc: &P, path: &str) -> i64 {
    to_ret(vfs.open(proc, path), |fd| fd as i64)
}

pub fn sys_close<P: ProcessContext + ?Sized>(vfs: &Vfs, proc: &P, fd: usize) -> i64 {
    status(vfs.close(proc, fd))
}

pub fn sys_dup<P: ProcessContext + ?Sized>(vfs: &Vfs, proc: &P, fd: usize) -> i64 {
    to_ret(vfs.dup(proc, fd), |fd| fd as i64)
}

pub fn sys_read<P: ProcessContext + ?Sized>(vfs: &Vfs, proc: &P, fd: usize, buf: &mut [u8]) -> i64 {
    to_ret(vfs.read(proc, fd, buf), |n| n as i64)
}

pub fn sys_write<P: ProcessContext + ?Sized>(vfs: &Vfs, proc: &P, fd: usize, buf: &[u8]) -> i64 {
    to_ret(vfs.write(proc, fd, buf), |n| n as i64)
}

pub fn sys_lseek<P: ProcessContext + ?Sized>(
    vfs: &Vfs,
    proc: &P,
    fd: usize,
    offset: i64,
    whence: u32,
) -> i64 {
    let Some(whence) = SeekWhence::from_u32(whence) else {
        return neg_errno(errno::EINVAL);
    };
    match vfs.lseek(proc, fd, offset, whence) {
        Ok(pos) => i64::try_from(pos).unwrap_or_else(|_| neg_errno(errno::EOVERFLOW)),
        Err(e) => e.errno(),
    }
}

/// TEAM_444: sys_stat - fill `out` for `path` without creating it.
pub fn sys_stat<P: ProcessContext + ?Sized>(vfs: &Vfs, proc: &P, path: &str, out: &mut Kstat) -> i64 {
    to_ret(vfs.stat(proc, path), |stat| {
        *out = stat;
        0
    })
}

pub fn sys_fstat<P: ProcessContext + ?Sized>(vfs: &Vfs, proc: &P, fd: usize, out: &mut Kstat) -> i64 {
    to_ret(vfs.fstat(proc, fd), |stat| {
        *out = stat;
        0
    })
}

pub fn sys_truncate<P: ProcessContext + ?Sized>(vfs: &Vfs, proc: &P, path: &str, length: i64) -> i64 {
    let Ok(length) = u64::try_from(length) else {
        return neg_errno(errno::EINVAL);
    };
    status(vfs.truncate(proc, path, length))
}

pub fn sys_ftruncate<P: ProcessContext + ?Sized>(vfs: &Vfs, proc: &P, fd: usize, length: i64) -> i64 {
    let Ok(length) = u64::try_from(length) else {
        return neg_errno(errno::EINVAL);
    };
    status(vfs.ftruncate(proc, fd, length))
}

pub fn sys_mknod<P: ProcessContext + ?Sized>(
    vfs: &Vfs,
    proc: &P,
    path: &str,
    mode: u32,
    dev: u32,
) -> i64 {
    status(vfs.mknod(proc, path, mode, DevId::from_raw(dev)))
}

pub fn sys_mount<P: ProcessContext + ?Sized>(
    vfs: &Vfs,
    proc: &P,
    source: &str,
    target: &str,
    fstype: &str,
) -> i64 {
    to_ret(vfs.mount(&proc.fs(), fstype, source, target), |_| 0)
}

pub fn sys_umount<P: ProcessContext + ?Sized>(vfs: &Vfs, proc: &P, target: &str) -> i64 {
    status(vfs.umount(&proc.fs(), target))
}
