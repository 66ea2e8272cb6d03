//! Platform shims: durability barriers, file preallocation, and advisory
//! locking.

use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::path::Path;

use fs2::FileExt;

use crate::error::{WalError, WalResult};

/// Synchronous durability barrier.
///
/// Fsync on Darwin flushes data to the drive, but the drive may hold it
/// in its own cache for quite some time and may write out of order.
/// `F_FULLFSYNC` forces the drive's buffer onto the persistent media.
#[cfg(target_os = "macos")]
pub(crate) fn fsync(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let ret = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_FULLFSYNC) };
    if ret == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Synchronous durability barrier.
#[cfg(not(target_os = "macos"))]
pub(crate) fn fsync(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Reserves `size_bytes` of space for the file.
///
/// If the filesystem does not support allocation the truncate fallback
/// is used instead. `size_bytes == 0` is a no-op.
pub(crate) fn preallocate(file: &File, size_bytes: u64) -> io::Result<()> {
    if size_bytes == 0 {
        return Ok(());
    }
    prealloc_extend(file, size_bytes)
}

#[cfg(target_os = "linux")]
fn prealloc_extend(file: &File, size_bytes: u64) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    // mode 0 changes the file size
    let ret = unsafe { libc::fallocate(file.as_raw_fd(), 0, 0, size_bytes as libc::off_t) };
    if ret == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::EOPNOTSUPP) | Some(libc::EINTR) => prealloc_extend_trunc(file, size_bytes),
        _ => Err(err),
    }
}

#[cfg(target_os = "macos")]
fn prealloc_extend(file: &File, size_bytes: u64) -> io::Result<()> {
    prealloc_fixed(file, size_bytes)?;
    prealloc_extend_trunc(file, size_bytes)
}

#[cfg(target_os = "macos")]
fn prealloc_fixed(file: &File, size_bytes: u64) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let mut fstore = libc::fstore_t {
        fst_flags: libc::F_ALLOCATEALL,
        fst_posmode: libc::F_PEOFPOSMODE,
        fst_offset: 0,
        fst_length: size_bytes as libc::off_t,
        fst_bytesalloc: 0,
    };

    let ret = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_PREALLOCATE, &mut fstore) };
    if ret != -1 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::ENOTSUP) | Some(libc::EINTR) => Ok(()),
        _ => Err(err),
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn prealloc_extend(file: &File, size_bytes: u64) -> io::Result<()> {
    prealloc_extend_trunc(file, size_bytes)
}

/// Extends the file to `size_bytes` with a seek and truncate, restoring
/// the current offset afterwards.
fn prealloc_extend_trunc(file: &File, size_bytes: u64) -> io::Result<()> {
    let mut f = file;
    let cur = f.stream_position()?;
    let end = f.seek(SeekFrom::End(size_bytes as i64))?;
    f.seek(SeekFrom::Start(cur))?;
    if end < size_bytes {
        return Ok(());
    }
    file.set_len(size_bytes)
}

/// Takes an exclusive advisory lock on the file without blocking.
///
/// Contention fails immediately with [`WalError::AlreadyLocked`]. The
/// lock is released when every handle to the file is closed.
pub(crate) fn lock_file_nonblocking(file: &File, path: &Path) -> WalResult<()> {
    match file.try_lock_exclusive() {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(WalError::AlreadyLocked {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use tempfile::tempdir;

    #[test]
    fn test_lock_and_unlock() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lock");
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .unwrap();
        lock_file_nonblocking(&file, &path).unwrap();

        // a second descriptor must contend
        let file2 = OpenOptions::new().write(true).open(&path).unwrap();
        assert!(matches!(
            lock_file_nonblocking(&file2, &path),
            Err(WalError::AlreadyLocked { .. })
        ));

        // closing the first descriptor releases the lock
        drop(file);
        lock_file_nonblocking(&file2, &path).unwrap();
    }

    #[test]
    fn test_preallocate_extends_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prealloc");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .unwrap();

        preallocate(&file, 4096).unwrap();
        assert_eq!(file.metadata().unwrap().len(), 4096);
    }

    #[test]
    fn test_preallocate_zero_is_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .unwrap();

        preallocate(&file, 0).unwrap();
        assert_eq!(file.metadata().unwrap().len(), 0);
    }

    #[test]
    fn test_preallocate_preserves_offset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("offset");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .unwrap();

        preallocate(&file, 1024).unwrap();
        let mut f = &file;
        assert_eq!(f.stream_position().unwrap(), 0);
    }
}
