use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Advisory lock held while a file is being rewritten.
///
/// Uses flock (Unix) on a sibling `<file>.lock`. The lock file stays in
/// place after release so every locker contends on the same inode.
pub struct StoreLock {
    _file: File,
}

/// Error type for lock operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not create lock file at {path}: {source}")]
    CreateError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not lock {path}: another tb process may be writing")]
    Timeout { path: PathBuf },
}

impl StoreLock {
    /// Lock `target`, waiting up to `timeout`
    pub fn acquire(target: &Path, timeout: Duration) -> Result<Self, LockError> {
        let (file, lock_path) = open_lock_file(target)?;
        let start = Instant::now();
        while try_lock(&file).is_err() {
            if start.elapsed() >= timeout {
                return Err(LockError::Timeout { path: lock_path });
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(StoreLock { _file: file })
    }

    /// Acquire with the default timeout (2 seconds)
    pub fn acquire_default(target: &Path) -> Result<Self, LockError> {
        Self::acquire(target, Duration::from_secs(2))
    }

    /// Lock `target` only if nobody else holds it
    pub fn try_acquire(target: &Path) -> Option<Self> {
        let (file, _) = open_lock_file(target).ok()?;
        try_lock(&file).ok()?;
        Some(StoreLock { _file: file })
    }
}

fn open_lock_file(target: &Path) -> Result<(File, PathBuf), LockError> {
    let lock_path = lock_path_for(target);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| LockError::CreateError {
            path: lock_path.clone(),
            source: e,
        })?;
    Ok((file, lock_path))
}

fn lock_path_for(store_path: &Path) -> PathBuf {
    let mut name = store_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "store".into());
    name.push(".lock");
    store_path.with_file_name(name)
}

#[cfg(unix)]
fn try_lock(file: &File) -> Result<(), std::io::Error> {
    use std::os::unix::io::AsRawFd;
    let fd = file.as_raw_fd();
    let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> Result<(), std::io::Error> {
    Ok(())
}
