use crate::error::{ErrorCode, SddError};
use fs2::FileExt;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

/// Advisory lock errors for the work-item store.
#[derive(Debug)]
pub enum LockError {
    Timeout { path: PathBuf, waited: Duration },
    IoError { path: PathBuf, source: io::Error },
}

impl LockError {
    /// Machine-readable code associated with this lock error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::IoError { .. } => ErrorCode::StoreWriteFailed,
        }
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { path, waited } => {
                write!(
                    f,
                    "{}: lock timed out after {:?} at {}",
                    self.code().code(),
                    waited,
                    path.display()
                )
            }
            Self::IoError { path, source } => {
                write!(f, "{}: {} ({})", self.code().code(), source, path.display())
            }
        }
    }
}

impl std::error::Error for LockError {}

impl From<LockError> for SddError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Timeout { path, waited } => Self::ConcurrentModification { path, waited },
            LockError::IoError { path, source } => Self::Io { path, source },
        }
    }
}

#[derive(Clone, Copy)]
enum LockKind {
    Shared,
    Exclusive,
}

#[derive(Debug)]
struct FileGuard {
    file: File,
    path: PathBuf,
}

impl FileGuard {
    fn acquire(path: &Path, timeout: Duration, kind: LockKind) -> Result<Self, LockError> {
        let io_err = |source| LockError::IoError {
            path: path.to_path_buf(),
            source,
        };
        let parent = path.parent().ok_or_else(|| {
            io_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "lock path has no parent",
            ))
        })?;
        fs::create_dir_all(parent).map_err(io_err)?;

        let start = Instant::now();
        let mut warned = false;
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)
                .map_err(io_err)?;

            let contended = match kind {
                LockKind::Shared => file.try_lock_shared().is_err(),
                LockKind::Exclusive => file.try_lock_exclusive().is_err(),
            };

            if !contended {
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }

            if start.elapsed() >= timeout {
                tracing::warn!(path = %path.display(), ?timeout, "store lock not acquired");
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }

            if !warned {
                tracing::debug!(path = %path.display(), "store lock held elsewhere, waiting");
                warned = true;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn release(self) {
        let _ = self.file.unlock();
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// RAII guard for the exclusive lock held across a read-modify-write.
#[derive(Debug)]
pub struct StoreLock {
    guard: FileGuard,
}

impl StoreLock {
    /// Acquire an exclusive advisory lock on the lock path.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        Ok(Self {
            guard: FileGuard::acquire(path, timeout, LockKind::Exclusive)?,
        })
    }

    /// Explicitly release the lock. Release also happens automatically on drop.
    pub fn release(self) {
        self.guard.release();
    }

    /// Return the lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.guard.path()
    }
}

/// RAII guard for a shared lock held while reading a snapshot.
#[derive(Debug)]
pub struct ReadLock {
    guard: FileGuard,
}

impl ReadLock {
    /// Acquire a shared advisory lock on the lock path.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        Ok(Self {
            guard: FileGuard::acquire(path, timeout, LockKind::Shared)?,
        })
    }

    /// Explicitly release the lock. Release also happens automatically on drop.
    pub fn release(self) {
        self.guard.release();
    }
}

#[cfg(test)]
mod tests {
    use super::{LockError, ReadLock, StoreLock};
    use crate::error::{ErrorCode, SddError};
    use std::{
        sync::{Arc, Barrier},
        thread,
        time::Duration,
    };

    #[test]
    fn store_lock_allows_acquire_and_release() -> Result<(), LockError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lock");
        let lock = StoreLock::acquire(&path, Duration::from_millis(50))?;
        assert_eq!(lock.path(), path.as_path());
        lock.release();
        Ok(())
    }

    #[test]
    fn store_lock_times_out_when_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lock");
        let _guard = StoreLock::acquire(&path, Duration::from_millis(50)).unwrap();
        let err = StoreLock::acquire(&path, Duration::from_millis(20)).unwrap_err();

        assert!(matches!(err, LockError::Timeout { path: ref p, .. } if *p == path));
        assert_eq!(err.code(), ErrorCode::LockContention);
    }

    #[test]
    fn timeout_converts_to_concurrent_modification() {
        let err: SddError = LockError::Timeout {
            path: "x/lock".into(),
            waited: Duration::from_millis(10),
        }
        .into();
        assert!(matches!(err, SddError::ConcurrentModification { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn read_locks_are_compatible() -> Result<(), LockError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lock");
        let first = ReadLock::acquire(&path, Duration::from_millis(50))?;
        let second = ReadLock::acquire(&path, Duration::from_millis(50))?;

        first.release();
        second.release();
        Ok(())
    }

    #[test]
    fn writer_blocks_readers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lock");
        let _write = StoreLock::acquire(&path, Duration::from_millis(50)).unwrap();

        let started = std::time::Instant::now();
        let read = ReadLock::acquire(&path, Duration::from_millis(20));

        assert!(matches!(read, Err(LockError::Timeout { .. })));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn contention_is_resolved_after_writer_releases() -> Result<(), LockError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lock");

        let blocker = Arc::new(Barrier::new(2));
        let waiter = Arc::new(Barrier::new(2));

        let blocker_thread = Arc::clone(&blocker);
        let waiter_thread = Arc::clone(&waiter);
        let path_in_thread = path.clone();
        let handle = thread::spawn(move || {
            let _writer = StoreLock::acquire(&path_in_thread, Duration::from_millis(200)).unwrap();
            blocker_thread.wait();
            waiter_thread.wait();
        });

        blocker.wait();
        assert!(matches!(
            StoreLock::acquire(&path, Duration::from_millis(20)),
            Err(LockError::Timeout { .. })
        ));
        waiter.wait();
        handle.join().unwrap();

        let follow_up = StoreLock::acquire(&path, Duration::from_millis(50))?;
        follow_up.release();
        Ok(())
    }
}
