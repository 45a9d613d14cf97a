//! Single-instance lock on a file in the data directory
//!
//! Uses an exclusive advisory lock; the holder writes its pid into the file
//! so a second instance can say who is already running. The lock is released
//! when the handle is dropped or the process dies.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::SupervisorResult;
use crate::traits::InstanceLock;
use crate::types::LockAcquisition;
use shared::{process_debug, ComponentId};

/// Real instance lock backed by `fs2`
pub struct FileInstanceLock {
    path: PathBuf,
    held: Mutex<Option<File>>,
}

impl FileInstanceLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            held: Mutex::new(None),
        }
    }

    /// Release the lock if this handle holds it
    pub fn release(&self) {
        if let Ok(mut held) = self.held.lock() {
            if let Some(file) = held.take() {
                let _ = file.unlock();
            }
        }
    }

    fn holder_pid(&self) -> Option<u32> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| content.trim().parse().ok())
    }
}

impl InstanceLock for FileInstanceLock {
    fn try_acquire(&self) -> SupervisorResult<LockAcquisition> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| std::io::Error::other("instance lock state poisoned"))?;
        if held.is_some() {
            return Ok(LockAcquisition::Acquired);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                file.set_len(0)?;
                file.seek(SeekFrom::Start(0))?;
                writeln!(file, "{}", std::process::id())?;
                file.flush()?;
                *held = Some(file);
                process_debug!(ComponentId::current(), "🔒 Acquired instance lock {}", self.path.display());
                Ok(LockAcquisition::Acquired)
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Ok(LockAcquisition::HeldBy(self.holder_pid()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_instance_acquires() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileInstanceLock::new(dir.path().join("supervisor.lock"));

        assert_eq!(lock.try_acquire().unwrap(), LockAcquisition::Acquired);
        // Re-acquiring from the same handle is a no-op
        assert_eq!(lock.try_acquire().unwrap(), LockAcquisition::Acquired);
    }

    #[test]
    fn test_second_instance_sees_holder_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supervisor.lock");
        let first = FileInstanceLock::new(&path);
        let second = FileInstanceLock::new(&path);

        assert_eq!(first.try_acquire().unwrap(), LockAcquisition::Acquired);
        assert_eq!(
            second.try_acquire().unwrap(),
            LockAcquisition::HeldBy(Some(std::process::id()))
        );
    }

    #[test]
    fn test_release_allows_next_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("supervisor.lock");
        let first = FileInstanceLock::new(&path);
        let second = FileInstanceLock::new(&path);

        assert_eq!(first.try_acquire().unwrap(), LockAcquisition::Acquired);
        first.release();
        assert_eq!(second.try_acquire().unwrap(), LockAcquisition::Acquired);
    }
}
