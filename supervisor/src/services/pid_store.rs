//! File-backed process identity record
//!
//! The record is a single decimal pid in a text file inside the
//! application data directory. Absence is the normal state after a clean
//! shutdown; anything unreadable is treated as absent.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;

use crate::error::SupervisorResult;
use crate::traits::PidStore;
use shared::{process_debug, process_warn, ComponentId};

/// Real pid store backed by one file
pub struct FilePidStore {
    path: PathBuf,
}

impl FilePidStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl PidStore for FilePidStore {
    async fn write(&self, pid: u32) -> SupervisorResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Write-then-rename so a crash never leaves a half-written record
        let temp = self.temp_path();
        fs::write(&temp, format!("{pid}\n")).await?;
        fs::rename(&temp, &self.path).await?;

        process_debug!(ComponentId::current(), "📝 Recorded backend pid {} in {}", pid, self.path.display());
        Ok(())
    }

    async fn read(&self) -> Option<u32> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                process_warn!(ComponentId::current(), "⚠️ Could not read pid record {}: {}", self.path.display(), e);
                return None;
            }
        };

        match content.trim().parse::<u32>() {
            Ok(pid) if pid > 0 => Some(pid),
            _ => {
                process_warn!(
                    ComponentId::current(),
                    "⚠️ Ignoring unparsable pid record {}: {:?}",
                    self.path.display(),
                    content.trim()
                );
                None
            }
        }
    }

    async fn clear(&self) -> SupervisorResult<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                process_debug!(ComponentId::current(), "🧹 Cleared pid record {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
