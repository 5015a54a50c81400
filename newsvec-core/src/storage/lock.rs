use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use crate::core::errors::{NewsvecError, Result};
use crate::core::utils::current_timestamp_ms;

/// Marker file held for the duration of an ingestion run. Compaction,
/// recode and manual checkpoints refuse to start while it is held.
///
/// A run that crashes leaves the file behind. On Linux a lock whose
/// recorded pid no longer exists is treated as stale and taken over;
/// elsewhere the file has to be removed by hand.
#[derive(Debug)]
pub struct IngestLock {
    path: PathBuf,
}

/// Process recorded in a lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    pub pid: Option<u32>,
    pub acquired_at_ms: Option<u64>,
}

impl LockHolder {
    fn parse(contents: &str) -> Self {
        let mut holder = LockHolder {
            pid: None,
            acquired_at_ms: None,
        };
        for field in contents.split_whitespace() {
            match field.split_once('=') {
                Some(("pid", v)) => holder.pid = v.parse().ok(),
                Some(("acquired_at_ms", v)) => holder.acquired_at_ms = v.parse().ok(),
                _ => {}
            }
        }
        holder
    }

    /// Whether the recorded process is known to be gone.
    #[cfg(target_os = "linux")]
    fn is_dead(&self) -> bool {
        let proc_root = Path::new("/proc");
        match self.pid {
            Some(pid) => proc_root.join("self").exists() && !proc_root.join(pid.to_string()).exists(),
            None => false,
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn is_dead(&self) -> bool {
        false
    }
}

impl fmt::Display for LockHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pid {
            Some(pid) => write!(f, "held by pid {}", pid)?,
            None => write!(f, "held by an unknown process")?,
        }
        if let Some(at) = self.acquired_at_ms {
            write!(f, " since {} ms", at)?;
        }
        Ok(())
    }
}

impl IngestLock {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = match Self::create(&path)? {
            Some(file) => file,
            None => {
                let holder = Self::read_holder(&path);
                match holder {
                    Some(holder) if holder.is_dead() => {
                        warn!(path = %path.display(), holder = %holder, "Removing stale ingest lock");
                        fs::remove_file(&path)?;
                        Self::create(&path)?.ok_or_else(|| Self::locked(&path, None))?
                    }
                    holder => return Err(Self::locked(&path, holder.as_ref())),
                }
            }
        };
        writeln!(file, "pid={} acquired_at_ms={}", std::process::id(), current_timestamp_ms())?;
        file.sync_all()?;
        debug!(path = %path.display(), "Acquired ingest lock");
        Ok(IngestLock { path })
    }

    /// `None` when the file already exists.
    fn create(path: &Path) -> Result<Option<File>> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn locked(path: &Path, holder: Option<&LockHolder>) -> NewsvecError {
        let holder = holder.map_or_else(|| "held".to_string(), |h| h.to_string());
        NewsvecError::MaintenanceLocked(format!(
            "ingest lock {} at {}; remove the file if that process is gone",
            holder,
            path.display()
        ))
    }

    fn read_holder(path: &Path) -> Option<LockHolder> {
        match fs::read_to_string(path) {
            Ok(contents) => Some(LockHolder::parse(&contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(_) => Some(LockHolder {
                pid: None,
                acquired_at_ms: None,
            }),
        }
    }

    /// Current holder of the lock at `path`, ignoring stale locks.
    pub fn holder(path: &Path) -> Option<LockHolder> {
        Self::read_holder(path).filter(|holder| !holder.is_dead())
    }

    pub fn is_held(path: &Path) -> bool {
        Self::holder(path).is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IngestLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to release ingest lock");
        }
    }
}
