use crate::error::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Durable storage for the "camera permission previously granted" flag.
pub trait PermissionStore: Send + Sync {
    fn load_granted(&self) -> bool;
    fn save_granted(&self, granted: bool) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedPermission {
    camera_permission_granted: bool,
    updated_at: DateTime<Utc>,
}

/// JSON file backed store.
#[derive(Debug, Clone)]
pub struct FilePermissionStore {
    path: PathBuf,
}

impl FilePermissionStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PermissionStore for FilePermissionStore {
    fn load_granted(&self) -> bool {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!("No persisted permission at {}: {}", self.path.display(), e);
                return false;
            }
        };

        match serde_json::from_str::<PersistedPermission>(&contents) {
            Ok(persisted) => persisted.camera_permission_granted,
            Err(e) => {
                warn!(
                    "Ignoring unreadable permission state at {}: {}",
                    self.path.display(),
                    e
                );
                false
            }
        }
    }

    fn save_granted(&self, granted: bool) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let persisted = PersistedPermission {
            camera_permission_granted: granted,
            updated_at: Utc::now(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&persisted)?)?;
        debug!("Persisted camera permission {} to {}", granted, self.path.display());
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    granted: Mutex<bool>,
}

impl MemoryPermissionStore {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: Mutex::new(granted),
        }
    }
}

impl PermissionStore for MemoryPermissionStore {
    fn load_granted(&self) -> bool {
        *self.granted.lock()
    }

    fn save_granted(&self, granted: bool) -> Result<()> {
        *self.granted.lock() = granted;
        Ok(())
    }
}
