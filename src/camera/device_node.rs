use super::gateway::MediaGateway;
use super::types::{
    DeviceInfo, DeviceSelector, MediaStream, MediaTrack, PermissionState, StreamConstraints,
};
use crate::config::CameraConfig;
use crate::error::CameraError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Gateway over V4L2 device nodes (`/dev/videoN`).
///
/// A stream holds its device node open until released. Labels come from
/// sysfs and device ids are the node paths.
pub struct DeviceNodeGateway {
    device_root: PathBuf,
    sysfs_root: PathBuf,
    open: Mutex<HashMap<Uuid, File>>,
}

impl DeviceNodeGateway {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(device_root: P, sysfs_root: Q) -> Self {
        Self {
            device_root: device_root.as_ref().to_path_buf(),
            sysfs_root: sysfs_root.as_ref().to_path_buf(),
            open: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(&config.device_root, &config.sysfs_root)
    }

    /// Number of device nodes currently held open.
    pub fn open_streams(&self) -> usize {
        self.open.lock().len()
    }

    fn scan(&self) -> io::Result<Vec<(u32, PathBuf)>> {
        let mut nodes = Vec::new();
        for entry in std::fs::read_dir(&self.device_root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(index) = name
                .to_str()
                .and_then(|name| name.strip_prefix("video"))
                .and_then(|suffix| suffix.parse::<u32>().ok())
            else {
                continue;
            };
            nodes.push((index, entry.path()));
        }
        nodes.sort_by_key(|(index, _)| *index);
        Ok(nodes)
    }

    fn label_for(&self, index: u32) -> String {
        let path = self.sysfs_root.join(format!("video{}", index)).join("name");
        match std::fs::read_to_string(&path) {
            Ok(name) => name.trim().to_string(),
            Err(e) => {
                debug!("No sysfs name at {}: {}", path.display(), e);
                String::new()
            }
        }
    }

    fn resolve(&self, selector: &DeviceSelector) -> Result<PathBuf, CameraError> {
        match selector {
            DeviceSelector::Exact(id) => Ok(PathBuf::from(id)),
            // Device nodes carry no facing information
            DeviceSelector::Facing(_) | DeviceSelector::Any => {
                let nodes = self.scan().map_err(|e| CameraError::Enumeration {
                    details: e.to_string(),
                })?;
                nodes
                    .into_iter()
                    .next()
                    .map(|(_, path)| path)
                    .ok_or(CameraError::NotAvailable)
            }
        }
    }
}

fn map_open_error(device: &Path, e: io::Error) -> CameraError {
    let device = device.display().to_string();

    #[cfg(unix)]
    let busy = e.raw_os_error() == Some(libc::EBUSY);
    #[cfg(not(unix))]
    let busy = false;
    if busy {
        return CameraError::DeviceBusy { device };
    }

    match e.kind() {
        io::ErrorKind::PermissionDenied => CameraError::PermissionDenied {
            details: format!("{}: {}", device, e),
        },
        io::ErrorKind::NotFound => CameraError::DeviceNotFound { device },
        _ => CameraError::Hardware {
            device,
            details: e.to_string(),
        },
    }
}

#[async_trait]
impl MediaGateway for DeviceNodeGateway {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        let nodes = self.scan().map_err(|e| CameraError::Enumeration {
            details: format!("{}: {}", self.device_root.display(), e),
        })?;

        Ok(nodes
            .into_iter()
            .map(|(index, path)| DeviceInfo::new(path.display().to_string(), self.label_for(index)))
            .collect())
    }

    async fn acquire(&self, constraints: &StreamConstraints) -> Result<MediaStream, CameraError> {
        let path = self.resolve(&constraints.device)?;
        debug!("Opening camera device {}", path.display());

        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .await
            .map_err(|e| map_open_error(&path, e))?
            .into_std()
            .await;

        let label = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix("video"))
            .and_then(|suffix| suffix.parse::<u32>().ok())
            .map(|index| self.label_for(index))
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| path.display().to_string());

        let stream = MediaStream::new(
            path.display().to_string(),
            constraints.ideal_resolution,
            vec![MediaTrack::video(label)],
        );
        self.open.lock().insert(stream.id(), file);
        info!("Camera device {} opened", path.display());
        Ok(stream)
    }

    fn release(&self, stream: &MediaStream) {
        match self.open.lock().remove(&stream.id()) {
            Some(_file) => debug!("Camera device {} closed", stream.device_id()),
            None => warn!("Release of unknown stream {}", stream.id()),
        }
    }

    async fn query_permission(&self) -> Option<PermissionState> {
        None
    }

    fn name(&self) -> &str {
        "v4l2"
    }
}
