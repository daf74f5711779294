use std::path::Path;

use tracing::info;
use v4l::capability::Flags;
use v4l::Device;

use crate::source::SourceError;

/// Device node for a camera index
pub fn device_node(index: u32) -> String {
    format!("/dev/video{index}")
}

/// Verify that a camera index maps to a real capture device before any
/// pipeline is built, so a bad index fails the same way a missing file does.
pub fn probe_device(index: u32) -> Result<String, SourceError> {
    let path = device_node(index);
    if !Path::new(&path).exists() {
        return Err(SourceError::NotFound(path));
    }

    let device =
        Device::with_path(&path).map_err(|_| SourceError::NotFound(path.clone()))?;
    let caps = device
        .query_caps()
        .map_err(|_| SourceError::NotFound(path.clone()))?;

    if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
        return Err(SourceError::NotFound(format!(
            "{path} does not support video capture"
        )));
    }

    info!("Found capture device: {} - {}", path, caps.card);
    Ok(path)
}
