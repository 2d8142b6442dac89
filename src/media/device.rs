use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{RecorderError, Result};

/// What a device is currently bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceUse {
    /// Held by a recording session
    Capture,
    /// Bound to the playback surface as a live preview
    Preview,
}

impl fmt::Display for DeviceUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceUse::Capture => write!(f, "capture"),
            DeviceUse::Preview => write!(f, "preview"),
        }
    }
}

/// Exclusive device bindings shared by the recorder and the player
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    held: Arc<Mutex<HashMap<String, DeviceUse>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `device` exclusively; fails with `ResourceBusy` if already bound
    pub fn claim(&self, device: &str, usage: DeviceUse) -> Result<DeviceClaim> {
        let mut held = self.held.lock();
        if let Some(current) = held.get(device) {
            return Err(RecorderError::ResourceBusy(format!(
                "device '{}' is in use for {}",
                device, current
            )));
        }
        held.insert(device.to_string(), usage);
        debug!("Device '{}' claimed for {}", device, usage);

        Ok(DeviceClaim {
            registry: self.clone(),
            device: device.to_string(),
            usage,
        })
    }

    pub fn holder(&self, device: &str) -> Option<DeviceUse> {
        self.held.lock().get(device).copied()
    }

    fn unbind(&self, device: &str) {
        self.held.lock().remove(device);
        debug!("Device '{}' released", device);
    }
}

/// Binding released on drop
#[derive(Debug)]
pub struct DeviceClaim {
    registry: DeviceRegistry,
    device: String,
    usage: DeviceUse,
}

impl DeviceClaim {
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn usage(&self) -> DeviceUse {
        self.usage
    }
}

impl Drop for DeviceClaim {
    fn drop(&mut self) {
        self.registry.unbind(&self.device);
    }
}
