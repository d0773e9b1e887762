// SPDX-License-Identifier: MIT OR Apache-2.0
//! Device and process enumeration on the host.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An instrumentation device (local, USB, remote)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Connection type, e.g. `local` or `usb`
    #[serde(rename = "type")]
    pub kind: String,
}

/// A process visible on a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// Process ID
    pub pid: u32,
    /// Process name
    pub name: String,
}

/// Enumeration failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Device ID not known
    #[error("Device not found: {0}")]
    NotFound(String),

    /// Backend failure
    #[error("Device enumeration failed: {0}")]
    Backend(String),
}

/// Source of devices and processes for the `list_*` nodes
pub trait DeviceCatalog: Send + Sync + 'static {
    /// Every reachable device
    fn devices(&self) -> BoxFuture<'_, Result<Vec<DeviceInfo>, DeviceError>>;

    /// Processes on a device, or on the default device when `None`
    fn processes(&self, device: Option<String>) -> BoxFuture<'_, Result<Vec<ProcessInfo>, DeviceError>>;
}

/// Fixed catalog, used when no backend is attached
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    devices: Vec<(DeviceInfo, Vec<ProcessInfo>)>,
}

impl StaticCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device with its processes. The first device is the default.
    pub fn with_device(mut self, device: DeviceInfo, processes: Vec<ProcessInfo>) -> Self {
        self.devices.push((device, processes));
        self
    }
}

impl DeviceCatalog for StaticCatalog {
    fn devices(&self) -> BoxFuture<'_, Result<Vec<DeviceInfo>, DeviceError>> {
        let devices = self.devices.iter().map(|(d, _)| d.clone()).collect();
        Box::pin(async move { Ok(devices) })
    }

    fn processes(&self, device: Option<String>) -> BoxFuture<'_, Result<Vec<ProcessInfo>, DeviceError>> {
        let found = match &device {
            Some(id) => self.devices.iter().find(|(d, _)| d.id == *id),
            None => self.devices.first(),
        };
        let result = match found {
            Some((_, processes)) => Ok(processes.clone()),
            None => Err(DeviceError::NotFound(device.unwrap_or_else(|| "default".to_string()))),
        };
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new().with_device(
            DeviceInfo {
                id: "local".into(),
                name: "Local System".into(),
                kind: "local".into(),
            },
            vec![ProcessInfo { pid: 42, name: "game".into() }],
        )
    }

    #[tokio::test]
    async fn test_default_device_processes() {
        let catalog = catalog();
        assert_eq!(catalog.devices().await.unwrap().len(), 1);
        assert_eq!(catalog.processes(None).await.unwrap()[0].pid, 42);
        assert_eq!(
            catalog.processes(Some("usb".into())).await,
            Err(DeviceError::NotFound("usb".into()))
        );
    }
}
