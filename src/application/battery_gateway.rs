// Collaborator traits for talking to storage systems
use crate::domain::energy::PowerSample;
use async_trait::async_trait;
use thiserror::Error;

/// Why a reading could not be obtained. All variants are transient from the
/// sampler's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("device responded with status {status}")]
    Status { status: u16 },
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("expected device {expected}, found {found}")]
    IdentityMismatch { expected: String, found: String },
}

/// A power sample together with the serial of the device that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryReading {
    pub device_id: String,
    pub sample: PowerSample,
}

/// A storage system found on the local network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Stable identity (serial number)
    pub device_id: String,
    pub address: String,
}

#[async_trait]
pub trait BatteryReader: Send + Sync {
    async fn fetch_latest_reading(&self, address: &str) -> Result<BatteryReading, FetchError>;
}

#[async_trait]
pub trait DeviceDiscovery: Send + Sync {
    async fn discover_devices(&self) -> Result<Vec<DiscoveredDevice>, FetchError>;
}

/// Base URL for an address given as `host`, `host:port` or a full URL.
pub fn base_url(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

pub fn same_address(a: &str, b: &str) -> bool {
    base_url(a).eq_ignore_ascii_case(&base_url(b))
}

pub fn same_device(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}
