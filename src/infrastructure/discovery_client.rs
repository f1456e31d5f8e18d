// Vendor discovery service client
use crate::application::battery_gateway::{DeviceDiscovery, DiscoveredDevice, FetchError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct FoundDevice {
    #[serde(default)]
    device: Value,
    #[serde(default)]
    lanip: Option<String>,
}

impl DiscoveryClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl DeviceDiscovery for DiscoveryClient {
    async fn discover_devices(&self) -> Result<Vec<DiscoveredDevice>, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let found: Vec<FoundDevice> = serde_json::from_str(&body)
            .map_err(|e| FetchError::MalformedPayload(e.to_string()))?;

        Ok(found.into_iter().filter_map(to_discovered).collect())
    }
}

/// The service reports the serial as a number or a string depending on the
/// firmware. Entries without a LAN address are skipped.
fn to_discovered(found: FoundDevice) -> Option<DiscoveredDevice> {
    let device_id = match found.device {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let address = found.lanip.filter(|ip| !ip.trim().is_empty())?;

    Some(DiscoveredDevice {
        device_id,
        address: address.trim().to_string(),
    })
}
