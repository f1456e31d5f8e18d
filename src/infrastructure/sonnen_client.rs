// sonnenBatterie local REST API client
use crate::application::battery_gateway::{BatteryReader, BatteryReading, FetchError, base_url};
use crate::domain::energy::PowerSample;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Clone)]
pub struct SonnenClient {
    client: reqwest::Client,
    token: String,
}

#[derive(Debug, Deserialize)]
struct LatestData {
    #[serde(rename = "Production_W")]
    production_w: f64,
    #[serde(rename = "Consumption_W")]
    consumption_w: f64,
    #[serde(rename = "GridFeedIn_W")]
    grid_feed_in_w: f64,
    #[serde(rename = "Pac_total_W")]
    pac_total_w: f64,
    #[serde(rename = "USOC")]
    usoc: f64,
    #[serde(rename = "Timestamp")]
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct BatteryData {
    cyclecount: f64,
}

/// Only the serial is read out of the configuration dump.
#[derive(Debug, Deserialize)]
struct Configurations {
    #[serde(rename = "DE_Ticket_Number", default)]
    serial: Value,
}

impl SonnenClient {
    pub fn new(token: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            token: token.into(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url)
            .header("Auth-Token", &self.token)
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
        serde_json::from_str(&body)
            .map_err(|e| FetchError::MalformedPayload(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl BatteryReader for SonnenClient {
    async fn fetch_latest_reading(&self, address: &str) -> Result<BatteryReading, FetchError> {
        let base = base_url(address);
        let configurations: Configurations =
            self.get_json(&format!("{}/api/v2/configurations", base)).await?;
        let device_id = serial(configurations)?;
        let latest: LatestData = self.get_json(&format!("{}/api/v2/latestdata", base)).await?;
        let battery: BatteryData = self.get_json(&format!("{}/api/v2/battery", base)).await?;

        tracing::debug!("Latest data from {} ({}): {:?}", base, device_id, latest);
        Ok(BatteryReading {
            device_id,
            sample: to_sample(latest, battery)?,
        })
    }
}

fn serial(configurations: Configurations) -> Result<String, FetchError> {
    let serial = match configurations.serial {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(FetchError::MalformedPayload(format!(
                "missing device serial, got {}",
                other
            )));
        }
    };
    if serial.is_empty() {
        return Err(FetchError::MalformedPayload("empty device serial".to_string()));
    }
    Ok(serial)
}

fn to_sample(latest: LatestData, battery: BatteryData) -> Result<PowerSample, FetchError> {
    let timestamp = parse_timestamp(&latest.timestamp)?;
    if !battery.cyclecount.is_finite() || battery.cyclecount < 0.0 {
        return Err(FetchError::MalformedPayload(format!(
            "invalid cycle count {}",
            battery.cyclecount
        )));
    }

    Ok(PowerSample {
        production_w: latest.production_w,
        consumption_w: latest.consumption_w,
        grid_feed_in_w: latest.grid_feed_in_w,
        battery_power_w: latest.pac_total_w,
        battery_soc_pct: latest.usoc,
        cycle_count: battery.cyclecount.round() as u64,
        timestamp,
    })
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, FetchError> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| FetchError::MalformedPayload(format!("unparseable timestamp '{}'", raw)))
}
