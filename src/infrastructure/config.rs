use crate::infrastructure::json_state_store::file_stem;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_DISCOVERY_URL: &str = "https://find-my.sonnen-batterie.com/find";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_discovery_url")]
    pub discovery_url: String,
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    /// Serial number, used to find the device again if its address changes
    pub id: String,
    pub address: String,
    pub token: String,
}

impl AppConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_discovery_url() -> String {
    DEFAULT_DISCOVERY_URL.to_string()
}

fn default_state_dir() -> String {
    "state".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

/// Load `config/sonnen.*`, overridden by `SONNEN__*` environment variables.
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    load_app_config_from(config::File::with_name("config/sonnen").required(false))
}

fn load_app_config_from<S>(source: S) -> anyhow::Result<AppConfig>
where
    S: config::Source + Send + Sync + 'static,
{
    let settings = config::Config::builder()
        .add_source(source)
        .add_source(config::Environment::with_prefix("SONNEN").separator("__"))
        .build()?;

    let config: AppConfig = settings.try_deserialize()?;
    validate_devices(&config.devices)?;
    Ok(config)
}

/// Ids must be non-empty and map to distinct state files.
fn validate_devices(devices: &[DeviceConfig]) -> anyhow::Result<()> {
    let mut stems: HashMap<String, &str> = HashMap::new();
    for device in devices {
        if device.id.trim().is_empty() {
            anyhow::bail!("device with address {} has an empty id", device.address);
        }
        if let Some(existing) = stems.insert(file_stem(&device.id), &device.id) {
            if existing == device.id {
                anyhow::bail!("device id {} is configured twice", device.id);
            }
            anyhow::bail!(
                "device ids {} and {} would share a state file",
                existing,
                device.id
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    #[test]
    fn test_defaults_apply() {
        let config = load_app_config_from(File::from_str("", FileFormat::Toml)).unwrap();

        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.discovery_url, DEFAULT_DISCOVERY_URL);
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_devices_parse() {
        let toml = r#"
            poll_interval_secs = 15
            state_dir = "/var/lib/sonnen"

            [[devices]]
            id = "123456"
            address = "192.168.1.40"
            token = "secret"
        "#;
        let config = load_app_config_from(File::from_str(toml, FileFormat::Toml)).unwrap();

        assert_eq!(config.poll_interval(), Duration::from_secs(15));
        assert_eq!(config.state_dir, "/var/lib/sonnen");
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].id, "123456");
        assert_eq!(config.devices[0].address, "192.168.1.40");
    }

    #[test]
    fn test_empty_device_id_is_rejected() {
        let toml = r#"
            [[devices]]
            id = " "
            address = "192.168.1.40"
            token = "secret"
        "#;
        assert!(load_app_config_from(File::from_str(toml, FileFormat::Toml)).is_err());
    }

    #[test]
    fn test_duplicate_device_id_is_rejected() {
        let toml = r#"
            [[devices]]
            id = "123456"
            address = "192.168.1.40"
            token = "secret"

            [[devices]]
            id = "123456"
            address = "192.168.1.41"
            token = "secret"
        "#;
        let err = load_app_config_from(File::from_str(toml, FileFormat::Toml)).unwrap_err();
        assert!(err.to_string().contains("configured twice"), "{err}");
    }

    #[test]
    fn test_colliding_state_files_are_rejected() {
        let toml = r#"
            [[devices]]
            id = "a b"
            address = "192.168.1.40"
            token = "secret"

            [[devices]]
            id = "a_b"
            address = "192.168.1.41"
            token = "secret"
        "#;
        let err = load_app_config_from(File::from_str(toml, FileFormat::Toml)).unwrap_err();
        assert!(err.to_string().contains("share a state file"), "{err}");
    }
}
