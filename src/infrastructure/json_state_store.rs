// JSON file persistence, one file per device
use crate::application::state_store::StateStore;
use crate::domain::persisted::PersistedEnergyState;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    dir: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, device_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(device_id)))
    }
}

/// File name (without extension) used for a device's state.
pub fn file_stem(device_id: &str) -> String {
    device_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn load(&self, device_id: &str) -> Result<Option<PersistedEnergyState>> {
        let path = self.path_for(device_id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        let record = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(record))
    }

    async fn save(&self, device_id: &str, state: &PersistedEnergyState) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let path = self.path_for(device_id);
        let tmp_path = path.with_extension("json.tmp");
        let contents = serde_json::to_vec_pretty(state).context("Failed to serialize state")?;

        // Write-then-rename keeps the previous file intact until the new one is complete
        tokio::fs::write(&tmp_path, contents)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        tracing::debug!("Saved state for {} to {}", device_id, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::energy::EnergyState;

    #[tokio::test]
    async fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path());

        assert_eq!(store.load("123456").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("nested"));
        let mut state = EnergyState::new();
        state.totals.grid_feed_in_wh = 321.5;

        store.save("123456", &state.to_persisted()).await.unwrap();
        let loaded = store.load("123456").await.unwrap();

        assert_eq!(loaded, Some(state.to_persisted()));
        assert!(!dir.path().join("nested/123456.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("123456.json"), "{ not json").unwrap();
        let store = JsonFileStateStore::new(dir.path());

        assert!(store.load("123456").await.is_err());
    }

    #[test]
    fn test_device_id_is_sanitized() {
        let store = JsonFileStateStore::new("/tmp/state");
        assert_eq!(
            store.path_for("../evil id"),
            PathBuf::from("/tmp/state/___evil_id.json")
        );
    }
}
