// Persistence seam for energy state
use crate::domain::persisted::PersistedEnergyState;
use async_trait::async_trait;

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Last saved state for a device, if any
    async fn load(&self, device_id: &str) -> anyhow::Result<Option<PersistedEnergyState>>;

    async fn save(&self, device_id: &str, state: &PersistedEnergyState) -> anyhow::Result<()>;
}
