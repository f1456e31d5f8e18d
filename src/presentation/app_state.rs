// Application state for HTTP handlers
use crate::application::energy_monitor::EnergyMonitor;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Keyed by device id
    pub monitors: BTreeMap<String, Arc<EnergyMonitor>>,
}
