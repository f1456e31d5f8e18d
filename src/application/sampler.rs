// Sampler - one fetch/integrate cycle with address rediscovery
use crate::application::battery_gateway::{
    BatteryReader, DeviceDiscovery, FetchError, same_address, same_device,
};
use crate::domain::accumulator;
use crate::domain::energy::{EnergyState, PowerSample};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Connected,
    /// A fetch failed and discovery or the retry is in flight.
    Rediscovering,
    /// Last tick gave up; state is held until the next tick.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Updated {
        state: EnergyState,
        sample: PowerSample,
    },
    /// No reading this tick. Carries the previous state unchanged.
    Held { state: EnergyState },
}

/// Failure path of a tick.
pub fn hold(previous: &EnergyState) -> TickOutcome {
    TickOutcome::Held {
        state: previous.clone(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Initial,
    AfterRediscovery,
}

pub struct Sampler {
    device_id: String,
    address: String,
    reader: Arc<dyn BatteryReader>,
    discovery: Arc<dyn DeviceDiscovery>,
    connectivity: watch::Sender<Connectivity>,
}

impl Sampler {
    pub fn new(
        device_id: String,
        address: String,
        reader: Arc<dyn BatteryReader>,
        discovery: Arc<dyn DeviceDiscovery>,
    ) -> Self {
        let (connectivity, _) = watch::channel(Connectivity::Connected);
        Self {
            device_id,
            address,
            reader,
            discovery,
            connectivity,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Follows connectivity as it changes, including mid-tick.
    pub fn watch_connectivity(&self) -> watch::Receiver<Connectivity> {
        self.connectivity.subscribe()
    }

    /// Run one tick against `previous`. Never fails: when no reading can be
    /// obtained the previous state comes back unchanged.
    ///
    /// A failed fetch triggers at most one rediscovery and one retry.
    pub async fn tick(&mut self, previous: &EnergyState) -> TickOutcome {
        let mut attempt = Attempt::Initial;

        loop {
            let error = match self.fetch().await {
                Ok(sample) => {
                    self.connectivity.send_replace(Connectivity::Connected);
                    let state = accumulator::integrate(previous, &sample);
                    return TickOutcome::Updated { state, sample };
                }
                Err(error) => error,
            };

            match attempt {
                Attempt::Initial => {
                    warn!(
                        "Fetch from {} at {} failed: {}",
                        self.device_id, self.address, error
                    );
                    self.connectivity.send_replace(Connectivity::Rediscovering);
                    match self.rediscover().await {
                        Some(address) => {
                            info!(
                                "Device {} moved from {} to {}, retrying",
                                self.device_id, self.address, address
                            );
                            self.address = address;
                            attempt = Attempt::AfterRediscovery;
                        }
                        None => break,
                    }
                }
                Attempt::AfterRediscovery => {
                    warn!(
                        "Retry for {} at {} failed: {}",
                        self.device_id, self.address, error
                    );
                    break;
                }
            }
        }

        self.connectivity.send_replace(Connectivity::Stale);
        hold(previous)
    }

    /// Reading from the current address, rejected when another unit answers.
    async fn fetch(&self) -> Result<PowerSample, FetchError> {
        let reading = self.reader.fetch_latest_reading(&self.address).await?;
        if !same_device(&reading.device_id, &self.device_id) {
            return Err(FetchError::IdentityMismatch {
                expected: self.device_id.clone(),
                found: reading.device_id,
            });
        }
        Ok(reading.sample)
    }

    /// New address for this device, if discovery knows a different one.
    async fn rediscover(&self) -> Option<String> {
        let devices = match self.discovery.discover_devices().await {
            Ok(devices) => devices,
            Err(error) => {
                warn!("Discovery for {} failed: {}", self.device_id, error);
                return None;
            }
        };
        debug!("Discovery returned {} devices", devices.len());

        let Some(found) = devices
            .into_iter()
            .find(|d| same_device(&d.device_id, &self.device_id))
        else {
            warn!("Device {} not found by discovery", self.device_id);
            return None;
        };

        if same_address(&found.address, &self.address) {
            debug!(
                "Device {} still reported at {}, not retrying",
                self.device_id, self.address
            );
            return None;
        }
        Some(found.address)
    }
}
