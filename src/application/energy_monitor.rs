// Energy monitor - owns one device's state and drives its sampling loop
use crate::application::sampler::{Connectivity, Sampler, TickOutcome};
use crate::application::state_store::StateStore;
use crate::domain::accumulator::{self, Elapsed};
use crate::domain::energy::{CycleSnapshot, EnergyState, PowerSample};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Published once per successful tick.
#[derive(Debug, Clone)]
pub struct StateUpdated {
    pub device_id: String,
    pub state: EnergyState,
    pub sample: PowerSample,
}

struct Inner {
    sampler: Sampler,
    state: EnergyState,
}

/// State and address as of the last completed tick or reset.
#[derive(Debug, Clone)]
struct Published {
    state: EnergyState,
    address: String,
}

impl Published {
    fn of(inner: &Inner) -> Self {
        Self {
            state: inner.state.clone(),
            address: inner.sampler.address().to_string(),
        }
    }
}

/// Where the device is and whether it answers. Reading it never waits on an
/// in-flight network call.
#[derive(Debug, Clone)]
pub struct MonitorStatus {
    pub address: String,
    /// Live, so a rediscovery in progress is visible.
    pub connectivity: Connectivity,
}

/// Ticks and resets both take the same lock, so a reset never interleaves
/// with an in-flight integration.
pub struct EnergyMonitor {
    device_id: String,
    inner: Mutex<Inner>,
    store: Arc<dyn StateStore>,
    events: broadcast::Sender<StateUpdated>,
    published: watch::Sender<Published>,
    connectivity: watch::Receiver<Connectivity>,
}

impl EnergyMonitor {
    pub fn new(sampler: Sampler, state: EnergyState, store: Arc<dyn StateStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let connectivity = sampler.watch_connectivity();
        let inner = Inner { sampler, state };
        let (published, _) = watch::channel(Published::of(&inner));
        Self {
            device_id: inner.sampler.device_id().to_string(),
            inner: Mutex::new(inner),
            store,
            events,
            published,
            connectivity,
        }
    }

    /// Start from the last persisted state, or from zero when there is none
    /// or it cannot be read.
    pub async fn restore(sampler: Sampler, store: Arc<dyn StateStore>) -> Self {
        let device_id = sampler.device_id().to_string();
        let state = match store.load(&device_id).await {
            Ok(Some(record)) => match EnergyState::restore(record) {
                Ok(state) => {
                    info!("Restored state for {}", device_id);
                    state
                }
                Err(e) => {
                    warn!("Discarding persisted state for {}: {}", device_id, e);
                    EnergyState::new()
                }
            },
            Ok(None) => {
                info!("No persisted state for {}, starting fresh", device_id);
                EnergyState::new()
            }
            Err(e) => {
                warn!("Failed to load state for {}: {:#}", device_id, e);
                EnergyState::new()
            }
        };
        Self::new(sampler, state, store)
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            address: self.published.borrow().address.clone(),
            connectivity: *self.connectivity.borrow(),
        }
    }

    pub fn snapshot(&self) -> EnergyState {
        self.published.borrow().state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateUpdated> {
        self.events.subscribe()
    }

    /// One sampling tick. Returns the state in effect afterwards.
    pub async fn tick(&self) -> EnergyState {
        let mut inner = self.inner.lock().await;
        let Inner { sampler, state } = &mut *inner;

        let (mut next, sample) = match sampler.tick(state).await {
            TickOutcome::Updated { state: next, sample } => (next, sample),
            TickOutcome::Held { state: held } => {
                debug!("Holding state for {}", self.device_id);
                self.published.send_replace(Published::of(&inner));
                return held;
            }
        };

        match accumulator::elapsed(state.last_update, sample.timestamp) {
            Elapsed::Backward { seconds } => warn!(
                "Sample for {} is {:.0}s older than the last update, no energy added",
                self.device_id, seconds
            ),
            _ if accumulator::cycle_snapshot_due(&next, sample.timestamp) => {
                next = accumulator::record_cycle_snapshot(
                    next,
                    CycleSnapshot::new(sample.timestamp, sample.cycle_count),
                );
            }
            _ => {}
        }

        *state = next.clone();
        self.published.send_replace(Published::of(&inner));
        self.persist(&next).await;

        // No subscribers is fine
        let _ = self.events.send(StateUpdated {
            device_id: self.device_id.clone(),
            state: next.clone(),
            sample,
        });

        next
    }

    /// Replace the state with a fresh zeroed one.
    pub async fn reset(&self) -> EnergyState {
        let mut inner = self.inner.lock().await;
        let fresh = accumulator::reset();
        inner.state = fresh.clone();
        self.published.send_replace(Published::of(&inner));
        self.persist(&fresh).await;
        info!("Energy state for {} reset", self.device_id);
        fresh
    }

    /// Tick every `period` until `shutdown` flips. Ticks never overlap: the
    /// next one starts only after the previous returned.
    pub async fn run(self: Arc<Self>, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Sampling {} every {:?}", self.device_id, period);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Sampling loop for {} stopped", self.device_id);
    }

    async fn persist(&self, state: &EnergyState) {
        if let Err(e) = self.store.save(&self.device_id, &state.to_persisted()).await {
            error!("Failed to persist state for {}: {:#}", self.device_id, e);
        }
    }
}
