// Versioned on-disk record of an EnergyState
use crate::domain::energy::{
    CycleSnapshot, DailyExtrema, EnergyState, FlowTotals, MONTH_HISTORY_CAPACITY,
    WEEK_HISTORY_CAPACITY,
};
use crate::domain::error::DomainError;
use crate::domain::ring_buffer::{HistoryRingBuffer, RingBufferState};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const PERSISTED_STATE_VERSION: u32 = 1;

/// Flat record written at process boundaries.
///
/// Every field has a default, so records written before a field existed still
/// load. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersistedEnergyState {
    pub version: u32,
    pub last_update: Option<NaiveDateTime>,

    pub to_battery_wh: f64,
    pub from_battery_wh: f64,
    pub production_wh: f64,
    pub consumption_wh: f64,
    pub grid_feed_in_wh: f64,
    pub grid_consumption_wh: f64,

    pub daily_to_battery_wh: f64,
    pub daily_from_battery_wh: f64,
    pub daily_production_wh: f64,
    pub daily_consumption_wh: f64,
    pub daily_grid_feed_in_wh: f64,
    pub daily_grid_consumption_wh: f64,

    pub max_consumption_w: f64,
    /// `None` while no reading has been seen today (in memory: +inf).
    pub min_consumption_w: Option<f64>,
    pub max_production_w: f64,
    pub max_grid_feed_in_w: f64,
    pub max_grid_consumption_w: f64,

    pub total_cycle_count: u64,
    pub cycles_week: Option<RingBufferState<CycleSnapshot>>,
    pub cycles_month: Option<RingBufferState<CycleSnapshot>>,
}

impl Default for PersistedEnergyState {
    fn default() -> Self {
        EnergyState::new().to_persisted()
    }
}

impl EnergyState {
    pub fn to_persisted(&self) -> PersistedEnergyState {
        PersistedEnergyState {
            version: PERSISTED_STATE_VERSION,
            last_update: self.last_update,

            to_battery_wh: self.totals.to_battery_wh,
            from_battery_wh: self.totals.from_battery_wh,
            production_wh: self.totals.production_wh,
            consumption_wh: self.totals.consumption_wh,
            grid_feed_in_wh: self.totals.grid_feed_in_wh,
            grid_consumption_wh: self.totals.grid_consumption_wh,

            daily_to_battery_wh: self.daily.to_battery_wh,
            daily_from_battery_wh: self.daily.from_battery_wh,
            daily_production_wh: self.daily.production_wh,
            daily_consumption_wh: self.daily.consumption_wh,
            daily_grid_feed_in_wh: self.daily.grid_feed_in_wh,
            daily_grid_consumption_wh: self.daily.grid_consumption_wh,

            max_consumption_w: self.extrema.max_consumption_w,
            min_consumption_w: Some(self.extrema.min_consumption_w).filter(|v| v.is_finite()),
            max_production_w: self.extrema.max_production_w,
            max_grid_feed_in_w: self.extrema.max_grid_feed_in_w,
            max_grid_consumption_w: self.extrema.max_grid_consumption_w,

            total_cycle_count: self.total_cycle_count,
            cycles_week: Some(self.cycles_week.serialize_state()),
            cycles_month: Some(self.cycles_month.serialize_state()),
        }
    }

    /// Rebuild a state from its persisted record. Transient fields start empty.
    pub fn restore(record: PersistedEnergyState) -> Result<Self, DomainError> {
        if record.version != PERSISTED_STATE_VERSION {
            return Err(DomainError::InvalidArgument(format!(
                "unsupported persisted state version {}",
                record.version
            )));
        }

        let cycles_week = restore_history(record.cycles_week, WEEK_HISTORY_CAPACITY)?;
        let cycles_month = restore_history(record.cycles_month, MONTH_HISTORY_CAPACITY)?;

        Ok(Self {
            last_update: record.last_update,
            totals: FlowTotals {
                to_battery_wh: record.to_battery_wh,
                from_battery_wh: record.from_battery_wh,
                production_wh: record.production_wh,
                consumption_wh: record.consumption_wh,
                grid_feed_in_wh: record.grid_feed_in_wh,
                grid_consumption_wh: record.grid_consumption_wh,
            },
            daily: FlowTotals {
                to_battery_wh: record.daily_to_battery_wh,
                from_battery_wh: record.daily_from_battery_wh,
                production_wh: record.daily_production_wh,
                consumption_wh: record.daily_consumption_wh,
                grid_feed_in_wh: record.daily_grid_feed_in_wh,
                grid_consumption_wh: record.daily_grid_consumption_wh,
            },
            extrema: DailyExtrema {
                max_consumption_w: record.max_consumption_w,
                min_consumption_w: record.min_consumption_w.unwrap_or(f64::INFINITY),
                max_production_w: record.max_production_w,
                max_grid_feed_in_w: record.max_grid_feed_in_w,
                max_grid_consumption_w: record.max_grid_consumption_w,
            },
            total_cycle_count: record.total_cycle_count,
            cycles_week,
            cycles_month,
            last_sample: None,
        })
    }
}

fn restore_history(
    state: Option<RingBufferState<CycleSnapshot>>,
    default_capacity: usize,
) -> Result<HistoryRingBuffer<CycleSnapshot>, DomainError> {
    match state {
        Some(state) => HistoryRingBuffer::restore_state(state),
        None => Ok(HistoryRingBuffer::new(default_capacity)),
    }
}
