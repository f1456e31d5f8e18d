// Energy accounting domain models
use crate::domain::ring_buffer::HistoryRingBuffer;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Hourly snapshots for 7 days.
pub const WEEK_HISTORY_CAPACITY: usize = 168;
/// Hourly snapshots for 30 days.
pub const MONTH_HISTORY_CAPACITY: usize = 720;

/// One reading from the storage system. Timestamps are device-local wall clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerSample {
    pub production_w: f64,
    pub consumption_w: f64,
    /// Positive when exporting, negative when importing.
    pub grid_feed_in_w: f64,
    /// Negative when charging, positive when discharging.
    pub battery_power_w: f64,
    pub battery_soc_pct: f64,
    pub cycle_count: u64,
    pub timestamp: NaiveDateTime,
}

/// Non-negative per-flow power split out of the signed readings. Negative or
/// NaN production and consumption readings count as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlowPower {
    pub to_battery_w: f64,
    pub from_battery_w: f64,
    pub production_w: f64,
    pub consumption_w: f64,
    pub grid_feed_in_w: f64,
    pub grid_consumption_w: f64,
}

impl From<&PowerSample> for FlowPower {
    fn from(sample: &PowerSample) -> Self {
        Self {
            to_battery_w: (-sample.battery_power_w).max(0.0),
            from_battery_w: sample.battery_power_w.max(0.0),
            production_w: sample.production_w.max(0.0),
            consumption_w: sample.consumption_w.max(0.0),
            grid_feed_in_w: sample.grid_feed_in_w.max(0.0),
            grid_consumption_w: (-sample.grid_feed_in_w).max(0.0),
        }
    }
}

/// Energy per flow, in Wh.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowTotals {
    pub to_battery_wh: f64,
    pub from_battery_wh: f64,
    pub production_wh: f64,
    pub consumption_wh: f64,
    pub grid_feed_in_wh: f64,
    pub grid_consumption_wh: f64,
}

impl FlowTotals {
    /// Add `power` sustained for `hours`.
    pub fn accumulate(self, power: &FlowPower, hours: f64) -> Self {
        Self {
            to_battery_wh: self.to_battery_wh + power.to_battery_w * hours,
            from_battery_wh: self.from_battery_wh + power.from_battery_w * hours,
            production_wh: self.production_wh + power.production_w * hours,
            consumption_wh: self.consumption_wh + power.consumption_w * hours,
            grid_feed_in_wh: self.grid_feed_in_wh + power.grid_feed_in_w * hours,
            grid_consumption_wh: self.grid_consumption_wh + power.grid_consumption_w * hours,
        }
    }
}

/// Today's extremes of the instantaneous readings, in W.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyExtrema {
    pub max_consumption_w: f64,
    /// `f64::INFINITY` until the first reading of the day.
    pub min_consumption_w: f64,
    pub max_production_w: f64,
    pub max_grid_feed_in_w: f64,
    pub max_grid_consumption_w: f64,
}

impl Default for DailyExtrema {
    fn default() -> Self {
        Self {
            max_consumption_w: 0.0,
            min_consumption_w: f64::INFINITY,
            max_production_w: 0.0,
            max_grid_feed_in_w: 0.0,
            max_grid_consumption_w: 0.0,
        }
    }
}

impl DailyExtrema {
    pub fn observe(self, power: &FlowPower) -> Self {
        Self {
            max_consumption_w: self.max_consumption_w.max(power.consumption_w),
            min_consumption_w: self.min_consumption_w.min(power.consumption_w),
            max_production_w: self.max_production_w.max(power.production_w),
            max_grid_feed_in_w: self.max_grid_feed_in_w.max(power.grid_feed_in_w),
            max_grid_consumption_w: self.max_grid_consumption_w.max(power.grid_consumption_w),
        }
    }
}

/// Battery cycle counter at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleSnapshot {
    pub timestamp: NaiveDateTime,
    pub cycle_count: u64,
}

impl CycleSnapshot {
    pub fn new(timestamp: NaiveDateTime, cycle_count: u64) -> Self {
        Self {
            timestamp,
            cycle_count,
        }
    }
}

/// Running accounting for one storage system.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyState {
    /// `None` until the first accepted sample.
    pub last_update: Option<NaiveDateTime>,
    pub totals: FlowTotals,
    pub daily: FlowTotals,
    pub extrema: DailyExtrema,
    pub total_cycle_count: u64,
    pub cycles_week: HistoryRingBuffer<CycleSnapshot>,
    pub cycles_month: HistoryRingBuffer<CycleSnapshot>,
    /// Most recent raw reading. Never persisted.
    pub last_sample: Option<PowerSample>,
}

impl EnergyState {
    pub fn new() -> Self {
        Self {
            last_update: None,
            totals: FlowTotals::default(),
            daily: FlowTotals::default(),
            extrema: DailyExtrema::default(),
            total_cycle_count: 0,
            cycles_week: HistoryRingBuffer::new(WEEK_HISTORY_CAPACITY),
            cycles_month: HistoryRingBuffer::new(MONTH_HISTORY_CAPACITY),
            last_sample: None,
        }
    }
}

impl Default for EnergyState {
    fn default() -> Self {
        Self::new()
    }
}
