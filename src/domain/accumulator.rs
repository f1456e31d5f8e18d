// Energy integration - turns irregular power samples into Wh totals
use crate::domain::energy::{CycleSnapshot, DailyExtrema, EnergyState, FlowPower, FlowTotals, PowerSample};
use crate::domain::ring_buffer::HistoryRingBuffer;
use chrono::{NaiveDateTime, TimeDelta};

const SECONDS_PER_HOUR: f64 = 3600.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Time between the last accepted sample and a new one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Elapsed {
    /// No previous sample to measure from.
    FirstSample,
    Forward { hours: f64 },
    /// The new sample is older than the last one. Integrates as zero.
    Backward { seconds: f64 },
}

impl Elapsed {
    pub fn hours(self) -> f64 {
        match self {
            Elapsed::Forward { hours } => hours,
            Elapsed::FirstSample | Elapsed::Backward { .. } => 0.0,
        }
    }
}

pub fn elapsed(last_update: Option<NaiveDateTime>, timestamp: NaiveDateTime) -> Elapsed {
    let Some(last_update) = last_update else {
        return Elapsed::FirstSample;
    };

    let seconds = seconds_between(last_update, timestamp);
    if seconds < 0.0 {
        Elapsed::Backward { seconds: -seconds }
    } else {
        Elapsed::Forward {
            hours: seconds / SECONDS_PER_HOUR,
        }
    }
}

/// Produce the state that follows `previous` once `sample` is accepted.
///
/// Daily totals and extrema restart when the sample falls on a different
/// calendar day than the previous update. A sample older than the last update
/// adds nothing: the reference time, daily totals and extrema stay put and only
/// the raw reading is kept.
pub fn integrate(previous: &EnergyState, sample: &PowerSample) -> EnergyState {
    let hours = match elapsed(previous.last_update, sample.timestamp) {
        Elapsed::Backward { .. } => {
            return EnergyState {
                last_sample: Some(sample.clone()),
                ..previous.clone()
            };
        }
        step => step.hours(),
    };
    let power = FlowPower::from(sample);

    let new_day = previous
        .last_update
        .is_some_and(|last| last.date() != sample.timestamp.date());
    let (daily, extrema) = if new_day {
        (FlowTotals::default(), DailyExtrema::default())
    } else {
        (previous.daily, previous.extrema)
    };

    EnergyState {
        last_update: Some(sample.timestamp),
        totals: previous.totals.accumulate(&power, hours),
        daily: daily.accumulate(&power, hours),
        extrema: extrema.observe(&power),
        total_cycle_count: sample.cycle_count,
        cycles_week: previous.cycles_week.clone(),
        cycles_month: previous.cycles_month.clone(),
        last_sample: Some(sample.clone()),
    }
}

/// Append to both cycle histories.
pub fn record_cycle_snapshot(mut state: EnergyState, snapshot: CycleSnapshot) -> EnergyState {
    state.cycles_week.add(snapshot);
    state.cycles_month.add(snapshot);
    state
}

/// Histories are hourly: due when empty or the newest entry is an hour old.
pub fn cycle_snapshot_due(state: &EnergyState, timestamp: NaiveDateTime) -> bool {
    match state.cycles_week.last() {
        None => true,
        Some(newest) => timestamp - newest.timestamp >= TimeDelta::hours(1),
    }
}

/// Cycles per day between the oldest and newest retained snapshot.
pub fn average_cycle_rate(history: &HistoryRingBuffer<CycleSnapshot>) -> Option<f64> {
    if history.len() < 2 {
        return None;
    }
    let oldest = history.first()?;
    let newest = history.last()?;

    let seconds = seconds_between(oldest.timestamp, newest.timestamp);
    if seconds <= 0.0 {
        return None;
    }

    let cycles = newest.cycle_count as f64 - oldest.cycle_count as f64;
    Some(cycles / (seconds / SECONDS_PER_DAY))
}

pub fn reset() -> EnergyState {
    EnergyState::new()
}

fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}
