// JSON views over computed energy state
use crate::application::sampler::Connectivity;
use crate::domain::accumulator::average_cycle_rate;
use crate::domain::energy::{EnergyState, FlowTotals, PowerSample};
use crate::domain::metrics::{autarky_pct, self_consumption_pct};
use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub id: String,
    pub address: String,
    pub connectivity: Connectivity,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtremaView {
    pub max_consumption_w: f64,
    pub min_consumption_w: Option<f64>,
    pub max_production_w: f64,
    pub max_grid_feed_in_w: f64,
    pub max_grid_consumption_w: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateView {
    pub last_update: Option<NaiveDateTime>,
    pub totals: FlowTotals,
    pub daily: FlowTotals,
    pub extrema: ExtremaView,
    pub total_cycle_count: u64,
    pub cycles_per_day_week: Option<f64>,
    pub cycles_per_day_month: Option<f64>,
    pub self_consumption_pct: Option<f64>,
    pub autarky_pct: Option<f64>,
    pub battery_soc_pct: Option<f64>,
}

impl From<&EnergyState> for StateView {
    fn from(state: &EnergyState) -> Self {
        let extrema = &state.extrema;
        Self {
            last_update: state.last_update,
            totals: state.totals,
            daily: state.daily,
            extrema: ExtremaView {
                max_consumption_w: extrema.max_consumption_w,
                min_consumption_w: Some(extrema.min_consumption_w).filter(|v| v.is_finite()),
                max_production_w: extrema.max_production_w,
                max_grid_feed_in_w: extrema.max_grid_feed_in_w,
                max_grid_consumption_w: extrema.max_grid_consumption_w,
            },
            total_cycle_count: state.total_cycle_count,
            cycles_per_day_week: average_cycle_rate(&state.cycles_week),
            cycles_per_day_month: average_cycle_rate(&state.cycles_month),
            self_consumption_pct: self_consumption_pct(&state.daily),
            autarky_pct: autarky_pct(&state.daily),
            battery_soc_pct: state.last_sample.as_ref().map(|s| s.battery_soc_pct),
        }
    }
}

/// Payload of a `state` server-sent event.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEvent<'a> {
    pub device_id: &'a str,
    pub state: StateView,
    pub sample: &'a PowerSample,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_state_view_has_nulls() {
        let view = StateView::from(&EnergyState::new());
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["lastUpdate"], serde_json::Value::Null);
        assert_eq!(json["extrema"]["minConsumptionW"], serde_json::Value::Null);
        assert_eq!(json["cyclesPerDayWeek"], serde_json::Value::Null);
        assert_eq!(json["selfConsumptionPct"], serde_json::Value::Null);
        assert_eq!(json["autarkyPct"], serde_json::Value::Null);
        assert_eq!(json["totals"]["productionWh"], 0.0);
    }

    #[test]
    fn test_view_reports_ratios() {
        let mut state = EnergyState::new();
        state.daily.production_wh = 4000.0;
        state.daily.grid_feed_in_wh = 1000.0;
        state.daily.consumption_wh = 2000.0;
        state.daily.grid_consumption_wh = 500.0;

        let view = StateView::from(&state);
        assert_eq!(view.self_consumption_pct, Some(75.0));
        assert_eq!(view.autarky_pct, Some(75.0));
    }
}
