// Derived ratios over daily totals
use crate::domain::energy::FlowTotals;

/// Share of today's production used on site, in percent.
/// `None` when nothing has been produced yet.
pub fn self_consumption_pct(daily: &FlowTotals) -> Option<f64> {
    ratio_pct(daily.production_wh - daily.grid_feed_in_wh, daily.production_wh)
}

/// Share of today's consumption not drawn from the grid, in percent.
/// `None` when nothing has been consumed yet.
pub fn autarky_pct(daily: &FlowTotals) -> Option<f64> {
    ratio_pct(daily.consumption_wh - daily.grid_consumption_wh, daily.consumption_wh)
}

fn ratio_pct(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator.is_nan() || denominator <= 0.0 || !numerator.is_finite() {
        return None;
    }
    Some((numerator / denominator * 100.0).clamp(0.0, 100.0))
}
