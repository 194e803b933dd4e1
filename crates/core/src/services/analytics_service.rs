use crate::models::analytics::PortfolioTotals;
use crate::models::holding::Holding;

/// Computes the summary figures for a holdings snapshot.
///
/// Pure function of its input: call it again for every new snapshot, never
/// keep the result across snapshots. Unknown prices and quantities count as
/// zero here.
pub struct AnalyticsService;

impl AnalyticsService {
    pub fn new() -> Self {
        Self
    }

    pub fn compute_totals(&self, holdings: &[Holding]) -> PortfolioTotals {
        let total_value: f64 = holdings
            .iter()
            .map(|h| h.current_price.unwrap_or(0.0) * h.quantity.unwrap_or(0.0))
            .sum();
        let total_investment: f64 = holdings
            .iter()
            .map(|h| h.average_buy_price.unwrap_or(0.0) * h.quantity.unwrap_or(0.0))
            .sum();
        let total_day_change_amount: f64 = holdings
            .iter()
            .map(|h| h.day_change_amount.unwrap_or(0.0) * h.quantity.unwrap_or(0.0))
            .sum();

        let total_return_amount = total_value - total_investment;
        let total_return_percent = if total_investment > 0.0 {
            total_return_amount / total_investment * 100.0
        } else {
            0.0
        };

        let prev_day_total_value = total_value - total_day_change_amount;
        let total_day_change_percent = if prev_day_total_value > 0.0 {
            total_day_change_amount / prev_day_total_value * 100.0
        } else {
            0.0
        };

        PortfolioTotals {
            total_stocks: holdings.len(),
            total_value,
            total_investment,
            total_return_amount,
            total_return_percent,
            total_day_change_amount,
            total_day_change_percent,
        }
    }
}

impl Default for AnalyticsService {
    fn default() -> Self {
        Self::new()
    }
}
