use serde::{Deserialize, Serialize};

/// Aggregate figures for the summary cards above the holdings table.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PortfolioTotals {
    /// Number of holdings in the snapshot
    pub total_stocks: usize,

    /// Σ current_price × quantity (unknown prices contribute 0)
    pub total_value: f64,

    /// Σ average_buy_price × quantity
    pub total_investment: f64,

    /// total_value − total_investment
    pub total_return_amount: f64,

    /// total_return_amount / total_investment × 100, or 0 without investment
    pub total_return_percent: f64,

    /// Σ day_change_amount × quantity
    pub total_day_change_amount: f64,

    /// total_day_change_amount / (total_value − total_day_change_amount) × 100
    pub total_day_change_percent: f64,
}
