use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analytics::PortfolioTotals;
use super::draft::{AddHoldingDraft, EditDraft};
use super::holding::Holding;
use super::portfolio::Portfolio;
use super::sort::SortConfig;

/// Rows above this total return are highlighted.
pub const HIGHLIGHT_RETURN_PERCENT: f64 = 30.0;

/// One rendered row of the holdings table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRow {
    pub holding: Holding,
    pub current_value: Option<f64>,
    pub editing: bool,
    pub selected: bool,
    pub highlight: bool,
    pub sell: bool,
    pub quote_url: Option<String>,
}

impl HoldingRow {
    pub fn new(holding: &Holding, editing: bool, selected: bool) -> Self {
        Self {
            current_value: holding.current_value(),
            highlight: holding
                .total_return_percent
                .is_some_and(|r| r > HIGHLIGHT_RETURN_PERCENT),
            sell: holding.is_sell(),
            quote_url: holding.quote_url(),
            holding: holding.clone(),
            editing,
            selected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum HoldingsStatus {
    Loading,
    Error(String),
    Ready,
}

/// Everything the holdings screen shows for the active portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsView {
    pub portfolio_id: String,
    pub status: HoldingsStatus,
    pub rows: Vec<HoldingRow>,
    pub totals: PortfolioTotals,
    pub sort: SortConfig,
    pub is_market_open: bool,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub is_fetching: bool,
    pub edit_draft: Option<EditDraft>,
    pub selected_count: usize,
    pub all_selected: bool,
    pub add_form: Option<AddHoldingDraft>,
    pub upload_pending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DashboardView {
    /// No portfolio is available (yet); the holdings screen is not shown.
    Placeholder { loading: bool, error: Option<String> },
    Ready {
        portfolios: Vec<Portfolio>,
        selected: Portfolio,
        holdings: HoldingsView,
    },
    /// Recovery screen shown after a render failure; offers a full reload.
    Fallback { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A message the host must show the user before they continue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}
