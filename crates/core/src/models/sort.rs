use serde::{Deserialize, Serialize};

/// Sortable columns of the holdings table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    StockName,
    Quantity,
    AverageBuyPrice,
    CurrentPrice,
    DayChangePercent,
    TotalReturnPercent,
    /// Synthetic column: current_price × quantity
    CurrentValue,
    StopLoss,
    Target,
    State,
    DateOfExit,
}

impl SortKey {
    pub const ALL: [SortKey; 11] = [
        SortKey::StockName,
        SortKey::Quantity,
        SortKey::AverageBuyPrice,
        SortKey::CurrentPrice,
        SortKey::DayChangePercent,
        SortKey::TotalReturnPercent,
        SortKey::CurrentValue,
        SortKey::StopLoss,
        SortKey::Target,
        SortKey::State,
        SortKey::DateOfExit,
    ];

    /// Field name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::StockName => "stock_name",
            SortKey::Quantity => "quantity",
            SortKey::AverageBuyPrice => "average_buy_price",
            SortKey::CurrentPrice => "current_price",
            SortKey::DayChangePercent => "day_change_percent",
            SortKey::TotalReturnPercent => "total_return_percent",
            SortKey::CurrentValue => "current_value",
            SortKey::StopLoss => "stop_loss",
            SortKey::Target => "target",
            SortKey::State => "state",
            SortKey::DateOfExit => "date_of_exit",
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Active sort of the holdings table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            key: SortKey::TotalReturnPercent,
            direction: SortDirection::Desc,
        }
    }
}

impl SortConfig {
    /// Column header click.
    ///
    /// The active ascending column flips to descending; anything else,
    /// including the active descending column, becomes ascending.
    pub fn request(&mut self, key: SortKey) {
        let direction = if self.key == key && self.direction == SortDirection::Asc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        *self = Self { key, direction };
    }
}
