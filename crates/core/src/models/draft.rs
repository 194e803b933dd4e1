use serde::{Deserialize, Serialize};

use super::holding::Holding;

/// Editable fields of one holding while its row is in edit mode.
///
/// Every field is kept as the raw text the user typed; numbers are parsed
/// only when the draft is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditDraft {
    pub ticker: String,
    pub stop_loss: String,
    pub target: String,
    pub date_of_exit: String,
    pub quantity: String,
    pub average_buy_price: String,
}

impl EditDraft {
    /// Seed a draft from a row's current values; unknown values become "".
    pub fn from_holding(holding: &Holding) -> Self {
        Self {
            ticker: holding.ticker.clone().unwrap_or_default(),
            stop_loss: format_number(holding.stop_loss),
            target: format_number(holding.target),
            date_of_exit: holding.date_of_exit.clone().unwrap_or_default(),
            quantity: format_number(holding.quantity),
            average_buy_price: format_number(holding.average_buy_price),
        }
    }
}

/// Fields of the "add holding" modal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddHoldingDraft {
    pub isin: String,
    pub stock_name: String,
    pub quantity: String,
    pub average_buy_price: String,
    pub ticker: String,
}

fn format_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
