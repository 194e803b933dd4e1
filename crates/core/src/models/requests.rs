use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

use super::portfolio::Portfolio;

// ── Request bodies ──────────────────────────────────────────────────

/// Body of `POST /portfolios` and `PUT /portfolios/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioNameRequest {
    pub name: String,
}

/// Body of `POST /holdings/add`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddHoldingRequest {
    pub portfolio_id: String,
    pub isin: String,
    pub stock_name: String,
    pub quantity: i64,
    pub average_buy_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
}

/// Body of `POST /holdings/delete-bulk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkDeleteRequest {
    pub portfolio_id: String,
    pub isins: Vec<String>,
}

/// Body of `POST /settings`.
///
/// `None` numeric fields serialize as `null`, which clears the stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub portfolio_id: String,
    pub isin: String,
    pub ticker: Option<String>,
    pub date_of_exit: Option<String>,
    pub target: Option<f64>,
    pub stop_loss: Option<f64>,
    pub quantity: Option<i64>,
    pub average_buy_price: Option<f64>,
}

/// A spreadsheet picked for `POST /upload`.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

// ── Response bodies ─────────────────────────────────────────────────

/// Generic acknowledgement returned by the write endpoints.
///
/// The backend reports some failures in-band with a 2xx status and
/// `success: false`, so callers go through [`Ack::into_result`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
}

impl Ack {
    pub fn into_result(self, status: u16) -> Result<Self, CoreError> {
        if self.success == Some(false) {
            return Err(CoreError::Api {
                status,
                detail: Some(self.error.unwrap_or_else(|| "Request was rejected".into())),
            });
        }
        Ok(self)
    }
}

/// Response of `POST /portfolios`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePortfolioResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub portfolio: Option<Portfolio>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response of `POST /discover`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiscoverResponse {
    #[serde(default)]
    pub updated: u64,
}
