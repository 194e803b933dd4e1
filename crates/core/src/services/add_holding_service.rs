use crate::errors::CoreError;
use crate::models::draft::AddHoldingDraft;
use crate::models::requests::AddHoldingRequest;

use super::edit_service::{parse_optional_f64, parse_optional_i64};

/// The "add holding" modal: open/closed plus its draft.
#[derive(Debug, Clone, Default)]
pub struct AddHoldingForm {
    draft: Option<AddHoldingDraft>,
}

impl AddHoldingForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.draft.is_some()
    }

    /// Open the modal. An already open modal keeps its draft.
    pub fn open(&mut self) {
        self.draft.get_or_insert_with(AddHoldingDraft::default);
    }

    /// Close the modal and clear the draft.
    pub fn close(&mut self) {
        self.draft = None;
    }

    pub fn draft(&self) -> Option<&AddHoldingDraft> {
        self.draft.as_ref()
    }

    pub fn draft_mut(&mut self) -> Option<&mut AddHoldingDraft> {
        self.draft.as_mut()
    }

    /// Validate the draft and build the request. The draft is left as is.
    pub fn submission(&self, portfolio_id: &str) -> Result<AddHoldingRequest, CoreError> {
        let draft = self
            .draft
            .as_ref()
            .ok_or_else(|| CoreError::ValidationError("Add holding form is not open".into()))?;

        let isin = required("isin", &draft.isin)?;
        let stock_name = required("stock_name", &draft.stock_name)?;
        let quantity = parse_optional_i64("quantity", &draft.quantity)?
            .ok_or_else(|| missing("quantity"))?;
        let average_buy_price = parse_optional_f64("average_buy_price", &draft.average_buy_price)?
            .ok_or_else(|| missing("average_buy_price"))?;
        let ticker = Some(draft.ticker.trim().to_string()).filter(|t| !t.is_empty());

        Ok(AddHoldingRequest {
            portfolio_id: portfolio_id.to_string(),
            isin,
            stock_name,
            quantity,
            average_buy_price,
            ticker,
        })
    }
}

fn required(field: &str, raw: &str) -> Result<String, CoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(missing(field));
    }
    Ok(trimmed.to_string())
}

fn missing(field: &str) -> CoreError {
    CoreError::ValidationError(format!("{field} is required"))
}
