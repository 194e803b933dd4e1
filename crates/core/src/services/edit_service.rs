use log::debug;

use crate::errors::CoreError;
use crate::models::draft::EditDraft;
use crate::models::holding::Holding;
use crate::models::requests::SettingsUpdate;

/// Inline edit state of the holdings table. At most one row edits at a time.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EditState {
    #[default]
    Idle,
    Editing { isin: String, draft: EditDraft },
}

/// Drives `Idle → Editing(isin) → Idle`.
///
/// The session never talks to the backend itself; the dashboard builds the
/// request with [`submission`](Self::submission) and calls
/// [`finish`](Self::finish) only once the backend accepted it.
#[derive(Debug, Clone, Default)]
pub struct EditSession {
    state: EditState,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub fn editing_id(&self) -> Option<&str> {
        match &self.state {
            EditState::Editing { isin, .. } => Some(isin),
            EditState::Idle => None,
        }
    }

    pub fn draft(&self) -> Option<&EditDraft> {
        match &self.state {
            EditState::Editing { draft, .. } => Some(draft),
            EditState::Idle => None,
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut EditDraft> {
        match &mut self.state {
            EditState::Editing { draft, .. } => Some(draft),
            EditState::Idle => None,
        }
    }

    /// Start editing `holding`, seeding the draft from its current values.
    /// Any unsaved draft for another row is dropped.
    pub fn begin(&mut self, holding: &Holding) {
        if let Some(previous) = self.editing_id() {
            if previous != holding.isin {
                debug!("Abandoning unsaved edit of {previous}");
            }
        }
        self.state = EditState::Editing {
            isin: holding.isin.clone(),
            draft: EditDraft::from_holding(holding),
        };
    }

    /// Discard the draft without saving.
    pub fn cancel(&mut self) {
        self.state = EditState::Idle;
    }

    /// Back to `Idle` after a successful save.
    pub fn finish(&mut self) {
        self.state = EditState::Idle;
    }

    /// Parse the draft into a settings update for `portfolio_id`.
    ///
    /// Blank numeric fields become `None` (clearing the stored value); text
    /// fields are sent as typed.
    pub fn submission(&self, portfolio_id: &str) -> Result<SettingsUpdate, CoreError> {
        let EditState::Editing { isin, draft } = &self.state else {
            return Err(CoreError::ValidationError("No holding is being edited".into()));
        };
        Ok(SettingsUpdate {
            portfolio_id: portfolio_id.to_string(),
            isin: isin.clone(),
            ticker: Some(draft.ticker.trim().to_string()),
            date_of_exit: Some(draft.date_of_exit.trim().to_string()),
            target: parse_optional_f64("target", &draft.target)?,
            stop_loss: parse_optional_f64("stop_loss", &draft.stop_loss)?,
            quantity: parse_optional_i64("quantity", &draft.quantity)?,
            average_buy_price: parse_optional_f64("average_buy_price", &draft.average_buy_price)?,
        })
    }
}

/// `""` → `None`; otherwise a finite number or a validation error.
pub fn parse_optional_f64(field: &str, raw: &str) -> Result<Option<f64>, CoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(CoreError::ValidationError(format!(
            "{field} must be a number, got '{trimmed}'"
        ))),
    }
}

/// `""` → `None`; otherwise a whole number. A fractional value is accepted
/// only when it has no fractional part ("10.0").
pub fn parse_optional_i64(field: &str, raw: &str) -> Result<Option<i64>, CoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(Some(v));
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
            Ok(Some(v as i64))
        }
        _ => Err(CoreError::ValidationError(format!(
            "{field} must be a whole number, got '{trimmed}'"
        ))),
    }
}
