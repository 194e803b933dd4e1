use log::debug;

use crate::errors::CoreError;
use crate::models::portfolio::Portfolio;

/// Tracks which portfolio is active.
///
/// Pure state, no I/O. The dashboard feeds it every new portfolio list
/// through [`reconcile`](Self::reconcile).
#[derive(Debug, Clone)]
pub struct PortfolioSelector {
    selected: Option<String>,
    /// Whether the next non-empty list may pick a default. Cleared once a
    /// default has been applied, so it fires once per "no selection" spell.
    auto_select_armed: bool,
}

impl PortfolioSelector {
    pub fn new() -> Self {
        Self {
            selected: None,
            auto_select_armed: true,
        }
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn select(&mut self, id: impl Into<String>) {
        self.selected = Some(id.into());
        self.auto_select_armed = false;
    }

    /// Explicit deselection by the user. Does not re-arm the default.
    pub fn clear(&mut self) {
        self.selected = None;
        self.auto_select_armed = false;
    }

    /// Apply the default-selection rule to the latest list.
    ///
    /// - A selection that no longer exists in a non-empty list is dropped
    ///   and the default re-armed.
    /// - With nothing selected and the default armed, the first portfolio
    ///   in server order is selected.
    ///
    /// Returns the id when the selection changed.
    pub fn reconcile(&mut self, portfolios: &[Portfolio]) -> Option<String> {
        if let Some(id) = &self.selected {
            if portfolios.is_empty() || portfolios.iter().any(|p| &p.id == id) {
                return None;
            }
            debug!("Selected portfolio {id} no longer exists");
            self.selected = None;
            self.auto_select_armed = true;
        }

        if !self.auto_select_armed {
            return None;
        }
        let first = portfolios.first()?;
        debug!("Defaulting to portfolio {}", first.id);
        self.select(first.id.clone());
        Some(first.id.clone())
    }

    /// Find the selected portfolio in `portfolios`.
    pub fn selected_in<'a>(&self, portfolios: &'a [Portfolio]) -> Option<&'a Portfolio> {
        let id = self.selected.as_deref()?;
        portfolios.iter().find(|p| p.id == id)
    }
}

impl Default for PortfolioSelector {
    fn default() -> Self {
        Self::new()
    }
}

/// Trimmed name for a new portfolio; empty names are rejected.
pub fn validate_portfolio_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::ValidationError("Portfolio name must not be empty".into()));
    }
    Ok(trimmed.to_string())
}

/// The name to send for a rename, or `None` when the rename is a no-op:
/// cancelled, blank, or unchanged.
pub fn rename_target(current: &Portfolio, new_name: Option<&str>) -> Option<String> {
    let trimmed = new_name?.trim();
    if trimmed.is_empty() || trimmed == current.name {
        return None;
    }
    Some(trimmed.to_string())
}
