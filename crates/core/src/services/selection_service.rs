use std::collections::BTreeSet;

use crate::models::holding::Holding;

/// Rows chosen for bulk delete, by ISIN.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    isins: BTreeSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.isins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.isins.is_empty()
    }

    pub fn contains(&self, isin: &str) -> bool {
        self.isins.contains(isin)
    }

    /// Selected ISINs in sorted order.
    pub fn isins(&self) -> Vec<String> {
        self.isins.iter().cloned().collect()
    }

    /// Add `isin` if absent, remove it if present. Returns whether it is now selected.
    pub fn toggle(&mut self, isin: &str) -> bool {
        if self.isins.remove(isin) {
            false
        } else {
            self.isins.insert(isin.to_string());
            true
        }
    }

    /// "Select all" checkbox: clears when every holding is already selected,
    /// otherwise selects every holding.
    pub fn toggle_all(&mut self, holdings: &[Holding]) {
        if self.is_all(holdings) {
            self.isins.clear();
        } else {
            self.isins = holdings.iter().map(|h| h.isin.clone()).collect();
        }
    }

    /// Whether the selection covers exactly the given holdings.
    pub fn is_all(&self, holdings: &[Holding]) -> bool {
        !holdings.is_empty() && self.isins.len() == holdings.len()
            && holdings.iter().all(|h| self.isins.contains(&h.isin))
    }

    pub fn clear(&mut self) {
        self.isins.clear();
    }

    /// Drop ISINs that are no longer in `holdings`. Run on every refetch so
    /// "select all" compares against the current rows. Returns how many were dropped.
    pub fn retain_existing(&mut self, holdings: &[Holding]) -> usize {
        let before = self.isins.len();
        self.isins
            .retain(|isin| holdings.iter().any(|h| &h.isin == isin));
        before - self.isins.len()
    }
}
