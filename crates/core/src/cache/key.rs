use serde::{Deserialize, Serialize};

/// Logical identity of a cached server resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "resource", rename_all = "snake_case")]
pub enum QueryKey {
    /// `["portfolios"]`
    Portfolios,
    /// `["holdings", portfolio_id]`
    Holdings { portfolio_id: String },
}

impl QueryKey {
    pub fn holdings(portfolio_id: impl Into<String>) -> Self {
        QueryKey::Holdings {
            portfolio_id: portfolio_id.into(),
        }
    }

    pub fn is_holdings(&self) -> bool {
        matches!(self, QueryKey::Holdings { .. })
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryKey::Portfolios => write!(f, "[\"portfolios\"]"),
            QueryKey::Holdings { portfolio_id } => write!(f, "[\"holdings\", \"{portfolio_id}\"]"),
        }
    }
}
