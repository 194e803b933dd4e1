use serde::{Deserialize, Serialize};

/// State string the backend assigns when a holding has hit its target,
/// its stop-loss, or the return threshold.
pub const SELL_STATE: &str = "SELL";

/// One stock position inside a portfolio, as served by `GET /holdings`.
///
/// Every numeric field may be absent or null. Absent means "unknown", never
/// zero; only the totals treat it as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Identity of the holding within its portfolio.
    pub isin: String,

    pub stock_name: String,

    #[serde(default)]
    pub ticker: Option<String>,

    #[serde(default)]
    pub quantity: Option<f64>,

    #[serde(default)]
    pub average_buy_price: Option<f64>,

    #[serde(default)]
    pub current_price: Option<f64>,

    #[serde(default)]
    pub day_change_percent: Option<f64>,

    /// Per-unit price change since the previous close.
    #[serde(default)]
    pub day_change_amount: Option<f64>,

    #[serde(default)]
    pub total_return_percent: Option<f64>,

    #[serde(default)]
    pub stop_loss: Option<f64>,

    #[serde(default)]
    pub target: Option<f64>,

    /// Planned exit date, `YYYY-MM-DD` as entered by the user.
    #[serde(default)]
    pub date_of_exit: Option<String>,

    #[serde(default = "default_state")]
    pub state: String,

    #[serde(default)]
    pub state_reason: Option<String>,

    /// Set when the price came from the server's persisted copy rather than a live quote.
    #[serde(default)]
    pub is_cached: bool,

    // ── Fundamentals ────────────────────────────────────────────────
    #[serde(default)]
    pub pe_ratio: Option<f64>,

    #[serde(default)]
    pub peg_ratio: Option<f64>,

    #[serde(default)]
    pub debt_to_equity: Option<f64>,

    #[serde(default)]
    pub market_cap: Option<f64>,

    #[serde(default)]
    pub sales_growth_3y: Option<f64>,

    #[serde(default)]
    pub eps_growth_3y: Option<f64>,
}

fn default_state() -> String {
    "HOLD".to_string()
}

impl Holding {
    /// Minimal holding with every derived field unknown.
    pub fn new(
        isin: impl Into<String>,
        stock_name: impl Into<String>,
        quantity: f64,
        average_buy_price: f64,
    ) -> Self {
        Self {
            isin: isin.into(),
            stock_name: stock_name.into(),
            ticker: None,
            quantity: Some(quantity),
            average_buy_price: Some(average_buy_price),
            current_price: None,
            day_change_percent: None,
            day_change_amount: None,
            total_return_percent: None,
            stop_loss: None,
            target: None,
            date_of_exit: None,
            state: default_state(),
            state_reason: None,
            is_cached: false,
            pe_ratio: None,
            peg_ratio: None,
            debt_to_equity: None,
            market_cap: None,
            sales_growth_3y: None,
            eps_growth_3y: None,
        }
    }

    /// `current_price × quantity`, unknown when either factor is.
    pub fn current_value(&self) -> Option<f64> {
        Some(self.current_price? * self.quantity?)
    }

    pub fn is_sell(&self) -> bool {
        self.state == SELL_STATE
    }

    /// Public quote page for the holding's ticker, if it has one.
    pub fn quote_url(&self) -> Option<String> {
        self.ticker
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| format!("https://finance.yahoo.com/quote/{t}"))
    }
}

/// The unit the query cache stores per portfolio.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HoldingsResponse {
    #[serde(default)]
    pub holdings: Vec<Holding>,

    #[serde(default)]
    pub is_market_open: bool,
}
