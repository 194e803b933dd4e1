use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::holding::HoldingsResponse;
use crate::models::portfolio::Portfolio;
use crate::models::requests::{
    Ack, AddHoldingRequest, BulkDeleteRequest, DiscoverResponse, SettingsUpdate, UploadFile,
};

/// The backend REST contract, one method per endpoint.
///
/// Implementations own no state beyond their transport. The dashboard only
/// talks to the backend through this trait, so tests and alternative
/// transports plug in here.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait PortfolioApi: Send + Sync {
    /// `GET /portfolios`, in server order.
    async fn list_portfolios(&self) -> Result<Vec<Portfolio>, CoreError>;

    /// `POST /portfolios`. Returns the created portfolio.
    async fn create_portfolio(&self, name: &str) -> Result<Portfolio, CoreError>;

    /// `PUT /portfolios/{id}`.
    async fn rename_portfolio(&self, id: &str, name: &str) -> Result<Ack, CoreError>;

    /// `DELETE /portfolios/{id}`.
    async fn delete_portfolio(&self, id: &str) -> Result<Ack, CoreError>;

    /// `GET /holdings?portfolio_id={id}`.
    async fn get_holdings(&self, portfolio_id: &str) -> Result<HoldingsResponse, CoreError>;

    /// `POST /holdings/add`.
    async fn add_holding(&self, request: &AddHoldingRequest) -> Result<Ack, CoreError>;

    /// `POST /holdings/delete-bulk`.
    async fn delete_holdings(&self, request: &BulkDeleteRequest) -> Result<Ack, CoreError>;

    /// `POST /settings`.
    async fn update_settings(&self, update: &SettingsUpdate) -> Result<Ack, CoreError>;

    /// `POST /discover`.
    async fn auto_discover(&self) -> Result<DiscoverResponse, CoreError>;

    /// `POST /upload` as multipart, field `file`.
    async fn upload(&self, file: &UploadFile) -> Result<Ack, CoreError>;
}
