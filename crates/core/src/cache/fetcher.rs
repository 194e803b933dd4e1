use crate::api::traits::PortfolioApi;
use crate::errors::CoreError;

use super::key::QueryKey;
use super::query_cache::CachedData;

/// Issue the read request behind a query key.
pub async fn fetch_query(api: &dyn PortfolioApi, key: &QueryKey) -> Result<CachedData, CoreError> {
    match key {
        QueryKey::Portfolios => api.list_portfolios().await.map(CachedData::Portfolios),
        QueryKey::Holdings { portfolio_id } => api
            .get_holdings(portfolio_id)
            .await
            .map(CachedData::Holdings),
    }
}
