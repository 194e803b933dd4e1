use async_trait::async_trait;
use log::{debug, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::errors::CoreError;
use crate::models::holding::HoldingsResponse;
use crate::models::portfolio::Portfolio;
use crate::models::requests::{
    Ack, AddHoldingRequest, BulkDeleteRequest, CreatePortfolioResponse, DiscoverResponse,
    PortfolioNameRequest, SettingsUpdate, UploadFile,
};

use super::traits::PortfolioApi;

/// reqwest-backed client for the dashboard backend.
///
/// Stateless apart from the connection pool; every call is a single request
/// and nothing is retried.
#[derive(Debug, Clone)]
pub struct HttpPortfolioApi {
    client: Client,
    base_url: String,
}

/// FastAPI-style error body.
#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
    error: Option<String>,
}

impl HttpPortfolioApi {
    pub fn new(config: &ClientConfig) -> Self {
        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(config.request_timeout);
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a response into `T`, mapping non-2xx statuses to `CoreError::Api`.
    async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, CoreError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("API request failed ({status}): {body}");
            return Err(CoreError::Api {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        debug!("API response ({status}): {} bytes", body.len());
        serde_json::from_str(&body)
            .map_err(|e| CoreError::Deserialization(format!("Failed to parse response: {e}")))
    }

    async fn parse_ack(response: Response) -> Result<Ack, CoreError> {
        let status = response.status().as_u16();
        // Some endpoints answer with an empty body.
        let ack = match Self::parse_response::<Option<Ack>>(response).await {
            Ok(ack) => ack.unwrap_or_default(),
            Err(CoreError::Deserialization(_)) => Ack::default(),
            Err(e) => return Err(e),
        };
        ack.into_result(status)
    }
}

fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
        None => parsed.error,
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl PortfolioApi for HttpPortfolioApi {
    async fn list_portfolios(&self) -> Result<Vec<Portfolio>, CoreError> {
        let url = self.url("/portfolios");
        debug!("GET {url}");
        let response = self.client.get(&url).send().await?;
        Self::parse_response(response).await
    }

    async fn create_portfolio(&self, name: &str) -> Result<Portfolio, CoreError> {
        let url = self.url("/portfolios");
        debug!("POST {url}");
        let response = self
            .client
            .post(&url)
            .json(&PortfolioNameRequest { name: name.to_string() })
            .send()
            .await?;
        let status = response.status().as_u16();
        let created: CreatePortfolioResponse = Self::parse_response(response).await?;

        if created.success == Some(false) {
            return Err(CoreError::Api {
                status,
                detail: created.error.or_else(|| Some("Failed to create portfolio".into())),
            });
        }
        created.portfolio.ok_or_else(|| {
            CoreError::Deserialization("Create response did not include the portfolio".into())
        })
    }

    async fn rename_portfolio(&self, id: &str, name: &str) -> Result<Ack, CoreError> {
        let url = self.url(&format!("/portfolios/{id}"));
        debug!("PUT {url}");
        let response = self
            .client
            .put(&url)
            .json(&PortfolioNameRequest { name: name.to_string() })
            .send()
            .await?;
        Self::parse_ack(response).await
    }

    async fn delete_portfolio(&self, id: &str) -> Result<Ack, CoreError> {
        let url = self.url(&format!("/portfolios/{id}"));
        debug!("DELETE {url}");
        let response = self.client.delete(&url).send().await?;
        Self::parse_ack(response).await
    }

    async fn get_holdings(&self, portfolio_id: &str) -> Result<HoldingsResponse, CoreError> {
        let url = self.url("/holdings");
        debug!("GET {url} (portfolio {portfolio_id})");
        let response = self
            .client
            .get(&url)
            .query(&[("portfolio_id", portfolio_id)])
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn add_holding(&self, request: &AddHoldingRequest) -> Result<Ack, CoreError> {
        let url = self.url("/holdings/add");
        debug!("POST {url} ({})", request.isin);
        let response = self.client.post(&url).json(request).send().await?;
        Self::parse_ack(response).await
    }

    async fn delete_holdings(&self, request: &BulkDeleteRequest) -> Result<Ack, CoreError> {
        let url = self.url("/holdings/delete-bulk");
        debug!("POST {url} ({} holdings)", request.isins.len());
        let response = self.client.post(&url).json(request).send().await?;
        Self::parse_ack(response).await
    }

    async fn update_settings(&self, update: &SettingsUpdate) -> Result<Ack, CoreError> {
        let url = self.url("/settings");
        debug!("POST {url} ({})", update.isin);
        let response = self.client.post(&url).json(update).send().await?;
        Self::parse_ack(response).await
    }

    async fn auto_discover(&self) -> Result<DiscoverResponse, CoreError> {
        let url = self.url("/discover");
        debug!("POST {url}");
        let response = self.client.post(&url).send().await?;
        Self::parse_response(response).await
    }

    async fn upload(&self, file: &UploadFile) -> Result<Ack, CoreError> {
        let url = self.url("/upload");
        debug!("POST {url} ({}, {} bytes)", file.file_name, file.bytes.len());
        let part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
        let form = Form::new().part("file", part);
        let response = self.client.post(&url).multipart(form).send().await?;
        Self::parse_ack(response).await
    }
}
