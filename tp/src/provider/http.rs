//! JSON-over-HTTP adapter to an external provider service

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{
    ActivityContext, AlternativesQuery, FlightQuery, ForecastQuery, HotelQuery, ProviderError, ProviderGateway,
};
use crate::domain::{Activity, FlightOption, HotelOption, TimeSlot, WeatherDay};

/// Transport-level ceiling; per-call deadlines are tighter and set by the caller
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest error body kept in a `Status` error
const MAX_ERROR_BODY: usize = 512;

pub struct HttpGateway {
    base_url: String,
    http: Client,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Result<Self, ProviderError> {
        debug!(%base_url, "HttpGateway::new: called");
        if base_url.trim().is_empty() {
            return Err(ProviderError::Unavailable("providers.base-url is not set".to_string()));
        }
        let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ProviderError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, "post: called");
        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(MAX_ERROR_BODY);
            warn!(%url, status = status.as_u16(), "post: provider returned error status");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ProviderError::Decode(format!("{path}: {e}")))
    }
}

#[async_trait]
impl ProviderGateway for HttpGateway {
    async fn search_flights(&self, query: &FlightQuery) -> Result<Vec<FlightOption>, ProviderError> {
        self.post("/flights/search", query).await
    }

    async fn search_hotels(&self, query: &HotelQuery) -> Result<Vec<HotelOption>, ProviderError> {
        self.post("/hotels/search", query).await
    }

    async fn forecast(&self, query: &ForecastQuery) -> Result<Vec<WeatherDay>, ProviderError> {
        self.post("/weather/forecast", query).await
    }

    async fn plan_activities(&self, context: &ActivityContext) -> Result<Vec<TimeSlot>, ProviderError> {
        self.post("/activities/plan", context).await
    }

    async fn alternatives(&self, query: &AlternativesQuery) -> Result<Vec<Activity>, ProviderError> {
        self.post("/activities/alternatives", query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_base_url() {
        assert!(matches!(HttpGateway::new("  "), Err(ProviderError::Unavailable(_))));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let gateway = HttpGateway::new("http://localhost:8080/").unwrap();
        assert_eq!(gateway.url("/flights/search"), "http://localhost:8080/flights/search");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        let gateway = HttpGateway::new("http://127.0.0.1:9").unwrap();
        let query = ForecastQuery {
            destination: "Berlin".to_string(),
            start: chrono::NaiveDate::from_ymd_opt(2025, 11, 20).unwrap(),
            end: chrono::NaiveDate::from_ymd_opt(2025, 11, 23).unwrap(),
        };
        assert!(matches!(gateway.forecast(&query).await, Err(ProviderError::Network(_))));
    }
}
