use crate::app::ports::{Publication, PublisherPort};
use crate::common::config::PublisherConfig;
use crate::common::constants;
use crate::common::error::{CatalogError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Serialize)]
struct LoadRequest<'a> {
    data_url: &'a str,
    model_url: &'a str,
}

/// Client for the OpenSpending loader API.
pub struct OpenSpendingPublisher {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenSpendingPublisher {
    pub fn new(config: &PublisherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

/// Pulls the publication URL out of a loader response body.
pub fn publication_from_response(body: &serde_json::Value) -> Result<Publication> {
    body.get(constants::PUBLICATION_URL_FIELD)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|url| Publication {
            url: url.to_string(),
        })
        .ok_or_else(|| {
            CatalogError::Publish(format!(
                "response has no '{}' field: {}",
                constants::PUBLICATION_URL_FIELD,
                body
            ))
        })
}

#[async_trait]
impl PublisherPort for OpenSpendingPublisher {
    async fn publish(&self, data_url: &str, model_url: &str) -> Result<Publication> {
        let mut req = self
            .client
            .post(&self.endpoint)
            .json(&LoadRequest { data_url, model_url });
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("ApiKey {}", key));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| CatalogError::Publish(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CatalogError::Publish(format!("{} - {}", status, body)));
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CatalogError::Publish(format!("unreadable response: {}", e)))?;

        let publication = publication_from_response(&body)?;
        info!("Published {} as {}", data_url, publication.url);
        Ok(publication)
    }
}
