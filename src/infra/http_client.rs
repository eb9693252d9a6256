use crate::app::ports::SourceLoaderPort;
use crate::common::error::{CatalogError, Result};
use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

/// Loads resource bodies over HTTP(S) with reqwest, or from disk for
/// `file://` URLs (the filesystem blob store hands those out).
pub struct ReqwestSourceLoader {
    client: reqwest::Client,
}

impl Default for ReqwestSourceLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestSourceLoader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SourceLoaderPort for ReqwestSourceLoader {
    async fn load(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = Url::parse(url).map_err(|e| CatalogError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        match parsed.scheme() {
            "file" => {
                let path = parsed.to_file_path().map_err(|_| CatalogError::Fetch {
                    url: url.to_string(),
                    message: "not a local file path".to_string(),
                })?;
                debug!("Reading {}", path.display());
                Ok(tokio::fs::read(&path).await?)
            }
            "http" | "https" => {
                debug!("GET {}", url);
                let resp = self.client.get(parsed).send().await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(CatalogError::Fetch {
                        url: url.to_string(),
                        message: format!("HTTP {}", status),
                    });
                }
                Ok(resp.bytes().await?.to_vec())
            }
            other => Err(CatalogError::Fetch {
                url: url.to_string(),
                message: format!("unsupported scheme '{}'", other),
            }),
        }
    }
}
