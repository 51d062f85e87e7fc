use super::{BlobObject, BlobSource, Result, StoreError};
use async_trait::async_trait;

/// Read-only template source that fetches locations over HTTP(S).
///
/// Relative locations are joined onto `base_url`; absolute `http(s)://` URLs
/// are fetched as given.
#[derive(Debug, Clone)]
pub struct HttpBlobSource {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpBlobSource {
    pub fn new(base_url: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: Option<String>) -> Self {
        Self { client, base_url }
    }

    fn url(&self, location: &str) -> Result<String> {
        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(location.to_string());
        }
        match &self.base_url {
            Some(base) => Ok(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                location.trim_start_matches('/')
            )),
            None => Err(StoreError::InvalidKey(location.to_string())),
        }
    }
}

#[async_trait]
impl BlobSource for HttpBlobSource {
    async fn get(&self, location: &str) -> Result<BlobObject> {
        let url = self.url(location)?;
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StoreError::Transfer(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(url));
        }
        if !status.is_success() {
            return Err(StoreError::Transfer(format!("{url} answered {status}")));
        }

        let content_length = response.content_length();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StoreError::Transfer(e.to_string()))?;
        Ok(BlobObject {
            bytes,
            content_length,
        })
    }
}
