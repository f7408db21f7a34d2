use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::info;

use crate::error::IngestError;
use crate::normalize::records_from_response;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the call audit listing endpoint.
#[derive(Debug, Clone)]
pub struct AuditClient {
    client: Client,
    url: String,
    token: Option<String>,
}

impl AuditClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, IngestError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(IngestError::Network)?;
        Ok(Self {
            client,
            url: url.into(),
            token: None,
        })
    }

    /// Sends the token as a bearer credential on every request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub async fn fetch_records(&self) -> Result<Vec<Value>, IngestError> {
        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|err| self.classify(err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Status {
                status: status.as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(|err| {
            if err.is_decode() {
                IngestError::Shape(format!("response body is not JSON: {err}"))
            } else {
                self.classify(err)
            }
        })?;
        let records = records_from_response(body)?;
        info!(url = %self.url, records = records.len(), "fetched call audits");
        Ok(records)
    }

    fn classify(&self, err: reqwest::Error) -> IngestError {
        if err.is_timeout() {
            IngestError::Timeout {
                url: self.url.clone(),
            }
        } else {
            IngestError::Network(err)
        }
    }
}

/// Where the listing comes from: the live endpoint or a saved response.
#[derive(Debug, Clone)]
pub enum AuditSource {
    Http(AuditClient),
    File(PathBuf),
}

impl AuditSource {
    pub async fn load(&self) -> Result<Vec<Value>, IngestError> {
        match self {
            AuditSource::Http(client) => client.fetch_records().await,
            AuditSource::File(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|source| IngestError::Io {
                    path: path.clone(),
                    source,
                })?;
                let body: Value = serde_json::from_slice(&bytes).map_err(|err| {
                    IngestError::Shape(format!("{} is not JSON: {err}", path.display()))
                })?;
                let records = records_from_response(body)?;
                info!(path = %path.display(), records = records.len(), "loaded call audits");
                Ok(records)
            }
        }
    }
}
