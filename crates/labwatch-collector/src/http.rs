use async_trait::async_trait;
use labwatch_core::{Incident, MetricSnapshot};
use serde::de::DeserializeOwned;

use crate::source::{MetricSource, SourceError};

/// JSON HTTP 数据源：`GET {base}/metrics` 与 `GET {base}/incidents`
pub struct HttpSource {
    id: String,
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            token,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let mut request = self.client.get(self.endpoint(path));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| SourceError::InvalidPayload(e.to_string()))
    }
}

#[async_trait]
impl MetricSource for HttpSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get_metrics(&self) -> Result<Vec<MetricSnapshot>, SourceError> {
        self.fetch("metrics").await
    }

    async fn get_incidents(&self) -> Result<Vec<Incident>, SourceError> {
        self.fetch("incidents").await
    }
}
