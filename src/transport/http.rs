//! reqwest-backed transport

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, Url};
use std::time::Duration;
use tracing::{debug, warn};

use super::AnalyticsTransport;
use crate::config::ClientConfig;
use crate::csv_import::{ImportFile, CSV_CONTENT_TYPE};
use crate::error::AnalyticsError;
use crate::query::RiskQuery;

/// HTTP transport for the analytics service
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, AnalyticsError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url()?,
            api_token: config.api_token.clone(),
        })
    }

    /// Append percent-encoded path segments to the base URL
    fn endpoint(&self, segments: &[&str]) -> Result<Url, AnalyticsError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AnalyticsError::Config("base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, AnalyticsError> {
        let response = self.authorize(request).send().await.map_err(|e| {
            warn!(error = %e, "analytics request failed");
            AnalyticsError::from(e)
        })?;
        check_status(response).await
    }
}

/// Turn a non-success response into `Service`, keeping the body verbatim
async fn check_status(response: Response) -> Result<Response, AnalyticsError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body
    };
    warn!(status = status.as_u16(), "analytics service returned an error");

    Err(AnalyticsError::Service {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl AnalyticsTransport for HttpTransport {
    async fn fetch_risk(
        &self,
        athlete_id: &str,
        query: &RiskQuery,
    ) -> Result<String, AnalyticsError> {
        let url = self.endpoint(&["athletes", athlete_id, "risk"])?;
        debug!(%url, from = %query.from, to = %query.to, "fetching risk series");

        let response = self
            .send(self.client.get(url).query(&query.query_pairs()))
            .await?;
        Ok(response.text().await?)
    }

    async fn upload_metrics(
        &self,
        session_id: &str,
        file: &ImportFile,
    ) -> Result<(), AnalyticsError> {
        let url = self.endpoint(&["sessions", session_id, "metrics", "import"])?;
        let content_type = file.content_type.as_deref().unwrap_or(CSV_CONTENT_TYPE);

        let part = Part::bytes(file.bytes.clone())
            .file_name(file.upload_name())
            .mime_str(content_type)?;
        let form = Form::new().part("file", part);

        debug!(%url, size = file.bytes.len(), "uploading metrics file");
        self.send(self.client.post(url).multipart(form)).await?;
        Ok(())
    }

    async fn fetch_answers(&self, session_id: &str) -> Result<String, AnalyticsError> {
        let url = self.endpoint(&["sessions", session_id, "answers"])?;
        debug!(%url, "fetching answers");

        let response = self.send(self.client.get(url)).await?;
        Ok(response.text().await?)
    }
}
