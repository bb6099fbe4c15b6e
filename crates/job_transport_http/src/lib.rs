//! HTTP implementation of the shared `job_protocol` transport contract.
//!
//! This adapter maps `job_api` request and stream primitives onto
//! [`JobTransport`], classifying every failure as transport, protocol or
//! rejected so the delivery coordinator never sees HTTP details.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use job_api::client::FrameResultStream;
use job_api::{JobApiClient, JobApiConfig, JobApiError};
use job_protocol::{
    FrameStream, JobId, JobTransport, StatusReport, SubmitRequest, TransportError,
};

/// Stable transport identifier used by startup selection.
pub const HTTP_TRANSPORT_ID: &str = "http";

/// Runtime configuration for the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    pub base_url: String,
    pub access_token: Option<String>,
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
}

impl HttpTransportConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: None,
            timeout: None,
            connect_timeout: None,
        }
    }

    #[must_use]
    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn into_job_api_config(self) -> JobApiConfig {
        let mut config = JobApiConfig::new(self.base_url);

        if let Some(access_token) = self.access_token {
            config = config.with_access_token(access_token);
        }

        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        if let Some(timeout) = self.connect_timeout {
            config = config.with_connect_timeout(timeout);
        }

        config
    }
}

#[async_trait]
trait ApiClient: Send + Sync {
    async fn submit(&self, request: &SubmitRequest) -> Result<JobId, JobApiError>;
    async fn status(&self, job_id: &JobId) -> Result<StatusReport, JobApiError>;
    async fn open_events(&self, job_id: &JobId) -> Result<FrameResultStream, JobApiError>;
}

#[async_trait]
impl ApiClient for JobApiClient {
    async fn submit(&self, request: &SubmitRequest) -> Result<JobId, JobApiError> {
        JobApiClient::submit(self, request).await
    }

    async fn status(&self, job_id: &JobId) -> Result<StatusReport, JobApiError> {
        JobApiClient::status(self, job_id).await
    }

    async fn open_events(&self, job_id: &JobId) -> Result<FrameResultStream, JobApiError> {
        JobApiClient::open_events(self, job_id).await
    }
}

/// [`JobTransport`] adapter backed by `job_api` transport primitives.
pub struct HttpJobTransport {
    client: Arc<dyn ApiClient>,
}

impl HttpJobTransport {
    /// Creates a transport using a real HTTP client.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = JobApiClient::new(config.into_job_api_config()).map_err(map_init_error)?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    #[cfg(test)]
    fn with_client_for_tests(client: Arc<dyn ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobTransport for HttpJobTransport {
    async fn submit(&self, request: &SubmitRequest) -> Result<JobId, TransportError> {
        self.client
            .submit(request)
            .await
            .map_err(JobApiError::into_transport_error)
    }

    async fn status(&self, job_id: &JobId) -> Result<StatusReport, TransportError> {
        self.client
            .status(job_id)
            .await
            .map_err(JobApiError::into_transport_error)
    }

    async fn open_events(&self, job_id: &JobId) -> Result<FrameStream, TransportError> {
        let frames = self
            .client
            .open_events(job_id)
            .await
            .map_err(JobApiError::into_transport_error)?;

        Ok(frames
            .map(|item| item.map_err(JobApiError::into_transport_error))
            .boxed())
    }
}

fn map_init_error(error: JobApiError) -> TransportError {
    tracing::warn!(%error, "http transport failed to initialize");
    TransportError::transport(format!("failed to initialize http transport: {error}"))
}
