//! Feature delivery
//!
//! Records leave the agent through [`FeatureSender`]. The bundled
//! [`HttpFeatureSender`] POSTs the encoded payload to the central analytics
//! endpoint. It makes exactly one attempt per call; retrying is up to the
//! caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{error, info};

use crate::encoder::FeatureEncoder;
use crate::error::DeliveryError;
use crate::types::FeatureRecord;

/// Default request timeout for feature delivery
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Destination for computed feature records
#[async_trait]
pub trait FeatureSender: Send + Sync {
    async fn send(&self, record: &FeatureRecord) -> Result<(), DeliveryError>;
}

/// Sender posting JSON payloads to an HTTP endpoint
pub struct HttpFeatureSender {
    client: Client,
    endpoint: String,
    encoder: FeatureEncoder,
}

impl HttpFeatureSender {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            encoder: FeatureEncoder::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl FeatureSender for HttpFeatureSender {
    async fn send(&self, record: &FeatureRecord) -> Result<(), DeliveryError> {
        let payload = self.encoder.encode(record);
        let body =
            serde_json::to_vec(&payload).map_err(|e| DeliveryError::Encoding(e.to_string()))?;

        let request = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                error!(endpoint = %self.endpoint, error = %err, "failed to send features");
                return Err(DeliveryError::Http(err));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(endpoint = %self.endpoint, %status, "analytics endpoint rejected features");
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            employee_id = %record.employee_id(),
            %status,
            "features sent to analytics endpoint"
        );
        Ok(())
    }
}
