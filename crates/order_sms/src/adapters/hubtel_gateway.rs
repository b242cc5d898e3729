// Rust guideline compliant 2026-10-15

//! Hubtel adapter for the `SmsGateway` port.
//!
//! One `POST` per message, JSON body `{"From", "To", "Content"}`, HTTP Basic
//! credentials. The raw status and body go back to the caller untouched;
//! deciding what a non-2xx answer means is the notifier's job.

use std::fmt;

use domain::{GatewayError, GatewayResponse, SmsGateway, SmsMessage};

/// `SmsGateway` adapter talking to the Hubtel SMS API.
#[derive(Clone)]
pub struct HubtelGateway {
    http: reqwest::Client,
    endpoint: String,
    client_id: String,
    client_secret: String,
}

impl fmt::Debug for HubtelGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubtelGateway")
            .field("endpoint", &self.endpoint)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl HubtelGateway {
    /// Create a gateway posting to `endpoint` with the given API credentials.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl SmsGateway for HubtelGateway {
    async fn send(&self, message: &SmsMessage) -> Result<GatewayResponse, GatewayError> {
        tracing::debug!(to = %message.to, "hubtel.send");

        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .json(message)
            .send()
            .await
            .map_err(|e| GatewayError::Request { reason: e.to_string() })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Response { reason: e.to_string() })?;

        Ok(GatewayResponse { status, body })
    }
}
