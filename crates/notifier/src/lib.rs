// Rust guideline compliant 2026-10-12

//! Notifier component -- renders an order document as an SMS and hands it to
//! the `SmsGateway` port.
//!
//! Entry points: [`Notifier::compose`], [`Notifier::deliver`].
//! Configuration via [`NotifierConfig::builder`].

pub mod format;

use domain::{Document, GatewayError, SmsGateway, SmsMessage};

pub use format::{OrderDisplay, render};

/// Longest alphanumeric sender id SMS networks accept.
pub const MAX_SENDER_LEN: usize = 11;

// ---------------------------------------------------------------------------
// NotifierError
// ---------------------------------------------------------------------------

/// Errors raised while configuring a [`Notifier`].
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    /// The supplied configuration is invalid.
    #[error("invalid notifier configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// NotifierConfig + builder
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`Notifier`].
///
/// Construct via [`NotifierConfig::builder`].
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Sender id placed in the `From` field.
    pub sender_id: String,
    /// Destination number. `None` disables sending.
    pub alert_number: Option<String>,
    /// Prefix for every amount in the message (e.g. `"GHC"`, `"GH₵"`).
    pub currency: String,
}

/// Builder for [`NotifierConfig`].
///
/// Obtain via [`NotifierConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct NotifierConfigBuilder {
    sender_id: String,
    alert_number: Option<String>,
    currency: String,
}

impl NotifierConfig {
    /// Create a builder. `sender_id` is the only required parameter.
    ///
    /// Default values: `alert_number = None`, `currency = "GHC"`.
    #[must_use]
    pub fn builder(sender_id: impl Into<String>) -> NotifierConfigBuilder {
        NotifierConfigBuilder {
            sender_id: sender_id.into(),
            alert_number: None,
            // ASCII keeps the message in the GSM-7 alphabet (one SMS part, not UCS-2).
            currency: "GHC".to_owned(),
        }
    }
}

impl NotifierConfigBuilder {
    /// Set the destination number. Blank values leave sending disabled.
    #[must_use]
    pub fn alert_number(mut self, number: impl Into<String>) -> Self {
        let number = number.into().trim().to_owned();
        self.alert_number = (!number.is_empty()).then_some(number);
        self
    }

    /// Override the currency prefix.
    #[must_use]
    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError::InvalidConfig`] when the sender id is empty or
    /// longer than [`MAX_SENDER_LEN`] characters.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<NotifierConfig, NotifierError> {
        let len = self.sender_id.chars().count();
        if len == 0 || len > MAX_SENDER_LEN {
            return Err(NotifierError::InvalidConfig {
                reason: format!("sender id must be 1..={MAX_SENDER_LEN} characters, got {len}"),
            });
        }
        Ok(NotifierConfig {
            sender_id: self.sender_id,
            alert_number: self.alert_number,
            currency: self.currency,
        })
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// What happened to one message. Every variant is final: nothing is retried.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// No alert number configured; the gateway was not called.
    Skipped,
    /// Gateway answered 2xx.
    Accepted {
        /// HTTP status.
        status: u16,
    },
    /// Gateway answered with a non-success status.
    Rejected {
        /// HTTP status.
        status: u16,
        /// Response body as returned.
        body: String,
    },
    /// No usable response.
    Failed(GatewayError),
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Formats order alerts and sends them through an `SmsGateway` adapter.
///
/// Stateless apart from its configuration; safe to share behind an `Rc`
/// between concurrently running order tasks.
#[derive(Debug)]
pub struct Notifier<G: SmsGateway> {
    config: NotifierConfig,
    gateway: G,
}

impl<G: SmsGateway> Notifier<G> {
    /// Create a notifier sending through `gateway`.
    #[must_use]
    pub fn new(config: NotifierConfig, gateway: G) -> Self {
        Self { config, gateway }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// Render the alert text for `document`.
    #[must_use]
    pub fn compose(&self, document: &Document) -> String {
        render(&OrderDisplay::project(document), &self.config.currency)
    }

    /// Send `message` to the configured alert number.
    ///
    /// Never fails: rejections and transport errors are logged at error level
    /// and reported through the returned [`Delivery`].
    pub async fn deliver(&self, message: &str) -> Delivery {
        let Some(to) = self.config.alert_number.as_deref() else {
            tracing::warn!("notifier.delivery.skipped: no alert number configured");
            return Delivery::Skipped;
        };

        let sms = SmsMessage {
            from: self.config.sender_id.clone(),
            to: to.to_owned(),
            content: message.to_owned(),
        };

        match self.gateway.send(&sms).await {
            Ok(response) if response.is_success() => {
                tracing::info!(
                    status = response.status,
                    body = %response.body,
                    "notifier.delivery.accepted"
                );
                Delivery::Accepted { status: response.status }
            }
            Ok(response) => {
                tracing::error!(
                    status = response.status,
                    body = %response.body,
                    "notifier.delivery.rejected"
                );
                Delivery::Rejected { status: response.status, body: response.body }
            }
            Err(e) => {
                tracing::error!(error = %e, "notifier.delivery.failed");
                Delivery::Failed(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
