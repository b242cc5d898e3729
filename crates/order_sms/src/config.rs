// Rust guideline compliant 2026-10-14

//! Process settings: command-line flags with environment fallbacks.
//!
//! Every flag can also be set through the variable named in its `env`
//! attribute; `main` loads a `.env` file first, so a plain `.env` works too.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context as _, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use clap::Parser;
use serde::Deserialize;

/// Hubtel SMS send endpoint.
pub const HUBTEL_SEND_URL: &str = "https://smsc.hubtel.com/v1/messages/send";

/// Order SMS bridge settings.
#[derive(Debug, Clone, Parser)]
#[command(name = "order_sms", version, about = "Texts the restaurant about every new pending order")]
pub struct Settings {
    /// Base64-encoded Firebase service-account JSON.
    #[arg(long, env = "FIREBASE_SERVICE_ACCOUNT_BASE64", hide_env_values = true)]
    pub service_account_base64: Option<String>,

    /// Path to a Firebase service-account JSON file.
    #[arg(long, env = "FIREBASE_SERVICE_ACCOUNT_PATH")]
    pub service_account_path: Option<PathBuf>,

    /// Firestore project id (defaults to the service account's `project_id`).
    #[arg(long, env = "FIRESTORE_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Firestore emulator `host:port`; disables authentication.
    #[arg(long, env = "FIRESTORE_EMULATOR_HOST")]
    pub emulator_host: Option<String>,

    /// Collection holding the orders.
    #[arg(long, env = "ORDERS_COLLECTION", default_value = "orders")]
    pub collection: String,

    /// Seconds between two live-query polls.
    #[arg(
        long,
        env = "FIRESTORE_POLL_INTERVAL_SECS",
        default_value_t = 2,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval_secs: u64,

    /// Hubtel API client id.
    #[arg(long, env = "HUBTEL_CLIENT_ID", hide_env_values = true)]
    pub hubtel_client_id: String,

    /// Hubtel API client secret.
    #[arg(long, env = "HUBTEL_CLIENT_SECRET", hide_env_values = true)]
    pub hubtel_client_secret: String,

    /// Phone number receiving the order alerts. Unset: orders are flagged without SMS.
    #[arg(long, env = "HUBTEL_ALERT_NUMBER")]
    pub alert_number: Option<String>,

    /// Sender id shown on the handset (max 11 characters).
    #[arg(long, env = "HUBTEL_SENDER", default_value = "Hubtel")]
    pub sender_id: String,

    /// Hubtel send endpoint.
    #[arg(long, env = "HUBTEL_ENDPOINT", default_value = HUBTEL_SEND_URL)]
    pub hubtel_endpoint: String,

    /// Currency prefix used in the message.
    #[arg(long, env = "SMS_CURRENCY", default_value = "GHC")]
    pub currency: String,

    /// HTTP port for the liveness route.
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// Public URL pinged every 5 minutes to keep the host awake.
    #[arg(long, env = "KEEP_ALIVE_URL")]
    pub keep_alive_url: Option<String>,
}

/// Where and how to reach Firestore.
#[derive(Clone, PartialEq, Eq)]
pub enum FirestoreTarget {
    /// Production Firestore, authenticated with a service account.
    ServiceAccount {
        /// Project id.
        project_id: String,
        /// Raw service-account JSON.
        key_json: String,
    },
    /// Local emulator, no authentication.
    Emulator {
        /// Project id.
        project_id: String,
        /// Emulator `host:port`.
        host: String,
    },
}

impl fmt::Debug for FirestoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceAccount { project_id, .. } => f
                .debug_struct("ServiceAccount")
                .field("project_id", project_id)
                .finish_non_exhaustive(),
            Self::Emulator { project_id, host } => f
                .debug_struct("Emulator")
                .field("project_id", project_id)
                .field("host", host)
                .finish(),
        }
    }
}

impl Settings {
    /// Resolve the Firestore target. Emulator wins, then the base64 credential,
    /// then the credential file.
    ///
    /// # Errors
    ///
    /// Fails when no credential source is set, the credential cannot be
    /// decoded or read, or no project id can be determined.
    pub fn firestore_target(&self) -> anyhow::Result<FirestoreTarget> {
        if let Some(host) = &self.emulator_host {
            let project_id = self
                .project_id
                .clone()
                .context("FIRESTORE_PROJECT_ID is required with FIRESTORE_EMULATOR_HOST")?;
            return Ok(FirestoreTarget::Emulator { project_id, host: host.clone() });
        }

        let key_json = if let Some(encoded) = &self.service_account_base64 {
            decode_service_account(encoded)?
        } else if let Some(path) = &self.service_account_path {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?
        } else {
            bail!(
                "no Firestore credentials: set FIREBASE_SERVICE_ACCOUNT_BASE64, \
                 FIREBASE_SERVICE_ACCOUNT_PATH or FIRESTORE_EMULATOR_HOST"
            );
        };

        let project_id = match &self.project_id {
            Some(project_id) => project_id.clone(),
            None => project_id_of(&key_json)?,
        };
        Ok(FirestoreTarget::ServiceAccount { project_id, key_json })
    }
}

/// Decode a base64 service-account credential into its JSON text.
///
/// # Errors
///
/// Fails on invalid base64 or non-UTF-8 content.
pub fn decode_service_account(encoded: &str) -> anyhow::Result<String> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .context("service account is not valid base64")?;
    String::from_utf8(bytes).context("service account is not UTF-8")
}

fn project_id_of(key_json: &str) -> anyhow::Result<String> {
    #[derive(Deserialize)]
    struct ServiceAccountKey {
        project_id: Option<String>,
    }

    let key: ServiceAccountKey =
        serde_json::from_str(key_json).context("service account is not valid JSON")?;
    key.project_id
        .filter(|id| !id.is_empty())
        .context("service account has no project_id")
}
