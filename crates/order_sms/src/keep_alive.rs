// Rust guideline compliant 2026-10-16

//! Periodic self-ping that stops free hosting tiers from idling the process.

use std::time::Duration;

/// Period between two pings.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Pings one URL on a fixed period. Failures never propagate.
#[derive(Debug, Clone)]
pub struct KeepAlive {
    http: reqwest::Client,
    url: String,
    interval: Duration,
}

impl KeepAlive {
    /// Ping `url` every [`KEEP_ALIVE_INTERVAL`].
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_interval(url, KEEP_ALIVE_INTERVAL)
    }

    /// Ping `url` every `interval`.
    #[must_use]
    pub fn with_interval(url: impl Into<String>, interval: Duration) -> Self {
        Self { http: reqwest::Client::new(), url: url.into(), interval }
    }

    /// Send one `GET`. Returns whether any HTTP response came back.
    pub async fn ping_once(&self) -> bool {
        match self.http.get(&self.url).send().await {
            Ok(response) => {
                tracing::debug!(status = response.status().as_u16(), "keep_alive.ping");
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "keep_alive.ping.failed");
                false
            }
        }
    }

    /// Sleep, ping, repeat. Never returns.
    pub async fn run(&self) {
        tracing::info!(url = %self.url, every_secs = self.interval.as_secs(), "keep_alive.started");
        loop {
            tokio::time::sleep(self.interval).await;
            self.ping_once().await;
        }
    }
}

/// Run `keep_alive` if configured; otherwise wait forever so callers can
/// race it inside `select!` unconditionally.
pub async fn run_optional(keep_alive: Option<&KeepAlive>) {
    match keep_alive {
        Some(keep_alive) => keep_alive.run().await,
        None => std::future::pending().await,
    }
}
