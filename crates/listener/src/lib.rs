// Rust guideline compliant 2026-10-13

//! Change listener -- keeps one live query on pending, un-notified orders and
//! turns every added order into an SMS followed by a flag update.
//!
//! Entry points: [`ChangeListener::run`], [`ChangeListener::run_session`],
//! [`ChangeListener::start`], [`ChangeListener::dispatch`].
//! Configuration via [`ListenerConfig::builder`].
//!
//! # Restart policy
//!
//! | session end                   | next subscribe after |
//! |-------------------------------|----------------------|
//! | `subscribe` returned an error | `setup_retry_delay` (30 s) |
//! | stream error or end of stream | `error_restart_delay` (15 s) |
//! | hourly refresh                | immediately          |
//!
//! The listener is the only owner of this schedule.

pub mod slot;

use std::rc::Rc;
use std::time::Duration;

use domain::{
    ChangeBatch, ChangeKind, Document, FeedError, OrderFeed, OrderQuery, OrderStore, SmsGateway,
};
use notifier::{Delivery, Notifier};
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub use slot::SubscriptionSlot;

/// Delay before resubscribing after the subscription reported an error.
pub const ERROR_RESTART_DELAY: Duration = Duration::from_secs(15);

/// Delay before retrying after the subscribe call itself failed.
pub const SETUP_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Unconditional teardown-and-resubscribe period.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

// ---------------------------------------------------------------------------
// ListenerError
// ---------------------------------------------------------------------------

/// Errors raised while configuring a [`ChangeListener`].
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The supplied configuration is invalid.
    #[error("invalid listener configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// ListenerConfig + builder
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`ChangeListener`].
///
/// Construct via [`ListenerConfig::builder`].
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Live query to subscribe to.
    pub query: OrderQuery,
    /// Wait after a stream error before resubscribing.
    pub error_restart_delay: Duration,
    /// Wait after a failed subscribe call before retrying.
    pub setup_retry_delay: Duration,
    /// Lifetime of a healthy subscription before it is torn down and renewed.
    pub refresh_interval: Duration,
    /// Optional upper bound on subscription sessions. `None` means infinite.
    pub sessions: Option<u64>,
}

/// Builder for [`ListenerConfig`].
///
/// Obtain via [`ListenerConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct ListenerConfigBuilder {
    query: OrderQuery,
    error_restart_delay: Duration,
    setup_retry_delay: Duration,
    refresh_interval: Duration,
    sessions: Option<u64>,
}

impl ListenerConfig {
    /// Create a builder. `query` is the only required parameter.
    ///
    /// Default values: `error_restart_delay = 15 s`, `setup_retry_delay = 30 s`,
    /// `refresh_interval = 1 h`, `sessions = None`.
    #[must_use]
    pub fn builder(query: OrderQuery) -> ListenerConfigBuilder {
        ListenerConfigBuilder {
            query,
            error_restart_delay: ERROR_RESTART_DELAY,
            setup_retry_delay: SETUP_RETRY_DELAY,
            refresh_interval: REFRESH_INTERVAL,
            sessions: None,
        }
    }
}

impl ListenerConfigBuilder {
    /// Override the delay after a stream error.
    #[must_use]
    pub fn error_restart_delay(mut self, delay: Duration) -> Self {
        self.error_restart_delay = delay;
        self
    }

    /// Override the delay after a failed subscribe call.
    #[must_use]
    pub fn setup_retry_delay(mut self, delay: Duration) -> Self {
        self.setup_retry_delay = delay;
        self
    }

    /// Override the refresh period.
    #[must_use]
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Stop [`ChangeListener::run`] after `n` sessions. Without this the
    /// listener restarts forever.
    #[must_use]
    pub fn sessions(mut self, n: u64) -> Self {
        self.sessions = Some(n);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::InvalidConfig`] when the collection name is
    /// empty, the refresh interval is zero, or `sessions` is zero.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<ListenerConfig, ListenerError> {
        if self.query.collection.trim().is_empty() {
            return Err(ListenerError::InvalidConfig {
                reason: "collection name must not be empty".to_owned(),
            });
        }
        if self.refresh_interval.is_zero() {
            return Err(ListenerError::InvalidConfig {
                reason: "refresh_interval must be > 0".to_owned(),
            });
        }
        if self.sessions == Some(0) {
            return Err(ListenerError::InvalidConfig {
                reason: "sessions must be >= 1".to_owned(),
            });
        }
        Ok(ListenerConfig {
            query: self.query,
            error_restart_delay: self.error_restart_delay,
            setup_retry_delay: self.setup_retry_delay,
            refresh_interval: self.refresh_interval,
            sessions: self.sessions,
        })
    }
}

// ---------------------------------------------------------------------------
// State and outcomes
// ---------------------------------------------------------------------------

/// Lifecycle of the listener's subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Nothing subscribed yet (or shut down).
    Uninitialized,
    /// A subscription is live.
    Subscribed,
    /// The last session ended; a new subscribe is scheduled.
    ErrorPendingRestart,
}

/// Why a subscription session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    /// `OrderFeed::subscribe` failed.
    SetupFailed(FeedError),
    /// The subscription reported an error or ended on its own.
    StreamFailed(FeedError),
    /// The refresh interval elapsed.
    Refresh,
}

/// Result of processing one added order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderOutcome {
    /// Processed order.
    pub order_id: String,
    /// SMS outcome.
    pub delivery: Delivery,
    /// Whether the notification flag update succeeded.
    pub flagged: bool,
}

// ---------------------------------------------------------------------------
// ChangeListener
// ---------------------------------------------------------------------------

/// Owns the subscription slot and the restart schedule; spawns one local task
/// per added order.
///
/// The feed is injected per call; store and notifier are shared with the
/// spawned order tasks through `Rc`, so everything runs on a single thread
/// inside a `tokio::task::LocalSet`.
#[derive(Debug)]
pub struct ChangeListener<S: OrderStore, G: SmsGateway> {
    config: ListenerConfig,
    store: Rc<S>,
    notifier: Rc<Notifier<G>>,
    slot: SubscriptionSlot,
    state: ListenerState,
}

impl<S, G> ChangeListener<S, G>
where
    S: OrderStore + 'static,
    G: SmsGateway + 'static,
{
    /// Create an idle listener.
    #[must_use]
    pub fn new(config: ListenerConfig, store: Rc<S>, notifier: Rc<Notifier<G>>) -> Self {
        Self {
            config,
            store,
            notifier,
            slot: SubscriptionSlot::new(),
            state: ListenerState::Uninitialized,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// The subscription slot (read-only).
    #[must_use]
    pub fn slot(&self) -> &SubscriptionSlot {
        &self.slot
    }

    /// Release the current subscription, if any, then subscribe afresh.
    ///
    /// # Errors
    ///
    /// Returns the feed's error when subscribing fails; the state becomes
    /// [`ListenerState::ErrorPendingRestart`] and the slot stays empty.
    pub async fn start<F: OrderFeed>(&mut self, feed: &F) -> Result<(), FeedError> {
        if self.slot.release() {
            tracing::debug!("listener.subscription.released");
        }
        match feed.subscribe(&self.config.query).await {
            Ok(subscription) => {
                self.slot.install(subscription);
                self.state = ListenerState::Subscribed;
                tracing::info!(
                    collection = %self.config.query.collection,
                    installed = self.slot.installed(),
                    "listener.subscription.started"
                );
                Ok(())
            }
            Err(e) => {
                self.state = ListenerState::ErrorPendingRestart;
                Err(e)
            }
        }
    }

    /// Subscribe and process batches until the session ends.
    ///
    /// # Panics
    ///
    /// Panics if called outside a `tokio::task::LocalSet` (order tasks are
    /// spawned with `spawn_local`).
    pub async fn run_session<F: OrderFeed>(&mut self, feed: &F) -> SessionEnd {
        if let Err(e) = self.start(feed).await {
            return SessionEnd::SetupFailed(e);
        }
        let refresh_at = Instant::now() + self.config.refresh_interval;

        loop {
            // `None` = refresh timer fired.
            let next = {
                let Some(subscription) = self.slot.active_mut() else {
                    self.state = ListenerState::ErrorPendingRestart;
                    return SessionEnd::StreamFailed(FeedError::Closed);
                };
                tokio::select! {
                    () = tokio::time::sleep_until(refresh_at) => None,
                    batch = subscription.next_batch() => Some(batch),
                }
            };

            match next {
                Some(Some(Ok(batch))) => {
                    let spawned = self.dispatch(batch);
                    tracing::debug!(tasks = spawned.len(), "listener.batch.dispatched");
                }
                Some(Some(Err(e))) => {
                    self.state = ListenerState::ErrorPendingRestart;
                    return SessionEnd::StreamFailed(e);
                }
                Some(None) => {
                    self.state = ListenerState::ErrorPendingRestart;
                    return SessionEnd::StreamFailed(FeedError::Closed);
                }
                None => {
                    self.state = ListenerState::ErrorPendingRestart;
                    return SessionEnd::Refresh;
                }
            }
        }
    }

    /// Run sessions back to back, waiting the configured delay between them.
    ///
    /// Returns only when `config.sessions` is set and reached; the
    /// subscription is released before returning.
    ///
    /// # Panics
    ///
    /// Panics if called outside a `tokio::task::LocalSet`.
    pub async fn run<F: OrderFeed>(&mut self, feed: &F) {
        let mut count = 0u64;
        loop {
            let end = self.run_session(feed).await;
            count += 1;

            let delay = match &end {
                SessionEnd::SetupFailed(e) => {
                    tracing::error!(
                        error = %e,
                        retry_in = ?self.config.setup_retry_delay,
                        "listener.subscribe.failed"
                    );
                    self.config.setup_retry_delay
                }
                SessionEnd::StreamFailed(e) => {
                    tracing::error!(
                        error = %e,
                        retry_in = ?self.config.error_restart_delay,
                        "listener.subscription.failed"
                    );
                    self.config.error_restart_delay
                }
                SessionEnd::Refresh => {
                    tracing::info!("listener.subscription.refresh");
                    Duration::ZERO
                }
            };

            if let Some(max) = self.config.sessions
                && count >= max
            {
                self.shutdown();
                tracing::info!("listener.run.stopped: session limit reached after {count}");
                return;
            }

            tokio::time::sleep(delay).await;
        }
    }

    /// Release the subscription and return to [`ListenerState::Uninitialized`].
    pub fn shutdown(&mut self) {
        if self.slot.release() {
            tracing::info!("listener.subscription.released");
        }
        self.state = ListenerState::Uninitialized;
    }

    /// Spawn one local task per added order that still matches the query.
    ///
    /// Tasks are independent: none waits for another, and dropping the
    /// returned handles leaves them running.
    ///
    /// # Panics
    ///
    /// Panics if called outside a `tokio::task::LocalSet`.
    pub fn dispatch(&self, batch: ChangeBatch) -> Vec<JoinHandle<OrderOutcome>> {
        batch
            .into_iter()
            .filter_map(|event| {
                if event.kind != ChangeKind::Added {
                    tracing::debug!(
                        order_id = %event.document.id,
                        kind = ?event.kind,
                        "listener.change.ignored"
                    );
                    return None;
                }
                if !self.config.query.matches(&event.document) {
                    tracing::debug!(order_id = %event.document.id, "listener.change.filtered");
                    return None;
                }
                let store = Rc::clone(&self.store);
                let notifier = Rc::clone(&self.notifier);
                Some(tokio::task::spawn_local(async move {
                    process_order(store.as_ref(), notifier.as_ref(), event.document).await
                }))
            })
            .collect()
    }
}

/// Notify about one order, then set its flag.
///
/// The flag is set whatever the SMS outcome. A failed flag update is logged
/// and leaves the order to be picked up by the next subscription.
pub async fn process_order<S: OrderStore, G: SmsGateway>(
    store: &S,
    notifier: &Notifier<G>,
    document: Document,
) -> OrderOutcome {
    tracing::info!(order_id = %document.id, "listener.order.received");

    let message = notifier.compose(&document);
    let delivery = notifier.deliver(&message).await;

    let flagged = match store.mark_notified(&document.id).await {
        Ok(()) => {
            tracing::info!(order_id = %document.id, "listener.order.flagged");
            true
        }
        Err(e) => {
            tracing::error!(order_id = %document.id, error = %e, "listener.order.flag_failed");
            false
        }
    };

    OrderOutcome { order_id: document.id, delivery, flagged }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
