// Rust guideline compliant 2026-10-12

//! Shared domain types for the order SMS bridge.
//!
//! Defines `Document`, `ChangeEvent`, `OrderQuery`, `Subscription`, `SmsMessage`,
//! the error enums, and the hexagonal port traits: `OrderFeed`, `OrderStore`,
//! and `SmsGateway`. All pipeline components depend on this crate.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

/// Order field holding the lifecycle status.
pub const STATUS_FIELD: &str = "status";

/// Order field holding the notification flag.
pub const NOTIFIED_FIELD: &str = "smsSent";

/// Status value of an order waiting for the restaurant.
pub const PENDING_STATUS: &str = "pending";

// ---------------------------------------------------------------------------
// Documents and change events
// ---------------------------------------------------------------------------

/// A document snapshot delivered by the store: opaque key plus loosely-typed fields.
///
/// Fields are kept as raw JSON values. Consumers project them defensively;
/// nothing here assumes a field exists or has the expected type.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document key within its collection.
    pub id: String,
    /// Top-level fields.
    pub fields: Map<String, Value>,
}

impl Document {
    /// Create a document from an id and a field map.
    #[must_use]
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self { id: id.into(), fields }
    }

    /// Create a document from a JSON value. A non-object value yields no fields.
    #[must_use]
    pub fn from_value(id: impl Into<String>, value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(id, fields)
    }

    /// Look up a top-level field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Classification of a change record within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Document entered the query result set.
    Added,
    /// Document changed but still matches.
    Modified,
    /// Document left the query result set.
    Removed,
}

/// One change record of a subscription batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// How the document changed relative to the previous result set.
    pub kind: ChangeKind,
    /// Snapshot of the document after the change (before it, for `Removed`).
    pub document: Document,
}

impl ChangeEvent {
    /// Shorthand for an `Added` event.
    #[must_use]
    pub fn added(document: Document) -> Self {
        Self { kind: ChangeKind::Added, document }
    }

    /// Shorthand for a `Modified` event.
    #[must_use]
    pub fn modified(document: Document) -> Self {
        Self { kind: ChangeKind::Modified, document }
    }

    /// Shorthand for a `Removed` event.
    #[must_use]
    pub fn removed(document: Document) -> Self {
        Self { kind: ChangeKind::Removed, document }
    }
}

/// Change records delivered together by one push from the store.
pub type ChangeBatch = Vec<ChangeEvent>;

/// Item carried on a subscription channel: a batch, or the error that ended it.
pub type BatchResult = Result<ChangeBatch, FeedError>;

// ---------------------------------------------------------------------------
// OrderQuery
// ---------------------------------------------------------------------------

/// Live query over a collection: `status == <status> AND smsSent == <notified>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
    /// Collection holding the orders (e.g. `"orders"`).
    pub collection: String,
    /// Required value of [`STATUS_FIELD`].
    pub status: String,
    /// Required value of [`NOTIFIED_FIELD`].
    pub notified: bool,
}

impl OrderQuery {
    /// The query the bridge listens on: pending orders not yet notified.
    #[must_use]
    pub fn pending_unnotified(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            status: PENDING_STATUS.to_owned(),
            notified: false,
        }
    }

    /// Whether `document` satisfies both equality predicates.
    ///
    /// Mirrors store semantics: a missing or mistyped field never matches.
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        let status = document.get(STATUS_FIELD).and_then(Value::as_str);
        let notified = document.get(NOTIFIED_FIELD).and_then(Value::as_bool);
        status == Some(self.status.as_str()) && notified == Some(self.notified)
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Handle on a live query. Dropping or [`release`](Self::release)-ing it stops
/// the underlying stream.
///
/// Batches arrive on an unbounded channel fed by the adapter. An `Err` item is
/// the adapter's error channel; `None` from [`next_batch`](Self::next_batch)
/// means the adapter side went away.
pub struct Subscription {
    batches: mpsc::UnboundedReceiver<BatchResult>,
    on_release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Wrap an existing receiver.
    #[must_use]
    pub fn new(batches: mpsc::UnboundedReceiver<BatchResult>) -> Self {
        Self { batches, on_release: None }
    }

    /// Create a subscription together with the sender an adapter pushes into.
    #[must_use]
    pub fn channel() -> (mpsc::UnboundedSender<BatchResult>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx))
    }

    /// Register a hook run exactly once when the subscription is released.
    #[must_use]
    pub fn on_release(mut self, hook: impl FnOnce() + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// Wait for the next batch or error. `None` once the adapter side is gone.
    pub async fn next_batch(&mut self) -> Option<BatchResult> {
        self.batches.recv().await
    }

    /// Stop the stream and run the release hook.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.batches.close();
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("has_release_hook", &self.on_release.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SMS gateway payloads
// ---------------------------------------------------------------------------

/// Outbound SMS as serialized on the wire: `{"From", "To", "Content"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SmsMessage {
    /// Sender id shown on the handset.
    pub from: String,
    /// Destination phone number.
    pub to: String,
    /// Message text.
    pub content: String,
}

/// Raw gateway answer: HTTP status plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, JSON or plain text depending on the gateway.
    pub body: String,
}

impl GatewayResponse {
    /// `true` for any 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the `OrderFeed` port and its subscriptions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeedError {
    /// The subscription could not be established.
    #[error("subscribe failed: {reason}")]
    Subscribe {
        /// Human-readable description.
        reason: String,
    },
    /// An established subscription reported an error.
    #[error("subscription stream failed: {reason}")]
    Stream {
        /// Human-readable description.
        reason: String,
    },
    /// The subscription ended without reporting an error.
    #[error("subscription closed")]
    Closed,
}

/// Errors from the `OrderStore` port.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The document does not exist (anymore).
    #[error("order {id} not found")]
    NotFound {
        /// Order id.
        id: String,
    },
    /// The update was rejected or could not be sent.
    #[error("update of order {id} failed: {reason}")]
    UpdateFailed {
        /// Order id.
        id: String,
        /// Human-readable description.
        reason: String,
    },
}

/// Errors from the `SmsGateway` port.
///
/// A non-2xx answer is not an error here; it comes back as a [`GatewayResponse`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    /// The request never produced a response (DNS, TLS, connection reset...).
    #[error("gateway request failed: {reason}")]
    Request {
        /// Human-readable description.
        reason: String,
    },
    /// A response arrived but its body could not be read.
    #[error("gateway response unreadable: {reason}")]
    Response {
        /// Human-readable description.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Hexagonal port: live, server-pushed queries over the order collection.
///
/// The change listener depends exclusively on this trait -- never on a
/// concrete adapter.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait OrderFeed {
    /// Start a live query. The first batch carries every matching document as
    /// [`ChangeKind::Added`].
    ///
    /// # Errors
    ///
    /// Returns `FeedError::Subscribe` when the subscription cannot be set up.
    async fn subscribe(&self, query: &OrderQuery) -> Result<Subscription, FeedError>;
}

/// Hexagonal port: the single mutation the bridge performs on an order.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait OrderStore {
    /// Set the notification flag of `order_id` to `true` (partial update).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` when the order is gone, or
    /// `StoreError::UpdateFailed` on any other failure.
    async fn mark_notified(&self, order_id: &str) -> Result<(), StoreError>;
}

/// Hexagonal port: outbound SMS delivery.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait SmsGateway {
    /// Submit one message and return the gateway's raw answer.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` when no readable response was obtained.
    async fn send(&self, message: &SmsMessage) -> Result<GatewayResponse, GatewayError>;
}
