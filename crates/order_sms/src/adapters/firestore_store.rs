// Rust guideline compliant 2026-10-15

//! Firestore adapter for the `OrderFeed` and `OrderStore` ports (REST v1).
//!
//! # Live queries
//!
//! The REST surface has no push channel, so a live query is a `runQuery`
//! poll: the first result set is delivered whole as `Added` events, and each
//! later poll is diffed against the previous one (by document id and
//! `updateTime`) into `Added` / `Modified` / `Removed` events. Empty diffs
//! are not delivered. A failed poll is reported once on the subscription's
//! error channel and ends the stream, like a snapshot listener error does.
//!
//! # Authentication
//!
//! Production uses an OAuth2 bearer token minted from the service account
//! (`gcp_auth`, datastore scope). The emulator accepts the fixed `owner`
//! token over plain HTTP.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use domain::{
    BatchResult, ChangeBatch, ChangeEvent, Document, FeedError, NOTIFIED_FIELD, OrderFeed,
    OrderQuery, OrderStore, STATUS_FIELD, StoreError, Subscription,
};
use gcp_auth::{CustomServiceAccount, TokenProvider as _};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::sync::mpsc::UnboundedSender;

use super::firestore_value::{decode_fields, document_id};
use crate::config::FirestoreTarget;

const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const EMULATOR_TOKEN: &str = "owner";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
enum FirestoreError {
    #[error("token: {0}")]
    Auth(#[from] gcp_auth::Error),
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("firestore answered {status}: {body}")]
    Status { status: u16, body: String },
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One element of the `runQuery` response array. Rows without a document
/// only carry progress information (`readTime`, `skippedResults`).
#[derive(Debug, Deserialize)]
struct RunQueryRow {
    document: Option<RawDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
    #[serde(default)]
    update_time: String,
}

/// A fetched document together with its server revision.
#[derive(Debug, Clone, PartialEq)]
struct Revision {
    update_time: String,
    document: Document,
}

impl From<RawDocument> for Revision {
    fn from(raw: RawDocument) -> Self {
        Self {
            document: Document::new(document_id(&raw.name), decode_fields(&raw.fields)),
            update_time: raw.update_time,
        }
    }
}

/// `runQuery` request body for `query`.
fn structured_query(query: &OrderQuery) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": query.collection }],
            "where": {
                "compositeFilter": {
                    "op": "AND",
                    "filters": [
                        {
                            "fieldFilter": {
                                "field": { "fieldPath": STATUS_FIELD },
                                "op": "EQUAL",
                                "value": { "stringValue": query.status }
                            }
                        },
                        {
                            "fieldFilter": {
                                "field": { "fieldPath": NOTIFIED_FIELD },
                                "op": "EQUAL",
                                "value": { "booleanValue": query.notified }
                            }
                        }
                    ]
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// SnapshotTracker
// ---------------------------------------------------------------------------

/// Last result set seen by a poll loop, keyed by document id.
#[derive(Debug, Default)]
struct SnapshotTracker {
    known: BTreeMap<String, Revision>,
}

impl SnapshotTracker {
    /// Replace the remembered result set with `current` and return the changes.
    /// Removals come first, then additions and modifications in result order.
    fn diff(&mut self, current: Vec<Revision>) -> ChangeBatch {
        let mut previous = std::mem::take(&mut self.known);
        let mut upserts = Vec::new();

        for revision in current {
            let id = revision.document.id.clone();
            match previous.remove(&id) {
                None => upserts.push(ChangeEvent::added(revision.document.clone())),
                Some(old) if old.update_time != revision.update_time => {
                    upserts.push(ChangeEvent::modified(revision.document.clone()));
                }
                Some(_) => {}
            }
            self.known.insert(id, revision);
        }

        let mut batch: ChangeBatch = previous
            .into_values()
            .map(|gone| ChangeEvent::removed(gone.document))
            .collect();
        batch.extend(upserts);
        batch
    }
}

// ---------------------------------------------------------------------------
// FirestoreOrders
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Auth {
    ServiceAccount(Arc<CustomServiceAccount>),
    Emulator,
}

/// Firestore-backed order feed and store.
///
/// Cheap to clone; clones share the HTTP connection pool and token cache.
#[derive(Clone)]
pub struct FirestoreOrders {
    http: reqwest::Client,
    documents_url: String,
    collection: String,
    auth: Auth,
    poll_interval: Duration,
}

impl fmt::Debug for FirestoreOrders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirestoreOrders")
            .field("documents_url", &self.documents_url)
            .field("collection", &self.collection)
            .field("emulator", &matches!(self.auth, Auth::Emulator))
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl FirestoreOrders {
    /// Build the adapter for `target`. No request is sent yet.
    ///
    /// # Errors
    ///
    /// Returns `gcp_auth::Error` when the service-account key cannot be parsed.
    pub fn connect(
        target: &FirestoreTarget,
        collection: impl Into<String>,
        poll_interval: Duration,
    ) -> Result<Self, gcp_auth::Error> {
        let (base, project_id, auth) = match target {
            FirestoreTarget::ServiceAccount { project_id, key_json } => {
                let account = CustomServiceAccount::from_json(key_json)?;
                (FIRESTORE_URL.to_owned(), project_id, Auth::ServiceAccount(Arc::new(account)))
            }
            FirestoreTarget::Emulator { project_id, host } => {
                (format!("http://{host}/v1"), project_id, Auth::Emulator)
            }
        };

        Ok(Self {
            http: reqwest::Client::new(),
            documents_url: format!("{base}/projects/{project_id}/databases/(default)/documents"),
            collection: collection.into(),
            auth,
            poll_interval,
        })
    }

    async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, FirestoreError> {
        match &self.auth {
            Auth::Emulator => Ok(request.bearer_auth(EMULATOR_TOKEN)),
            Auth::ServiceAccount(account) => {
                let token = account.token(&[DATASTORE_SCOPE]).await?;
                Ok(request.bearer_auth(token.as_str()))
            }
        }
    }

    /// `PATCH` target for the flag update. The id is pushed as one encoded
    /// path segment, so `#`, `?` or `/` in an id cannot escape it.
    fn document_url(&self, order_id: &str) -> Result<reqwest::Url, String> {
        let mut url = reqwest::Url::parse(&self.documents_url).map_err(|e| e.to_string())?;
        url.path_segments_mut()
            .map_err(|()| format!("{} cannot take path segments", self.documents_url))?
            .push(&self.collection)
            .push(order_id);
        url.query_pairs_mut()
            .append_pair("updateMask.fieldPaths", NOTIFIED_FIELD)
            .append_pair("currentDocument.exists", "true");
        Ok(url)
    }

    async fn run_query(&self, query: &OrderQuery) -> Result<Vec<Revision>, FirestoreError> {
        let request = self
            .http
            .post(format!("{}:runQuery", self.documents_url))
            .json(&structured_query(query));
        let response = self.authorize(request).await?.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FirestoreError::Status { status: status.as_u16(), body });
        }

        let rows: Vec<RunQueryRow> = response.json().await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.document)
            .map(Revision::from)
            .collect())
    }

    /// Poll loop behind one subscription. Ends on the first failed poll or
    /// once the receiving side is gone.
    async fn poll(
        self,
        query: OrderQuery,
        mut tracker: SnapshotTracker,
        tx: UnboundedSender<BatchResult>,
    ) {
        loop {
            tokio::time::sleep(self.poll_interval).await;
            if tx.is_closed() {
                return;
            }

            match self.run_query(&query).await {
                Ok(current) => {
                    let batch = tracker.diff(current);
                    if !batch.is_empty() && tx.send(Ok(batch)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "firestore.poll.failed");
                    // The receiver may already be gone; nothing left to tell.
                    tx.send(Err(FeedError::Stream { reason: e.to_string() })).ok();
                    return;
                }
            }
        }
    }
}

impl OrderFeed for FirestoreOrders {
    async fn subscribe(&self, query: &OrderQuery) -> Result<Subscription, FeedError> {
        let initial = self
            .run_query(query)
            .await
            .map_err(|e| FeedError::Subscribe { reason: e.to_string() })?;

        let mut tracker = SnapshotTracker::default();
        let first = tracker.diff(initial);
        tracing::debug!(documents = first.len(), "firestore.subscribe.snapshot");

        let (tx, subscription) = Subscription::channel();
        // Receiver is alive: the subscription has not left this function.
        tx.send(Ok(first)).ok();

        let task = tokio::spawn(self.clone().poll(query.clone(), tracker, tx));
        Ok(subscription.on_release(move || task.abort()))
    }
}

impl OrderStore for FirestoreOrders {
    async fn mark_notified(&self, order_id: &str) -> Result<(), StoreError> {
        let failed = |reason: String| StoreError::UpdateFailed { id: order_id.to_owned(), reason };

        let url = self.document_url(order_id).map_err(failed)?;
        let request = self
            .http
            .patch(url)
            .json(&json!({ "fields": { NOTIFIED_FIELD: { "booleanValue": true } } }));
        let request = self.authorize(request).await.map_err(|e| failed(e.to_string()))?;
        let response = request.send().await.map_err(|e| failed(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            reqwest::StatusCode::NOT_FOUND => Err(StoreError::NotFound { id: order_id.to_owned() }),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(failed(format!("firestore answered {}: {body}", status.as_u16())))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{FirestoreOrders, Revision, SnapshotTracker, structured_query};
    use crate::config::FirestoreTarget;
    use axum::Router;
    use axum::http::{Method, StatusCode, Uri};
    use domain::{
        ChangeKind, Document, FeedError, GatewayError, GatewayResponse, OrderFeed, OrderQuery,
        OrderStore, SmsGateway, SmsMessage, StoreError,
    };
    use listener::{ChangeListener, ListenerConfig, SessionEnd};
    use notifier::{Notifier, NotifierConfig};
    use serde_json::{Value, json};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::task::LocalSet;

    // -- tracker ------------------------------------------------------------

    fn revision(id: &str, update_time: &str) -> Revision {
        Revision {
            update_time: update_time.to_owned(),
            document: Document::from_value(id, json!({ "status": "pending" })),
        }
    }

    fn kinds(batch: &[domain::ChangeEvent]) -> Vec<(ChangeKind, &str)> {
        batch.iter().map(|e| (e.kind, e.document.id.as_str())).collect()
    }

    #[test]
    fn first_diff_reports_everything_added() {
        let mut tracker = SnapshotTracker::default();
        let batch = tracker.diff(vec![revision("a", "t1"), revision("b", "t1")]);
        assert_eq!(kinds(&batch), vec![(ChangeKind::Added, "a"), (ChangeKind::Added, "b")]);
    }

    #[test]
    fn later_diffs_report_only_changes() {
        let mut tracker = SnapshotTracker::default();
        tracker.diff(vec![revision("a", "t1"), revision("b", "t1")]);

        let batch = tracker.diff(vec![revision("a", "t2"), revision("c", "t1")]);
        assert_eq!(
            kinds(&batch),
            vec![
                (ChangeKind::Removed, "b"),
                (ChangeKind::Modified, "a"),
                (ChangeKind::Added, "c"),
            ]
        );

        let batch = tracker.diff(vec![revision("a", "t2"), revision("c", "t1")]);
        assert!(batch.is_empty());
    }

    #[test]
    fn query_filters_status_and_flag() {
        let body = structured_query(&OrderQuery::pending_unnotified("orders"));
        let query = &body["structuredQuery"];

        assert_eq!(query["from"], json!([{ "collectionId": "orders" }]));
        assert_eq!(query["where"]["compositeFilter"]["op"], "AND");
        let filters = &query["where"]["compositeFilter"]["filters"];
        assert_eq!(filters[0]["fieldFilter"]["field"]["fieldPath"], "status");
        assert_eq!(filters[0]["fieldFilter"]["value"], json!({ "stringValue": "pending" }));
        assert_eq!(filters[1]["fieldFilter"]["field"]["fieldPath"], "smsSent");
        assert_eq!(filters[1]["fieldFilter"]["value"], json!({ "booleanValue": false }));
    }

    // -- emulator-mode HTTP -------------------------------------------------

    #[derive(Debug, Clone)]
    struct Seen {
        method: Method,
        uri: Uri,
        authorization: Option<String>,
        body: Value,
    }

    #[derive(Debug)]
    struct MockFirestore {
        /// Replies served in order; the last one repeats.
        replies: Vec<(StatusCode, Value)>,
        served: usize,
        seen: Vec<Seen>,
    }

    async fn spawn_firestore(
        replies: Vec<(StatusCode, Value)>,
    ) -> (String, Arc<Mutex<MockFirestore>>) {
        let state = Arc::new(Mutex::new(MockFirestore { replies, served: 0, seen: vec![] }));
        let shared = Arc::clone(&state);

        let app = Router::new().fallback(
            move |method: Method, uri: Uri, headers: axum::http::HeaderMap, body: String| {
                let shared = Arc::clone(&shared);
                async move {
                    let mut mock = shared.lock().unwrap();
                    mock.seen.push(Seen {
                        method,
                        uri,
                        authorization: headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_owned),
                        body: serde_json::from_str(&body).unwrap_or(Value::Null),
                    });
                    let index = mock.served.min(mock.replies.len() - 1);
                    mock.served += 1;
                    let (status, reply) = mock.replies[index].clone();
                    (status, axum::Json(reply))
                }
            },
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr.to_string(), state)
    }

    fn orders_at(host: String) -> FirestoreOrders {
        let target = FirestoreTarget::Emulator { project_id: "demo".to_owned(), host };
        FirestoreOrders::connect(&target, "orders", Duration::from_millis(20)).unwrap()
    }

    fn row(id: &str, update_time: &str) -> Value {
        json!({
            "document": {
                "name": format!("projects/demo/databases/(default)/documents/orders/{id}"),
                "fields": {
                    "status": { "stringValue": "pending" },
                    "smsSent": { "booleanValue": false },
                    "totalAmount": { "integerValue": "20" }
                },
                "updateTime": update_time
            },
            "readTime": "2026-10-15T10:00:00Z"
        })
    }

    #[tokio::test]
    async fn subscribe_delivers_initial_snapshot_then_changes() {
        let (host, mock) = spawn_firestore(vec![
            (StatusCode::OK, json!([row("a", "t1")])),
            (StatusCode::OK, json!([row("a", "t1"), row("b", "t1")])),
        ])
        .await;
        let orders = orders_at(host);

        let mut subscription = orders
            .subscribe(&OrderQuery::pending_unnotified("orders"))
            .await
            .unwrap();

        let first = subscription.next_batch().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind, ChangeKind::Added);
        assert_eq!(first[0].document.id, "a");
        assert_eq!(first[0].document.get("totalAmount"), Some(&json!(20)));

        let second = subscription.next_batch().await.unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].kind, ChangeKind::Added);
        assert_eq!(second[0].document.id, "b");

        subscription.release();

        let mock = mock.lock().unwrap();
        let request = &mock.seen[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(
            request.uri.path(),
            "/v1/projects/demo/databases/(default)/documents:runQuery"
        );
        assert_eq!(request.authorization.as_deref(), Some("Bearer owner"));
        assert_eq!(
            request.body["structuredQuery"]["from"],
            json!([{ "collectionId": "orders" }])
        );
    }

    #[tokio::test]
    async fn empty_initial_snapshot_is_still_delivered() {
        let (host, _mock) =
            spawn_firestore(vec![(StatusCode::OK, json!([{ "readTime": "2026-10-15T10:00:00Z" }]))])
                .await;
        let orders = orders_at(host);

        let mut subscription = orders
            .subscribe(&OrderQuery::pending_unnotified("orders"))
            .await
            .unwrap();

        let first = subscription.next_batch().await.unwrap().unwrap();
        assert!(first.is_empty());
    }

    #[tokio::test]
    async fn failing_initial_query_is_a_subscribe_error() {
        let (host, _mock) = spawn_firestore(vec![(
            StatusCode::FORBIDDEN,
            json!({ "error": { "status": "PERMISSION_DENIED" } }),
        )])
        .await;
        let orders = orders_at(host);

        let err = orders
            .subscribe(&OrderQuery::pending_unnotified("orders"))
            .await
            .unwrap_err();

        assert!(matches!(err, FeedError::Subscribe { ref reason } if reason.contains("403")));
    }

    #[tokio::test]
    async fn failing_poll_is_reported_once_on_the_stream() {
        let (host, _mock) = spawn_firestore(vec![
            (StatusCode::OK, json!([row("a", "t1")])),
            (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": "unavailable" })),
        ])
        .await;
        let orders = orders_at(host);

        let mut subscription = orders
            .subscribe(&OrderQuery::pending_unnotified("orders"))
            .await
            .unwrap();

        assert!(matches!(subscription.next_batch().await, Some(Ok(_))));
        assert!(matches!(
            subscription.next_batch().await,
            Some(Err(FeedError::Stream { .. }))
        ));
        assert!(subscription.next_batch().await.is_none(), "stream ends after an error");
    }

    #[tokio::test]
    async fn mark_notified_patches_only_the_flag() {
        let (host, mock) = spawn_firestore(vec![(StatusCode::OK, json!({}))]).await;
        let orders = orders_at(host);

        orders.mark_notified("o-42").await.unwrap();

        let mock = mock.lock().unwrap();
        let request = &mock.seen[0];
        assert_eq!(request.method, Method::PATCH);
        assert_eq!(
            request.uri.path(),
            "/v1/projects/demo/databases/(default)/documents/orders/o-42"
        );
        let query = request.uri.query().unwrap();
        assert!(query.contains("updateMask.fieldPaths=smsSent"), "{query}");
        assert!(query.contains("currentDocument.exists=true"), "{query}");
        assert_eq!(
            request.body,
            json!({ "fields": { "smsSent": { "booleanValue": true } } })
        );
    }

    #[tokio::test]
    async fn mark_notified_encodes_awkward_ids() {
        let (host, mock) = spawn_firestore(vec![(StatusCode::OK, json!({}))]).await;
        let orders = orders_at(host);

        orders.mark_notified("ord #1?x/y").await.unwrap();

        let mock = mock.lock().unwrap();
        let request = &mock.seen[0];
        assert_eq!(
            request.uri.path(),
            "/v1/projects/demo/databases/(default)/documents/orders/ord%20%231%3Fx%2Fy"
        );
        assert_eq!(
            request.uri.query(),
            Some("updateMask.fieldPaths=smsSent&currentDocument.exists=true")
        );
        assert_eq!(
            request.body,
            json!({ "fields": { "smsSent": { "booleanValue": true } } })
        );
    }

    #[tokio::test]
    async fn mark_notified_maps_missing_document() {
        let (host, _mock) =
            spawn_firestore(vec![(StatusCode::NOT_FOUND, json!({ "error": "NOT_FOUND" }))]).await;
        let orders = orders_at(host);

        let err = orders.mark_notified("gone").await.unwrap_err();

        assert_eq!(err, StoreError::NotFound { id: "gone".to_owned() });
    }

    #[tokio::test]
    async fn mark_notified_reports_other_failures() {
        let (host, _mock) =
            spawn_firestore(vec![(StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "boom" }))])
                .await;
        let orders = orders_at(host);

        let err = orders.mark_notified("o-1").await.unwrap_err();

        assert!(matches!(err, StoreError::UpdateFailed { ref id, .. } if id == "o-1"));
    }

    // -- feed + listener ----------------------------------------------------

    struct CountingGateway {
        sent: Rc<Cell<usize>>,
    }

    impl SmsGateway for CountingGateway {
        async fn send(&self, _message: &SmsMessage) -> Result<GatewayResponse, GatewayError> {
            self.sent.set(self.sent.get() + 1);
            Ok(GatewayResponse { status: 200, body: "{}".to_owned() })
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        flagged: RefCell<Vec<String>>,
    }

    impl OrderStore for RecordingStore {
        async fn mark_notified(&self, order_id: &str) -> Result<(), StoreError> {
            self.flagged.borrow_mut().push(order_id.to_owned());
            Ok(())
        }
    }

    #[tokio::test]
    async fn order_added_after_snapshot_is_dispatched_once_across_quiet_polls() {
        LocalSet::new()
            .run_until(async {
                // Empty snapshot, then "a" appears and stays unchanged for every later poll.
                let (host, mock) = spawn_firestore(vec![
                    (StatusCode::OK, json!([])),
                    (StatusCode::OK, json!([row("a", "t1")])),
                ])
                .await;
                let orders = orders_at(host);

                let sent = Rc::new(Cell::new(0));
                let notifier = Notifier::new(
                    NotifierConfig::builder("Hubtel").alert_number("0240000000").build().unwrap(),
                    CountingGateway { sent: Rc::clone(&sent) },
                );
                let store = Rc::new(RecordingStore::default());
                let config = ListenerConfig::builder(OrderQuery::pending_unnotified("orders"))
                    .refresh_interval(Duration::from_millis(400))
                    .build()
                    .unwrap();
                let mut listener =
                    ChangeListener::new(config, Rc::clone(&store), Rc::new(notifier));

                let end = listener.run_session(&orders).await;
                listener.shutdown();

                assert_eq!(end, SessionEnd::Refresh);
                let polls = mock.lock().unwrap().served;
                assert!(polls >= 4, "only {polls} queries ran");
                assert_eq!(sent.get(), 1);
                assert_eq!(*store.flagged.borrow(), vec!["a".to_owned()]);
            })
            .await;
    }

    #[test]
    fn invalid_service_account_key_is_rejected() {
        let target = FirestoreTarget::ServiceAccount {
            project_id: "p".to_owned(),
            key_json: "{}".to_owned(),
        };
        assert!(FirestoreOrders::connect(&target, "orders", Duration::from_secs(2)).is_err());
    }
}
