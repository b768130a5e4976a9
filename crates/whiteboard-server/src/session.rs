//! Session actor: the per-session serialization point.
//!
//! Every live session is one actor task draining a command queue. All
//! state-mutating operations, the attach sequence, and cursor relays pass
//! through that queue, which gives each session a total order over edits,
//! at-most-one in-flight persistence, and an identical broadcast order for
//! every subscriber. A mutation is persisted before its reply and before its
//! broadcast frames are released.
//!
//! Subscribers own bounded outbound queues; the actor encodes each frame once
//! and `try_send`s the shared bytes, so a slow peer is dropped rather than
//! ever stalling the session.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::ws::Utf8Bytes;
use serde_json::{Map, Value};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::config::policy;
use crate::error::{ApiError, ApiResult};
use crate::id;
use crate::model::{Element, SessionRecord, now_millis};
use crate::protocol::ServerFrame;
use crate::store::ElementStore;
use crate::validate;

/// Who initiated a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// HTTP API caller. Not a subscriber; broadcasts reach everyone.
    Api,
    /// A connected socket, identified by its user id. Excluded from the
    /// broadcast of its own mutations.
    Socket(String),
}

impl Origin {
    /// Value stamped into `createdBy`/`updatedBy`/`movedBy`.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Api => "api",
            Self::Socket(user_id) => user_id,
        }
    }

    /// Subscriber to exclude from the broadcast, if any.
    #[must_use]
    pub fn excluded(&self) -> Option<&str> {
        match self {
            Self::Api => None,
            Self::Socket(user_id) => Some(user_id),
        }
    }
}

/// Point-in-time copy of a session for HTTP reads.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: String,
    pub created_at: i64,
    pub elements: Vec<Element>,
    pub user_count: usize,
}

enum SessionCommand {
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Attach {
        user_id: String,
        tx: mpsc::Sender<Utf8Bytes>,
        reply: oneshot::Sender<usize>,
    },
    Detach {
        user_id: String,
    },
    Create {
        element: Element,
        origin: Origin,
        reply: oneshot::Sender<ApiResult<Element>>,
    },
    CreateBatch {
        elements: Vec<Element>,
        origin: Origin,
        reply: oneshot::Sender<ApiResult<Vec<Element>>>,
    },
    Update {
        element_id: String,
        patch: Map<String, Value>,
        origin: Origin,
        reply: oneshot::Sender<ApiResult<Element>>,
    },
    Delete {
        element_id: String,
        origin: Origin,
        reply: oneshot::Sender<ApiResult<()>>,
    },
    Clear {
        origin: Origin,
        reply: oneshot::Sender<ApiResult<()>>,
    },
    MoveElement {
        element_id: String,
        replacement: Element,
        origin: Origin,
        reply: oneshot::Sender<ApiResult<Element>>,
    },
    Reorder {
        element_id: String,
        position: String,
        origin: Origin,
        reply: oneshot::Sender<ApiResult<()>>,
    },
    Cursor {
        user_id: String,
        x: f64,
        y: f64,
    },
}

/// Cloneable handle to a session actor.
///
/// Dropping every handle (registry eviction) closes the command queue and the
/// actor exits; the store copy is untouched.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    tx: mpsc::Sender<SessionCommand>,
    subscriber_count: Arc<AtomicUsize>,
}

impl SessionHandle {
    /// Spawn the actor for a session record.
    #[must_use]
    pub fn spawn(record: SessionRecord, store: Arc<ElementStore>) -> Self {
        let (tx, rx) = mpsc::channel(policy::COMMAND_QUEUE_DEPTH);
        let subscriber_count = Arc::new(AtomicUsize::new(0));
        let actor = SessionActor {
            record,
            store,
            subscribers: Vec::new(),
            subscriber_count: Arc::clone(&subscriber_count),
        };
        let id = actor.record.id.clone();
        tokio::spawn(actor.run(rx));
        Self { id, tx, subscriber_count }
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Live subscriber count, maintained by the actor.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::SeqCst)
    }

    /// Copy of the element sequence and subscriber count.
    pub async fn snapshot(&self) -> ApiResult<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| ApiError::SessionClosed)
    }

    /// Register a subscriber. The `init` frame is queued to it and a
    /// `userCount` frame to everyone before this returns. Returns the
    /// post-attach subscriber count.
    pub async fn attach(&self, user_id: String, tx: mpsc::Sender<Utf8Bytes>) -> ApiResult<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Attach { user_id, tx, reply }).await?;
        rx.await.map_err(|_| ApiError::SessionClosed)
    }

    /// Remove a subscriber and notify the remainder. Idempotent.
    pub async fn detach(&self, user_id: String) {
        let _ = self.tx.send(SessionCommand::Detach { user_id }).await;
    }

    /// Append an element; `draw` is broadcast per the origin rule.
    pub async fn create(&self, element: Element, origin: Origin) -> ApiResult<Element> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Create { element, origin, reply }).await?;
        rx.await.map_err(|_| ApiError::SessionClosed)?
    }

    /// Append a batch in input order with a single durable write and one
    /// `draw` frame per element.
    pub async fn create_batch(
        &self,
        elements: Vec<Element>,
        origin: Origin,
    ) -> ApiResult<Vec<Element>> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::CreateBatch { elements, origin, reply }).await?;
        rx.await.map_err(|_| ApiError::SessionClosed)?
    }

    /// Overlay a patch onto an element. Broadcasts a `move` frame even for
    /// non-geometric changes: the protocol has a single notification channel
    /// for element replacement.
    pub async fn update(
        &self,
        element_id: String,
        patch: Map<String, Value>,
        origin: Origin,
    ) -> ApiResult<Element> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Update { element_id, patch, origin, reply }).await?;
        rx.await.map_err(|_| ApiError::SessionClosed)?
    }

    /// Remove an element; broadcasts `erase`.
    pub async fn delete(&self, element_id: String, origin: Origin) -> ApiResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Delete { element_id, origin, reply }).await?;
        rx.await.map_err(|_| ApiError::SessionClosed)?
    }

    /// Empty the element sequence; broadcasts `clear`.
    pub async fn clear(&self, origin: Origin) -> ApiResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Clear { origin, reply }).await?;
        rx.await.map_err(|_| ApiError::SessionClosed)?
    }

    /// Replace an element's full body; broadcasts `move`.
    pub async fn move_element(
        &self,
        element_id: String,
        replacement: Element,
        origin: Origin,
    ) -> ApiResult<Element> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::MoveElement { element_id, replacement, origin, reply }).await?;
        rx.await.map_err(|_| ApiError::SessionClosed)?
    }

    /// Move an element to the top (`front`) or bottom (`back`) of the
    /// Z-order; any other position is a no-op.
    pub async fn reorder(
        &self,
        element_id: String,
        position: String,
        origin: Origin,
    ) -> ApiResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Reorder { element_id, position, origin, reply }).await?;
        rx.await.map_err(|_| ApiError::SessionClosed)?
    }

    /// Relay a cursor position to every other subscriber. No persistence.
    pub async fn cursor(&self, user_id: String, x: f64, y: f64) {
        let _ = self.tx.send(SessionCommand::Cursor { user_id, x, y }).await;
    }

    async fn send(&self, cmd: SessionCommand) -> ApiResult<()> {
        self.tx.send(cmd).await.map_err(|_| ApiError::SessionClosed)
    }
}

struct Subscriber {
    user_id: String,
    tx: mpsc::Sender<Utf8Bytes>,
}

struct SessionActor {
    record: SessionRecord,
    store: Arc<ElementStore>,
    subscribers: Vec<Subscriber>,
    subscriber_count: Arc<AtomicUsize>,
}

impl SessionActor {
    async fn run(mut self, mut rx: mpsc::Receiver<SessionCommand>) {
        while let Some(cmd) = rx.recv().await {
            self.handle(cmd);
        }
        tracing::debug!(session_id = %self.record.id, "session actor stopped");
    }

    fn handle(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(SessionSnapshot {
                    id: self.record.id.clone(),
                    created_at: self.record.created_at,
                    elements: self.record.elements.clone(),
                    user_count: self.subscribers.len(),
                });
            }
            SessionCommand::Attach { user_id, tx, reply } => {
                self.attach(user_id, tx);
                let _ = reply.send(self.subscribers.len());
            }
            SessionCommand::Detach { user_id } => self.remove_subscriber(&user_id),
            SessionCommand::Create { element, origin, reply } => {
                let _ = reply.send(self.apply_create(element, &origin));
            }
            SessionCommand::CreateBatch { elements, origin, reply } => {
                let _ = reply.send(self.apply_create_batch(elements, &origin));
            }
            SessionCommand::Update { element_id, patch, origin, reply } => {
                let _ = reply.send(self.apply_update(&element_id, patch, &origin));
            }
            SessionCommand::Delete { element_id, origin, reply } => {
                let _ = reply.send(self.apply_delete(&element_id, &origin));
            }
            SessionCommand::Clear { origin, reply } => {
                let _ = reply.send(self.apply_clear(&origin));
            }
            SessionCommand::MoveElement { element_id, replacement, origin, reply } => {
                let _ = reply.send(self.apply_move(&element_id, replacement, &origin));
            }
            SessionCommand::Reorder { element_id, position, origin, reply } => {
                let _ = reply.send(self.apply_reorder(&element_id, &position, &origin));
            }
            SessionCommand::Cursor { user_id, x, y } => {
                self.broadcast(&ServerFrame::cursor(&user_id, x, y), Some(&user_id));
            }
        }
    }

    fn attach(&mut self, user_id: String, tx: mpsc::Sender<Utf8Bytes>) {
        self.subscribers.push(Subscriber { user_id: user_id.clone(), tx });
        self.sync_count();
        let count = self.subscribers.len();

        // init goes to exactly the new subscriber; the snapshot and the
        // userCount that follows reflect the same serialization point.
        let init = ServerFrame::Init {
            user_id: user_id.clone(),
            elements: self.record.elements.clone(),
            user_count: count,
        };
        match init.encode() {
            Ok(bytes) => {
                if let Some(sub) = self.subscribers.last() {
                    let _ = sub.tx.try_send(bytes);
                }
            }
            Err(error) => {
                tracing::error!(session_id = %self.record.id, %error, "failed to encode init");
            }
        }

        self.broadcast(&ServerFrame::UserCount { count }, None);
        tracing::info!(session_id = %self.record.id, %user_id, count, "subscriber attached");
    }

    fn apply_create(&mut self, mut element: Element, origin: &Origin) -> ApiResult<Element> {
        self.prepare_new(&mut element, origin);
        self.record.elements.push(element.clone());

        if let Err(e) = self.persist() {
            self.record.elements.pop();
            return Err(e);
        }

        self.broadcast(&ServerFrame::Draw { element: element.clone() }, origin.excluded());
        Ok(element)
    }

    fn apply_create_batch(
        &mut self,
        elements: Vec<Element>,
        origin: &Origin,
    ) -> ApiResult<Vec<Element>> {
        let base_len = self.record.elements.len();
        let mut stored = Vec::with_capacity(elements.len());
        for mut element in elements {
            self.prepare_new(&mut element, origin);
            self.record.elements.push(element.clone());
            stored.push(element);
        }

        if let Err(e) = self.persist() {
            self.record.elements.truncate(base_len);
            return Err(e);
        }

        for element in &stored {
            self.broadcast(&ServerFrame::Draw { element: element.clone() }, origin.excluded());
        }
        Ok(stored)
    }

    fn apply_update(
        &mut self,
        element_id: &str,
        patch: Map<String, Value>,
        origin: &Origin,
    ) -> ApiResult<Element> {
        let idx = self
            .record
            .position_of(element_id)
            .ok_or_else(|| ApiError::element_not_found(element_id))?;

        let prior = self.record.elements[idx].clone();
        let merged_value = serde_json::to_value(&prior)
            .map_err(|e| ApiError::internal(format!("element re-serialization failed: {e}")))?;
        let Value::Object(mut merged) = merged_value else {
            return Err(ApiError::internal("element did not serialize to an object"));
        };
        for (key, value) in patch {
            merged.insert(key, value);
        }
        merged.insert("id".to_string(), Value::String(element_id.to_string()));

        let mut updated = validate::element(Value::Object(merged)).map_err(ApiError::from)?;
        updated.stamp_updated(origin.label(), now_millis());

        let prev = std::mem::replace(&mut self.record.elements[idx], updated.clone());
        if let Err(e) = self.persist() {
            self.record.elements[idx] = prev;
            return Err(e);
        }

        self.broadcast(
            &ServerFrame::Move { element_id: element_id.to_string(), element: updated.clone() },
            origin.excluded(),
        );
        Ok(updated)
    }

    fn apply_delete(&mut self, element_id: &str, origin: &Origin) -> ApiResult<()> {
        let idx = self
            .record
            .position_of(element_id)
            .ok_or_else(|| ApiError::element_not_found(element_id))?;

        let removed = self.record.elements.remove(idx);
        if let Err(e) = self.persist() {
            self.record.elements.insert(idx, removed);
            return Err(e);
        }

        self.broadcast(
            &ServerFrame::Erase { element_id: element_id.to_string() },
            origin.excluded(),
        );
        Ok(())
    }

    fn apply_clear(&mut self, origin: &Origin) -> ApiResult<()> {
        let cleared = std::mem::take(&mut self.record.elements);
        if let Err(e) = self.persist() {
            self.record.elements = cleared;
            return Err(e);
        }

        self.broadcast(&ServerFrame::Clear, origin.excluded());
        Ok(())
    }

    fn apply_move(
        &mut self,
        element_id: &str,
        mut replacement: Element,
        origin: &Origin,
    ) -> ApiResult<Element> {
        let idx = self
            .record
            .position_of(element_id)
            .ok_or_else(|| ApiError::element_not_found(element_id))?;

        replacement.set_id(element_id);
        replacement.stamp_moved(origin.label(), now_millis());

        let prev = std::mem::replace(&mut self.record.elements[idx], replacement.clone());
        if let Err(e) = self.persist() {
            self.record.elements[idx] = prev;
            return Err(e);
        }

        self.broadcast(
            &ServerFrame::Move {
                element_id: element_id.to_string(),
                element: replacement.clone(),
            },
            origin.excluded(),
        );
        Ok(replacement)
    }

    fn apply_reorder(&mut self, element_id: &str, position: &str, origin: &Origin) -> ApiResult<()> {
        // Absent element and unrecognized positions are silent no-ops.
        let Some(idx) = self.record.position_of(element_id) else {
            return Ok(());
        };
        if position != "front" && position != "back" {
            return Ok(());
        }

        let original = self.record.elements.clone();
        let element = self.record.elements.remove(idx);
        if position == "front" {
            self.record.elements.push(element);
        } else {
            self.record.elements.insert(0, element);
        }

        if let Err(e) = self.persist() {
            self.record.elements = original;
            return Err(e);
        }

        self.broadcast(
            &ServerFrame::Reorder {
                element_id: element_id.to_string(),
                position: position.to_string(),
            },
            origin.excluded(),
        );
        Ok(())
    }

    /// Assign an identifier if the element has none (or a colliding one) and
    /// stamp creation metadata.
    fn prepare_new(&self, element: &mut Element, origin: &Origin) {
        let needs_id = match element.id() {
            None => true,
            Some(id) => id.is_empty() || self.record.contains_element(id),
        };
        if needs_id {
            let mut fresh = id::element_id();
            while self.record.contains_element(&fresh) {
                fresh = id::element_id();
            }
            element.set_id(fresh);
        }
        element.stamp_created(origin.label(), now_millis());
    }

    /// Durably write the record; the commit is the acknowledgement point.
    fn persist(&self) -> ApiResult<()> {
        self.store.put(&self.record).map_err(ApiError::from)
    }

    /// Encode once, enqueue to every subscriber except `exclude`. Subscribers
    /// whose queue is full or closed are removed with the detach sequence.
    fn broadcast(&mut self, frame: &ServerFrame, exclude: Option<&str>) {
        let bytes = match frame.encode() {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::error!(session_id = %self.record.id, %error, "failed to encode frame");
                return;
            }
        };

        let mut failed = Vec::new();
        for sub in &self.subscribers {
            if exclude == Some(sub.user_id.as_str()) {
                continue;
            }
            match sub.tx.try_send(bytes.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        session_id = %self.record.id,
                        user_id = %sub.user_id,
                        "subscriber queue full, dropping peer"
                    );
                    failed.push(sub.user_id.clone());
                }
                Err(TrySendError::Closed(_)) => failed.push(sub.user_id.clone()),
            }
        }

        for user_id in failed {
            self.remove_subscriber(&user_id);
        }
    }

    /// Drop a subscriber and notify the remainder: `userCount`, then
    /// `userLeft`. Idempotent.
    fn remove_subscriber(&mut self, user_id: &str) {
        let Some(pos) = self.subscribers.iter().position(|s| s.user_id == user_id) else {
            return;
        };
        self.subscribers.remove(pos);
        self.sync_count();

        let count = self.subscribers.len();
        self.broadcast(&ServerFrame::UserCount { count }, None);
        self.broadcast(&ServerFrame::user_left(user_id), None);
        tracing::info!(session_id = %self.record.id, %user_id, count, "subscriber detached");
    }

    fn sync_count(&self) {
        self.subscriber_count.store(self.subscribers.len(), Ordering::SeqCst);
    }
}
