//! Best-effort multi-recipient delivery.
//!
//! A failed recipient is logged and skipped. There is no retry and no
//! rollback; the [`DeliveryReport`] only records what happened.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::domain::{ChatId, MediaRef, ReportId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Text {
        text: String,
        /// Attaches the approver's "confirm" action for this report.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confirm: Option<ReportId>,
    },
    MediaGroup {
        media: Vec<MediaRef>,
        caption: String,
    },
    Document {
        file: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            confirm: None,
        }
    }
}

/// Outbound side of the chat transport.
pub trait Transport: Send + Sync {
    fn deliver(&self, recipient: ChatId, message: &OutboundMessage) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DeliveryError {
    #[error("recipient {0} is unreachable")]
    Unreachable(ChatId),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("outbox is full ({0} undelivered messages)")]
    Backlog(usize),
}

/// Outcome of one fan-out, exposed for inspection only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub attempted: Vec<ChatId>,
    pub delivered: Vec<ChatId>,
    pub failed: Vec<(ChatId, String)>,
}

impl DeliveryReport {
    pub fn merge(&mut self, other: DeliveryReport) {
        self.attempted.extend(other.attempted);
        self.delivered.extend(other.delivered);
        self.failed.extend(other.failed);
    }
}

/// Runs `op`, logging a failure against `recipient` before handing it back.
pub fn best_effort<T, E, F>(context: &str, recipient: ChatId, op: F) -> Result<T, E>
where
    E: Display,
    F: FnOnce() -> Result<T, E>,
{
    op().map_err(|err| {
        warn!(%recipient, %err, "{context}: delivery failed");
        err
    })
}

/// Ordered recipient list that never repeats anyone already reached.
#[derive(Debug, Clone, Default)]
pub struct Audience {
    members: Vec<ChatId>,
    reached: BTreeSet<ChatId>,
}

impl Audience {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `id` as already notified without adding it.
    pub fn exclude(mut self, id: ChatId) -> Self {
        self.reached.insert(id);
        self
    }

    pub fn push(&mut self, id: ChatId) -> bool {
        if self.reached.insert(id) {
            self.members.push(id);
            true
        } else {
            false
        }
    }

    pub fn extend<I: IntoIterator<Item = ChatId>>(&mut self, ids: I) {
        for id in ids {
            self.push(id);
        }
    }

    pub fn contains(&self, id: ChatId) -> bool {
        self.members.contains(&id)
    }

    pub fn members(&self) -> &[ChatId] {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Clone)]
pub struct FanOut {
    transport: Arc<dyn Transport>,
}

impl FanOut {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Delivers `payload` to every recipient in order. A recipient counts as
    /// delivered only if all of its messages went through; the first failure
    /// skips the rest of that recipient's messages.
    pub fn send(&self, audience: &[ChatId], payload: &[OutboundMessage]) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for &recipient in audience {
            report.attempted.push(recipient);
            let outcome = best_effort("fan-out", recipient, || {
                payload
                    .iter()
                    .try_for_each(|message| self.transport.deliver(recipient, message))
            });
            match outcome {
                Ok(()) => report.delivered.push(recipient),
                Err(err) => report.failed.push((recipient, err.to_string())),
            }
        }

        debug!(
            attempted = report.attempted.len(),
            delivered = report.delivered.len(),
            "fan-out finished"
        );
        report
    }
}

/// Transport that keeps every delivered message in memory. Doubles as the
/// outbox the chat gateway drains.
///
/// The default instance is unbounded and meant for tests. A served outbox
/// should be [`RecordingTransport::bounded`]: once `capacity` messages are
/// waiting, further deliveries fail with [`DeliveryError::Backlog`] until the
/// gateway drains it, and fan-out reports those recipients as failed.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(ChatId, OutboundMessage)>>,
    unreachable: Mutex<BTreeSet<ChatId>>,
    capacity: Option<usize>,
}

impl RecordingTransport {
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn fail_for(&self, recipient: ChatId) {
        self.unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(recipient);
    }

    pub fn sent(&self) -> Vec<(ChatId, OutboundMessage)> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    pub fn sent_to(&self, recipient: ChatId) -> Vec<OutboundMessage> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| *to == recipient)
            .map(|(_, message)| message)
            .collect()
    }

    pub fn recipients(&self) -> BTreeSet<ChatId> {
        self.sent().into_iter().map(|(to, _)| to).collect()
    }

    pub fn drain(&self) -> Vec<(ChatId, OutboundMessage)> {
        self.sent
            .lock()
            .map(|mut sent| std::mem::take(&mut *sent))
            .unwrap_or_default()
    }
}

impl Transport for RecordingTransport {
    fn deliver(&self, recipient: ChatId, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let unreachable = self
            .unreachable
            .lock()
            .map_err(|_| DeliveryError::Transport("outbox lock poisoned".to_string()))?;
        if unreachable.contains(&recipient) {
            return Err(DeliveryError::Unreachable(recipient));
        }
        drop(unreachable);

        let mut sent = self
            .sent
            .lock()
            .map_err(|_| DeliveryError::Transport("outbox lock poisoned".to_string()))?;
        if let Some(capacity) = self.capacity {
            if sent.len() >= capacity {
                return Err(DeliveryError::Backlog(sent.len()));
            }
        }
        sent.push((recipient, message.clone()));
        Ok(())
    }
}
