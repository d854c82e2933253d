//! Ephemeral per-conversation state.
//!
//! Expiry belongs to the backing store; the workflow only loads, saves and
//! clears sessions.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::domain::{ChatId, MediaKind, MediaRef, ReportId, ReportKind, ReportRecord};
use super::notify::DeliveryReport;
use super::prompt::Reply;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    Opening,
    Closing,
    Verification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "index", rename_all = "snake_case")]
pub enum SessionStep {
    ChooseVariant,
    ChooseDate,
    ChooseLocation,
    AuxQuestion,
    /// Zero-based evidence slot awaiting upload.
    Evidence(usize),
    Comment,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFields {
    pub kind: Option<ReportKind>,
    pub location: Option<String>,
    pub submitter: Option<ChatId>,
    pub evidence: Vec<MediaRef>,
    pub aux_answer: Option<String>,
    pub occurs_on: Option<NaiveDate>,
    pub report_id: Option<ReportId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub conversation: ChatId,
    pub flow: Flow,
    pub step: SessionStep,
    pub fields: SessionFields,
    pub last_touched: NaiveDateTime,
}

impl Session {
    pub fn new(conversation: ChatId, flow: Flow, step: SessionStep, now: NaiveDateTime) -> Self {
        Self {
            conversation,
            flow,
            step,
            fields: SessionFields {
                submitter: Some(conversation),
                ..SessionFields::default()
            },
            last_touched: now,
        }
    }
}

/// One inbound message as seen by a session step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Text(String),
    Photo(MediaRef),
    Video(MediaRef),
}

impl Input {
    pub fn text(&self) -> Option<&str> {
        match self {
            Input::Text(text) => Some(text.trim()).filter(|text| !text.is_empty()),
            Input::Photo(_) | Input::Video(_) => None,
        }
    }

    pub fn media(&self) -> Option<(MediaKind, &MediaRef)> {
        match self {
            Input::Photo(media) => Some((MediaKind::Photo, media)),
            Input::Video(media) => Some((MediaKind::Video, media)),
            Input::Text(_) => None,
        }
    }
}

/// Result of feeding one input to a session.
#[derive(Debug)]
pub enum Progress {
    /// The session moves on (or stays put after a re-prompt) and must be saved.
    Continue(Session, Reply),
    /// The session ends without persisting anything.
    Closed(Reply),
    Submitted {
        reply: Reply,
        record: ReportRecord,
        delivery: DeliveryReport,
    },
    Verified {
        reply: Reply,
        record: ReportRecord,
        delivery: DeliveryReport,
    },
}

impl Progress {
    pub fn reply(&self) -> &Reply {
        match self {
            Progress::Continue(_, reply) | Progress::Closed(reply) => reply,
            Progress::Submitted { reply, .. } | Progress::Verified { reply, .. } => reply,
        }
    }
}

pub trait SessionStore: Send + Sync {
    fn load(&self, conversation: ChatId) -> Result<Option<Session>, SessionStoreError>;
    fn save(&self, session: Session) -> Result<(), SessionStoreError>;
    fn clear(&self, conversation: ChatId) -> Result<(), SessionStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<ChatId, Session>>,
}

impl InMemorySessionStore {
    fn guard(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ChatId, Session>>, SessionStoreError> {
        self.sessions
            .lock()
            .map_err(|_| SessionStoreError::Unavailable("session lock poisoned".to_string()))
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, conversation: ChatId) -> Result<Option<Session>, SessionStoreError> {
        Ok(self.guard()?.get(&conversation).cloned())
    }

    fn save(&self, session: Session) -> Result<(), SessionStoreError> {
        self.guard()?.insert(session.conversation, session);
        Ok(())
    }

    fn clear(&self, conversation: ChatId) -> Result<(), SessionStoreError> {
        self.guard()?.remove(&conversation);
        Ok(())
    }
}
