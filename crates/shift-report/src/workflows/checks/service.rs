use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info};

use super::catalog::KindFamily;
use super::clock::Clock;
use super::collection::CollectionEngine;
use super::digest::{DigestJobs, ScheduledJob};
use super::domain::{ChatId, MediaRef, ReportId, ReportKind, ReportStatusView, StaffMember};
use super::notify::{DeliveryReport, Transport};
use super::prompt::{is_cancel, Menu, Reply, CLOSING_START, OPENING_START};
use super::repository::{DirectoryRepository, ReportRepository, RepositoryError};
use super::schedule::{LedgerSource, ShiftRoster, SourceError};
use super::session::{Flow, Input, Progress, SessionStore, SessionStoreError};
use super::summary::{summarize, ComplianceSummary};
use super::verification::VerificationEngine;
use crate::config::ReportingConfig;

const NOT_REGISTERED: &str = "You are not registered. Ask your manager for access.";
const NO_ACCESS: &str = "No access.";
const NO_SESSION: &str = "Choose an action from the menu 👇";

/// Inbound transport event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Text {
        conversation_id: ChatId,
        text: String,
    },
    Photo {
        conversation_id: ChatId,
        media_ref: MediaRef,
    },
    Video {
        conversation_id: ChatId,
        media_ref: MediaRef,
    },
    Confirmation {
        conversation_id: ChatId,
        report_id: ReportId,
    },
    Cancel {
        conversation_id: ChatId,
    },
}

impl InboundEvent {
    pub fn conversation(&self) -> ChatId {
        match self {
            InboundEvent::Text {
                conversation_id, ..
            }
            | InboundEvent::Photo {
                conversation_id, ..
            }
            | InboundEvent::Video {
                conversation_id, ..
            }
            | InboundEvent::Confirmation {
                conversation_id, ..
            }
            | InboundEvent::Cancel { conversation_id } => *conversation_id,
        }
    }
}

/// External collaborators the workflow is wired against.
#[derive(Clone)]
pub struct Collaborators {
    pub reports: Arc<dyn ReportRepository>,
    pub directory: Arc<dyn DirectoryRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub transport: Arc<dyn Transport>,
    pub roster: Arc<dyn ShiftRoster>,
    pub ledger: Arc<dyn LedgerSource>,
    pub clock: Arc<dyn Clock>,
}

/// Service composing the collection and verification engines with the
/// scheduled jobs behind one event entry point.
pub struct CheckWorkflowService {
    collaborators: Collaborators,
    collection: CollectionEngine,
    verification: VerificationEngine,
    jobs: DigestJobs,
}

impl CheckWorkflowService {
    pub fn new(collaborators: Collaborators, config: ReportingConfig) -> Self {
        Self {
            collection: CollectionEngine::new(&collaborators, &config),
            verification: VerificationEngine::new(&collaborators, &config),
            jobs: DigestJobs::new(&collaborators, &config),
            collaborators,
        }
    }

    /// Routes one inbound event by the sender's current session.
    pub fn handle(&self, event: InboundEvent) -> Result<Reply, ServiceError> {
        let conversation = event.conversation();
        let sessions = &self.collaborators.sessions;

        let Some(member) = self.collaborators.directory.staff(conversation)? else {
            debug!(%conversation, "event from unregistered conversation");
            return Ok(Reply::new(NOT_REGISTERED, Menu::Remove));
        };
        if !member.active {
            sessions.clear(conversation)?;
            return Ok(Reply::new(NO_ACCESS, Menu::Remove));
        }

        let input = match event {
            InboundEvent::Cancel { .. } => return self.cancel(&member),
            InboundEvent::Text { text, .. } if is_cancel(&text) => return self.cancel(&member),
            InboundEvent::Confirmation { report_id, .. } => {
                let progress = self.verification.begin(&member, report_id)?;
                return self.settle(conversation, progress);
            }
            InboundEvent::Text { text, .. } if text.trim() == OPENING_START => {
                let progress = self.collection.start(&member, KindFamily::Opening)?;
                return self.settle(conversation, progress);
            }
            InboundEvent::Text { text, .. } if text.trim() == CLOSING_START => {
                let progress = self.collection.start(&member, KindFamily::Closing)?;
                return self.settle(conversation, progress);
            }
            InboundEvent::Text { text, .. } => Input::Text(text),
            InboundEvent::Photo { media_ref, .. } => Input::Photo(media_ref),
            InboundEvent::Video { media_ref, .. } => Input::Video(media_ref),
        };

        let Some(session) = sessions.load(conversation)? else {
            return Ok(Reply::new(NO_SESSION, Menu::for_role(member.role)));
        };
        let progress = match session.flow {
            Flow::Opening | Flow::Closing => self.collection.advance(&member, session, input)?,
            Flow::Verification => self.verification.complete(&member, session, input)?,
        };
        self.settle(conversation, progress)
    }

    /// Saves a continuing session or clears a finished one.
    fn settle(&self, conversation: ChatId, progress: Progress) -> Result<Reply, ServiceError> {
        let sessions = &self.collaborators.sessions;
        match progress {
            Progress::Continue(session, reply) => {
                sessions.save(session)?;
                Ok(reply)
            }
            Progress::Closed(reply)
            | Progress::Submitted { reply, .. }
            | Progress::Verified { reply, .. } => {
                sessions.clear(conversation)?;
                Ok(reply)
            }
        }
    }

    fn cancel(&self, member: &StaffMember) -> Result<Reply, ServiceError> {
        self.collaborators.sessions.clear(member.chat_id)?;
        debug!(conversation = %member.chat_id, "session cancelled");
        Ok(Reply::acknowledgement(member))
    }

    /// Reports dated `date`, optionally of one kind.
    pub fn reports_on(
        &self,
        date: NaiveDate,
        kind: Option<ReportKind>,
    ) -> Result<Vec<ReportStatusView>, ServiceError> {
        Ok(self
            .collaborators
            .reports
            .find_by_date_range(kind, date, date)?
            .iter()
            .map(|record| record.status_view())
            .collect())
    }

    pub fn report(&self, id: ReportId) -> Result<ReportStatusView, ServiceError> {
        Ok(self.collaborators.reports.find_by_id(id)?.status_view())
    }

    pub fn summary(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ComplianceSummary, ServiceError> {
        let reports = self
            .collaborators
            .reports
            .find_by_date_range(None, start, end)?;
        Ok(summarize(
            &reports,
            self.collaborators.directory.as_ref(),
            start,
            end,
        )?)
    }

    pub fn run_job(
        &self,
        job: ScheduledJob,
        target: Option<ChatId>,
    ) -> Result<DeliveryReport, ServiceError> {
        info!(%job, ?target, "running scheduled job");
        self.jobs.run(job, target)
    }
}

/// Error raised by the check workflow service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Session(#[from] SessionStoreError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("session for {conversation} is in an inconsistent state")]
    InvalidSession { conversation: ChatId },
}

impl ServiceError {
    /// True when a referenced report does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Repository(RepositoryError::NotFound))
    }
}
