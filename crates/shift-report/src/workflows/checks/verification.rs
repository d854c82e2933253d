//! Approver-side confirmation.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{info, warn};

use super::catalog::KindFamily;
use super::clock::Clock;
use super::coverage::CoverageDirectory;
use super::domain::{ChatId, ReportId, ReportRecord, StaffMember};
use super::notify::{Audience, DeliveryReport, FanOut, OutboundMessage};
use super::prompt::{verification_message, Menu, Reply, ACKNOWLEDGE};
use super::repository::ReportRepository;
use super::schedule::ShiftRoster;
use super::service::{Collaborators, ServiceError};
use super::session::{Flow, Input, Progress, Session, SessionStep};
use crate::config::ReportingConfig;

pub const COMMENT_PROMPT: &str = "Enter a comment for the report 👇";

const SECONDS_PER_DAY: i64 = 86_400;

/// Elapsed time between two instants as a time of day. Anything past 24h
/// wraps; a negative span counts as zero.
pub fn elapsed_hms(from: NaiveDateTime, to: NaiveDateTime) -> NaiveTime {
    let seconds = (to - from).num_seconds().max(0) % SECONDS_PER_DAY;
    u32::try_from(seconds)
        .ok()
        .and_then(|seconds| NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0))
        .unwrap_or(NaiveTime::MIN)
}

pub struct VerificationEngine {
    reports: Arc<dyn ReportRepository>,
    coverage: CoverageDirectory,
    roster: Arc<dyn ShiftRoster>,
    clock: Arc<dyn Clock>,
    fanout: FanOut,
    observers: Vec<ChatId>,
}

impl VerificationEngine {
    pub fn new(collaborators: &Collaborators, config: &ReportingConfig) -> Self {
        Self {
            reports: Arc::clone(&collaborators.reports),
            coverage: CoverageDirectory::new(Arc::clone(&collaborators.directory)),
            roster: Arc::clone(&collaborators.roster),
            clock: Arc::clone(&collaborators.clock),
            fanout: FanOut::new(Arc::clone(&collaborators.transport)),
            observers: config.observers.clone(),
        }
    }

    /// Opens a comment session for `report_id`. An unknown id is a hard
    /// failure.
    pub fn begin(&self, actor: &StaffMember, report_id: ReportId) -> Result<Progress, ServiceError> {
        let record = self.reports.find_by_id(report_id)?;

        let mut session = Session::new(
            actor.chat_id,
            Flow::Verification,
            SessionStep::Comment,
            self.clock.now(),
        );
        session.fields.report_id = Some(record.id);
        session.fields.kind = Some(record.kind);
        session.fields.location = Some(record.location);
        session.fields.occurs_on = Some(record.add_date);

        Ok(Progress::Continue(session, Self::prompt()))
    }

    pub fn prompt() -> Reply {
        Reply::new(COMMENT_PROMPT, Menu::choices([ACKNOWLEDGE]))
    }

    /// Stores the comment and elapsed time, then notifies the audience.
    pub fn complete(
        &self,
        actor: &StaffMember,
        session: Session,
        input: Input,
    ) -> Result<Progress, ServiceError> {
        let Some(comment) = input.text() else {
            return Ok(Progress::Continue(session, Self::prompt()));
        };
        let report_id = session
            .fields
            .report_id
            .ok_or(ServiceError::InvalidSession {
                conversation: session.conversation,
            })?;

        let record = self.reports.find_by_id(report_id)?;
        let now = self.clock.now();
        let duration = elapsed_hms(record.created_at, now);
        if record.verified {
            warn!(
                report_id = %record.id,
                previous = ?record.verification_duration,
                "report verified again; overwriting previous verification"
            );
        }

        let record = self.reports.mark_verified(report_id, comment, duration, now)?;
        info!(
            report_id = %record.id,
            kind = %record.kind,
            location = %record.location,
            add_date = %record.add_date,
            duration = %duration.format("%H:%M:%S"),
            "report verified"
        );

        let delivery = self.announce(&record, actor);
        Ok(Progress::Verified {
            reply: Reply::acknowledgement(actor),
            record,
            delivery,
        })
    }

    /// Covering approver, submitter, scheduled peers and observers, each at
    /// most once and never the verifying actor. The record is already
    /// stored, so lookup failures only narrow the audience.
    fn announce(&self, record: &ReportRecord, actor: &StaffMember) -> DeliveryReport {
        let mut audience = Audience::new().exclude(actor.chat_id);

        match self.coverage.approver_for(&record.location) {
            Ok(Some(approver)) => {
                audience.push(approver.chat_id);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(%err, location = %record.location, "approver lookup failed");
            }
        }
        audience.push(record.submitter);
        audience.extend(self.peers(record));
        audience.extend(self.observers.iter().copied());

        let message = OutboundMessage::text(verification_message(record));
        self.fanout.send(audience.members(), &[message])
    }

    fn peers(&self, record: &ReportRecord) -> Vec<ChatId> {
        let mut peers = Vec::new();
        for date in peer_window(record) {
            match self.roster.scheduled(date, Some(&record.location)) {
                Ok(scheduled) => peers.extend(scheduled),
                Err(err) => {
                    warn!(%err, location = %record.location, %date, "roster lookup failed");
                }
            }
        }
        peers
    }
}

/// Opening reports reach the same day's shift; closing also reaches the
/// next morning's.
fn peer_window(record: &ReportRecord) -> Vec<NaiveDate> {
    match record.kind.family() {
        KindFamily::Opening => vec![record.add_date],
        KindFamily::Closing => vec![record.add_date, record.add_date + Duration::days(1)],
    }
}
