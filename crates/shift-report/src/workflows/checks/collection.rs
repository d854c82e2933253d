//! Submitter-side state machine.
//!
//! Opening kinds walk `ChooseVariant -> ChooseLocation -> [AuxQuestion] ->
//! Evidence(0..n)`; closing walks `ChooseDate -> ChooseLocation ->
//! Evidence(0..n)` with `n` depending on the weekday of the chosen date.
//! Guards never mutate the session: a rejected input returns the unchanged
//! session together with the prompt of its current step.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use super::catalog::{kind_for_variant, variant_labels, KindFamily};
use super::clock::Clock;
use super::coverage::CoverageDirectory;
use super::domain::{ChatId, NewReport, ReportKind, ReportRecord, StaffMember};
use super::notify::{Audience, DeliveryReport, FanOut, OutboundMessage};
use super::prompt::{
    day_label, duplicate_message, submission_caption, Menu, Reply, ACKNOWLEDGE,
};
use super::repository::{DirectoryRepository, ReportRepository, RepositoryError, UniqueKey};
use super::service::{Collaborators, ServiceError};
use super::session::{Flow, Input, Progress, Session, SessionStep};
use super::timeliness::classify;
use crate::config::ReportingConfig;

pub const APPROVER_PROMPT: &str = "After viewing, press confirm 👇";

const VARIANT_PROMPT: &str = "Which report are you sending? 👇";
const DATE_PROMPT: &str = "Which day is the report for? 👇";
const LOCATION_PROMPT: &str = "Choose the location 👇";

pub struct CollectionEngine {
    reports: Arc<dyn ReportRepository>,
    directory: Arc<dyn DirectoryRepository>,
    coverage: CoverageDirectory,
    clock: Arc<dyn Clock>,
    fanout: FanOut,
    observers: Vec<ChatId>,
    diagram_dir: Option<PathBuf>,
}

impl CollectionEngine {
    pub fn new(collaborators: &Collaborators, config: &ReportingConfig) -> Self {
        Self {
            reports: Arc::clone(&collaborators.reports),
            directory: Arc::clone(&collaborators.directory),
            coverage: CoverageDirectory::new(Arc::clone(&collaborators.directory)),
            clock: Arc::clone(&collaborators.clock),
            fanout: FanOut::new(Arc::clone(&collaborators.transport)),
            observers: config.observers.clone(),
            diagram_dir: config.diagram_dir.clone(),
        }
    }

    /// Opens a fresh session for `family`, replacing whatever the submitter
    /// had in progress.
    pub fn start(&self, actor: &StaffMember, family: KindFamily) -> Result<Progress, ServiceError> {
        let now = self.clock.now();
        let session = match family {
            KindFamily::Opening => {
                Session::new(actor.chat_id, Flow::Opening, SessionStep::ChooseVariant, now)
            }
            KindFamily::Closing => {
                let mut session =
                    Session::new(actor.chat_id, Flow::Closing, SessionStep::ChooseDate, now);
                session.fields.kind = Some(ReportKind::Closing);
                session
            }
        };
        debug!(conversation = %actor.chat_id, ?family, "collection session started");

        let reply = self.prompt(&session)?;
        Ok(Progress::Continue(session, reply))
    }

    /// Prompt for the session's current step. Asking twice yields the same
    /// reply as long as the clock stays on the same day.
    pub fn prompt(&self, session: &Session) -> Result<Reply, ServiceError> {
        let reply = match session.step {
            SessionStep::ChooseVariant => Reply::new(VARIANT_PROMPT, Menu::choices(variant_labels())),
            SessionStep::ChooseDate => {
                let (today, yesterday) = self.date_choices();
                Reply::new(DATE_PROMPT, Menu::choices([today.0, yesterday.0]))
            }
            SessionStep::ChooseLocation => {
                let names = self
                    .directory
                    .locations()?
                    .into_iter()
                    .filter(|location| location.active)
                    .map(|location| location.name);
                Reply::new(LOCATION_PROMPT, Menu::choices(names))
            }
            SessionStep::AuxQuestion => {
                let question = session_kind(session)?
                    .spec()
                    .aux_question
                    .ok_or_else(|| invalid(session))?;
                Reply::new(question, Menu::choices([ACKNOWLEDGE]))
            }
            SessionStep::Evidence(index) => {
                let kind = session_kind(session)?;
                let step = kind.spec().evidence_step(index).ok_or_else(|| invalid(session))?;
                let attachment = if kind == ReportKind::OpeningEarly && index == 0 {
                    self.diagram_for(session.fields.location.as_deref())?
                } else {
                    None
                };
                Reply::new(step.prompt, Menu::Remove).with_attachment(attachment)
            }
            SessionStep::Comment => return Err(invalid(session)),
        };
        Ok(reply)
    }

    /// Feeds one input to an opening or closing session.
    pub fn advance(
        &self,
        actor: &StaffMember,
        session: Session,
        input: Input,
    ) -> Result<Progress, ServiceError> {
        let now = self.clock.now();
        let mut next = session.clone();

        match session.step {
            SessionStep::ChooseVariant => {
                let Some(kind) = input.text().and_then(kind_for_variant) else {
                    return self.reprompt(session);
                };
                next.fields.kind = Some(kind);
                next.fields.occurs_on = Some(now.date());
                next.step = SessionStep::ChooseLocation;
            }
            SessionStep::ChooseDate => {
                let Some(date) = input.text().and_then(|text| self.parse_date(text)) else {
                    return self.reprompt(session);
                };
                next.fields.occurs_on = Some(date);
                next.step = SessionStep::ChooseLocation;
            }
            SessionStep::ChooseLocation => {
                let location = match input.text() {
                    Some(name) => self.directory.location(name)?,
                    None => None,
                };
                let Some(location) = location.filter(|location| location.active) else {
                    return self.reprompt(session);
                };
                next.fields.location = Some(location.name);

                if session_kind(&next)?.spec().aux_question.is_some() {
                    next.step = SessionStep::AuxQuestion;
                } else if let Some(existing) = self.existing_report(&next)? {
                    return self.reject_duplicate(actor, &existing);
                } else {
                    next.step = SessionStep::Evidence(0);
                }
            }
            SessionStep::AuxQuestion => {
                let Some(answer) = input.text() else {
                    return self.reprompt(session);
                };
                next.fields.aux_answer = Some(answer.to_string());
                if let Some(existing) = self.existing_report(&next)? {
                    return self.reject_duplicate(actor, &existing);
                }
                next.step = SessionStep::Evidence(0);
            }
            SessionStep::Evidence(index) => {
                let kind = session_kind(&session)?;
                let expected = kind
                    .spec()
                    .evidence_step(index)
                    .ok_or_else(|| invalid(&session))?
                    .media;
                let Some(media) = input
                    .media()
                    .filter(|(media_kind, _)| *media_kind == expected)
                    .map(|(_, media)| media.clone())
                else {
                    return self.reprompt(session);
                };
                next.fields.evidence.push(media);

                let date = session_date(&next)?;
                if next.fields.evidence.len() >= kind.spec().required_evidence(date) {
                    return self.complete(actor, next, now);
                }
                next.step = SessionStep::Evidence(index + 1);
            }
            SessionStep::Comment => return Err(invalid(&session)),
        }

        next.last_touched = now;
        let reply = self.prompt(&next)?;
        Ok(Progress::Continue(next, reply))
    }

    fn reprompt(&self, session: Session) -> Result<Progress, ServiceError> {
        debug!(conversation = %session.conversation, step = ?session.step, "input rejected");
        let reply = self.prompt(&session)?;
        Ok(Progress::Continue(session, reply))
    }

    fn existing_report(&self, session: &Session) -> Result<Option<ReportRecord>, ServiceError> {
        let kind = session_kind(session)?;
        if !kind.spec().is_unique_per_day() {
            return Ok(None);
        }
        let location = session.fields.location.clone().ok_or_else(|| invalid(session))?;
        let key = UniqueKey::new(location, kind, session_date(session)?);
        Ok(self.reports.find_unique(&key)?)
    }

    fn reject_duplicate(
        &self,
        actor: &StaffMember,
        existing: &ReportRecord,
    ) -> Result<Progress, ServiceError> {
        let owner = self
            .directory
            .staff(existing.submitter)?
            .map(|member| member.full_name())
            .unwrap_or_else(|| existing.submitter.to_string());
        info!(
            report_id = %existing.id,
            kind = %existing.kind,
            location = %existing.location,
            add_date = %existing.add_date,
            "duplicate submission rejected"
        );
        Ok(Progress::Closed(Reply::new(
            duplicate_message(existing, &owner),
            Menu::for_role(actor.role),
        )))
    }

    fn complete(
        &self,
        actor: &StaffMember,
        session: Session,
        now: NaiveDateTime,
    ) -> Result<Progress, ServiceError> {
        let kind = session_kind(&session)?;
        let add_date = session_date(&session)?;
        let spec = kind.spec();
        let reference = match spec.family {
            KindFamily::Closing => add_date.pred_opt(),
            KindFamily::Opening => None,
        };
        let on_time = classify(spec.window, now, reference);

        let location = session.fields.location.clone().ok_or_else(|| invalid(&session))?;
        let approver = self.coverage.approver_for(&location)?;
        let report = NewReport {
            add_date,
            kind,
            location,
            submitter: session.fields.submitter.unwrap_or(actor.chat_id),
            evidence: session.fields.evidence,
            aux_answer: session.fields.aux_answer,
            on_time,
            approver_surname: approver.as_ref().map(|member| member.last_name.clone()),
            created_at: now,
        };

        let record = match self.reports.insert(report) {
            Ok(record) => record,
            Err(RepositoryError::Duplicate { existing, .. }) => {
                return self.reject_duplicate(actor, &existing);
            }
            Err(err) => return Err(err.into()),
        };
        info!(
            report_id = %record.id,
            kind = %record.kind,
            location = %record.location,
            add_date = %record.add_date,
            on_time = record.on_time,
            "report stored"
        );

        let delivery = self.announce(&record, actor, approver.as_ref());
        Ok(Progress::Submitted {
            reply: Reply::submitted(actor),
            record,
            delivery,
        })
    }

    /// Approver first with the confirm action, then observers with the
    /// evidence only. The submitter is never addressed.
    fn announce(
        &self,
        record: &ReportRecord,
        submitter: &StaffMember,
        approver: Option<&StaffMember>,
    ) -> DeliveryReport {
        let evidence = OutboundMessage::MediaGroup {
            media: record.evidence.clone(),
            caption: submission_caption(record, submitter),
        };
        let mut audience = Audience::new().exclude(submitter.chat_id);
        let mut delivery = DeliveryReport::default();

        if let Some(approver) = approver {
            if audience.push(approver.chat_id) {
                let mut payload = vec![evidence.clone()];
                payload.extend(self.layout_for_review(record));
                payload.push(OutboundMessage::Text {
                    text: APPROVER_PROMPT.to_string(),
                    confirm: Some(record.id),
                });
                delivery.merge(self.fanout.send(&[approver.chat_id], &payload));
            }
        }

        let already = audience.members().len();
        audience.extend(self.observers.iter().copied());
        delivery.merge(self.fanout.send(&audience.members()[already..], &[evidence]));
        delivery
    }

    /// The counter layout the approver compares an opening-by-10 album
    /// against. Lookup failures only drop the document.
    fn layout_for_review(&self, record: &ReportRecord) -> Option<OutboundMessage> {
        if record.kind != ReportKind::OpeningEarly {
            return None;
        }
        match self.diagram_for(Some(&record.location)) {
            Ok(file) => file.map(|file| OutboundMessage::Document {
                file,
                caption: Some(format!("Layout for {}", record.location)),
            }),
            Err(err) => {
                warn!(%err, location = %record.location, "layout diagram lookup failed");
                None
            }
        }
    }

    fn date_choices(&self) -> ((String, NaiveDate), (String, NaiveDate)) {
        let today = self.clock.today();
        let yesterday = today.pred_opt().unwrap_or(today);
        (
            (format!("Today ({})", day_label(today)), today),
            (format!("Yesterday ({})", day_label(yesterday)), yesterday),
        )
    }

    fn parse_date(&self, text: &str) -> Option<NaiveDate> {
        let (today, yesterday) = self.date_choices();
        let text = text.trim();
        [today, yesterday].into_iter().find_map(|(label, date)| {
            let word = label.split(' ').next().unwrap_or_default();
            (text.eq_ignore_ascii_case(&label) || text.eq_ignore_ascii_case(word)).then_some(date)
        })
    }

    fn diagram_for(&self, location: Option<&str>) -> Result<Option<String>, ServiceError> {
        let (Some(dir), Some(name)) = (&self.diagram_dir, location) else {
            return Ok(None);
        };
        Ok(self
            .directory
            .location(name)?
            .filter(|location| !location.alias.is_empty())
            .map(|location| dir.join(format!("{}.png", location.alias)).display().to_string()))
    }
}

fn invalid(session: &Session) -> ServiceError {
    ServiceError::InvalidSession {
        conversation: session.conversation,
    }
}

fn session_kind(session: &Session) -> Result<ReportKind, ServiceError> {
    session.fields.kind.ok_or_else(|| invalid(session))
}

fn session_date(session: &Session) -> Result<NaiveDate, ServiceError> {
    session.fields.occurs_on.ok_or_else(|| invalid(session))
}
