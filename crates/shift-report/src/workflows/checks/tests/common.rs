use std::path::PathBuf;
use std::sync::Arc;

use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::config::ReportingConfig;
use crate::workflows::checks::{
    checks_router, ChatId, CheckWorkflowService, Collaborators, DirectoryRepository, FixedClock,
    InMemoryDirectory, InMemoryLedger, InMemoryReportStore, InMemorySessionStore,
    InMemoryShiftRoster, InboundEvent, MediaRef, RecordingTransport, Reply, ReportId, Session,
    SessionStore, StaffMember, StaffRole,
};

pub(super) const ANNA: ChatId = ChatId(100);
pub(super) const OLEG: ChatId = ChatId(101);
pub(super) const MARIA: ChatId = ChatId(200);
pub(super) const ILYA: ChatId = ChatId(300);
pub(super) const RETIRED: ChatId = ChatId(400);
pub(super) const OBSERVER: ChatId = ChatId(900);
pub(super) const STRANGER: ChatId = ChatId(555);

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn at(day: NaiveDate, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    day.and_hms_opt(hour, minute, second).expect("valid time")
}

/// 2024-07-01 is a Monday.
pub(super) fn monday() -> NaiveDate {
    date(2024, 7, 1)
}

pub(super) fn tuesday() -> NaiveDate {
    date(2024, 7, 2)
}

pub(super) fn member(
    chat_id: ChatId,
    first_name: &str,
    last_name: &str,
    home_location: &str,
    role: StaffRole,
) -> StaffMember {
    StaffMember {
        chat_id,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        home_location: home_location.to_string(),
        role,
        active: true,
    }
}

pub(super) fn directory() -> InMemoryDirectory {
    let mut retired = member(RETIRED, "Pavel", "Smirnov", "North", StaffRole::Staff);
    retired.active = false;

    InMemoryDirectory::default()
        .with_location("North", "NRT")
        .with_location("South", "STH")
        .with_staff(member(ANNA, "Anna", "Ivanova", "North", StaffRole::Staff))
        .with_staff(member(OLEG, "Oleg", "Petrov", "North", StaffRole::Staff))
        .with_staff(member(MARIA, "Maria", "Sidorova", "North", StaffRole::Supervisor))
        .with_staff(member(ILYA, "Ilya", "Orlov", "South", StaffRole::Admin))
        .with_staff(retired)
        .with_coverage(MARIA, "North, East")
}

pub(super) fn reporting_config() -> ReportingConfig {
    ReportingConfig {
        observers: vec![OBSERVER],
        bosses: vec![ILYA],
        diagram_dir: Some(PathBuf::from("/srv/diagrams")),
        ..ReportingConfig::default()
    }
}

pub(super) struct Harness {
    pub(super) store: Arc<InMemoryReportStore>,
    pub(super) sessions: Arc<InMemorySessionStore>,
    pub(super) transport: Arc<RecordingTransport>,
    pub(super) roster: Arc<InMemoryShiftRoster>,
    pub(super) ledger: Arc<InMemoryLedger>,
    pub(super) clock: Arc<FixedClock>,
    pub(super) service: Arc<CheckWorkflowService>,
}

impl Harness {
    pub(super) fn new(now: NaiveDateTime) -> Self {
        Self::with_directory(now, directory())
    }

    pub(super) fn with_directory(now: NaiveDateTime, directory: InMemoryDirectory) -> Self {
        Self::with_repository(now, Arc::new(directory))
    }

    pub(super) fn with_repository(
        now: NaiveDateTime,
        directory: Arc<dyn DirectoryRepository>,
    ) -> Self {
        let store = Arc::new(InMemoryReportStore::default());
        let sessions = Arc::new(InMemorySessionStore::default());
        let transport = Arc::new(RecordingTransport::default());
        let roster = Arc::new(InMemoryShiftRoster::default());
        let ledger = Arc::new(InMemoryLedger::default());
        let clock = Arc::new(FixedClock::at(now));

        let collaborators = Collaborators {
            reports: store.clone(),
            directory,
            sessions: sessions.clone(),
            transport: transport.clone(),
            roster: roster.clone(),
            ledger: ledger.clone(),
            clock: clock.clone(),
        };
        let service = Arc::new(CheckWorkflowService::new(collaborators, reporting_config()));

        Self {
            store,
            sessions,
            transport,
            roster,
            ledger,
            clock,
            service,
        }
    }

    pub(super) fn send(&self, event: InboundEvent) -> Reply {
        self.service.handle(event).expect("event handled")
    }

    pub(super) fn session(&self, conversation: ChatId) -> Option<Session> {
        self.sessions.load(conversation).expect("session store")
    }

    pub(super) fn router(&self) -> axum::Router {
        checks_router(self.service.clone())
    }

    /// Walks an opening-by-10 submission through to completion.
    pub(super) fn submit_opening_early(&self, submitter: ChatId, location: &str) -> Reply {
        self.send(text(submitter, "✅ Opening"));
        self.send(text(submitter, "By 10"));
        self.send(text(submitter, location));
        self.send(photo(submitter, "counter.jpg"));
        self.send(photo(submitter, "bar.jpg"))
    }

    /// Walks a closing submission, uploading `videos` clips.
    pub(super) fn submit_closing(&self, submitter: ChatId, day: &str, videos: usize) -> Reply {
        self.send(text(submitter, "✅ Closing"));
        self.send(text(submitter, day));
        let mut reply = self.send(text(submitter, "North"));
        for index in 0..videos {
            reply = self.send(video(submitter, &format!("clip-{index}.mp4")));
        }
        reply
    }
}

pub(super) fn text(conversation: ChatId, text: &str) -> InboundEvent {
    InboundEvent::Text {
        conversation_id: conversation,
        text: text.to_string(),
    }
}

pub(super) fn photo(conversation: ChatId, media: &str) -> InboundEvent {
    InboundEvent::Photo {
        conversation_id: conversation,
        media_ref: MediaRef(media.to_string()),
    }
}

pub(super) fn video(conversation: ChatId, media: &str) -> InboundEvent {
    InboundEvent::Video {
        conversation_id: conversation,
        media_ref: MediaRef(media.to_string()),
    }
}

pub(super) fn confirm(conversation: ChatId, report_id: ReportId) -> InboundEvent {
    InboundEvent::Confirmation {
        conversation_id: conversation,
        report_id,
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
