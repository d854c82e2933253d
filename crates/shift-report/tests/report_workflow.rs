use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use shift_report::config::ReportingConfig;
use shift_report::workflows::checks::{
    ChatId, CheckWorkflowService, Collaborators, CoverageDirectory, FixedClock, InMemoryDirectory,
    InMemoryLedger, InMemoryReportStore, InMemorySessionStore, InMemoryShiftRoster, InboundEvent,
    MediaRef, RecordingTransport, ReportKind, ReportRepository, UniqueKey,
};

const SUBMITTER: ChatId = ChatId(11);
const LATECOMER: ChatId = ChatId(12);
const APPROVER: ChatId = ChatId(21);
const OBSERVER: ChatId = ChatId(99);

fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).expect("valid date")
}

fn instant(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, minute, 0).expect("valid time")
}

struct World {
    store: Arc<InMemoryReportStore>,
    transport: Arc<RecordingTransport>,
    clock: Arc<FixedClock>,
    service: CheckWorkflowService,
}

fn world(now: NaiveDateTime) -> World {
    let locations = "name,alias,active\nNorth,NRT,true\nSouth,STH,true\n";
    let staff = "chat_id,first_name,last_name,location,role,active\n\
                 11,Anna,Ivanova,North,staff,true\n\
                 12,Oleg,Petrov,North,staff,true\n\
                 21,Maria,Sidorova,North,supervisor,true\n";
    let coverage = "approver_id,locations\n21,North\n";
    let directory =
        InMemoryDirectory::from_csv(locations.as_bytes(), staff.as_bytes(), coverage.as_bytes())
            .expect("directory csv");

    let store = Arc::new(InMemoryReportStore::default());
    let transport = Arc::new(RecordingTransport::default());
    let clock = Arc::new(FixedClock::at(now));
    let collaborators = Collaborators {
        reports: store.clone(),
        directory: Arc::new(directory),
        sessions: Arc::new(InMemorySessionStore::default()),
        transport: transport.clone(),
        roster: Arc::new(InMemoryShiftRoster::default()),
        ledger: Arc::new(InMemoryLedger::default()),
        clock: clock.clone(),
    };
    let config = ReportingConfig {
        observers: vec![OBSERVER],
        ..ReportingConfig::default()
    };

    World {
        store,
        transport,
        clock,
        service: CheckWorkflowService::new(collaborators, config),
    }
}

impl World {
    fn say(&self, from: ChatId, text: &str) -> String {
        self.service
            .handle(InboundEvent::Text {
                conversation_id: from,
                text: text.to_string(),
            })
            .expect("text handled")
            .text
    }

    fn upload(&self, from: ChatId, photo: bool, name: &str) -> String {
        let media_ref = MediaRef(name.to_string());
        let event = if photo {
            InboundEvent::Photo {
                conversation_id: from,
                media_ref,
            }
        } else {
            InboundEvent::Video {
                conversation_id: from,
                media_ref,
            }
        };
        self.service.handle(event).expect("media handled").text
    }
}

#[test]
fn opening_early_is_unique_per_location_and_day() {
    let world = world(instant(day(7, 1), 9, 30));

    world.say(SUBMITTER, "✅ Opening");
    world.say(SUBMITTER, "By 10");
    world.say(SUBMITTER, "North");
    world.upload(SUBMITTER, true, "counter.jpg");
    let done = world.upload(SUBMITTER, true, "bar.jpg");
    assert_eq!(done, "Sent for review 👍");

    world.say(LATECOMER, "✅ Opening");
    world.say(LATECOMER, "By 10");
    let rejected = world.say(LATECOMER, "North");
    assert!(
        rejected.contains("Ivanova Anna"),
        "duplicate reply should name the first submitter: {rejected}"
    );

    let stored = world
        .store
        .find_by_date_range(Some(ReportKind::OpeningEarly), day(7, 1), day(7, 1))
        .expect("range");
    assert_eq!(stored.len(), 1);
    assert!(stored[0].on_time);
    assert_eq!(stored[0].submitter, SUBMITTER);
}

#[test]
fn closing_length_depends_on_weekday() {
    for (date, required) in [(day(7, 1), 7), (day(7, 2), 3)] {
        let world = world(instant(date, 22, 15));
        world.say(SUBMITTER, "✅ Closing");
        world.say(SUBMITTER, "today");
        world.say(SUBMITTER, "North");

        for index in 1..required {
            let reply = world.upload(SUBMITTER, false, &format!("clip-{index}.mp4"));
            assert_ne!(reply, "Sent for review 👍", "completed early at {index}");
        }
        let reply = world.upload(SUBMITTER, false, "last.mp4");
        assert_eq!(reply, "Sent for review 👍");

        let record = world
            .store
            .find_unique(&UniqueKey::new("North", ReportKind::Closing, date))
            .expect("lookup")
            .expect("closing stored");
        assert_eq!(record.evidence.len(), required);
    }
}

#[test]
fn uncovered_location_degrades_to_observers() {
    let world = world(instant(day(7, 1), 9, 45));

    world.say(SUBMITTER, "✅ Opening");
    world.say(SUBMITTER, "By 10");
    world.say(SUBMITTER, "South");
    world.upload(SUBMITTER, true, "counter.jpg");
    world.upload(SUBMITTER, true, "bar.jpg");

    let record = world
        .store
        .find_unique(&UniqueKey::new("South", ReportKind::OpeningEarly, day(7, 1)))
        .expect("lookup")
        .expect("record stored");
    assert_eq!(record.approver_surname, None);
    assert_eq!(
        world.transport.recipients().into_iter().collect::<Vec<_>>(),
        vec![OBSERVER]
    );
}

#[test]
fn coverage_ties_resolve_to_lowest_approver_id() {
    let directory = Arc::new(
        InMemoryDirectory::default()
            .with_location("North", "NRT")
            .with_staff(shift_report::workflows::checks::StaffMember {
                chat_id: ChatId(5),
                first_name: "Lev".to_string(),
                last_name: "Kuznetsov".to_string(),
                home_location: "North".to_string(),
                role: shift_report::workflows::checks::StaffRole::Supervisor,
                active: true,
            })
            .with_coverage(ChatId(9), "North")
            .with_coverage(ChatId(5), "North,South"),
    );
    let coverage = CoverageDirectory::new(directory);

    let approver = coverage
        .approver_for("North")
        .expect("lookup")
        .expect("approver");
    assert_eq!(approver.chat_id, ChatId(5));
    assert!(coverage.approver_for("East").expect("lookup").is_none());
}

#[test]
fn approver_confirmation_completes_the_report() {
    let world = world(instant(day(7, 2), 9, 10));
    world.say(SUBMITTER, "✅ Opening");
    world.say(SUBMITTER, "By 10");
    world.say(SUBMITTER, "North");
    world.upload(SUBMITTER, true, "counter.jpg");
    world.upload(SUBMITTER, true, "bar.jpg");
    let record = world
        .store
        .find_unique(&UniqueKey::new("North", ReportKind::OpeningEarly, day(7, 2)))
        .expect("lookup")
        .expect("record stored");

    world.clock.set(instant(day(7, 2), 9, 40));
    world
        .service
        .handle(InboundEvent::Confirmation {
            conversation_id: APPROVER,
            report_id: record.id,
        })
        .expect("confirmation handled");
    world.say(APPROVER, "Clean counter");

    let view = world.service.report(record.id).expect("status view");
    assert!(view.verified);
    assert_eq!(view.comment, "Clean counter");
    assert_eq!(view.verification_duration.as_deref(), Some("00:30:00"));
}
