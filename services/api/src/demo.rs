use crate::infra::{in_memory, Seed};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use clap::Args;
use rust_decimal::Decimal;
use shift_report::config::ReportingConfig;
use shift_report::error::AppError;
use shift_report::workflows::checks::{
    classify, ChatId, CheckWorkflowService, CoverageDirectory, FixedClock, InMemoryDirectory,
    InboundEvent, MediaRef, OutboundMessage, RecordingTransport, Reply, ReportKind,
    ReportRepository, ScheduledJob, ServiceError, StaffMember, StaffRole, TimeWindow, UniqueKey,
};
use std::sync::Arc;

const ANNA: ChatId = ChatId(100);
const OLEG: ChatId = ChatId(101);
const MARIA: ChatId = ChatId(200);
const ILYA: ChatId = ChatId(300);
const OBSERVER: ChatId = ChatId(900);

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Day the scripted shift takes place (YYYY-MM-DD). Defaults to Monday 2024-07-01.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// Local time of the opening submission (HH:MM[:SS]). Defaults to 09:30.
    #[arg(long, value_parser = crate::infra::parse_time)]
    pub(crate) time: Option<NaiveTime>,
}

struct Demo {
    service: CheckWorkflowService,
    outbox: Arc<RecordingTransport>,
}

impl Demo {
    fn say(&self, from: ChatId, text: &str) -> Result<Reply, ServiceError> {
        println!("  [{from}] > {text}");
        self.deliver(InboundEvent::Text {
            conversation_id: from,
            text: text.to_string(),
        })
    }

    fn upload(&self, from: ChatId, name: &str, video: bool) -> Result<Reply, ServiceError> {
        println!("  [{from}] > <{name}>");
        let media_ref = MediaRef(name.to_string());
        let event = if video {
            InboundEvent::Video {
                conversation_id: from,
                media_ref,
            }
        } else {
            InboundEvent::Photo {
                conversation_id: from,
                media_ref,
            }
        };
        self.deliver(event)
    }

    fn deliver(&self, event: InboundEvent) -> Result<Reply, ServiceError> {
        let reply = self.service.handle(event)?;
        let first_line = reply.text.lines().next().unwrap_or_default();
        match reply.attachment.as_deref() {
            Some(file) => println!("           < {first_line} [{file}]"),
            None => println!("           < {first_line}"),
        }
        Ok(reply)
    }

    fn flush_outbox(&self) {
        for (recipient, message) in self.outbox.drain() {
            match message {
                OutboundMessage::Text { text, confirm } => {
                    let action = confirm
                        .map(|id| format!(" [confirm #{id}]"))
                        .unwrap_or_default();
                    let first_line = text.lines().next().unwrap_or_default();
                    println!("    -> {recipient}: {first_line}{action}");
                }
                OutboundMessage::MediaGroup { media, .. } => {
                    println!("    -> {recipient}: album of {} item(s)", media.len());
                }
                OutboundMessage::Document { file, .. } => {
                    println!("    -> {recipient}: document {file}");
                }
            }
        }
    }
}

fn member(chat_id: ChatId, first: &str, last: &str, home: &str, role: StaffRole) -> StaffMember {
    StaffMember {
        chat_id,
        first_name: first.to_string(),
        last_name: last.to_string(),
        home_location: home.to_string(),
        role,
        active: true,
    }
}

fn directory() -> InMemoryDirectory {
    InMemoryDirectory::default()
        .with_location("North", "NRT")
        .with_location("South", "STH")
        .with_staff(member(ANNA, "Anna", "Ivanova", "North", StaffRole::Staff))
        .with_staff(member(OLEG, "Oleg", "Petrov", "North", StaffRole::Staff))
        .with_staff(member(MARIA, "Maria", "Sidorova", "North", StaffRole::Supervisor))
        .with_staff(member(ILYA, "Ilya", "Orlov", "South", StaffRole::Admin))
        .with_coverage(MARIA, "North")
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN))
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let date = args
        .date
        .or_else(|| NaiveDate::from_ymd_opt(2024, 7, 1))
        .unwrap_or_default();
    let time = args
        .time
        .or_else(|| NaiveTime::from_hms_opt(9, 30, 0))
        .unwrap_or(NaiveTime::MIN);
    let next_day = date + Duration::days(1);

    let clock = Arc::new(FixedClock::at(date.and_time(time)));
    let seed = Seed {
        directory: directory(),
        ..Seed::default()
    };
    let infrastructure = in_memory(seed, clock.clone());
    let reports = infrastructure.collaborators.reports.clone();
    let coverage = CoverageDirectory::new(infrastructure.collaborators.directory.clone());
    infrastructure
        .ledger
        .record_revenue(date - Duration::days(1), "North", Decimal::new(125_050, 2))
        .map_err(ServiceError::from)?;

    let config = ReportingConfig {
        observers: vec![OBSERVER],
        bosses: vec![ILYA],
        ..ReportingConfig::default()
    };
    let demo = Demo {
        service: CheckWorkflowService::new(infrastructure.collaborators, config),
        outbox: infrastructure.outbox,
    };

    println!("Shift report demo for {date} ({})", date.format("%A"));

    println!("\nOpening by 10 at North, {time}");
    demo.say(ANNA, "✅ Opening")?;
    demo.say(ANNA, "By 10")?;
    demo.say(ANNA, "North")?;
    demo.upload(ANNA, "counter.jpg", false)?;
    demo.upload(ANNA, "bar.jpg", false)?;
    demo.flush_outbox();

    let record = reports
        .find_unique(&UniqueKey::new("North", ReportKind::OpeningEarly, date))
        .map_err(ServiceError::from)?;
    if let Some(record) = &record {
        println!("  stored #{} on_time={}", record.id, record.on_time);
    }

    println!("\nSecond opening for the same location and day");
    demo.say(OLEG, "✅ Opening")?;
    demo.say(OLEG, "By 10")?;
    demo.say(OLEG, "North")?;

    if let Some(record) = record {
        println!("\nApprover review");
        clock.advance(Duration::minutes(20));
        demo.deliver(InboundEvent::Confirmation {
            conversation_id: MARIA,
            report_id: record.id,
        })?;
        demo.say(MARIA, "Counter is clean")?;
        demo.flush_outbox();
        let view = demo.service.report(record.id)?;
        println!(
            "  verified={} duration={}",
            view.verified,
            view.verification_duration.unwrap_or_default()
        );
    }

    for day in [date, next_day] {
        let required = ReportKind::Closing.spec().required_evidence(day);
        println!(
            "\nClosing for {day} ({}) needs {required} clip(s)",
            day.format("%A")
        );
        clock.set(at(day, 22, 15));
        demo.say(ANNA, "✅ Closing")?;
        demo.say(ANNA, "today")?;
        demo.say(ANNA, "North")?;
        for index in 1..=required {
            demo.upload(ANNA, &format!("closing-{index}.mp4"), true)?;
        }
        demo.outbox.drain();
    }

    println!("\nClosing timeliness two days after the reference date");
    let reference = date - Duration::days(2);
    for hour in [2, 4] {
        let on_time = classify(TimeWindow::Closing, at(date, hour, 0), Some(reference));
        println!("  {hour:02}:00 -> on_time={on_time}");
    }

    println!("\nOpening at South, which nobody covers");
    let approver = coverage.approver_for("South").map_err(ServiceError::from)?;
    let approver = approver
        .map(|member| member.last_name)
        .unwrap_or_else(|| "none".to_string());
    println!("  approver: {approver}");
    clock.set(at(date, 9, 45));
    demo.say(OLEG, "✅ Opening")?;
    demo.say(OLEG, "By 10")?;
    demo.say(OLEG, "South")?;
    demo.upload(OLEG, "counter.jpg", false)?;
    demo.upload(OLEG, "bar.jpg", false)?;
    demo.flush_outbox();

    println!("\nOwner digests");
    clock.set(at(next_day, 10, 0));
    for job in [ScheduledJob::Revenue, ScheduledJob::MissingOpening] {
        let report = demo.service.run_job(job, None)?;
        println!("  {job}: delivered to {} recipient(s)", report.delivered.len());
        demo.flush_outbox();
    }

    let summary = demo.service.summary(date, next_day)?;
    println!("\n{}", summary.render());

    Ok(())
}
