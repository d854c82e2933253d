//! Scheduled entry points.
//!
//! Each job reads the report store, directory, roster or ledger and fans
//! out a message. Jobs never touch sessions.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Timelike, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::catalog::{kinds_in, KindFamily};
use super::clock::Clock;
use super::domain::ChatId;
use super::notify::{Audience, DeliveryReport, FanOut, OutboundMessage};
use super::prompt::{day_label, digest_header};
use super::repository::{DirectoryRepository, ReportRepository};
use super::schedule::{LedgerLine, LedgerSource, ShiftRoster};
use super::service::{Collaborators, ServiceError};
use super::summary::summarize;
use crate::config::ReportingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduledJob {
    Revenue,
    Safe,
    ShiftReminder,
    ChecklistReminder,
    MaintenanceReminder,
    MissingOpening,
    MissingClosing,
    Compliance,
}

impl ScheduledJob {
    pub const ALL: [ScheduledJob; 8] = [
        ScheduledJob::Revenue,
        ScheduledJob::Safe,
        ScheduledJob::ShiftReminder,
        ScheduledJob::ChecklistReminder,
        ScheduledJob::MaintenanceReminder,
        ScheduledJob::MissingOpening,
        ScheduledJob::MissingClosing,
        ScheduledJob::Compliance,
    ];

    pub const fn slug(self) -> &'static str {
        match self {
            ScheduledJob::Revenue => "revenue",
            ScheduledJob::Safe => "safe",
            ScheduledJob::ShiftReminder => "shift-reminder",
            ScheduledJob::ChecklistReminder => "checklist-reminder",
            ScheduledJob::MaintenanceReminder => "maintenance-reminder",
            ScheduledJob::MissingOpening => "missing-opening",
            ScheduledJob::MissingClosing => "missing-closing",
            ScheduledJob::Compliance => "compliance",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|job| job.slug().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for ScheduledJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

const OPENING_REMINDER: &str =
    "Good morning! Don't forget the opening checklist: send the report by 10:00 ☀";
const CLOSING_REMINDER: &str =
    "The shift is almost over. Don't forget the closing checklist before you leave 🌘";
const MAINTENANCE_MORNING: &str =
    "Monday is grinder cleaning day. Plan time for the burrs and the steam wand today 🧽";
const MAINTENANCE_EVENING: &str =
    "Reminder: the Monday closing report includes the grinder and steam wand videos 🎥";

pub struct DigestJobs {
    reports: Arc<dyn ReportRepository>,
    directory: Arc<dyn DirectoryRepository>,
    roster: Arc<dyn ShiftRoster>,
    ledger: Arc<dyn LedgerSource>,
    clock: Arc<dyn Clock>,
    fanout: FanOut,
    bosses: Vec<ChatId>,
}

impl DigestJobs {
    pub fn new(collaborators: &Collaborators, config: &ReportingConfig) -> Self {
        Self {
            reports: Arc::clone(&collaborators.reports),
            directory: Arc::clone(&collaborators.directory),
            roster: Arc::clone(&collaborators.roster),
            ledger: Arc::clone(&collaborators.ledger),
            clock: Arc::clone(&collaborators.clock),
            fanout: FanOut::new(Arc::clone(&collaborators.transport)),
            bosses: config.bosses.clone(),
        }
    }

    pub fn run(
        &self,
        job: ScheduledJob,
        target: Option<ChatId>,
    ) -> Result<DeliveryReport, ServiceError> {
        let report = match job {
            ScheduledJob::Revenue => self.revenue(target)?,
            ScheduledJob::Safe => self.safe(target)?,
            ScheduledJob::ShiftReminder => self.shift_reminder(target)?,
            ScheduledJob::ChecklistReminder => self.checklist_reminder(target)?,
            ScheduledJob::MaintenanceReminder => self.maintenance_reminder(target)?,
            ScheduledJob::MissingOpening => self.missing_reports(KindFamily::Opening, target)?,
            ScheduledJob::MissingClosing => self.missing_reports(KindFamily::Closing, target)?,
            ScheduledJob::Compliance => self.compliance(target)?,
        };
        info!(
            %job,
            attempted = report.attempted.len(),
            delivered = report.delivered.len(),
            "scheduled job finished"
        );
        Ok(report)
    }

    /// Yesterday's revenue per location.
    pub fn revenue(&self, target: Option<ChatId>) -> Result<DeliveryReport, ServiceError> {
        let date = self.yesterday();
        let lines = self.ledger.revenue(date)?;
        let mut text = digest_header(date, "Revenue");
        text.push_str(&render_lines(&lines));
        let total: Decimal = lines.iter().map(|line| line.amount).sum();
        text.push_str(&format!("\n<b>Total: {total}</b>"));

        Ok(self.fanout.send(
            self.owners(target).members(),
            &[OutboundMessage::text(text)],
        ))
    }

    /// With a target, every balance goes to that recipient. Otherwise each
    /// scheduled non-owner gets their home location's balance.
    pub fn safe(&self, target: Option<ChatId>) -> Result<DeliveryReport, ServiceError> {
        let today = self.clock.today();
        let balances = self.ledger.safe_balances()?;

        if let Some(target) = target {
            let mut text = digest_header(today, "Safe balances");
            text.push_str(&render_lines(&balances));
            return Ok(self.fanout.send(&[target], &[OutboundMessage::text(text)]));
        }

        let mut audience = Audience::new();
        for boss in &self.bosses {
            audience = audience.exclude(*boss);
        }
        audience.extend(self.roster.scheduled(today, None)?);

        let mut report = DeliveryReport::default();
        for recipient in audience.members() {
            let Some(member) = self.directory.staff(*recipient)? else {
                debug!(%recipient, "scheduled recipient missing from directory");
                continue;
            };
            let Some(line) = balances
                .iter()
                .find(|line| line.location == member.home_location)
            else {
                continue;
            };
            let text = format!(
                "{}Location: <b>{}</b>\nBalance: {}",
                digest_header(today, "Safe balance"),
                line.location,
                line.amount
            );
            report.merge(self.fanout.send(&[*recipient], &[OutboundMessage::text(text)]));
        }
        Ok(report)
    }

    /// Tells tomorrow's staff where they work.
    pub fn shift_reminder(&self, target: Option<ChatId>) -> Result<DeliveryReport, ServiceError> {
        let tomorrow = self.clock.today() + Duration::days(1);
        let mut reached = Audience::new();
        let mut report = DeliveryReport::default();

        for location in self.active_locations()? {
            let scheduled = self.roster.scheduled(tomorrow, Some(&location))?;
            for member in scheduled
                .into_iter()
                .filter(|member| target.map_or(true, |target| target == *member))
            {
                if !reached.push(member) {
                    continue;
                }
                let text = format!(
                    "Reminder: tomorrow ({}) you work at <b>{location}</b> 🗓",
                    day_label(tomorrow)
                );
                report.merge(self.fanout.send(&[member], &[OutboundMessage::text(text)]));
            }
        }
        Ok(report)
    }

    /// Opening reminder at 09, closing reminder at 21; other hours do nothing.
    pub fn checklist_reminder(
        &self,
        target: Option<ChatId>,
    ) -> Result<DeliveryReport, ServiceError> {
        let text = match self.clock.now().hour() {
            9 => OPENING_REMINDER,
            21 => CLOSING_REMINDER,
            hour => {
                debug!(hour, "no checklist reminder for this hour");
                return Ok(DeliveryReport::default());
            }
        };
        self.remind_today(text, target)
    }

    /// Monday-only grinder cleaning reminder at 10 and 21.
    pub fn maintenance_reminder(
        &self,
        target: Option<ChatId>,
    ) -> Result<DeliveryReport, ServiceError> {
        let now = self.clock.now();
        if now.weekday() != Weekday::Mon {
            return Ok(DeliveryReport::default());
        }
        let text = match now.hour() {
            10 => MAINTENANCE_MORNING,
            21 => MAINTENANCE_EVENING,
            _ => return Ok(DeliveryReport::default()),
        };
        self.remind_today(text, target)
    }

    /// Which active locations did and did not report. Opening kinds are
    /// checked for today, closing for yesterday.
    pub fn missing_reports(
        &self,
        family: KindFamily,
        target: Option<ChatId>,
    ) -> Result<DeliveryReport, ServiceError> {
        let (date, title) = match family {
            KindFamily::Opening => (self.clock.today(), "Opening reports"),
            KindFamily::Closing => (self.yesterday(), "Closing reports"),
        };
        let kinds = kinds_in(family);
        let sent: BTreeSet<String> = self
            .reports
            .find_by_date_range(None, date, date)?
            .into_iter()
            .filter(|record| kinds.contains(&record.kind))
            .map(|record| record.location)
            .collect();
        let (done, missing): (Vec<String>, Vec<String>) = self
            .active_locations()?
            .into_iter()
            .partition(|location| sent.contains(location));

        let mut text = digest_header(date, title);
        text.push_str(&format!("Sent: {}\n", join_or_dash(&done)));
        text.push_str(&format!("Missing: {}", join_or_dash(&missing)));

        Ok(self.fanout.send(
            self.owners(target).members(),
            &[OutboundMessage::text(text)],
        ))
    }

    /// Month-to-date compliance summary.
    pub fn compliance(&self, target: Option<ChatId>) -> Result<DeliveryReport, ServiceError> {
        let today = self.clock.today();
        let start = today.with_day(1).unwrap_or(today);
        let reports = self.reports.find_by_date_range(None, start, today)?;
        let summary = summarize(&reports, self.directory.as_ref(), start, today)?;

        let mut text = digest_header(
            today,
            &format!("Compliance {} to {}", day_label(start), day_label(today)),
        );
        text.push_str(&summary.render());

        Ok(self.fanout.send(
            self.owners(target).members(),
            &[OutboundMessage::text(text)],
        ))
    }

    fn remind_today(
        &self,
        text: &str,
        target: Option<ChatId>,
    ) -> Result<DeliveryReport, ServiceError> {
        let mut audience = Audience::new();
        match target {
            Some(target) => {
                audience.push(target);
            }
            None => audience.extend(self.roster.scheduled(self.clock.today(), None)?),
        }
        Ok(self
            .fanout
            .send(audience.members(), &[OutboundMessage::text(text)]))
    }

    fn owners(&self, target: Option<ChatId>) -> Audience {
        let mut audience = Audience::new();
        match target {
            Some(target) => {
                audience.push(target);
            }
            None => audience.extend(self.bosses.iter().copied()),
        }
        audience
    }

    fn active_locations(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self
            .directory
            .locations()?
            .into_iter()
            .filter(|location| location.active)
            .map(|location| location.name)
            .collect())
    }

    fn yesterday(&self) -> NaiveDate {
        let today = self.clock.today();
        today.pred_opt().unwrap_or(today)
    }
}

fn render_lines(lines: &[LedgerLine]) -> String {
    if lines.is_empty() {
        return "No data.".to_string();
    }
    lines
        .iter()
        .map(|line| format!("{}: {}", line.location, line.amount))
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_or_dash(names: &[String]) -> String {
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_slugs_round_trip() {
        for job in ScheduledJob::ALL {
            assert_eq!(ScheduledJob::parse(job.slug()), Some(job));
        }
        assert_eq!(ScheduledJob::parse("lunch"), None);
    }

    #[test]
    fn empty_ledger_renders_placeholder() {
        assert_eq!(render_lines(&[]), "No data.");
    }
}
