//! Replies to the acting conversation and shared message texts.

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{ReportKind, ReportRecord, StaffMember, StaffRole};

pub const OPENING_START: &str = "✅ Opening";
pub const CLOSING_START: &str = "✅ Closing";
pub const ACKNOWLEDGE: &str = "OK";

const CANCEL_WORDS: [&str; 5] = ["cancel", "/cancel", "❌ cancel", "⬆ exit", "stop"];

pub fn is_cancel(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    CANCEL_WORDS.contains(&text.as_str())
}

/// Keyboard shown with a reply. Layout is up to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "options", rename_all = "snake_case")]
pub enum Menu {
    Remove,
    Main,
    Boss,
    Choices(Vec<String>),
}

impl Menu {
    pub fn for_role(role: StaffRole) -> Self {
        match role {
            StaffRole::Admin => Menu::Boss,
            StaffRole::Supervisor | StaffRole::Staff => Menu::Main,
        }
    }

    pub fn choices<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Menu::Choices(options.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    pub menu: Menu,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

impl Reply {
    pub fn new(text: impl Into<String>, menu: Menu) -> Self {
        Self {
            text: text.into(),
            menu,
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Option<String>) -> Self {
        self.attachment = attachment;
        self
    }

    pub fn acknowledgement(member: &StaffMember) -> Self {
        Self::new("Anything else? 👇", Menu::for_role(member.role))
    }

    pub fn submitted(member: &StaffMember) -> Self {
        Self::new("Sent for review 👍", Menu::for_role(member.role))
    }
}

pub fn day_label(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

pub fn long_day_label(date: NaiveDate) -> String {
    date.format("%d %B %y, %a").to_string()
}

fn hashtag(kind: ReportKind, location: &str) -> String {
    format!("#{}_{}", kind.title().replace(' ', "_"), location.replace(' ', "_"))
}

const RULE: &str = "*************************";

/// Caption attached to the evidence when a report is sent for review.
pub fn submission_caption(record: &ReportRecord, submitter: &StaffMember) -> String {
    let mut caption = format!(
        "<b>{}</b>\n{}\n{RULE}\nLocation: <b>{}</b>\nEmployee: {}\n",
        record.kind.title(),
        long_day_label(record.add_date),
        record.location,
        submitter.full_name(),
    );
    if let Some(answer) = &record.aux_answer {
        caption.push_str(&format!("Answer: {answer}\n"));
    }
    caption.push_str(&format!(
        "On time: {}\nVerified: No\n{}",
        yes_no(record.on_time),
        hashtag(record.kind, &record.location)
    ));
    caption
}

/// Message broadcast once an approver confirms a report.
pub fn verification_message(record: &ReportRecord) -> String {
    let icon = match record.kind {
        ReportKind::Closing => "🌘",
        ReportKind::Setup | ReportKind::OpeningEarly | ReportKind::OpeningLate => "☀",
    };
    let duration = record
        .verification_duration
        .map(|duration| duration.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());

    format!(
        "<b>{icon} {} report</b>\n{}\n{RULE}\nLocation: <b>{}</b>\nComment: {}\nVerified in: {duration} h.\n{}",
        record.kind.title(),
        long_day_label(record.add_date),
        record.location,
        record.comment,
        hashtag(record.kind, &record.location)
    )
}

pub fn duplicate_message(record: &ReportRecord, owner: &str) -> String {
    format!(
        "<b>\"{}\"</b> for {} already exists!\nAdded by: {owner}",
        record.kind.title(),
        day_label(record.add_date)
    )
}

pub fn digest_header(date: NaiveDate, title: &str) -> String {
    format!("<b>INFO {}</b>\n{title}\n{RULE}\n", long_day_label(date))
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_words_are_case_insensitive() {
        assert!(is_cancel("Cancel"));
        assert!(is_cancel(" /cancel "));
        assert!(!is_cancel("cancellation"));
    }

    #[test]
    fn admins_get_the_boss_menu() {
        assert_eq!(Menu::for_role(StaffRole::Admin), Menu::Boss);
        assert_eq!(Menu::for_role(StaffRole::Supervisor), Menu::Main);
    }
}
