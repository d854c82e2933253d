use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Conversation identity on the chat transport. Staff members are keyed by the
/// same value since every conversation is a private chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Surrogate key assigned by the report store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub u64);

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque transport handle for an uploaded photo or video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
}

/// Checklist variants a submitter can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    Setup,
    OpeningEarly,
    OpeningLate,
    Closing,
}

impl ReportKind {
    pub const ALL: [ReportKind; 4] = [
        ReportKind::Setup,
        ReportKind::OpeningEarly,
        ReportKind::OpeningLate,
        ReportKind::Closing,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ReportKind::Setup => "setup",
            ReportKind::OpeningEarly => "opening-early",
            ReportKind::OpeningLate => "opening-late",
            ReportKind::Closing => "closing",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Staff,
    Supervisor,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub chat_id: ChatId,
    pub first_name: String,
    pub last_name: String,
    pub home_location: String,
    pub role: StaffRole,
    pub active: bool,
}

impl StaffMember {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    /// Short code used to resolve the layout diagram.
    pub alias: String,
    pub active: bool,
}

/// Approver responsibility as stored: one row per approver with a delimited
/// location list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageAssignment {
    pub approver_id: ChatId,
    pub covered_locations: String,
}

impl CoverageAssignment {
    pub const DELIMITER: char = ',';

    pub fn locations(&self) -> BTreeSet<String> {
        self.covered_locations
            .split(Self::DELIMITER)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn covers(&self, location: &str) -> bool {
        self.locations().contains(location.trim())
    }
}

/// Fully collected submission ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReport {
    pub add_date: NaiveDate,
    pub kind: ReportKind,
    pub location: String,
    pub submitter: ChatId,
    pub evidence: Vec<MediaRef>,
    pub aux_answer: Option<String>,
    pub on_time: bool,
    pub approver_surname: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Comment stored until an approver verifies the report.
pub const NO_COMMENT: &str = "none";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: ReportId,
    pub add_date: NaiveDate,
    pub kind: ReportKind,
    pub location: String,
    pub submitter: ChatId,
    pub evidence: Vec<MediaRef>,
    pub aux_answer: Option<String>,
    pub on_time: bool,
    pub approver_surname: Option<String>,
    pub verified: bool,
    pub comment: String,
    pub verification_duration: Option<NaiveTime>,
    pub created_at: NaiveDateTime,
    pub verified_at: Option<NaiveDateTime>,
}

impl ReportRecord {
    pub fn from_new(id: ReportId, report: NewReport) -> Self {
        Self {
            id,
            add_date: report.add_date,
            kind: report.kind,
            location: report.location,
            submitter: report.submitter,
            evidence: report.evidence,
            aux_answer: report.aux_answer,
            on_time: report.on_time,
            approver_surname: report.approver_surname,
            verified: false,
            comment: NO_COMMENT.to_string(),
            verification_duration: None,
            created_at: report.created_at,
            verified_at: None,
        }
    }

    pub fn status_view(&self) -> ReportStatusView {
        ReportStatusView {
            report_id: self.id,
            kind: self.kind,
            location: self.location.clone(),
            add_date: self.add_date,
            submitter: self.submitter,
            evidence_count: self.evidence.len(),
            on_time: self.on_time,
            approver: self.approver_surname.clone(),
            verified: self.verified,
            comment: self.comment.clone(),
            verification_duration: self
                .verification_duration
                .map(|duration| duration.format("%H:%M:%S").to_string()),
        }
    }
}

/// Sanitized representation exposed over HTTP.
#[derive(Debug, Clone, Serialize)]
pub struct ReportStatusView {
    pub report_id: ReportId,
    pub kind: ReportKind,
    pub location: String,
    pub add_date: NaiveDate,
    pub submitter: ChatId,
    pub evidence_count: usize,
    pub on_time: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,
    pub verified: bool,
    pub comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_duration: Option<String>,
}
