use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::domain::{
    ChatId, CoverageAssignment, Location, NewReport, ReportId, ReportKind, ReportRecord,
    StaffMember,
};

/// Key of the one-report-per-location-per-kind-per-day index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UniqueKey {
    pub location: String,
    pub kind: ReportKind,
    pub add_date: NaiveDate,
}

impl UniqueKey {
    pub fn new(location: impl Into<String>, kind: ReportKind, add_date: NaiveDate) -> Self {
        Self {
            location: location.into(),
            kind,
            add_date,
        }
    }

    pub fn of(report: &NewReport) -> Self {
        Self::new(report.location.clone(), report.kind, report.add_date)
    }
}

impl fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.location, self.kind, self.add_date)
    }
}

/// Persistence for submitted reports.
///
/// `insert` is a conditional insert: for kinds limited to one report per day
/// it fails with [`RepositoryError::Duplicate`] instead of writing a second
/// row, so callers never depend on a separate lookup to keep the index clean.
pub trait ReportRepository: Send + Sync {
    fn insert(&self, report: NewReport) -> Result<ReportRecord, RepositoryError>;
    fn find_unique(&self, key: &UniqueKey) -> Result<Option<ReportRecord>, RepositoryError>;
    fn find_by_id(&self, id: ReportId) -> Result<ReportRecord, RepositoryError>;
    fn find_by_date_range(
        &self,
        kind: Option<ReportKind>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ReportRecord>, RepositoryError>;
    /// Overwrites any previous verification of the same report.
    fn mark_verified(
        &self,
        id: ReportId,
        comment: &str,
        duration: NaiveTime,
        verified_at: NaiveDateTime,
    ) -> Result<ReportRecord, RepositoryError>;
}

/// Read access to locations, staff, and coverage assignments.
pub trait DirectoryRepository: Send + Sync {
    fn location(&self, name: &str) -> Result<Option<Location>, RepositoryError>;
    fn locations(&self) -> Result<Vec<Location>, RepositoryError>;
    fn coverage_assignments(&self) -> Result<Vec<CoverageAssignment>, RepositoryError>;
    fn staff(&self, chat_id: ChatId) -> Result<Option<StaffMember>, RepositoryError>;
    fn active_staff(&self) -> Result<Vec<StaffMember>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("report already exists for {key}")]
    Duplicate {
        key: UniqueKey,
        existing: Box<ReportRecord>,
    },
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
