//! Report collection and verification for multi-location shift checklists.
//!
//! Staff walk through a conversational session to submit photo and video
//! evidence; the covering approver confirms it, and the outcome is fanned
//! out to co-workers and a fixed observer list.

pub mod catalog;
pub mod clock;
pub mod collection;
pub mod coverage;
pub mod digest;
pub mod domain;
pub mod notify;
pub mod prompt;
pub mod repository;
pub mod router;
pub mod schedule;
pub mod service;
pub mod session;
pub mod store;
pub mod summary;
pub mod timeliness;
pub mod verification;

#[cfg(test)]
mod tests;

pub use catalog::{KindFamily, KindSpec, UniquenessScope};
pub use clock::{Clock, FixedClock, ZonedClock};
pub use collection::CollectionEngine;
pub use coverage::CoverageDirectory;
pub use digest::{DigestJobs, ScheduledJob};
pub use domain::{
    ChatId, CoverageAssignment, Location, MediaKind, MediaRef, NewReport, ReportId, ReportKind,
    ReportRecord, ReportStatusView, StaffMember, StaffRole,
};
pub use notify::{
    best_effort, Audience, DeliveryError, DeliveryReport, FanOut, OutboundMessage,
    RecordingTransport, Transport,
};
pub use prompt::{Menu, Reply};
pub use repository::{DirectoryRepository, ReportRepository, RepositoryError, UniqueKey};
pub use router::checks_router;
pub use schedule::{
    InMemoryLedger, InMemoryShiftRoster, LedgerLine, LedgerSource, ShiftRoster, SourceError,
};
pub use service::{CheckWorkflowService, Collaborators, InboundEvent, ServiceError};
pub use session::{
    Flow, InMemorySessionStore, Input, Progress, Session, SessionStep, SessionStore,
    SessionStoreError,
};
pub use store::{DirectoryImportError, InMemoryDirectory, InMemoryReportStore};
pub use summary::{summarize, ComplianceRow, ComplianceSummary};
pub use timeliness::{classify, TimeWindow};
pub use verification::{elapsed_hms, VerificationEngine};
