//! In-process implementations of the persistence traits.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use super::domain::{
    ChatId, CoverageAssignment, Location, NewReport, ReportId, ReportKind, ReportRecord,
    StaffMember, StaffRole,
};
use super::repository::{DirectoryRepository, ReportRepository, RepositoryError, UniqueKey};

#[derive(Debug, Default)]
struct ReportTable {
    next_id: u64,
    rows: BTreeMap<ReportId, ReportRecord>,
    unique: HashMap<UniqueKey, ReportId>,
}

/// Report store with a unique index on `(location, kind, add_date)`.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    table: Mutex<ReportTable>,
}

impl InMemoryReportStore {
    fn table(&self) -> Result<MutexGuard<'_, ReportTable>, RepositoryError> {
        self.table
            .lock()
            .map_err(|_| RepositoryError::Unavailable("report table lock poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.table().map(|table| table.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReportRepository for InMemoryReportStore {
    fn insert(&self, report: NewReport) -> Result<ReportRecord, RepositoryError> {
        let mut table = self.table()?;
        let key = UniqueKey::of(&report);
        let constrained = report.kind.spec().is_unique_per_day();

        if constrained {
            if let Some(existing) = table.unique.get(&key).and_then(|id| table.rows.get(id)) {
                return Err(RepositoryError::Duplicate {
                    key,
                    existing: Box::new(existing.clone()),
                });
            }
        }

        table.next_id += 1;
        let id = ReportId(table.next_id);
        let record = ReportRecord::from_new(id, report);
        if constrained {
            table.unique.insert(key, id);
        }
        table.rows.insert(id, record.clone());
        Ok(record)
    }

    fn find_unique(&self, key: &UniqueKey) -> Result<Option<ReportRecord>, RepositoryError> {
        let table = self.table()?;
        if let Some(record) = table.unique.get(key).and_then(|id| table.rows.get(id)) {
            return Ok(Some(record.clone()));
        }

        // Unconstrained kinds are not indexed; fall back to a scan.
        Ok(table
            .rows
            .values()
            .find(|record| {
                record.kind == key.kind
                    && record.add_date == key.add_date
                    && record.location == key.location
            })
            .cloned())
    }

    fn find_by_id(&self, id: ReportId) -> Result<ReportRecord, RepositoryError> {
        self.table()?
            .rows
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    fn find_by_date_range(
        &self,
        kind: Option<ReportKind>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ReportRecord>, RepositoryError> {
        let table = self.table()?;
        Ok(table
            .rows
            .values()
            .filter(|record| record.add_date >= start && record.add_date <= end)
            .filter(|record| kind.map_or(true, |kind| record.kind == kind))
            .cloned()
            .collect())
    }

    fn mark_verified(
        &self,
        id: ReportId,
        comment: &str,
        duration: NaiveTime,
        verified_at: NaiveDateTime,
    ) -> Result<ReportRecord, RepositoryError> {
        let mut table = self.table()?;
        let record = table.rows.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        record.verified = true;
        record.comment = comment.to_string();
        record.verification_duration = Some(duration);
        record.verified_at = Some(verified_at);
        Ok(record.clone())
    }
}

#[derive(Debug, Default)]
struct DirectoryTables {
    locations: BTreeMap<String, Location>,
    staff: BTreeMap<ChatId, StaffMember>,
    coverage: Vec<CoverageAssignment>,
}

impl DirectoryTables {
    fn put_location(&mut self, location: Location) {
        self.locations.insert(location.name.clone(), location);
    }

    fn put_staff(&mut self, member: StaffMember) {
        self.staff.insert(member.chat_id, member);
    }

    /// One assignment per approver; a newer row replaces the older one.
    fn put_coverage(&mut self, assignment: CoverageAssignment) {
        self.coverage
            .retain(|existing| existing.approver_id != assignment.approver_id);
        self.coverage.push(assignment);
    }
}

/// Locations, staff, and coverage held in memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    tables: Mutex<DirectoryTables>,
}

impl InMemoryDirectory {
    fn tables(&self) -> Result<MutexGuard<'_, DirectoryTables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("directory lock poisoned".to_string()))
    }

    fn from_tables(tables: DirectoryTables) -> Self {
        Self {
            tables: Mutex::new(tables),
        }
    }

    /// Builders own the directory, so no other holder can have poisoned
    /// the lock.
    fn tables_mut(&mut self) -> &mut DirectoryTables {
        self.tables.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_location(mut self, name: &str, alias: &str) -> Self {
        self.tables_mut().put_location(Location {
            name: name.to_string(),
            alias: alias.to_string(),
            active: true,
        });
        self
    }

    pub fn with_staff(mut self, member: StaffMember) -> Self {
        self.tables_mut().put_staff(member);
        self
    }

    pub fn with_coverage(mut self, approver_id: ChatId, covered_locations: &str) -> Self {
        self.tables_mut().put_coverage(CoverageAssignment {
            approver_id,
            covered_locations: covered_locations.to_string(),
        });
        self
    }

    pub fn put_location(&self, location: Location) -> Result<(), RepositoryError> {
        self.tables()?.put_location(location);
        Ok(())
    }

    pub fn put_staff(&self, member: StaffMember) -> Result<(), RepositoryError> {
        self.tables()?.put_staff(member);
        Ok(())
    }

    pub fn put_coverage(&self, assignment: CoverageAssignment) -> Result<(), RepositoryError> {
        self.tables()?.put_coverage(assignment);
        Ok(())
    }

    /// Seeds the directory from CSV exports (`name,alias,active`,
    /// `chat_id,first_name,last_name,location,role,active`,
    /// `approver_id,locations`).
    pub fn from_csv<L: Read, S: Read, C: Read>(
        locations: L,
        staff: S,
        coverage: C,
    ) -> Result<Self, DirectoryImportError> {
        let mut tables = DirectoryTables::default();

        for row in reader(locations).deserialize::<LocationRow>() {
            let row = row?;
            tables.put_location(Location {
                name: row.name,
                alias: row.alias,
                active: row.active.unwrap_or(true),
            });
        }

        for row in reader(staff).deserialize::<StaffRow>() {
            let row = row?;
            tables.put_staff(StaffMember {
                chat_id: ChatId(row.chat_id),
                first_name: row.first_name,
                last_name: row.last_name,
                home_location: row.location,
                role: row.role.unwrap_or(StaffRole::Staff),
                active: row.active.unwrap_or(true),
            });
        }

        for row in reader(coverage).deserialize::<CoverageRow>() {
            let row = row?;
            tables.put_coverage(CoverageAssignment {
                approver_id: ChatId(row.approver_id),
                covered_locations: row.locations,
            });
        }

        Ok(Self::from_tables(tables))
    }
}

fn reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source)
}

#[derive(Debug, Deserialize)]
struct LocationRow {
    name: String,
    alias: String,
    #[serde(default)]
    active: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct StaffRow {
    chat_id: i64,
    first_name: String,
    last_name: String,
    location: String,
    #[serde(default)]
    role: Option<StaffRole>,
    #[serde(default)]
    active: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct CoverageRow {
    approver_id: i64,
    locations: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryImportError {
    #[error("malformed directory csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("unable to open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
}

impl DirectoryRepository for InMemoryDirectory {
    fn location(&self, name: &str) -> Result<Option<Location>, RepositoryError> {
        Ok(self.tables()?.locations.get(name.trim()).cloned())
    }

    fn locations(&self) -> Result<Vec<Location>, RepositoryError> {
        Ok(self.tables()?.locations.values().cloned().collect())
    }

    fn coverage_assignments(&self) -> Result<Vec<CoverageAssignment>, RepositoryError> {
        Ok(self.tables()?.coverage.clone())
    }

    fn staff(&self, chat_id: ChatId) -> Result<Option<StaffMember>, RepositoryError> {
        Ok(self.tables()?.staff.get(&chat_id).cloned())
    }

    fn active_staff(&self) -> Result<Vec<StaffMember>, RepositoryError> {
        Ok(self
            .tables()?
            .staff
            .values()
            .filter(|member| member.active)
            .cloned()
            .collect())
    }
}
