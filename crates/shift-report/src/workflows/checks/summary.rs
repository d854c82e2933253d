//! Period compliance figures grouped by approver and kind.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveTime, Timelike};
use rust_decimal::Decimal;
use serde::Serialize;

use super::domain::{ReportKind, ReportRecord};
use super::repository::{DirectoryRepository, RepositoryError};

pub const UNASSIGNED: &str = "unassigned";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceRow {
    pub approver: String,
    pub kind: ReportKind,
    pub received: usize,
    pub on_time: usize,
    /// Percentage of received reports that were on time, one decimal place.
    pub on_time_rate: Decimal,
    pub verified: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_verification: Option<String>,
    pub expected: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceSummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub rows: Vec<ComplianceRow>,
}

impl ComplianceSummary {
    pub fn render(&self) -> String {
        if self.rows.is_empty() {
            return "No reports in this period.".to_string();
        }
        self.rows
            .iter()
            .map(|row| {
                format!(
                    "<b>{}</b> · {}: {}/{} received, {}% on time, verified {} (avg {})",
                    row.approver,
                    row.kind.title(),
                    row.received,
                    row.expected,
                    row.on_time_rate,
                    row.verified,
                    row.mean_verification.as_deref().unwrap_or("--:--:--"),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Default)]
struct Tally {
    received: usize,
    on_time: usize,
    verified_seconds: Vec<u32>,
}

pub fn summarize(
    reports: &[ReportRecord],
    directory: &dyn DirectoryRepository,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<ComplianceSummary, RepositoryError> {
    let mut groups: BTreeMap<(String, ReportKind), Tally> = BTreeMap::new();
    for report in reports
        .iter()
        .filter(|report| report.add_date >= start && report.add_date <= end)
    {
        let approver = report
            .approver_surname
            .clone()
            .unwrap_or_else(|| UNASSIGNED.to_string());
        let tally = groups.entry((approver, report.kind)).or_default();
        tally.received += 1;
        if report.on_time {
            tally.on_time += 1;
        }
        if let Some(duration) = report.verification_duration.filter(|_| report.verified) {
            tally.verified_seconds.push(duration.num_seconds_from_midnight());
        }
    }

    let days = usize::try_from((end - start).num_days() + 1).unwrap_or(0);
    let covered = covered_by_surname(directory)?;

    let rows = groups
        .into_iter()
        .map(|((approver, kind), tally)| {
            let locations = covered.get(&approver).map_or(0, BTreeSet::len);
            ComplianceRow {
                on_time_rate: rate(tally.on_time, tally.received),
                verified: tally.verified_seconds.len(),
                mean_verification: mean_time(&tally.verified_seconds)
                    .map(|mean| mean.format("%H:%M:%S").to_string()),
                expected: days * locations,
                approver,
                kind,
                received: tally.received,
                on_time: tally.on_time,
            }
        })
        .collect();

    Ok(ComplianceSummary { start, end, rows })
}

/// Locations per approver surname; active locations nobody covers are
/// counted under [`UNASSIGNED`].
fn covered_by_surname(
    directory: &dyn DirectoryRepository,
) -> Result<BTreeMap<String, BTreeSet<String>>, RepositoryError> {
    let mut covered: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut any_coverage = BTreeSet::new();

    for assignment in directory.coverage_assignments()? {
        let locations = assignment.locations();
        any_coverage.extend(locations.iter().cloned());
        if let Some(approver) = directory.staff(assignment.approver_id)? {
            covered.entry(approver.last_name).or_default().extend(locations);
        }
    }

    let uncovered = directory
        .locations()?
        .into_iter()
        .filter(|location| location.active && !any_coverage.contains(&location.name))
        .map(|location| location.name)
        .collect::<BTreeSet<_>>();
    if !uncovered.is_empty() {
        covered.insert(UNASSIGNED.to_string(), uncovered);
    }
    Ok(covered)
}

fn rate(part: usize, whole: usize) -> Decimal {
    if whole == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(part as u64) * Decimal::ONE_HUNDRED / Decimal::from(whole as u64)).round_dp(1)
}

fn mean_time(seconds: &[u32]) -> Option<NaiveTime> {
    if seconds.is_empty() {
        return None;
    }
    let total: u64 = seconds.iter().map(|value| u64::from(*value)).sum();
    let mean = u32::try_from(total / seconds.len() as u64).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(mean, 0)
}
