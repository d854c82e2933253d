use chrono::{NaiveDate, NaiveTime};
use metrics_exporter_prometheus::PrometheusHandle;
use shift_report::config::ReportingConfig;
use shift_report::error::AppError;
use shift_report::workflows::checks::{
    Clock, Collaborators, DirectoryImportError, InMemoryDirectory, InMemoryLedger,
    InMemoryReportStore, InMemorySessionStore, InMemoryShiftRoster, RecordingTransport,
    ServiceError,
};
use std::fs::File;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) outbox: Arc<RecordingTransport>,
}

/// Messages the outbox holds before deliveries start failing; the chat
/// gateway is expected to drain it well before that.
pub(crate) const OUTBOX_CAPACITY: usize = 10_000;

/// In-process collaborators backing the workflow service.
pub(crate) struct Infrastructure {
    pub(crate) collaborators: Collaborators,
    pub(crate) outbox: Arc<RecordingTransport>,
    pub(crate) ledger: Arc<InMemoryLedger>,
}

/// Reference data read at startup.
#[derive(Debug, Default)]
pub(crate) struct Seed {
    pub(crate) directory: InMemoryDirectory,
    pub(crate) roster: InMemoryShiftRoster,
    pub(crate) ledger: InMemoryLedger,
}

pub(crate) fn in_memory(seed: Seed, clock: Arc<dyn Clock>) -> Infrastructure {
    let outbox = Arc::new(RecordingTransport::bounded(OUTBOX_CAPACITY));
    let ledger = Arc::new(seed.ledger);
    let collaborators = Collaborators {
        reports: Arc::new(InMemoryReportStore::default()),
        directory: Arc::new(seed.directory),
        sessions: Arc::new(InMemorySessionStore::default()),
        transport: outbox.clone(),
        roster: Arc::new(seed.roster),
        ledger: ledger.clone(),
        clock,
    };

    Infrastructure {
        collaborators,
        outbox,
        ledger,
    }
}

/// Loads `locations.csv`, `staff.csv` and `coverage.csv` from the configured
/// directory, plus the optional `shifts.csv`, `revenue.csv` and `safe.csv`.
/// Without a directory everything starts empty.
pub(crate) fn load_directory(config: &ReportingConfig) -> Result<Seed, AppError> {
    let Some(dir) = config.directory_dir.as_deref() else {
        return Ok(Seed::default());
    };

    let directory = InMemoryDirectory::from_csv(
        open(&dir.join("locations.csv"))?,
        open(&dir.join("staff.csv"))?,
        open(&dir.join("coverage.csv"))?,
    )?;

    let shifts = dir.join("shifts.csv");
    let roster = if shifts.is_file() {
        InMemoryShiftRoster::from_csv(open(&shifts)?).map_err(ServiceError::from)?
    } else {
        InMemoryShiftRoster::default()
    };

    let ledger = InMemoryLedger::default();
    let revenue = dir.join("revenue.csv");
    if revenue.is_file() {
        let rows = ledger
            .load_revenue_csv(open(&revenue)?)
            .map_err(ServiceError::from)?;
        info!(rows, "revenue ledger seeded");
    }
    let safe = dir.join("safe.csv");
    if safe.is_file() {
        let rows = ledger
            .load_safe_csv(open(&safe)?)
            .map_err(ServiceError::from)?;
        info!(rows, "safe balances seeded");
    }

    info!(directory = %dir.display(), "directory seeded from csv");
    Ok(Seed {
        directory,
        roster,
        ledger,
    })
}

fn open(path: &Path) -> Result<File, DirectoryImportError> {
    File::open(path).map_err(|source| DirectoryImportError::Open {
        path: path.display().to_string(),
        source,
    })
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|err| format!("failed to parse '{raw}' as HH:MM[:SS] ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shift_report::workflows::checks::{DirectoryRepository, LedgerSource};
    use std::path::PathBuf;

    fn seed_dir(name: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("shift-report-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        for (file, contents) in files {
            std::fs::write(dir.join(file), contents).expect("seed file");
        }
        dir
    }

    const LOCATIONS: &str = "name,alias,active\nNorth,NRT,true\n";
    const STAFF: &str = "chat_id,first_name,last_name,location,role,active\n\
                         10,Anna,Ivanova,North,supervisor,true\n";
    const COVERAGE: &str = "approver_id,locations\n10,North\n";

    #[test]
    fn time_accepts_minutes_or_seconds() {
        assert_eq!(
            parse_time("09:30"),
            Ok(NaiveTime::from_hms_opt(9, 30, 0).expect("valid time"))
        );
        assert_eq!(
            parse_time("22:15:05"),
            Ok(NaiveTime::from_hms_opt(22, 15, 5).expect("valid time"))
        );
        assert!(parse_time("noon").is_err());
    }

    #[test]
    fn missing_directory_dir_starts_empty() {
        let seed = load_directory(&ReportingConfig::default()).expect("empty");
        assert!(seed.directory.locations().expect("locations").is_empty());
    }

    #[test]
    fn missing_seed_file_reports_its_path() {
        let config = ReportingConfig {
            directory_dir: Some("/nonexistent/shift-report".into()),
            ..ReportingConfig::default()
        };
        let err = load_directory(&config).expect_err("missing files");
        assert!(err.to_string().contains("locations.csv"));
    }

    #[test]
    fn ledger_exports_are_loaded_next_to_the_directory() {
        let dir = seed_dir(
            "ledger",
            &[
                ("locations.csv", LOCATIONS),
                ("staff.csv", STAFF),
                ("coverage.csv", COVERAGE),
                ("revenue.csv", "date,location,amount\n2024-06-30,North,1250.50\n"),
                ("safe.csv", "location,amount\nNorth,4000\n"),
            ],
        );
        let config = ReportingConfig {
            directory_dir: Some(dir.clone()),
            ..ReportingConfig::default()
        };

        let seed = load_directory(&config).expect("seed loads");
        let date = NaiveDate::from_ymd_opt(2024, 6, 30).expect("valid date");
        let revenue = seed.ledger.revenue(date).expect("revenue");
        assert_eq!(revenue.len(), 1);
        assert_eq!(revenue[0].amount, Decimal::new(125_050, 2));
        assert_eq!(seed.ledger.safe_balances().expect("safe").len(), 1);
        assert!(seed.directory.location("North").expect("lookup").is_some());

        std::fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn ledger_exports_are_optional() {
        let dir = seed_dir(
            "no-ledger",
            &[
                ("locations.csv", LOCATIONS),
                ("staff.csv", STAFF),
                ("coverage.csv", COVERAGE),
            ],
        );
        let config = ReportingConfig {
            directory_dir: Some(dir.clone()),
            ..ReportingConfig::default()
        };

        let seed = load_directory(&config).expect("seed loads");
        assert!(seed.ledger.safe_balances().expect("safe").is_empty());

        std::fs::remove_dir_all(dir).expect("cleanup");
    }
}
