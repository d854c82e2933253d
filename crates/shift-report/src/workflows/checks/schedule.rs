//! Read-only collaborators fed from the staffing and finance spreadsheets.

use std::collections::BTreeMap;
use std::io::Read;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::ChatId;

/// Who works where on which day.
pub trait ShiftRoster: Send + Sync {
    /// Staff scheduled on `date`, optionally only at `location`.
    fn scheduled(&self, date: NaiveDate, location: Option<&str>)
        -> Result<Vec<ChatId>, SourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLine {
    pub location: String,
    pub amount: Decimal,
}

/// Daily revenue and safe balances per location.
pub trait LedgerSource: Send + Sync {
    fn revenue(&self, date: NaiveDate) -> Result<Vec<LedgerLine>, SourceError>;
    fn safe_balances(&self) -> Result<Vec<LedgerLine>, SourceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("malformed source data: {0}")]
    Malformed(#[from] csv::Error),
    #[error("'{value}' is not a valid amount for {location}")]
    InvalidAmount { location: String, value: String },
}

type Shifts = BTreeMap<NaiveDate, Vec<(String, ChatId)>>;

#[derive(Debug, Default)]
pub struct InMemoryShiftRoster {
    shifts: Mutex<Shifts>,
}

fn poisoned(what: &str) -> SourceError {
    SourceError::Unavailable(format!("{what} lock poisoned"))
}

fn reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source)
}

fn push_shift(shifts: &mut Shifts, date: NaiveDate, location: &str, member: ChatId) {
    shifts
        .entry(date)
        .or_default()
        .push((location.to_string(), member));
}

impl InMemoryShiftRoster {
    pub fn assign(&self, date: NaiveDate, location: &str, member: ChatId) -> Result<(), SourceError> {
        let mut shifts = self.shifts.lock().map_err(|_| poisoned("roster"))?;
        push_shift(&mut shifts, date, location, member);
        Ok(())
    }

    /// Loads `date,location,chat_id` rows.
    pub fn from_csv<R: Read>(source: R) -> Result<Self, SourceError> {
        let mut shifts = Shifts::new();
        for row in reader(source).deserialize::<ShiftRow>() {
            let row = row?;
            push_shift(&mut shifts, row.date, &row.location, ChatId(row.chat_id));
        }
        Ok(Self {
            shifts: Mutex::new(shifts),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ShiftRow {
    date: NaiveDate,
    location: String,
    chat_id: i64,
}

impl ShiftRoster for InMemoryShiftRoster {
    fn scheduled(
        &self,
        date: NaiveDate,
        location: Option<&str>,
    ) -> Result<Vec<ChatId>, SourceError> {
        let shifts = self
            .shifts
            .lock()
            .map_err(|_| poisoned("roster"))?;
        Ok(shifts
            .get(&date)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(at, _)| location.map_or(true, |wanted| at == wanted))
                    .map(|(_, member)| *member)
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    revenue: Mutex<BTreeMap<NaiveDate, Vec<LedgerLine>>>,
    safe: Mutex<Vec<LedgerLine>>,
}

impl InMemoryLedger {
    pub fn record_revenue(
        &self,
        date: NaiveDate,
        location: &str,
        amount: Decimal,
    ) -> Result<(), SourceError> {
        let mut revenue = self.revenue.lock().map_err(|_| poisoned("ledger"))?;
        revenue.entry(date).or_default().push(LedgerLine {
            location: location.to_string(),
            amount,
        });
        Ok(())
    }

    /// Latest balance per location; a later row replaces an earlier one.
    pub fn record_safe(&self, location: &str, amount: Decimal) -> Result<(), SourceError> {
        let mut safe = self.safe.lock().map_err(|_| poisoned("ledger"))?;
        safe.retain(|line| line.location != location);
        safe.push(LedgerLine {
            location: location.to_string(),
            amount,
        });
        Ok(())
    }

    /// Loads `date,location,amount` rows from the daily revenue export.
    pub fn load_revenue_csv<R: Read>(&self, source: R) -> Result<usize, SourceError> {
        let mut loaded = 0;
        for row in reader(source).deserialize::<RevenueRow>() {
            let row = row?;
            let amount = parse_amount(&row.location, &row.amount)?;
            self.record_revenue(row.date, &row.location, amount)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Loads `location,amount` rows from the safe balance export.
    pub fn load_safe_csv<R: Read>(&self, source: R) -> Result<usize, SourceError> {
        let mut loaded = 0;
        for row in reader(source).deserialize::<SafeRow>() {
            let row = row?;
            let amount = parse_amount(&row.location, &row.amount)?;
            self.record_safe(&row.location, amount)?;
            loaded += 1;
        }
        Ok(loaded)
    }
}

#[derive(Debug, Deserialize)]
struct RevenueRow {
    date: NaiveDate,
    location: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
struct SafeRow {
    location: String,
    amount: String,
}

/// Spreadsheet exports may use a decimal comma and thousands spaces.
fn parse_amount(location: &str, raw: &str) -> Result<Decimal, SourceError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    Decimal::from_str(&cleaned).map_err(|_| SourceError::InvalidAmount {
        location: location.to_string(),
        value: raw.to_string(),
    })
}

impl LedgerSource for InMemoryLedger {
    fn revenue(&self, date: NaiveDate) -> Result<Vec<LedgerLine>, SourceError> {
        let revenue = self
            .revenue
            .lock()
            .map_err(|_| poisoned("ledger"))?;
        Ok(revenue.get(&date).cloned().unwrap_or_default())
    }

    fn safe_balances(&self) -> Result<Vec<LedgerLine>, SourceError> {
        let safe = self
            .safe
            .lock()
            .map_err(|_| poisoned("ledger"))?;
        Ok(safe.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_filters_by_location() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 1).expect("valid date");
        let csv = "date,location,chat_id\n2024-07-01,North,1\n2024-07-01,South,2\n";
        let roster = InMemoryShiftRoster::from_csv(csv.as_bytes()).expect("roster parses");

        assert_eq!(
            roster.scheduled(date, Some("North")).expect("lookup"),
            vec![ChatId(1)]
        );
        assert_eq!(roster.scheduled(date, None).expect("lookup").len(), 2);
        let next = date.succ_opt().expect("valid date");
        assert!(roster.scheduled(next, None).expect("lookup").is_empty());
    }

    #[test]
    fn ledger_loads_spreadsheet_exports() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 30).expect("valid date");
        let ledger = InMemoryLedger::default();
        let revenue = "date,location,amount\n\
                       2024-06-30,North,1250.50\n\
                       2024-06-30,South,\"1 749,50\"\n";
        let safe = "location,amount\nNorth,4000\nNorth,5000\n";

        assert_eq!(ledger.load_revenue_csv(revenue.as_bytes()).expect("revenue"), 2);
        assert_eq!(ledger.load_safe_csv(safe.as_bytes()).expect("safe"), 2);

        let lines = ledger.revenue(date).expect("revenue lookup");
        assert_eq!(lines[0].amount, Decimal::new(125_050, 2));
        assert_eq!(lines[1].amount, Decimal::new(174_950, 2));
        assert_eq!(
            ledger.safe_balances().expect("safe lookup"),
            vec![LedgerLine {
                location: "North".to_string(),
                amount: Decimal::new(5_000, 0),
            }]
        );
    }

    #[test]
    fn ledger_rejects_unparsable_amounts() {
        let ledger = InMemoryLedger::default();
        let result = ledger.load_safe_csv("location,amount\nSouth,lots\n".as_bytes());
        assert!(matches!(
            result,
            Err(SourceError::InvalidAmount { location, .. }) if location == "South"
        ));
    }
}
