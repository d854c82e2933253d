//! Submission timeliness windows.
//!
//! Every comparison is on local time of day with second precision; callers
//! hand in instants that are already localized.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeWindow {
    /// 09:00:00 through 10:00:00 inclusive.
    EarlyMorning,
    /// 09:00:00 through 12:00:00 inclusive.
    LateMorning,
    /// Evening of the day after the reference date, or the small hours of
    /// the day after that.
    Closing,
}

fn hms(hour: u32, minute: u32, second: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, second).unwrap_or(NaiveTime::MIN)
}

fn within(current: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    start <= current && current <= end
}

/// Returns whether a submission made at `now` falls inside `window`.
///
/// `reference` only matters for [`TimeWindow::Closing`]: one day before
/// today accepts 22:00:00..=23:59:59, two days before accepts anything up to
/// 03:00:00, every other distance (or no reference at all) is late.
pub fn classify(window: TimeWindow, now: NaiveDateTime, reference: Option<NaiveDate>) -> bool {
    let current = now.time().with_nanosecond(0).unwrap_or(now.time());

    match window {
        TimeWindow::EarlyMorning => within(current, hms(9, 0, 0), hms(10, 0, 0)),
        TimeWindow::LateMorning => within(current, hms(9, 0, 0), hms(12, 0, 0)),
        TimeWindow::Closing => {
            let Some(reference) = reference else {
                return false;
            };
            match (now.date() - reference).num_days() {
                1 => within(current, hms(22, 0, 0), hms(23, 59, 59)),
                2 => current <= hms(3, 0, 0),
                _ => false,
            }
        }
    }
}
