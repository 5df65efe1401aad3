use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};

/// 00:00 UTC of the given calendar day.
pub fn day_start_utc(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// ISO day string, `2025-01-05`.
pub fn day_string(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Compact day string used in lock keys, `20250105`.
pub fn compact_day_string(day: NaiveDate) -> String {
    day.format("%Y%m%d").to_string()
}

/// Every UTC day from `from` to `to`, both inclusive. Empty when `from > to`.
pub fn days_inclusive(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    from.iter_days().take_while(|day| *day <= to).collect()
}

/// Half-open UTC time range `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl UtcWindow {
    /// The window covering exactly one UTC calendar day.
    pub fn day(day: NaiveDate) -> Self {
        let from = day_start_utc(day);
        Self {
            from,
            to: from + Days::new(1),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.from && ts < self.to
    }
}
