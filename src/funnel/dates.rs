use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Calendar month used as the reporting period key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub const fn year(self) -> i32 {
        self.year
    }

    pub const fn month(self) -> u32 {
        self.month
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(self) -> NaiveDate {
        self.succ()
            .first_day()
            .pred_opt()
            .unwrap_or_else(|| self.first_day())
    }

    pub fn days_in_month(self) -> i64 {
        days_inclusive(self.first_day(), self.last_day())
    }

    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Closed day bounds of the month.
    pub fn interval(self) -> DateInterval {
        DateInterval::new(self.first_day(), self.last_day())
    }

    /// Half-open window covering the month.
    pub fn window(self) -> PeriodWindow {
        PeriodWindow::new(self.first_day(), self.succ().first_day())
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a YYYY-MM month")]
pub struct MonthParseError(pub String);

impl FromStr for MonthKey {
    type Err = MonthParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let (year, month) = trimmed
            .split_once('-')
            .ok_or_else(|| MonthParseError(raw.to_string()))?;

        if year.len() != 4 || month.is_empty() || month.len() > 2 {
            return Err(MonthParseError(raw.to_string()));
        }

        let year = year
            .parse::<i32>()
            .map_err(|_| MonthParseError(raw.to_string()))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| MonthParseError(raw.to_string()))?;

        Self::new(year, month).ok_or_else(|| MonthParseError(raw.to_string()))
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

pub fn month_bucket(date: NaiveDate) -> MonthKey {
    MonthKey {
        year: date.year(),
        month: date.month(),
    }
}

/// Calendar days from `start` to `end`, both included; 0 when `end < start`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> i64 {
    if end < start {
        return 0;
    }
    (end - start).num_days() + 1
}

/// Closed date interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateInterval {
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn days(&self) -> i64 {
        days_inclusive(self.start, self.end)
    }
}

pub fn overlap_days(a: DateInterval, b: DateInterval) -> i64 {
    days_inclusive(a.start.max(b.start), a.end.min(b.end)).max(0)
}

/// Half-open date window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodWindow {
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days().max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    fn month_aligned_span(&self) -> Option<u32> {
        if self.start.day() != 1 || self.end.day() != 1 || self.is_empty() {
            return None;
        }
        let months = (self.end.year() - self.start.year()) * 12 + self.end.month() as i32
            - self.start.month() as i32;
        u32::try_from(months).ok()
    }

    /// The window immediately before this one with the same length. Month-aligned
    /// windows step back by whole calendar months, everything else by days.
    pub fn previous(&self) -> PeriodWindow {
        if let Some(months) = self.month_aligned_span() {
            if let Some(start) = self.start.checked_sub_months(Months::new(months)) {
                return PeriodWindow::new(start, self.start);
            }
        }

        let start = self.start - chrono::Duration::days(self.len_days());
        PeriodWindow::new(start, self.start)
    }

    /// Calendar months touched by the window, each clipped to the window bounds.
    pub fn month_windows(&self) -> Vec<(MonthKey, PeriodWindow)> {
        let mut windows = Vec::new();
        if self.is_empty() {
            return windows;
        }

        let mut month = month_bucket(self.start);
        loop {
            let whole = month.window();
            if whole.start >= self.end {
                break;
            }
            let clipped = PeriodWindow::new(whole.start.max(self.start), whole.end.min(self.end));
            windows.push((month, clipped));
            month = month.succ();
        }
        windows
    }
}

impl fmt::Display for PeriodWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Inclusive month range requested by a report caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthRange {
    pub start_month: MonthKey,
    pub end_month: MonthKey,
}

impl MonthRange {
    pub fn window(&self) -> PeriodWindow {
        PeriodWindow::new(self.start_month.first_day(), self.end_month.succ().first_day())
    }

    pub fn months(&self) -> Vec<MonthKey> {
        let mut months = Vec::new();
        let mut cursor = self.start_month;
        while cursor <= self.end_month {
            months.push(cursor);
            cursor = cursor.succ();
        }
        months
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// `numerator / denominator` to four decimals, or 0 when the denominator is 0.
pub fn safe_rate(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return 0.0;
    }
    round_to(numerator / denominator, 4)
}

/// Percentage with one decimal, or 0 when the denominator is 0.
pub fn safe_percent(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return 0.0;
    }
    round_to(numerator * 100.0 / denominator, 1)
}
