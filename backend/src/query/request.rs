//! Query requests: date windows, dimensional filters and quick ranges.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::FactOrderRow;
use crate::transform::dates::{month_end, quarter_start, year_start};

/// An ad-hoc query over the fact table and monthly mart.
///
/// Dates are kept as text so that the engine, not the transport, decides
/// whether they are usable. Absent or empty dimension sets match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub regions: Option<BTreeSet<String>>,
    #[serde(default)]
    pub categories: Option<BTreeSet<String>>,
    #[serde(default)]
    pub segments: Option<BTreeSet<String>>,
    /// Length of the top products ranking; the engine default when absent.
    #[serde(default)]
    pub top_n: Option<usize>,
    /// Always aggregate fact rows, even without dimensional filters.
    #[serde(default)]
    pub exact: bool,
}

impl QueryRequest {
    pub fn new(start_date: impl Into<String>, end_date: impl Into<String>) -> Self {
        Self {
            start_date: Some(start_date.into()),
            end_date: Some(end_date.into()),
            ..Self::default()
        }
    }

    pub fn with_window(window: DateWindow) -> Self {
        Self::new(window.start.to_string(), window.end.to_string())
    }

    pub fn regions<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn categories<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn segments<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.segments = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn top_n(mut self, n: usize) -> Self {
        self.top_n = Some(n);
        self
    }

    pub fn exact(mut self) -> Self {
        self.exact = true;
        self
    }

    pub fn filter(&self) -> DimensionFilter {
        DimensionFilter {
            regions: self.regions.clone().unwrap_or_default(),
            categories: self.categories.clone().unwrap_or_default(),
            segments: self.segments.clone().unwrap_or_default(),
        }
    }
}

/// Why a request cannot be answered yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NotReady {
    MissingStartDate,
    MissingEndDate,
    InvalidStartDate(String),
    InvalidEndDate(String),
}

impl fmt::Display for NotReady {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotReady::MissingStartDate => write!(f, "start date not set"),
            NotReady::MissingEndDate => write!(f, "end date not set"),
            NotReady::InvalidStartDate(v) => write!(f, "start date '{}' is not a date", v),
            NotReady::InvalidEndDate(v) => write!(f, "end date '{}' is not a date", v),
        }
    }
}

/// Inclusive calendar-day window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// `end - start` in days; a single-day window has length zero.
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Starts on the first of a month and ends on the last day of a month.
    pub fn is_month_aligned(&self) -> bool {
        self.start.day() == 1 && self.end == month_end(self.end)
    }

    /// The equal-length window ending the day before this one starts;
    /// `None` when it would fall outside the representable calendar.
    pub fn previous(&self) -> Option<DateWindow> {
        let end = self.start.checked_sub_signed(Duration::days(1))?;
        let start = end.checked_sub_signed(self.end - self.start)?;
        Some(DateWindow { start, end })
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.start, self.end)
    }
}

/// Membership filters on the fact table's dimensions.
///
/// Empty sets are inactive. Active sets combine with AND; values inside a
/// set combine with OR.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionFilter {
    pub regions: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    pub segments: BTreeSet<String>,
}

impl DimensionFilter {
    pub fn is_active(&self) -> bool {
        !(self.regions.is_empty() && self.categories.is_empty() && self.segments.is_empty())
    }

    pub fn matches(&self, row: &FactOrderRow) -> bool {
        member(&self.regions, &row.region)
            && member(&self.categories, &row.category)
            && member(&self.segments, &row.segment)
    }

    /// `"Regions: East, West | Segments: Consumer"`, or the all-inclusive
    /// wording when nothing is active.
    pub fn describe(&self) -> String {
        let active: Vec<String> = [
            ("Regions", &self.regions),
            ("Categories", &self.categories),
            ("Segments", &self.segments),
        ]
        .into_iter()
        .filter(|(_, set)| !set.is_empty())
        .map(|(label, set)| {
            let values: Vec<&str> = set.iter().map(String::as_str).collect();
            format!("{}: {}", label, values.join(", "))
        })
        .collect();

        if active.is_empty() {
            "All Regions • All Categories • All Segments".to_string()
        } else {
            active.join(" | ")
        }
    }
}

fn member(set: &BTreeSet<String>, value: &str) -> bool {
    set.is_empty() || set.contains(value)
}

/// Preset windows anchored at the latest order date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuickRange {
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "qtd")]
    QuarterToDate,
    #[serde(rename = "ytd")]
    YearToDate,
    #[serde(rename = "all")]
    All,
}

impl QuickRange {
    /// Window for this preset, clamped to `bounds`.
    pub fn resolve(self, bounds: DateWindow) -> DateWindow {
        let end = bounds.end;
        let start = match self {
            QuickRange::Last7Days => days_before(end, 7),
            QuickRange::Last30Days => days_before(end, 30),
            QuickRange::QuarterToDate => quarter_start(end),
            QuickRange::YearToDate => year_start(end),
            QuickRange::All => bounds.start,
        };
        DateWindow::new(start.max(bounds.start), end)
    }
}

fn days_before(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_sub_signed(Duration::days(days))
        .unwrap_or(NaiveDate::MIN)
}

impl FromStr for QuickRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "7d" => Ok(QuickRange::Last7Days),
            "30d" => Ok(QuickRange::Last30Days),
            "qtd" => Ok(QuickRange::QuarterToDate),
            "ytd" => Ok(QuickRange::YearToDate),
            "all" => Ok(QuickRange::All),
            other => Err(format!("unknown quick range '{}' (expected 7d, 30d, qtd, ytd or all)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_previous_window_equal_length() {
        let window = DateWindow::new(d(2017, 3, 1), d(2017, 3, 31));
        let prev = window.previous().unwrap();

        assert_eq!(prev.end, d(2017, 2, 28));
        assert_eq!(prev.start, d(2017, 1, 29));
        assert_eq!(prev.span_days(), window.span_days());
    }

    #[test]
    fn test_previous_of_single_day() {
        let window = DateWindow::new(d(2017, 3, 1), d(2017, 3, 1));
        assert_eq!(window.previous(), Some(DateWindow::new(d(2017, 2, 28), d(2017, 2, 28))));
    }

    #[test]
    fn test_previous_outside_calendar() {
        let first = DateWindow::new(NaiveDate::MIN, d(2017, 1, 1));
        assert_eq!(first.previous(), None);

        // Fits the day before, not the full span.
        let wide = DateWindow::new(d(-200000, 1, 1), d(200000, 1, 1));
        assert_eq!(wide.previous(), None);
    }

    #[test]
    fn test_month_alignment() {
        assert!(DateWindow::new(d(2016, 1, 1), d(2016, 2, 29)).is_month_aligned());
        assert!(!DateWindow::new(d(2016, 1, 2), d(2016, 2, 29)).is_month_aligned());
        assert!(!DateWindow::new(d(2016, 1, 1), d(2016, 2, 28)).is_month_aligned());
    }

    #[test]
    fn test_filter_semantics() {
        let filter = QueryRequest::new("2017-01-01", "2017-12-31")
            .regions(["East", "West"])
            .segments(Vec::<String>::new())
            .filter();

        assert!(filter.is_active());
        assert!(member(&filter.regions, "West"));
        assert!(!member(&filter.regions, "South"));
        // Empty set is match-all.
        assert!(member(&filter.segments, "Anything"));
        assert!(!DimensionFilter::default().is_active());
    }

    #[test]
    fn test_describe_filters() {
        assert_eq!(
            DimensionFilter::default().describe(),
            "All Regions • All Categories • All Segments"
        );
        let filter = QueryRequest::default()
            .regions(["West", "East"])
            .segments(["Consumer"])
            .filter();
        assert_eq!(filter.describe(), "Regions: East, West | Segments: Consumer");
    }

    #[test]
    fn test_quick_ranges() {
        let bounds = DateWindow::new(d(2014, 1, 3), d(2017, 12, 30));

        assert_eq!(QuickRange::Last7Days.resolve(bounds).start, d(2017, 12, 23));
        assert_eq!(QuickRange::QuarterToDate.resolve(bounds).start, d(2017, 10, 1));
        assert_eq!(QuickRange::YearToDate.resolve(bounds).start, d(2017, 1, 1));
        assert_eq!(QuickRange::All.resolve(bounds), bounds);

        let short = DateWindow::new(d(2017, 12, 28), d(2017, 12, 30));
        assert_eq!(QuickRange::Last30Days.resolve(short).start, d(2017, 12, 28));

        let earliest = DateWindow::new(NaiveDate::MIN, NaiveDate::MIN);
        assert_eq!(QuickRange::Last7Days.resolve(earliest), earliest);
    }

    #[test]
    fn test_quick_range_parse() {
        assert_eq!("YTD".parse::<QuickRange>(), Ok(QuickRange::YearToDate));
        assert!("90d".parse::<QuickRange>().is_err());
    }

    #[test]
    fn test_request_json_shape() {
        let req: QueryRequest = serde_json::from_str(
            r#"{"startDate":"2017-01-01","endDate":"2017-01-31","regions":null,"categories":["Technology"]}"#,
        )
        .unwrap();

        assert_eq!(req.start_date.as_deref(), Some("2017-01-01"));
        assert!(req.regions.is_none());
        assert!(req.filter().is_active());
        assert!(!req.exact);
    }
}
