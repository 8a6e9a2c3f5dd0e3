//! Per-group outlier flags using Tukey's fence.
//!
//! For each group the 0.25 and 0.75 quantiles of the value column are
//! computed with linear interpolation between order statistics, then joined
//! back onto every row of the group by key. A row is an outlier when its
//! value lies below `Q1 - 1.5·IQR` or above `Q3 + 1.5·IQR`.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::SchemaError;
use crate::models::Columnar;

/// Fence width in IQRs.
pub const FENCE_FACTOR: f64 = 1.5;

/// Quartile statistics of one group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupStats {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
}

impl GroupStats {
    pub fn lower_fence(&self) -> f64 {
        self.q1 - FENCE_FACTOR * self.iqr
    }

    pub fn upper_fence(&self) -> f64 {
        self.q3 + FENCE_FACTOR * self.iqr
    }

    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower_fence() || value > self.upper_fence()
    }
}

/// An input row with its group's statistics and its flag.
///
/// Statistics are null when the row has no group key or its group has no
/// numeric values; such rows are never outliers.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierFlag<R> {
    pub row: R,
    pub q1: Option<f64>,
    pub q3: Option<f64>,
    pub iqr: Option<f64>,
    pub is_outlier: bool,
}

/// Per-group summary, handy for logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub group: String,
    pub rows: usize,
    pub outliers: usize,
    pub stats: Option<GroupStats>,
}

/// Quantile with linear interpolation (`idx = p·(n−1)`) over sorted values.
pub fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        Some(sorted[lo])
    } else {
        let frac = idx - lo as f64;
        Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
    }
}

/// Flag outliers of `value_col` within each group of `group_col`.
///
/// Every input row is returned, in input order.
pub fn iqr_flags<R>(rows: &[R], group_col: &str, value_col: &str) -> Result<Vec<OutlierFlag<R>>, SchemaError>
where
    R: Columnar + Clone,
{
    let stats = group_stats(rows, group_col, value_col)?;

    let flags = rows
        .iter()
        .map(|row| {
            let key = row.cell(group_col).and_then(|c| c.group_key());
            let value = row.cell(value_col).and_then(|c| c.as_number());
            let group = key.and_then(|k| stats.get(&k).copied().flatten());

            OutlierFlag {
                row: row.clone(),
                q1: group.map(|s| s.q1),
                q3: group.map(|s| s.q3),
                iqr: group.map(|s| s.iqr),
                is_outlier: matches!((group, value), (Some(s), Some(v)) if s.is_outlier(v)),
            }
        })
        .collect();

    Ok(flags)
}

/// Per-group row and outlier counts, ordered by group key.
pub fn summarize<R: Columnar>(flags: &[OutlierFlag<R>], group_col: &str) -> Vec<GroupSummary> {
    let mut summaries: BTreeMap<String, GroupSummary> = BTreeMap::new();

    for flag in flags {
        let Some(key) = flag.row.cell(group_col).and_then(|c| c.group_key()) else {
            continue;
        };
        let entry = summaries.entry(key.clone()).or_insert_with(|| GroupSummary {
            group: key,
            rows: 0,
            outliers: 0,
            stats: None,
        });
        entry.rows += 1;
        if flag.is_outlier {
            entry.outliers += 1;
        }
        if let (None, Some(q1), Some(q3), Some(iqr)) = (entry.stats, flag.q1, flag.q3, flag.iqr) {
            entry.stats = Some(GroupStats { q1, q3, iqr });
        }
    }

    summaries.into_values().collect()
}

/// Quartiles per group key; `None` for groups without numeric values.
fn group_stats<R: Columnar>(
    rows: &[R],
    group_col: &str,
    value_col: &str,
) -> Result<HashMap<String, Option<GroupStats>>, SchemaError> {
    let mut values: HashMap<String, Vec<f64>> = HashMap::new();

    for row in rows {
        let group = row
            .cell(group_col)
            .ok_or_else(|| SchemaError::UnknownColumn(group_col.to_string()))?;
        let value = row
            .cell(value_col)
            .ok_or_else(|| SchemaError::UnknownColumn(value_col.to_string()))?;
        if !value.is_numeric() {
            return Err(SchemaError::NonNumericColumn(value_col.to_string()));
        }

        if let Some(key) = group.group_key() {
            let bucket = values.entry(key).or_default();
            if let Some(v) = value.as_number() {
                bucket.push(v);
            }
        }
    }

    Ok(values
        .into_iter()
        .map(|(key, mut vals)| {
            vals.sort_by(f64::total_cmp);
            let stats = match (quantile(&vals, 0.25), quantile(&vals, 0.75)) {
                (Some(q1), Some(q3)) => Some(GroupStats { q1, q3, iqr: q3 - q1 }),
                _ => None,
            };
            (key, stats)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, FactOrderRow};

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        group: &'static str,
        value: Option<f64>,
    }

    impl Columnar for Row {
        fn cell(&self, column: &str) -> Option<Cell<'_>> {
            match column {
                "group" => Some(Cell::Text(self.group)),
                "value" => Some(Cell::Number(self.value)),
                _ => None,
            }
        }
    }

    fn rows(group: &'static str, values: &[f64]) -> Vec<Row> {
        values
            .iter()
            .map(|v| Row { group, value: Some(*v) })
            .collect()
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.25), Some(1.75));
        assert_eq!(quantile(&sorted, 0.75), Some(3.25));
        assert_eq!(quantile(&sorted, 0.5), Some(2.5));
        assert_eq!(quantile(&[7.0], 0.25), Some(7.0));
        assert_eq!(quantile(&[], 0.25), None);
    }

    #[test]
    fn test_upper_fence_boundary() {
        // Q1 = 10, Q3 = 20 → upper fence 35.
        let mut input = rows("a", &[10.0, 10.0, 20.0, 20.0, 36.0]);
        input.extend(rows("b", &[10.0, 10.0, 20.0, 20.0, 34.0]));

        let flags = iqr_flags(&input, "group", "value").unwrap();

        let a_last = &flags[4];
        assert_eq!((a_last.q1, a_last.q3, a_last.iqr), (Some(10.0), Some(20.0), Some(10.0)));
        assert!(a_last.is_outlier);

        let b_last = &flags[9];
        assert_eq!((b_last.q1, b_last.q3), (Some(10.0), Some(20.0)));
        assert!(!b_last.is_outlier);
    }

    #[test]
    fn test_lower_fence() {
        let stats = GroupStats { q1: 10.0, q3: 20.0, iqr: 10.0 };
        assert_eq!(stats.lower_fence(), -5.0);
        assert!(stats.is_outlier(-5.5));
        assert!(!stats.is_outlier(-5.0));
        assert!(!stats.is_outlier(35.0));
    }

    #[test]
    fn test_stats_joined_by_group_key_not_position() {
        let input = vec![
            Row { group: "x", value: Some(1.0) },
            Row { group: "y", value: Some(100.0) },
            Row { group: "x", value: Some(3.0) },
            Row { group: "y", value: Some(300.0) },
        ];
        let flags = iqr_flags(&input, "group", "value").unwrap();

        assert_eq!(flags.len(), 4);
        assert_eq!(flags[0].row, input[0]);
        assert_eq!(flags[0].q1, Some(1.5));
        assert_eq!(flags[2].q1, Some(1.5));
        assert_eq!(flags[1].q1, Some(150.0));
        assert_eq!(flags[3].q3, Some(250.0));
    }

    #[test]
    fn test_null_values_never_flagged() {
        let input = vec![
            Row { group: "x", value: Some(1.0) },
            Row { group: "x", value: None },
            Row { group: "z", value: None },
        ];
        let flags = iqr_flags(&input, "group", "value").unwrap();

        assert!(!flags[1].is_outlier);
        assert_eq!(flags[1].q1, Some(1.0));
        // Group without any numeric value has no statistics.
        assert_eq!(flags[2].q1, None);
        assert!(!flags[2].is_outlier);
    }

    #[test]
    fn test_unknown_and_text_columns_rejected() {
        let input = rows("a", &[1.0]);
        assert_eq!(
            iqr_flags(&input, "nope", "value").unwrap_err(),
            SchemaError::UnknownColumn("nope".into())
        );
        assert_eq!(
            iqr_flags(&input, "value", "group").unwrap_err(),
            SchemaError::NonNumericColumn("group".into())
        );
    }

    #[test]
    fn test_summary_counts() {
        let mut input = rows("a", &[10.0, 10.0, 20.0, 20.0, 36.0]);
        input.extend(rows("b", &[1.0, 2.0]));
        let flags = iqr_flags(&input, "group", "value").unwrap();
        let summary = summarize(&flags, "group");

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].group, "a");
        assert_eq!((summary[0].rows, summary[0].outliers), (5, 1));
        assert_eq!(summary[0].stats.map(|s| s.upper_fence()), Some(35.0));
        assert_eq!((summary[1].rows, summary[1].outliers), (2, 0));
    }

    #[test]
    fn test_works_on_fact_rows() {
        let fact: Vec<FactOrderRow> = Vec::new();
        assert!(iqr_flags(&fact, "Sub-Category", "Profit").unwrap().is_empty());
    }
}
