//! Raw table → cleaned table.
//!
//! Cleaning trims every text cell, coerces the four measures to numbers
//! (unparsable values become null), keeps only rows with a discount in
//! `(0, 0.9]` and drops exact duplicate rows, keeping first occurrences.
//! Columns outside the expected schema are carried through as text.

use std::collections::HashSet;

use crate::error::SchemaError;
use crate::models::{expected_columns, CleanedRecord, NUMERIC_COLUMNS, TEXT_COLUMNS};
use crate::parser::RawTable;

/// Largest discount a valid order line can carry.
pub const MAX_DISCOUNT: f64 = 0.9;

/// Cleaned order lines plus the names of passthrough columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedTable {
    /// Columns outside the expected schema, in raw table order.
    pub extra_columns: Vec<String>,
    pub records: Vec<CleanedRecord>,
}

impl CleanedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Header of the cleaned table: expected columns, then passthrough ones.
    pub fn columns(&self) -> Vec<String> {
        expected_columns()
            .map(str::to_string)
            .chain(self.extra_columns.iter().cloned())
            .collect()
    }

    /// Render back to text cells, in [`CleanedTable::columns`] order.
    ///
    /// Numbers use their shortest round-trip representation so that
    /// cleaning the rendered table again yields the same records.
    pub fn to_raw(&self) -> RawTable {
        let rows = self.records.iter().map(render_record).collect();
        RawTable::new(self.columns(), rows)
    }
}

/// What cleaning removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleaningReport {
    pub raw_rows: usize,
    /// Rows dropped for a null or out-of-range discount.
    pub invalid_discount: usize,
    pub duplicates: usize,
    pub kept: usize,
}

/// Clean a raw table.
///
/// Fails only when expected columns are missing; bad cells never abort.
pub fn basic_clean(raw: &RawTable) -> Result<CleanedTable, SchemaError> {
    basic_clean_with_report(raw).map(|(table, _)| table)
}

/// [`basic_clean`], also reporting how many rows each rule removed.
pub fn basic_clean_with_report(raw: &RawTable) -> Result<(CleanedTable, CleaningReport), SchemaError> {
    let layout = ColumnLayout::resolve(raw)?;

    let mut report = CleaningReport {
        raw_rows: raw.len(),
        ..CleaningReport::default()
    };
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for row in &raw.rows {
        let Some(record) = layout.clean_row(row) else {
            report.invalid_discount += 1;
            continue;
        };

        if !seen.insert(DedupKey::of(&record)) {
            report.duplicates += 1;
            continue;
        }
        records.push(record);
    }

    report.kept = records.len();
    let extra_columns = layout
        .extra
        .iter()
        .map(|&i| raw.headers[i].clone())
        .collect();

    Ok((
        CleanedTable {
            extra_columns,
            records,
        },
        report,
    ))
}

/// Coerce a text cell to a number; empty, unparsable and non-finite cells
/// are null.
pub fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Text form of an optional number, empty for null.
pub fn format_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn is_valid_discount(discount: f64) -> bool {
    discount > 0.0 && discount <= MAX_DISCOUNT
}

/// Where each expected column sits in a raw table.
struct ColumnLayout {
    text: [usize; 16],
    numeric: [usize; 4],
    extra: Vec<usize>,
}

impl ColumnLayout {
    fn resolve(raw: &RawTable) -> Result<Self, SchemaError> {
        let missing: Vec<String> = expected_columns()
            .filter(|c| raw.column_index(c).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError::MissingColumns(missing));
        }

        let index = |name: &str| raw.column_index(name).unwrap_or_default();
        let text = TEXT_COLUMNS.map(index);
        let numeric = NUMERIC_COLUMNS.map(index);
        let extra = (0..raw.headers.len())
            .filter(|i| !text.contains(i) && !numeric.contains(i))
            .collect();

        Ok(Self {
            text,
            numeric,
            extra,
        })
    }

    /// `None` when the row fails the discount rule.
    fn clean_row(&self, row: &[String]) -> Option<CleanedRecord> {
        let cell = |i: usize| row.get(i).map(|s| s.trim()).unwrap_or("");
        let text = |k: usize| cell(self.text[k]).to_string();
        let number = |k: usize| parse_number(cell(self.numeric[k]));

        let discount = number(2).filter(|d| is_valid_discount(*d))?;

        Some(CleanedRecord {
            order_id: text(0),
            order_date: text(1),
            ship_date: text(2),
            ship_mode: text(3),
            customer_id: text(4),
            customer_name: text(5),
            segment: text(6),
            country: text(7),
            city: text(8),
            state: text(9),
            postal_code: text(10),
            region: text(11),
            product_id: text(12),
            category: text(13),
            sub_category: text(14),
            product_name: text(15),
            sales: number(0),
            quantity: number(1),
            discount,
            profit: number(3),
            extra: self.extra.iter().map(|&i| cell(i).to_string()).collect(),
        })
    }
}

/// Hashable identity of a cleaned row across all columns.
#[derive(PartialEq, Eq, Hash)]
struct DedupKey {
    text: Vec<String>,
    numbers: [Option<u64>; 4],
}

impl DedupKey {
    fn of(record: &CleanedRecord) -> Self {
        let text = record
            .text_fields()
            .iter()
            .map(|s| s.to_string())
            .chain(record.extra.iter().cloned())
            .collect();
        // -0.0 and 0.0 are the same value.
        let numbers = record
            .numeric_fields()
            .map(|n| n.map(|v| if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() }));
        Self { text, numbers }
    }
}

fn render_record(record: &CleanedRecord) -> Vec<String> {
    record
        .text_fields()
        .iter()
        .map(|s| s.to_string())
        .chain(record.numeric_fields().map(format_number))
        .chain(record.extra.iter().cloned())
        .collect()
}
