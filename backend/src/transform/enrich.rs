//! Cleaned table → enriched table: parsed dates, per-line margin and
//! order month.

use chrono::NaiveDate;

use super::cleaning::{format_number, CleanedTable};
use super::dates::{month_start, parse_date};
use crate::models::{CleanedRecord, EnrichedRecord, ORDER_MONTH, PROFIT_MARGIN};
use crate::parser::RawTable;

/// Enriched order lines plus the passthrough column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichedTable {
    pub extra_columns: Vec<String>,
    pub records: Vec<EnrichedRecord>,
}

impl EnrichedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Cleaned columns followed by the derived ones.
    pub fn columns(&self) -> Vec<String> {
        let cleaned = CleanedTable {
            extra_columns: self.extra_columns.clone(),
            records: Vec::new(),
        };
        let mut columns = cleaned.columns();
        columns.push(PROFIT_MARGIN.to_string());
        columns.push(ORDER_MONTH.to_string());
        columns
    }

    /// Render to text cells; dates as `YYYY-MM-DD`, nulls as empty cells.
    pub fn to_raw(&self) -> RawTable {
        let rows = self
            .records
            .iter()
            .map(|r| {
                let base = &r.record;
                let mut row: Vec<String> = base.text_fields().iter().map(|s| s.to_string()).collect();
                // Parsed dates replace the raw text.
                row[1] = format_date(r.order_date);
                row[2] = format_date(r.ship_date);
                row.extend(base.numeric_fields().map(format_number));
                row.extend(base.extra.iter().cloned());
                row.push(format_number(r.profit_margin));
                row.push(format_date(r.order_month));
                row
            })
            .collect();
        RawTable::new(self.columns(), rows)
    }
}

/// Enrich every cleaned record.
pub fn add_enriched_fields(table: &CleanedTable) -> EnrichedTable {
    EnrichedTable {
        extra_columns: table.extra_columns.clone(),
        records: table.records.iter().cloned().map(enrich_record).collect(),
    }
}

/// Enrich one record.
pub fn enrich_record(record: CleanedRecord) -> EnrichedRecord {
    let order_date = parse_date(&record.order_date);
    let ship_date = parse_date(&record.ship_date);
    let profit_margin = profit_margin(record.sales, record.profit);

    EnrichedRecord {
        record,
        order_date,
        ship_date,
        profit_margin,
        order_month: order_date.map(month_start),
    }
}

/// Per-line margin: `0` when sales is zero whatever the profit, null when
/// a needed operand is null.
pub fn profit_margin(sales: Option<f64>, profit: Option<f64>) -> Option<f64> {
    match (sales, profit) {
        (Some(s), _) if s == 0.0 => Some(0.0),
        (Some(s), Some(p)) => Some(p / s),
        _ => None,
    }
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::cleaning::basic_clean;
    use crate::transform::cleaning::tests::{line, raw};

    fn enriched(lines: &[String]) -> EnrichedTable {
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        add_enriched_fields(&basic_clean(&raw(&refs)).unwrap())
    }

    #[test]
    fn test_zero_sales_margin_is_zero() {
        let table = enriched(&[line("A", "0", "0.2", "50")]);
        assert_eq!(table.records[0].profit_margin, Some(0.0));
    }

    #[test]
    fn test_margin_guard() {
        assert_eq!(profit_margin(Some(200.0), Some(50.0)), Some(0.25));
        assert_eq!(profit_margin(Some(-200.0), Some(50.0)), Some(-0.25));
        assert_eq!(profit_margin(Some(0.0), Some(-5.0)), Some(0.0));
        assert_eq!(profit_margin(Some(0.0), None), Some(0.0));
        assert_eq!(profit_margin(None, Some(5.0)), None);
        assert_eq!(profit_margin(Some(10.0), None), None);
    }

    #[test]
    fn test_dates_and_order_month() {
        let table = enriched(&[line("A", "100", "0.2", "10")]);
        let record = &table.records[0];

        assert_eq!(record.order_date, NaiveDate::from_ymd_opt(2016, 11, 8));
        assert_eq!(record.ship_date, NaiveDate::from_ymd_opt(2016, 11, 11));
        assert_eq!(record.order_month, NaiveDate::from_ymd_opt(2016, 11, 1));
    }

    #[test]
    fn test_bad_order_date_nulls_month() {
        let cleaned = basic_clean(&raw(&[&line("A", "100", "0.2", "10")])).unwrap();
        let mut record = cleaned.records[0].clone();
        record.order_date = "someday".into();

        let enriched = enrich_record(record);
        assert_eq!(enriched.order_date, None);
        assert_eq!(enriched.order_month, None);
        assert!(enriched.ship_date.is_some());
    }

    #[test]
    fn test_to_raw_layout() {
        let table = enriched(&[line("A", "100", "0.2", "10")]);
        let rendered = table.to_raw();

        assert_eq!(rendered.headers.len(), 22);
        assert_eq!(rendered.headers[20], "Profit Margin");
        assert_eq!(rendered.rows[0][1], "2016-11-08");
        assert_eq!(rendered.rows[0][20], "0.1");
        assert_eq!(rendered.rows[0][21], "2016-11-01");
    }
}
