//! High-level ETL API: raw CSV to curated tables.
//!
//! [`run_pipeline`] chains the pure stages over an in-memory table;
//! [`run_etl`] adds reading the raw file and persisting every output
//! through the [`CuratedStore`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ordermart::{run_etl, Config};
//!
//! let summary = run_etl(&Config::from_env())?;
//! println!("{} fact rows, {} months", summary.fact_rows, summary.months);
//! ```

use std::path::PathBuf;

use serde::Serialize;

use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::config::{Config, OutlierConfig};
use crate::error::PipelineResult;
use crate::marts::{build_marts, Marts};
use crate::models::FactOrderRow;
use crate::parser::{parse_csv_file_auto, RawTable};
use crate::store::CuratedStore;

use super::cleaning::{basic_clean_with_report, CleanedTable, CleaningReport};
use super::enrich::{add_enriched_fields, EnrichedTable};
use super::outliers::{iqr_flags, summarize, GroupSummary, OutlierFlag};

/// Everything the pure stages produce from one raw table.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub cleaned: CleanedTable,
    pub report: CleaningReport,
    pub enriched: EnrichedTable,
    pub marts: Marts,
    pub outliers: Vec<OutlierFlag<FactOrderRow>>,
}

impl PipelineOutput {
    pub fn outlier_count(&self) -> usize {
        self.outliers.iter().filter(|f| f.is_outlier).count()
    }
}

/// What a completed ETL run wrote.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtlSummary {
    pub source: PathBuf,
    pub encoding: String,
    pub delimiter: char,
    pub raw_rows: usize,
    pub cleaned_rows: usize,
    pub invalid_discount: usize,
    pub duplicates: usize,
    pub fact_rows: usize,
    pub products: usize,
    pub months: usize,
    pub outliers: usize,
    pub outputs: Vec<PathBuf>,
}

/// Clean, enrich, build marts and flag outliers over the fact table.
///
/// Fails when expected columns are missing or the outlier columns are
/// unknown. A table with no surviving record yields empty marts.
pub fn run_pipeline(raw: &RawTable, outliers: &OutlierConfig) -> PipelineResult<PipelineOutput> {
    let (cleaned, report) = basic_clean_with_report(raw)?;
    let enriched = add_enriched_fields(&cleaned);
    let marts = build_marts(&enriched);
    let flags = iqr_flags(&marts.fact_orders, &outliers.group_col, &outliers.value_col)?;

    Ok(PipelineOutput {
        cleaned,
        report,
        enriched,
        marts,
        outliers: flags,
    })
}

/// Run the whole ETL described by `config` and write every curated table.
pub fn run_etl(config: &Config) -> PipelineResult<EtlSummary> {
    // Ingest
    log_info(format!("[INGEST] Reading {}", config.raw_csv.display()));
    let parsed = parse_csv_file_auto(&config.raw_csv)?;
    log_success(format!(
        "[INGEST] {} rows, {} columns (encoding: {}, separator: '{}')",
        parsed.table.len(),
        parsed.table.headers.len(),
        parsed.encoding,
        format_delimiter(parsed.delimiter)
    ));

    let output = run_pipeline(&parsed.table, &config.outliers)?;
    let store = CuratedStore::new(config.store.clone());
    let mut outputs = Vec::new();

    // Clean
    log_cleaning(&output.report);
    outputs.push(store.write_clean(&output.cleaned.to_raw())?);

    // Enrich
    let undated = output
        .enriched
        .records
        .iter()
        .filter(|r| r.order_date.is_none())
        .count();
    if undated > 0 {
        log_warning(format!("[ENRICH] {} rows have an unparsable Order Date", undated));
    }
    log_success(format!("[ENRICH] {} rows enriched", output.enriched.len()));
    outputs.push(store.write_enriched(&output.enriched.to_raw())?);

    // Marts
    outputs.extend(store.write_marts(&output.marts)?);
    log_success(format!(
        "[MARTS] {} fact rows, {} products, {} months",
        output.marts.fact_orders.len(),
        output.marts.dim_products.len(),
        output.marts.orders_monthly.len()
    ));

    // Outliers
    log_outliers(&config.outliers, &summarize(&output.outliers, &config.outliers.group_col));
    outputs.push(store.write_outliers(&config.outliers, &output.outliers)?);

    for path in &outputs {
        log_info_indent(path.display().to_string(), 1);
    }
    log_success(format!("[DONE] {} files written to {}", outputs.len(), config.store.curated_dir.display()));

    Ok(EtlSummary {
        source: config.raw_csv.clone(),
        encoding: parsed.encoding,
        delimiter: parsed.delimiter,
        raw_rows: output.report.raw_rows,
        cleaned_rows: output.report.kept,
        invalid_discount: output.report.invalid_discount,
        duplicates: output.report.duplicates,
        fact_rows: output.marts.fact_orders.len(),
        products: output.marts.dim_products.len(),
        months: output.marts.orders_monthly.len(),
        outliers: output.outlier_count(),
        outputs,
    })
}

fn log_cleaning(report: &CleaningReport) {
    if report.invalid_discount > 0 {
        log_warning(format!(
            "[CLEAN] Dropped {} rows with a missing or out-of-range Discount",
            report.invalid_discount
        ));
    }
    if report.duplicates > 0 {
        log_warning(format!("[CLEAN] Dropped {} duplicate rows", report.duplicates));
    }
    if report.kept == 0 {
        log_warning(format!(
            "[CLEAN] No rows left out of {}; curated tables will be empty",
            report.raw_rows
        ));
    } else {
        log_success(format!("[CLEAN] {} of {} rows kept", report.kept, report.raw_rows));
    }
}

fn log_outliers(config: &OutlierConfig, summary: &[GroupSummary]) {
    let total: usize = summary.iter().map(|g| g.outliers).sum();
    log_success(format!(
        "[OUTLIERS] {} {} outliers across {} {} groups",
        total,
        config.value_col,
        summary.len(),
        config.group_col
    ));
    for group in summary.iter().filter(|g| g.outliers > 0) {
        let fences = group
            .stats
            .map(|s| format!(" (fences {:.2} .. {:.2})", s.lower_fence(), s.upper_fence()))
            .unwrap_or_default();
        log_info_indent(
            format!("{}: {}/{}{}", group.group, group.outliers, group.rows, fences),
            1,
        );
    }
}

/// Format delimiter for display
fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}
