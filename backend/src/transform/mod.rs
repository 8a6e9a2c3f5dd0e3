//! Transformation module.
//!
//! - Cleaning: raw table → validated base table
//! - Enrich: parsed dates and derived fields
//! - Outliers: per-group Tukey fences
//! - Pipeline: ETL orchestration

pub mod cleaning;
pub mod dates;
pub mod enrich;
pub mod outliers;
pub mod pipeline;

pub use cleaning::{basic_clean, basic_clean_with_report, CleanedTable, CleaningReport};
pub use dates::parse_date;
pub use enrich::{add_enriched_fields, EnrichedTable};
pub use outliers::{iqr_flags, summarize, GroupStats, GroupSummary, OutlierFlag};
pub use pipeline::*;
