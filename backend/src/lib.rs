//! # Ordermart - Retail order ETL and KPI query engine
//!
//! Ordermart turns a raw retail order export into curated, analysis-ready
//! tables and answers ad-hoc KPI queries over them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Raw CSV   │────▶│   Cleaner   │────▶│  Enricher   │────▶│    Marts    │
//! │  (any enc)  │     │ (dedup, Δ%) │     │ (dates, Δm) │     │ fact/dim/mo │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    │
//!                            ┌─────────────┐     ┌─────────────┐     │
//!                            │ Query Engine│◀────│Curated Store│◀────┘
//!                            │ (fast/slow) │     │   (CSVs)    │
//!                            └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ordermart::{run_etl, Config, QueryEngine, QueryRequest};
//!
//! let config = Config::from_env();
//! run_etl(&config)?;
//!
//! let engine = QueryEngine::load(&config.store)?;
//! let outcome = engine.query(&QueryRequest::new("2017-01-01", "2017-03-31"));
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Explicit configuration values
//! - [`models`] - Column names and table rows
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Cleaning, enrichment, outliers and the ETL pipeline
//! - [`marts`] - Fact, product dimension and monthly KPI tables
//! - [`store`] - Curated CSV persistence
//! - [`query`] - Window/filter queries with period-over-period deltas
//! - [`api`] - HTTP API server and broadcast logging

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod marts;
pub mod transform;

// Persistence
pub mod store;

// Querying
pub mod query;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Errors and configuration
// =============================================================================

pub use config::{Config, OutlierConfig, StoreConfig};
pub use error::{
    CsvError, PipelineError, QueryError, SchemaError, ServerError, StoreError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    CleanedRecord,
    EnrichedRecord,
    FactOrderRow,
    MonthlyKpiRow,
    ProductDimRow,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    parse_csv_file_auto,
    parse_bytes_auto,
    parse_csv_str,
    detect_encoding,
    detect_delimiter,
    decode_content,
    ParseResult,
    RawTable,
};

// =============================================================================
// Re-exports - Pipeline stages
// =============================================================================

pub use transform::{
    add_enriched_fields,
    basic_clean,
    iqr_flags,
    run_etl,
    run_pipeline,
    CleanedTable,
    EnrichedTable,
    EtlSummary,
    OutlierFlag,
    PipelineOutput,
};
pub use marts::{build_marts, Marts};
pub use store::CuratedStore;

// =============================================================================
// Re-exports - Query engine
// =============================================================================

pub use query::{
    compute_delta,
    AggregationPath,
    DateWindow,
    QueryEngine,
    QueryOutcome,
    QueryRequest,
    QueryResponse,
    QuickRange,
};

// Server
pub mod server {
    pub use crate::api::server::{start_server, AppState};
}
