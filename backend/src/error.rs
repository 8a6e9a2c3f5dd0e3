//! Error types for the Ordermart pipeline and query engine.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`CsvError`] - Raw CSV reading and decoding errors
//! - [`SchemaError`] - Column set mismatches
//! - [`StoreError`] - Curated table persistence errors
//! - [`QueryError`] - Query requests that can never produce a result
//! - [`PipelineError`] - Top-level ETL orchestration errors
//! - [`ServerError`] - HTTP server errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Unparsable numbers and dates are not errors: they become nulls in the
//! cleaned and enriched tables.

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors while reading a raw CSV source.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid CSV format.
    #[error("Invalid CSV format at line {line}: {message}")]
    Parse { line: u64, message: String },

    /// Empty file.
    #[error("CSV input is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

// =============================================================================
// Schema Errors
// =============================================================================

/// The table handed to a stage does not have the shape the stage requires.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    /// Raw table lacks some of the expected columns.
    #[error("Raw table is missing expected columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// A stage was asked to read a column the rows do not have.
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    /// A numeric computation was pointed at a text or date column.
    #[error("Column '{0}' is not numeric")]
    NonNumericColumn(String),
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors reading or writing curated tables.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A curated table required to serve queries does not exist.
    #[error("Missing data source: {}", path.display())]
    MissingSource { path: PathBuf },

    /// IO error.
    #[error("Store IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV (de)serialization error.
    #[error("Store CSV error on '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

// =============================================================================
// Query Errors
// =============================================================================

/// Requests that are well-formed but can never be answered.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    /// Window start falls after its end.
    #[error("Start date {start} is after end date {end}")]
    InvertedWindow { start: NaiveDate, end: NaiveDate },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level ETL orchestration errors.
///
/// This is the main error type returned by [`crate::transform::pipeline::run_etl`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Schema mismatch.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Curated store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Curated tables could not be loaded at start-up.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Failed to bind or serve.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for curated store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
