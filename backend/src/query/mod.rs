//! Query Engine - Ad-hoc KPIs over the curated tables
//!
//! A request names an inclusive date window and optional dimension filters.
//! Unfiltered requests read the pre-aggregated monthly mart (fast path);
//! filtered or `exact` requests aggregate fact rows (slow path). Both paths
//! agree on month-aligned windows.
//!
//! ```text
//! QueryRequest ──▶ window check ──┬──▶ NotReady (missing/unparsable date)
//!                                 ├──▶ Error    (start after end)
//!                                 └──▶ Ready    (KPIs, deltas, views)
//! ```

pub mod delta;
pub mod engine;
pub mod request;
pub mod response;

pub use delta::compute_delta;
pub use engine::{slow_kpis, DimensionOptions, QueryEngine};
pub use request::{DateWindow, DimensionFilter, NotReady, QueryRequest, QuickRange};
pub use response::{
    AggregationPath, CategoryTotals, KpiDeltas, Kpis, ProductTotals, QueryOutcome, QueryResponse,
    RegionCategorySales, SeriesPoint,
};
