//! Query outcomes and the views of a ready response.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::QueryError;

use super::delta::compute_delta;
use super::request::{DateWindow, NotReady};

pub const NO_DATA_INSIGHTS: &str = "No data for the current filter selection.";

/// Tri-state result of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Ready(QueryResponse),
    NotReady(NotReady),
    Error(QueryError),
}

impl QueryOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, QueryOutcome::Ready(_))
    }

    pub fn ready(&self) -> Option<&QueryResponse> {
        match self {
            QueryOutcome::Ready(response) => Some(response),
            _ => None,
        }
    }

    pub fn into_ready(self) -> Option<QueryResponse> {
        match self {
            QueryOutcome::Ready(response) => Some(response),
            _ => None,
        }
    }
}

/// Which table the overall KPIs were aggregated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationPath {
    /// Pre-aggregated monthly mart.
    Fast,
    /// Filtered fact rows.
    Slow,
}

impl AggregationPath {
    pub fn select(filtered: bool, exact: bool) -> Self {
        if filtered || exact {
            AggregationPath::Slow
        } else {
            AggregationPath::Fast
        }
    }
}

/// Headline KPIs of one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub total_sales: f64,
    pub total_profit: f64,
    pub orders: u64,
    pub customers: u64,
    pub avg_discount: f64,
    pub margin: f64,
}

/// Percent change against the previous window; `None` when undefined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct KpiDeltas {
    pub sales: Option<f64>,
    pub profit: Option<f64>,
    pub orders: Option<f64>,
    pub margin: Option<f64>,
}

impl KpiDeltas {
    pub fn between(current: &Kpis, previous: &Kpis) -> Self {
        Self {
            sales: compute_delta(current.total_sales, Some(previous.total_sales)),
            profit: compute_delta(current.total_profit, Some(previous.total_profit)),
            orders: compute_delta(current.orders as f64, Some(previous.orders as f64)),
            margin: compute_delta(current.margin, Some(previous.margin)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub month: NaiveDate,
    pub sales: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotals {
    pub category: String,
    pub sales: f64,
    pub profit: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionCategorySales {
    pub region: String,
    pub category: String,
    pub sales: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductTotals {
    pub product_name: String,
    pub sales: f64,
    pub profit: f64,
}

/// Everything a dashboard needs for one window and filter set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub window: DateWindow,
    pub previous_window: Option<DateWindow>,
    pub path: AggregationPath,
    pub month_aligned: bool,
    /// Fact rows matching the window and filters.
    pub row_count: usize,
    pub kpis: Kpis,
    pub deltas: Option<KpiDeltas>,
    pub time_series: Vec<SeriesPoint>,
    pub by_category: Vec<CategoryTotals>,
    pub region_category: Vec<RegionCategorySales>,
    pub top_products: Vec<ProductTotals>,
    pub context: String,
    pub insights: String,
}

impl QueryResponse {
    /// Zero KPIs and no views for a window nothing matched.
    pub fn empty(window: DateWindow, path: AggregationPath, filters: &str) -> Self {
        Self {
            window,
            previous_window: window.previous(),
            path,
            month_aligned: window.is_month_aligned(),
            row_count: 0,
            kpis: Kpis::default(),
            deltas: None,
            time_series: Vec::new(),
            by_category: Vec::new(),
            region_category: Vec::new(),
            top_products: Vec::new(),
            context: format!("{}  |  {}  |  No data for current filters", window, filters),
            insights: NO_DATA_INSIGHTS.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kpis(sales: f64, profit: f64, orders: u64) -> Kpis {
        Kpis {
            total_sales: sales,
            total_profit: profit,
            orders,
            customers: orders,
            avg_discount: 0.1,
            margin: if sales == 0.0 { 0.0 } else { profit / sales },
        }
    }

    #[test]
    fn test_path_selection() {
        assert_eq!(AggregationPath::select(false, false), AggregationPath::Fast);
        assert_eq!(AggregationPath::select(true, false), AggregationPath::Slow);
        assert_eq!(AggregationPath::select(false, true), AggregationPath::Slow);
    }

    #[test]
    fn test_deltas_between() {
        let deltas = KpiDeltas::between(&kpis(110.0, 22.0, 5), &kpis(100.0, 0.0, 4));

        assert!((deltas.sales.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(deltas.profit, None);
        assert!((deltas.orders.unwrap() - 25.0).abs() < 1e-9);
        // Previous margin is zero.
        assert_eq!(deltas.margin, None);
    }

    #[test]
    fn test_empty_response() {
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2017, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2017, 1, 31).unwrap(),
        );
        let response = QueryResponse::empty(window, AggregationPath::Slow, "Regions: Mars");

        assert_eq!(response.kpis, Kpis::default());
        assert!(response.deltas.is_none());
        assert!(response.month_aligned);
        assert!(response.context.ends_with("No data for current filters"));
        assert!(response.context.starts_with("2017-01-01 → 2017-01-31  |  "));
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = QueryOutcome::NotReady(NotReady::MissingEndDate);
        assert!(!outcome.is_ready());
        assert!(outcome.ready().is_none());
    }

    #[test]
    fn test_response_json_keys() {
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2017, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2017, 1, 31).unwrap(),
        );
        let json = serde_json::to_value(QueryResponse::empty(window, AggregationPath::Fast, "x")).unwrap();

        assert_eq!(json["path"], "fast");
        assert_eq!(json["window"]["start"], "2017-01-01");
        assert_eq!(json["kpis"]["totalSales"], 0.0);
        assert!(json["deltas"].is_null());
    }
}
