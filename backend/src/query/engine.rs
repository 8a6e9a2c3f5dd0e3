//! The query engine over the curated fact table and monthly mart.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::config::StoreConfig;
use crate::error::{QueryError, StoreResult};
use crate::marts::{margin_of_sums, MonthAccumulator};
use crate::models::{FactOrderRow, MonthlyKpiRow};
use crate::store::CuratedStore;
use crate::transform::dates::parse_date;

use super::request::{DateWindow, DimensionFilter, NotReady, QueryRequest, QuickRange};
use super::response::{
    AggregationPath, CategoryTotals, KpiDeltas, Kpis, ProductTotals, QueryOutcome, QueryResponse,
    RegionCategorySales, SeriesPoint,
};

/// Ranking length when a request does not say.
pub const DEFAULT_TOP_N: usize = crate::config::DEFAULT_TOP_N;

/// Distinct values available for each filterable dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DimensionOptions {
    pub regions: Vec<String>,
    pub categories: Vec<String>,
    pub segments: Vec<String>,
}

/// Immutable tables answering ad-hoc window and filter queries.
///
/// Requests borrow the engine; share it across threads behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct QueryEngine {
    fact: Vec<FactOrderRow>,
    monthly: Vec<MonthlyKpiRow>,
}

impl QueryEngine {
    pub fn new(fact: Vec<FactOrderRow>, mut monthly: Vec<MonthlyKpiRow>) -> Self {
        monthly.sort_by_key(|m| m.order_month);
        Self { fact, monthly }
    }

    /// Load `fact_orders.csv` and `mart_orders_monthly.csv`.
    pub fn load(config: &StoreConfig) -> StoreResult<Self> {
        let store = CuratedStore::new(config.clone());
        let fact = store.load_fact_orders()?;
        let monthly = store.load_orders_monthly()?;
        Ok(Self::new(fact, monthly))
    }

    pub fn fact_rows(&self) -> &[FactOrderRow] {
        &self.fact
    }

    pub fn monthly_rows(&self) -> &[MonthlyKpiRow] {
        &self.monthly
    }

    /// Earliest and latest Order Date; `None` without any dated row.
    pub fn date_bounds(&self) -> Option<DateWindow> {
        let mut dates = self.fact.iter().filter_map(|r| r.order_date);
        let first = dates.next()?;
        let (start, end) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some(DateWindow::new(start, end))
    }

    pub fn dimension_options(&self) -> DimensionOptions {
        fn distinct<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
            values
                .filter(|v| !v.is_empty())
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        }

        DimensionOptions {
            regions: distinct(self.fact.iter().map(|r| &r.region)),
            categories: distinct(self.fact.iter().map(|r| &r.category)),
            segments: distinct(self.fact.iter().map(|r| &r.segment)),
        }
    }

    pub fn quick_range(&self, range: QuickRange) -> Option<DateWindow> {
        self.date_bounds().map(|bounds| range.resolve(bounds))
    }

    /// Answer one request.
    pub fn query(&self, request: &QueryRequest) -> QueryOutcome {
        let window = match resolve_window(request) {
            Ok(window) => window,
            Err(outcome) => return outcome,
        };
        let filter = request.filter();
        let path = AggregationPath::select(filter.is_active(), request.exact);

        let rows = self.filtered(window, &filter);
        if rows.is_empty() {
            return QueryOutcome::Ready(QueryResponse::empty(window, path, &filter.describe()));
        }

        let kpis = self.kpis(window, &filter, path);
        let previous_window = window.previous();
        let deltas = previous_window
            .map(|previous| KpiDeltas::between(&kpis, &self.kpis(previous, &filter, path)));
        let top_n = request.top_n.unwrap_or(DEFAULT_TOP_N);

        let time_series = match path {
            AggregationPath::Fast => self.monthly_series(window),
            AggregationPath::Slow => fact_series(&rows),
        };

        QueryOutcome::Ready(QueryResponse {
            window,
            previous_window,
            path,
            month_aligned: window.is_month_aligned(),
            row_count: rows.len(),
            kpis,
            deltas,
            time_series,
            by_category: category_totals(&rows),
            region_category: region_category_sales(&rows),
            top_products: top_products(&rows, top_n),
            context: format!("{}  |  {}", window, filter.describe()),
            insights: quick_insights(&rows),
        })
    }

    /// Overall KPIs of a window on the given path.
    pub fn kpis(&self, window: DateWindow, filter: &DimensionFilter, path: AggregationPath) -> Kpis {
        match path {
            AggregationPath::Fast => self.fast_kpis(window),
            AggregationPath::Slow => slow_kpis(&self.filtered(window, filter)),
        }
    }

    /// KPIs from monthly mart rows whose month falls inside the window.
    pub fn fast_kpis(&self, window: DateWindow) -> Kpis {
        let months: Vec<&MonthlyKpiRow> = self
            .monthly
            .iter()
            .filter(|m| window.contains(m.order_month))
            .collect();
        if months.is_empty() {
            return Kpis::default();
        }

        let total_sales: f64 = months.iter().map(|m| m.total_sales).sum();
        let total_profit: f64 = months.iter().map(|m| m.total_profit).sum();
        let avg_discount = months.iter().map(|m| m.avg_discount).sum::<f64>() / months.len() as f64;

        Kpis {
            total_sales,
            total_profit,
            orders: months.iter().map(|m| m.orders).sum(),
            customers: months.iter().map(|m| m.customers).sum(),
            avg_discount,
            margin: margin_of_sums(total_profit, total_sales),
        }
    }

    fn filtered(&self, window: DateWindow, filter: &DimensionFilter) -> Vec<&FactOrderRow> {
        self.fact
            .iter()
            .filter(|r| r.order_date.is_some_and(|d| window.contains(d)))
            .filter(|r| filter.matches(r))
            .collect()
    }

    fn monthly_series(&self, window: DateWindow) -> Vec<SeriesPoint> {
        self.monthly
            .iter()
            .filter(|m| window.contains(m.order_month))
            .map(|m| SeriesPoint {
                month: m.order_month,
                sales: m.total_sales,
                profit: m.total_profit,
            })
            .collect()
    }
}

fn resolve_window(request: &QueryRequest) -> Result<DateWindow, QueryOutcome> {
    let start = match request.start_date.as_deref().map(str::trim) {
        None | Some("") => return Err(QueryOutcome::NotReady(NotReady::MissingStartDate)),
        Some(text) => parse_date(text)
            .ok_or_else(|| QueryOutcome::NotReady(NotReady::InvalidStartDate(text.to_string())))?,
    };
    let end = match request.end_date.as_deref().map(str::trim) {
        None | Some("") => return Err(QueryOutcome::NotReady(NotReady::MissingEndDate)),
        Some(text) => parse_date(text)
            .ok_or_else(|| QueryOutcome::NotReady(NotReady::InvalidEndDate(text.to_string())))?,
    };

    if start > end {
        return Err(QueryOutcome::Error(QueryError::InvertedWindow { start, end }));
    }
    Ok(DateWindow::new(start, end))
}

/// Exact KPIs from fact rows.
pub fn slow_kpis(rows: &[&FactOrderRow]) -> Kpis {
    let mut acc = MonthAccumulator::default();
    for row in rows {
        acc.add(&row.order_id, &row.customer_id, row.sales, row.profit, row.discount);
    }
    Kpis {
        total_sales: acc.sales,
        total_profit: acc.profit,
        orders: acc.orders(),
        customers: acc.customers(),
        avg_discount: acc.avg_discount(),
        margin: acc.margin(),
    }
}

fn fact_series(rows: &[&FactOrderRow]) -> Vec<SeriesPoint> {
    let mut months: BTreeMap<chrono::NaiveDate, (f64, f64)> = BTreeMap::new();
    for row in rows {
        if let Some(month) = row.order_month {
            let entry = months.entry(month).or_default();
            entry.0 += row.sales.unwrap_or(0.0);
            entry.1 += row.profit.unwrap_or(0.0);
        }
    }
    months
        .into_iter()
        .map(|(month, (sales, profit))| SeriesPoint { month, sales, profit })
        .collect()
}

fn category_totals(rows: &[&FactOrderRow]) -> Vec<CategoryTotals> {
    let mut totals: BTreeMap<&str, CategoryTotals> = BTreeMap::new();
    for row in rows {
        let entry = totals.entry(row.category.as_str()).or_insert_with(|| CategoryTotals {
            category: row.category.clone(),
            sales: 0.0,
            profit: 0.0,
            quantity: 0.0,
        });
        entry.sales += row.sales.unwrap_or(0.0);
        entry.profit += row.profit.unwrap_or(0.0);
        entry.quantity += row.quantity.unwrap_or(0.0);
    }

    let mut totals: Vec<CategoryTotals> = totals.into_values().collect();
    totals.sort_by(|a, b| b.sales.total_cmp(&a.sales));
    totals
}

/// Dense matrix: every region crossed with every category seen in `rows`.
fn region_category_sales(rows: &[&FactOrderRow]) -> Vec<RegionCategorySales> {
    let regions: BTreeSet<&str> = rows.iter().map(|r| r.region.as_str()).collect();
    let categories: BTreeSet<&str> = rows.iter().map(|r| r.category.as_str()).collect();

    let mut sales: HashMap<(&str, &str), f64> = HashMap::new();
    for row in rows {
        *sales.entry((row.region.as_str(), row.category.as_str())).or_default() += row.sales.unwrap_or(0.0);
    }

    regions
        .iter()
        .flat_map(|region| {
            categories.iter().map(|category| RegionCategorySales {
                region: region.to_string(),
                category: category.to_string(),
                sales: sales.get(&(*region, *category)).copied().unwrap_or(0.0),
            })
        })
        .collect()
}

fn top_products(rows: &[&FactOrderRow], n: usize) -> Vec<ProductTotals> {
    let mut totals: HashMap<&str, (f64, f64)> = HashMap::new();
    for row in rows {
        let entry = totals.entry(row.product_name.as_str()).or_default();
        entry.0 += row.sales.unwrap_or(0.0);
        entry.1 += row.profit.unwrap_or(0.0);
    }

    let mut products: Vec<ProductTotals> = totals
        .into_iter()
        .map(|(name, (sales, profit))| ProductTotals {
            product_name: name.to_string(),
            sales,
            profit,
        })
        .collect();
    products.sort_by(|a, b| {
        b.profit
            .total_cmp(&a.profit)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
    products.truncate(n);
    products
}

/// One-line summary naming the best and worst category by Sales, the best
/// region and the overall margin.
fn quick_insights(rows: &[&FactOrderRow]) -> String {
    let categories = category_totals(rows);
    let top_cat = categories
        .first()
        .map(|c| format!("{} (+{})", c.category, format_amount(c.sales)))
        .unwrap_or_else(|| "—".to_string());
    let low_cat = match categories.as_slice() {
        [_, .., last] => format!("{} (+{})", last.category, format_amount(last.sales)),
        _ => "—".to_string(),
    };

    let mut regions: BTreeMap<&str, f64> = BTreeMap::new();
    for row in rows {
        *regions.entry(row.region.as_str()).or_default() += row.sales.unwrap_or(0.0);
    }
    let top_region = regions
        .iter()
        .max_by(|a, b| a.1.total_cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(region, sales)| format!("{} (+{})", region, format_amount(*sales)))
        .unwrap_or_else(|| "—".to_string());

    let kpis = slow_kpis(rows);
    format!(
        "Top Category: {} • Low Category: {} • Top Region: {} • Overall Margin: {:.1}%",
        top_cat,
        low_cat,
        top_region,
        kpis.margin * 100.0
    )
}

/// Whole units with thousands separators: `1234567.8` → `"1,234,568"`.
fn format_amount(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if rounded < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
