//! Curated projections of the enriched table.
//!
//! ```text
//!                    ┌──▶ fact_orders          (column subset, one row per line)
//! enriched table ────┼──▶ dim_products         (distinct product identity)
//!                    └──▶ mart_orders_monthly  (KPIs grouped by Order Month)
//! ```

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use crate::models::{EnrichedRecord, FactOrderRow, MonthlyKpiRow, ProductDimRow};
use crate::transform::EnrichedTable;

/// The three curated tables built from one enriched table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Marts {
    pub fact_orders: Vec<FactOrderRow>,
    pub dim_products: Vec<ProductDimRow>,
    pub orders_monthly: Vec<MonthlyKpiRow>,
}

/// Build every mart.
pub fn build_marts(table: &EnrichedTable) -> Marts {
    Marts {
        fact_orders: build_fact_orders(&table.records),
        dim_products: build_dim_products(&table.records),
        orders_monthly: build_orders_monthly(&table.records),
    }
}

/// Fixed-column copy of every enriched line.
pub fn build_fact_orders(records: &[EnrichedRecord]) -> Vec<FactOrderRow> {
    records.iter().map(fact_row).collect()
}

fn fact_row(enriched: &EnrichedRecord) -> FactOrderRow {
    let r = &enriched.record;
    FactOrderRow {
        order_id: r.order_id.clone(),
        order_date: enriched.order_date,
        ship_date: enriched.ship_date,
        customer_id: r.customer_id.clone(),
        segment: r.segment.clone(),
        country: r.country.clone(),
        city: r.city.clone(),
        state: r.state.clone(),
        postal_code: r.postal_code.clone(),
        region: r.region.clone(),
        product_id: r.product_id.clone(),
        category: r.category.clone(),
        sub_category: r.sub_category.clone(),
        product_name: r.product_name.clone(),
        sales: r.sales,
        quantity: r.quantity,
        discount: Some(r.discount),
        profit: r.profit,
        profit_margin: enriched.profit_margin,
        order_month: enriched.order_month,
    }
}

/// Distinct product tuples in first-occurrence order.
pub fn build_dim_products(records: &[EnrichedRecord]) -> Vec<ProductDimRow> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|e| ProductDimRow {
            product_id: e.record.product_id.clone(),
            product_name: e.record.product_name.clone(),
            category: e.record.category.clone(),
            sub_category: e.record.sub_category.clone(),
        })
        .filter(|row| seen.insert(row.clone()))
        .collect()
}

/// One KPI row per distinct order month, ascending. Lines without an
/// order month belong to no group.
pub fn build_orders_monthly(records: &[EnrichedRecord]) -> Vec<MonthlyKpiRow> {
    let mut groups: BTreeMap<NaiveDate, MonthAccumulator> = BTreeMap::new();

    for enriched in records {
        if let Some(month) = enriched.order_month {
            let r = &enriched.record;
            groups.entry(month).or_default().add(
                &r.order_id,
                &r.customer_id,
                r.sales,
                r.profit,
                Some(r.discount),
            );
        }
    }

    groups
        .into_iter()
        .map(|(month, acc)| acc.finish(month))
        .collect()
}

/// Ratio of sums with a zero guard on the denominator.
pub fn margin_of_sums(total_profit: f64, total_sales: f64) -> f64 {
    if total_sales == 0.0 {
        0.0
    } else {
        total_profit / total_sales
    }
}

/// Running totals for one group of order lines.
///
/// Null measures are skipped; both sums of a margin see exactly the lines
/// pushed into this accumulator.
#[derive(Debug, Default, Clone)]
pub struct MonthAccumulator {
    pub sales: f64,
    pub profit: f64,
    discount_sum: f64,
    discount_count: u64,
    orders: HashSet<String>,
    customers: HashSet<String>,
}

impl MonthAccumulator {
    pub fn add(
        &mut self,
        order_id: &str,
        customer_id: &str,
        sales: Option<f64>,
        profit: Option<f64>,
        discount: Option<f64>,
    ) {
        self.sales += sales.unwrap_or(0.0);
        self.profit += profit.unwrap_or(0.0);
        if let Some(d) = discount {
            self.discount_sum += d;
            self.discount_count += 1;
        }
        if !self.orders.contains(order_id) {
            self.orders.insert(order_id.to_string());
        }
        if !self.customers.contains(customer_id) {
            self.customers.insert(customer_id.to_string());
        }
    }

    pub fn orders(&self) -> u64 {
        self.orders.len() as u64
    }

    pub fn customers(&self) -> u64 {
        self.customers.len() as u64
    }

    pub fn avg_discount(&self) -> f64 {
        if self.discount_count == 0 {
            0.0
        } else {
            self.discount_sum / self.discount_count as f64
        }
    }

    pub fn margin(&self) -> f64 {
        margin_of_sums(self.profit, self.sales)
    }

    pub fn finish(self, order_month: NaiveDate) -> MonthlyKpiRow {
        MonthlyKpiRow {
            order_month,
            total_sales: self.sales,
            total_profit: self.profit,
            orders: self.orders(),
            customers: self.customers(),
            avg_discount: self.avg_discount(),
            profit_margin: self.margin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::cleaning::basic_clean;
    use crate::transform::cleaning::tests::{raw, HEADER};
    use crate::transform::enrich::add_enriched_fields;

    fn table(lines: &[&str]) -> EnrichedTable {
        add_enriched_fields(&basic_clean(&raw(lines)).unwrap())
    }

    fn row(order: &str, date: &str, customer: &str, product: &str, sales: &str, discount: &str, profit: &str) -> String {
        format!(
            "{order},{date},{date},Standard Class,{customer},Name,Consumer,United States,Austin,Texas,78701,Central,{product},Office Supplies,Paper,Paper {product},{sales},1,{discount},{profit}"
        )
    }

    fn sample() -> EnrichedTable {
        let lines = [
            row("O-1", "2017-01-03", "C-1", "P-1", "100", "0.2", "50"),
            row("O-1", "2017-01-03", "C-1", "P-2", "300", "0.4", "-30"),
            row("O-2", "2017-01-20", "C-2", "P-1", "0", "0.1", "10"),
            row("O-3", "2017-02-11", "C-1", "P-3", "40", "0.2", "4"),
            row("O-4", "garbage", "C-3", "P-3", "999", "0.2", "999"),
        ];
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        table(&refs)
    }

    #[test]
    fn test_fact_orders_one_row_per_line() {
        let marts = build_marts(&sample());
        assert_eq!(marts.fact_orders.len(), 5);

        let first = &marts.fact_orders[0];
        assert_eq!(first.order_id, "O-1");
        assert_eq!(first.product_name, "Paper P-1");
        assert_eq!(first.profit_margin, Some(0.5));
        assert_eq!(first.order_month, NaiveDate::from_ymd_opt(2017, 1, 1));
    }

    #[test]
    fn test_dim_products_distinct_in_order() {
        let dims = build_dim_products(&sample().records);
        let ids: Vec<&str> = dims.iter().map(|d| d.product_id.as_str()).collect();
        assert_eq!(ids, vec!["P-1", "P-2", "P-3"]);
    }

    #[test]
    fn test_monthly_kpis() {
        let monthly = build_orders_monthly(&sample().records);

        // The garbage-dated line has no month.
        assert_eq!(monthly.len(), 2);

        let jan = &monthly[0];
        assert_eq!(jan.order_month, NaiveDate::from_ymd_opt(2017, 1, 1).unwrap());
        assert_eq!(jan.total_sales, 400.0);
        assert_eq!(jan.total_profit, 30.0);
        assert_eq!(jan.orders, 2);
        assert_eq!(jan.customers, 2);
        assert!((jan.avg_discount - 0.7 / 3.0).abs() < 1e-12);

        let feb = &monthly[1];
        assert_eq!(feb.orders, 1);
        assert!((feb.profit_margin - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_monthly_margin_is_ratio_of_sums() {
        let enriched = sample();
        let monthly = build_orders_monthly(&enriched.records);
        let jan = &monthly[0];

        let jan_rows: Vec<&EnrichedRecord> = enriched
            .records
            .iter()
            .filter(|r| r.order_month == Some(jan.order_month))
            .collect();
        let sales: f64 = jan_rows.iter().filter_map(|r| r.record.sales).sum();
        let profit: f64 = jan_rows.iter().filter_map(|r| r.record.profit).sum();
        let mean_row_margin: f64 = jan_rows
            .iter()
            .filter_map(|r| r.profit_margin)
            .sum::<f64>()
            / jan_rows.len() as f64;

        assert!((jan.profit_margin - profit / sales).abs() < 1e-12);
        assert!((jan.profit_margin - 0.075).abs() < 1e-12);
        // (0.5 - 0.1 + 0.0) / 3
        assert!((mean_row_margin - 0.4 / 3.0).abs() < 1e-12);
        assert!((jan.profit_margin - mean_row_margin).abs() > 1e-3);
    }

    #[test]
    fn test_zero_sales_month_margin() {
        let line = row("O-9", "2017-03-05", "C-9", "P-9", "0", "0.2", "25");
        let monthly = build_orders_monthly(&table(&[&line]).records);
        assert_eq!(monthly[0].profit_margin, 0.0);
    }

    #[test]
    fn test_empty_input() {
        let empty = raw(&[]);
        assert_eq!(empty.headers.join(","), HEADER);
        let marts = build_marts(&add_enriched_fields(&basic_clean(&empty).unwrap()));
        assert_eq!(marts, Marts::default());
    }
}
