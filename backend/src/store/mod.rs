//! Curated Store - Persist and reload curated tables
//!
//! Every table is a UTF-8, comma-delimited CSV with a header row, written
//! under the configured curated directory. Headers are written even for
//! empty tables so readers always see the full column set.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{OutlierConfig, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::marts::Marts;
use crate::models::{Cell, Columnar, FactOrderRow, MonthlyKpiRow, ProductDimRow, FACT_COLUMNS};
use crate::parser::RawTable;
use crate::transform::cleaning::format_number;
use crate::transform::OutlierFlag;

pub const DIM_PRODUCTS_COLUMNS: [&str; 4] = ["Product ID", "Product Name", "Category", "Sub-Category"];

pub const MONTHLY_COLUMNS: [&str; 7] = [
    "Order Month",
    "Total_Sales",
    "Total_Profit",
    "Orders",
    "Customers",
    "Avg_Discount",
    "Profit_Margin",
];

pub const OUTLIER_COLUMNS: [&str; 4] = ["Q1", "Q3", "IQR", "is_outlier"];

/// Reads and writes the curated CSVs of one directory.
#[derive(Debug, Clone)]
pub struct CuratedStore {
    config: StoreConfig,
}

impl CuratedStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Writing
    // -------------------------------------------------------------------------

    pub fn write_clean(&self, table: &RawTable) -> StoreResult<PathBuf> {
        let path = self.config.clean_path();
        write_raw(&path, table)?;
        Ok(path)
    }

    pub fn write_enriched(&self, table: &RawTable) -> StoreResult<PathBuf> {
        let path = self.config.enriched_path();
        write_raw(&path, table)?;
        Ok(path)
    }

    /// Write fact, dimension and monthly tables; returns the written paths.
    pub fn write_marts(&self, marts: &Marts) -> StoreResult<Vec<PathBuf>> {
        let fact = self.config.fact_orders_path();
        write_rows(&fact, &FACT_COLUMNS, &marts.fact_orders)?;

        let dim = self.config.dim_products_path();
        write_rows(&dim, &DIM_PRODUCTS_COLUMNS, &marts.dim_products)?;

        let monthly = self.config.monthly_mart_path();
        write_rows(&monthly, &MONTHLY_COLUMNS, &marts.orders_monthly)?;

        Ok(vec![fact, dim, monthly])
    }

    /// Write flagged fact rows: fact columns, then `Q1, Q3, IQR, is_outlier`.
    pub fn write_outliers(
        &self,
        outliers: &OutlierConfig,
        flags: &[OutlierFlag<FactOrderRow>],
    ) -> StoreResult<PathBuf> {
        let path = self.config.outliers_path(outliers);
        write_outlier_rows(&path, flags)?;
        Ok(path)
    }

    // -------------------------------------------------------------------------
    // Reading
    // -------------------------------------------------------------------------

    /// Fact table; a missing file is [`StoreError::MissingSource`].
    pub fn load_fact_orders(&self) -> StoreResult<Vec<FactOrderRow>> {
        read_rows(&self.config.fact_orders_path())
    }

    /// Monthly mart; a missing file is [`StoreError::MissingSource`].
    pub fn load_orders_monthly(&self) -> StoreResult<Vec<MonthlyKpiRow>> {
        read_rows(&self.config.monthly_mart_path())
    }

    pub fn load_dim_products(&self) -> StoreResult<Vec<ProductDimRow>> {
        read_rows(&self.config.dim_products_path())
    }
}

/// Flagged fact rows to `path`: fact columns, then `Q1, Q3, IQR, is_outlier`.
pub fn write_outlier_rows(path: &Path, flags: &[OutlierFlag<FactOrderRow>]) -> StoreResult<()> {
    let header: Vec<String> = FACT_COLUMNS
        .iter()
        .chain(OUTLIER_COLUMNS.iter())
        .map(|c| c.to_string())
        .collect();
    let rows = flags
        .iter()
        .map(|flag| {
            let mut cells: Vec<String> = FACT_COLUMNS
                .iter()
                .map(|c| flag.row.cell(c).map(render_cell).unwrap_or_default())
                .collect();
            cells.push(format_number(flag.q1));
            cells.push(format_number(flag.q3));
            cells.push(format_number(flag.iqr));
            cells.push(flag.is_outlier.to_string());
            cells
        })
        .collect();
    write_raw(path, &RawTable::new(header, rows))
}

fn render_cell(cell: Cell<'_>) -> String {
    match cell {
        Cell::Text(s) => s.to_string(),
        Cell::Number(n) => format_number(n),
        Cell::Date(d) => d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
    }
}

fn ensure_parent(path: &Path) -> StoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

fn open_writer(path: &Path) -> StoreResult<csv::Writer<fs::File>> {
    ensure_parent(path)?;
    csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|source| csv_error(path, source))
}

fn csv_error(path: &Path, source: csv::Error) -> StoreError {
    StoreError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn write_raw(path: &Path, table: &RawTable) -> StoreResult<()> {
    let mut writer = open_writer(path)?;
    writer
        .write_record(&table.headers)
        .map_err(|e| csv_error(path, e))?;
    for row in &table.rows {
        writer.write_record(row).map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_rows<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> StoreResult<()> {
    let mut writer = open_writer(path)?;
    writer.write_record(header).map_err(|e| csv_error(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> StoreResult<Vec<T>> {
    if !path.is_file() {
        return Err(StoreError::MissingSource {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;

    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| csv_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn fact(order: &str, sales: Option<f64>) -> FactOrderRow {
        FactOrderRow {
            order_id: order.into(),
            order_date: NaiveDate::from_ymd_opt(2017, 1, 3),
            ship_date: None,
            customer_id: "C-1".into(),
            segment: "Consumer".into(),
            country: "United States".into(),
            city: "Austin".into(),
            state: "Texas".into(),
            postal_code: "78701".into(),
            region: "Central".into(),
            product_id: "P-1".into(),
            category: "Technology".into(),
            sub_category: "Phones".into(),
            product_name: "Phone, Dual SIM".into(),
            sales,
            quantity: Some(3.0),
            discount: Some(0.2),
            profit: Some(12.5),
            profit_margin: sales.map(|s| 12.5 / s),
            order_month: NaiveDate::from_ymd_opt(2017, 1, 1),
        }
    }

    fn monthly() -> MonthlyKpiRow {
        MonthlyKpiRow {
            order_month: NaiveDate::from_ymd_opt(2017, 1, 1).unwrap(),
            total_sales: 100.0,
            total_profit: 12.5,
            orders: 1,
            customers: 1,
            avg_discount: 0.2,
            profit_margin: 0.125,
        }
    }

    #[test]
    fn test_marts_round_trip() {
        let dir = tempdir().unwrap();
        let store = CuratedStore::new(StoreConfig::new(dir.path().join("curated")));
        let marts = Marts {
            fact_orders: vec![fact("O-1", Some(100.0)), fact("O-2", None)],
            dim_products: vec![ProductDimRow {
                product_id: "P-1".into(),
                product_name: "Phone, Dual SIM".into(),
                category: "Technology".into(),
                sub_category: "Phones".into(),
            }],
            orders_monthly: vec![monthly()],
        };

        let paths = store.write_marts(&marts).unwrap();
        assert_eq!(paths.len(), 3);

        assert_eq!(store.load_fact_orders().unwrap(), marts.fact_orders);
        assert_eq!(store.load_dim_products().unwrap(), marts.dim_products);
        assert_eq!(store.load_orders_monthly().unwrap(), marts.orders_monthly);
    }

    #[test]
    fn test_headers_written_for_empty_tables() {
        let dir = tempdir().unwrap();
        let store = CuratedStore::new(StoreConfig::new(dir.path()));
        store.write_marts(&Marts::default()).unwrap();

        let content = fs::read_to_string(store.config().monthly_mart_path()).unwrap();
        assert_eq!(
            content.trim(),
            "Order Month,Total_Sales,Total_Profit,Orders,Customers,Avg_Discount,Profit_Margin"
        );
        assert!(store.load_orders_monthly().unwrap().is_empty());
    }

    #[test]
    fn test_missing_source() {
        let dir = tempdir().unwrap();
        let store = CuratedStore::new(StoreConfig::new(dir.path()));

        match store.load_fact_orders() {
            Err(StoreError::MissingSource { path }) => {
                assert!(path.ends_with("fact_orders.csv"));
            }
            other => panic!("expected MissingSource, got {other:?}"),
        }
    }

    #[test]
    fn test_outliers_file() {
        let dir = tempdir().unwrap();
        let store = CuratedStore::new(StoreConfig::new(dir.path()));
        let flags = vec![OutlierFlag {
            row: fact("O-1", Some(100.0)),
            q1: Some(10.0),
            q3: Some(20.0),
            iqr: Some(10.0),
            is_outlier: true,
        }];

        let path = store.write_outliers(&OutlierConfig::default(), &flags).unwrap();
        let table = crate::parser::parse_csv_file_auto(&path).unwrap().table;

        assert_eq!(table.headers.len(), 24);
        assert_eq!(table.headers[23], "is_outlier");
        assert_eq!(table.rows[0][0], "O-1");
        assert_eq!(table.rows[0][13], "Phone, Dual SIM");
        assert_eq!(table.rows[0][20], "10");
        assert_eq!(table.rows[0][23], "true");
    }
}
