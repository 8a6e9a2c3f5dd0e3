//! Domain models for the Ordermart pipeline.
//!
//! - [`CleanedRecord`] - A raw order line after trimming, coercion and filtering
//! - [`EnrichedRecord`] - A cleaned line plus parsed dates and derived fields
//! - [`FactOrderRow`] - Line-item grain curated fact row
//! - [`ProductDimRow`] - Distinct product identity row
//! - [`MonthlyKpiRow`] - One pre-aggregated month
//!
//! Column names are the exact header strings of the source data.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// =============================================================================
// Column names
// =============================================================================

pub const ORDER_ID: &str = "Order ID";
pub const ORDER_DATE: &str = "Order Date";
pub const SHIP_DATE: &str = "Ship Date";
pub const SHIP_MODE: &str = "Ship Mode";
pub const CUSTOMER_ID: &str = "Customer ID";
pub const CUSTOMER_NAME: &str = "Customer Name";
pub const SEGMENT: &str = "Segment";
pub const COUNTRY: &str = "Country";
pub const CITY: &str = "City";
pub const STATE: &str = "State";
pub const POSTAL_CODE: &str = "Postal Code";
pub const REGION: &str = "Region";
pub const PRODUCT_ID: &str = "Product ID";
pub const CATEGORY: &str = "Category";
pub const SUB_CATEGORY: &str = "Sub-Category";
pub const PRODUCT_NAME: &str = "Product Name";
pub const SALES: &str = "Sales";
pub const QUANTITY: &str = "Quantity";
pub const DISCOUNT: &str = "Discount";
pub const PROFIT: &str = "Profit";
pub const PROFIT_MARGIN: &str = "Profit Margin";
pub const ORDER_MONTH: &str = "Order Month";

/// Text columns of the expected schema, in source order.
pub const TEXT_COLUMNS: [&str; 16] = [
    ORDER_ID,
    ORDER_DATE,
    SHIP_DATE,
    SHIP_MODE,
    CUSTOMER_ID,
    CUSTOMER_NAME,
    SEGMENT,
    COUNTRY,
    CITY,
    STATE,
    POSTAL_CODE,
    REGION,
    PRODUCT_ID,
    CATEGORY,
    SUB_CATEGORY,
    PRODUCT_NAME,
];

/// Measures coerced to numbers during cleaning.
pub const NUMERIC_COLUMNS: [&str; 4] = [SALES, QUANTITY, DISCOUNT, PROFIT];

/// Every column a raw table must carry.
pub fn expected_columns() -> impl Iterator<Item = &'static str> {
    TEXT_COLUMNS.iter().chain(NUMERIC_COLUMNS.iter()).copied()
}

// =============================================================================
// Column access
// =============================================================================

/// A borrowed cell read by column name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Text(&'a str),
    Number(Option<f64>),
    Date(Option<NaiveDate>),
}

impl Cell<'_> {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => *n,
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Cell::Number(_))
    }

    /// Key used when grouping rows by this cell; null cells have no group.
    pub fn group_key(&self) -> Option<String> {
        match self {
            Cell::Text(s) => Some((*s).to_string()),
            Cell::Number(n) => n.map(|v| v.to_string()),
            Cell::Date(d) => d.map(|v| v.to_string()),
        }
    }
}

/// Rows whose fields can be read by column name.
pub trait Columnar {
    /// `None` when the row has no such column.
    fn cell(&self, column: &str) -> Option<Cell<'_>>;
}

// =============================================================================
// Cleaned / Enriched records
// =============================================================================

/// One order line after cleaning.
///
/// `discount` is not optional: rows without a discount in `(0, 0.9]` are
/// dropped by the cleaner.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRecord {
    pub order_id: String,
    pub order_date: String,
    pub ship_date: String,
    pub ship_mode: String,
    pub customer_id: String,
    pub customer_name: String,
    pub segment: String,
    pub country: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub region: String,
    pub product_id: String,
    pub category: String,
    pub sub_category: String,
    pub product_name: String,
    pub sales: Option<f64>,
    pub quantity: Option<f64>,
    pub discount: f64,
    pub profit: Option<f64>,
    /// Values of columns outside the expected schema, in table order.
    pub extra: Vec<String>,
}

impl CleanedRecord {
    /// Text fields in [`TEXT_COLUMNS`] order.
    pub fn text_fields(&self) -> [&str; 16] {
        [
            self.order_id.as_str(),
            self.order_date.as_str(),
            self.ship_date.as_str(),
            self.ship_mode.as_str(),
            self.customer_id.as_str(),
            self.customer_name.as_str(),
            self.segment.as_str(),
            self.country.as_str(),
            self.city.as_str(),
            self.state.as_str(),
            self.postal_code.as_str(),
            self.region.as_str(),
            self.product_id.as_str(),
            self.category.as_str(),
            self.sub_category.as_str(),
            self.product_name.as_str(),
        ]
    }

    /// Measures in [`NUMERIC_COLUMNS`] order.
    pub fn numeric_fields(&self) -> [Option<f64>; 4] {
        [self.sales, self.quantity, Some(self.discount), self.profit]
    }
}

impl Columnar for CleanedRecord {
    fn cell(&self, column: &str) -> Option<Cell<'_>> {
        if let Some(i) = TEXT_COLUMNS.iter().position(|c| *c == column) {
            return Some(Cell::Text(self.text_fields()[i]));
        }
        NUMERIC_COLUMNS
            .iter()
            .position(|c| *c == column)
            .map(|i| Cell::Number(self.numeric_fields()[i]))
    }
}

/// A cleaned line plus parsed dates and derived fields.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub record: CleanedRecord,
    pub order_date: Option<NaiveDate>,
    pub ship_date: Option<NaiveDate>,
    pub profit_margin: Option<f64>,
    pub order_month: Option<NaiveDate>,
}

impl Columnar for EnrichedRecord {
    fn cell(&self, column: &str) -> Option<Cell<'_>> {
        match column {
            ORDER_DATE => Some(Cell::Date(self.order_date)),
            SHIP_DATE => Some(Cell::Date(self.ship_date)),
            PROFIT_MARGIN => Some(Cell::Number(self.profit_margin)),
            ORDER_MONTH => Some(Cell::Date(self.order_month)),
            _ => self.record.cell(column),
        }
    }
}

// =============================================================================
// Curated tables
// =============================================================================

/// Line-item grain curated fact row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactOrderRow {
    #[serde(rename = "Order ID")]
    pub order_id: String,
    #[serde(rename = "Order Date")]
    pub order_date: Option<NaiveDate>,
    #[serde(rename = "Ship Date")]
    pub ship_date: Option<NaiveDate>,
    #[serde(rename = "Customer ID")]
    pub customer_id: String,
    #[serde(rename = "Segment")]
    pub segment: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Postal Code")]
    pub postal_code: String,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "Product ID")]
    pub product_id: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Sub-Category")]
    pub sub_category: String,
    #[serde(rename = "Product Name")]
    pub product_name: String,
    #[serde(rename = "Sales")]
    pub sales: Option<f64>,
    #[serde(rename = "Quantity")]
    pub quantity: Option<f64>,
    #[serde(rename = "Discount")]
    pub discount: Option<f64>,
    #[serde(rename = "Profit")]
    pub profit: Option<f64>,
    #[serde(rename = "Profit Margin")]
    pub profit_margin: Option<f64>,
    #[serde(rename = "Order Month")]
    pub order_month: Option<NaiveDate>,
}

/// Fact table header, in file order.
pub const FACT_COLUMNS: [&str; 20] = [
    ORDER_ID,
    ORDER_DATE,
    SHIP_DATE,
    CUSTOMER_ID,
    SEGMENT,
    COUNTRY,
    CITY,
    STATE,
    POSTAL_CODE,
    REGION,
    PRODUCT_ID,
    CATEGORY,
    SUB_CATEGORY,
    PRODUCT_NAME,
    SALES,
    QUANTITY,
    DISCOUNT,
    PROFIT,
    PROFIT_MARGIN,
    ORDER_MONTH,
];

impl Columnar for FactOrderRow {
    fn cell(&self, column: &str) -> Option<Cell<'_>> {
        let cell = match column {
            ORDER_ID => Cell::Text(&self.order_id),
            ORDER_DATE => Cell::Date(self.order_date),
            SHIP_DATE => Cell::Date(self.ship_date),
            CUSTOMER_ID => Cell::Text(&self.customer_id),
            SEGMENT => Cell::Text(&self.segment),
            COUNTRY => Cell::Text(&self.country),
            CITY => Cell::Text(&self.city),
            STATE => Cell::Text(&self.state),
            POSTAL_CODE => Cell::Text(&self.postal_code),
            REGION => Cell::Text(&self.region),
            PRODUCT_ID => Cell::Text(&self.product_id),
            CATEGORY => Cell::Text(&self.category),
            SUB_CATEGORY => Cell::Text(&self.sub_category),
            PRODUCT_NAME => Cell::Text(&self.product_name),
            SALES => Cell::Number(self.sales),
            QUANTITY => Cell::Number(self.quantity),
            DISCOUNT => Cell::Number(self.discount),
            PROFIT => Cell::Number(self.profit),
            PROFIT_MARGIN => Cell::Number(self.profit_margin),
            ORDER_MONTH => Cell::Date(self.order_month),
            _ => return None,
        };
        Some(cell)
    }
}

/// Distinct product identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductDimRow {
    #[serde(rename = "Product ID")]
    pub product_id: String,
    #[serde(rename = "Product Name")]
    pub product_name: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Sub-Category")]
    pub sub_category: String,
}

/// One month of pre-aggregated KPIs.
///
/// `profit_margin` is `total_profit / total_sales` for the month, not the
/// mean of the per-line margins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyKpiRow {
    #[serde(rename = "Order Month")]
    pub order_month: NaiveDate,
    #[serde(rename = "Total_Sales")]
    pub total_sales: f64,
    #[serde(rename = "Total_Profit")]
    pub total_profit: f64,
    #[serde(rename = "Orders")]
    pub orders: u64,
    #[serde(rename = "Customers")]
    pub customers: u64,
    #[serde(rename = "Avg_Discount")]
    pub avg_discount: f64,
    #[serde(rename = "Profit_Margin")]
    pub profit_margin: f64,
}
