//! Application configuration.
//!
//! Configuration is an explicit value handed to each component at
//! construction. Defaults can be overridden from the environment (a `.env`
//! file is loaded by the CLI) and then from command-line flags.

use std::path::{Path, PathBuf};

/// Default raw input CSV.
pub const DEFAULT_RAW_CSV: &str = "data/raw/superstore.csv";

/// Default directory for curated outputs.
pub const DEFAULT_CURATED_DIR: &str = "data/curated";

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default length of the top products ranking.
pub const DEFAULT_TOP_N: usize = 10;

/// Environment variable overriding the raw CSV path.
pub const ENV_RAW_CSV: &str = "ORDERMART_RAW_CSV";

/// Environment variable overriding the curated directory.
pub const ENV_CURATED_DIR: &str = "ORDERMART_CURATED_DIR";

/// Environment variable overriding the HTTP port.
pub const ENV_PORT: &str = "ORDERMART_PORT";

pub const CLEAN_FILE: &str = "superstore_clean.csv";
pub const ENRICHED_FILE: &str = "superstore_enriched.csv";
pub const FACT_ORDERS_FILE: &str = "fact_orders.csv";
pub const DIM_PRODUCTS_FILE: &str = "dim_products.csv";
pub const MONTHLY_MART_FILE: &str = "mart_orders_monthly.csv";

/// Location of curated tables.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub curated_dir: PathBuf,
}

impl StoreConfig {
    pub fn new(curated_dir: impl Into<PathBuf>) -> Self {
        Self {
            curated_dir: curated_dir.into(),
        }
    }

    pub fn clean_path(&self) -> PathBuf {
        self.curated_dir.join(CLEAN_FILE)
    }

    pub fn enriched_path(&self) -> PathBuf {
        self.curated_dir.join(ENRICHED_FILE)
    }

    pub fn fact_orders_path(&self) -> PathBuf {
        self.curated_dir.join(FACT_ORDERS_FILE)
    }

    pub fn dim_products_path(&self) -> PathBuf {
        self.curated_dir.join(DIM_PRODUCTS_FILE)
    }

    pub fn monthly_mart_path(&self) -> PathBuf {
        self.curated_dir.join(MONTHLY_MART_FILE)
    }

    /// `outliers_<value>_by_<group>.csv`, with column names slugged.
    pub fn outliers_path(&self, outliers: &OutlierConfig) -> PathBuf {
        self.curated_dir.join(format!(
            "outliers_{}_by_{}.csv",
            slug(&outliers.value_col),
            slug(&outliers.group_col)
        ))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CURATED_DIR)
    }
}

/// Which column is fenced, grouped by which other column.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierConfig {
    pub group_col: String,
    pub value_col: String,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            group_col: "Sub-Category".to_string(),
            value_col: "Profit".to_string(),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub raw_csv: PathBuf,
    pub store: StoreConfig,
    pub outliers: OutlierConfig,
    pub top_n: usize,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raw_csv: PathBuf::from(DEFAULT_RAW_CSV),
            store: StoreConfig::default(),
            outliers: OutlierConfig::default(),
            top_n: DEFAULT_TOP_N,
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Defaults overridden by `ORDERMART_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_RAW_CSV).filter(|v| !v.trim().is_empty()) {
            config.raw_csv = PathBuf::from(raw.trim());
        }
        if let Some(dir) = lookup(ENV_CURATED_DIR).filter(|v| !v.trim().is_empty()) {
            config.store = StoreConfig::new(dir.trim());
        }
        if let Some(port) = lookup(ENV_PORT).and_then(|v| v.trim().parse().ok()) {
            config.port = port;
        }
        config
    }

    pub fn with_raw_csv(mut self, path: impl AsRef<Path>) -> Self {
        self.raw_csv = path.as_ref().to_path_buf();
        self
    }

    pub fn with_curated_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.store = StoreConfig::new(dir.as_ref());
        self
    }
}

fn slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}
