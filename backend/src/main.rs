//! Ordermart CLI - Curate retail order exports and query their KPIs
//!
//! # Commands
//!
//! ```bash
//! ordermart etl                                   # Raw CSV → curated tables
//! ordermart query --start 2017-01-01 --end 2017-03-31 --region West
//! ordermart query --range ytd --exact             # Preset window, fact rows only
//! ordermart outliers --group Category --value Sales
//! ordermart serve                                 # Start HTTP server (port 3000)
//! ```
//!
//! Settings come from `ORDERMART_*` variables (a `.env` file is honoured),
//! then from flags.

use clap::{Parser, Subcommand};
use ordermart::store::write_outlier_rows;
use ordermart::{
    iqr_flags, run_etl, Config, CuratedStore, OutlierConfig, QueryEngine, QueryRequest, QuickRange,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ordermart")]
#[command(about = "Retail order ETL and KPI queries", long_about = None)]
struct Cli {
    /// Curated tables directory (overrides ORDERMART_CURATED_DIR)
    #[arg(long, global = true)]
    curated: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean, enrich and curate the raw export
    Etl {
        /// Raw CSV export (overrides ORDERMART_RAW_CSV)
        #[arg(long)]
        raw: Option<PathBuf>,
    },

    /// Query KPIs for a date window and print the JSON response
    Query {
        /// First day of the window (inclusive)
        #[arg(long)]
        start: Option<String>,

        /// Last day of the window (inclusive)
        #[arg(long)]
        end: Option<String>,

        /// Preset window anchored at the latest order: 7d, 30d, qtd, ytd, all
        #[arg(long, conflicts_with_all = ["start", "end"])]
        range: Option<QuickRange>,

        /// Keep only these regions (repeatable)
        #[arg(long)]
        region: Vec<String>,

        /// Keep only these categories (repeatable)
        #[arg(long)]
        category: Vec<String>,

        /// Keep only these segments (repeatable)
        #[arg(long)]
        segment: Vec<String>,

        /// Number of top products to list
        #[arg(long)]
        top: Option<usize>,

        /// Aggregate fact rows even without filters
        #[arg(long)]
        exact: bool,
    },

    /// Flag per-group outliers in the curated fact table
    Outliers {
        /// Grouping column
        #[arg(long, default_value = "Sub-Category")]
        group: String,

        /// Numeric column to test
        #[arg(long, default_value = "Profit")]
        value: String,

        /// Output file (default: curated outliers_<value>_by_<group>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (overrides ORDERMART_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(dir) = &cli.curated {
        config = config.with_curated_dir(dir);
    }

    let result = match cli.command {
        Commands::Etl { raw } => {
            if let Some(raw) = raw {
                config = config.with_raw_csv(raw);
            }
            cmd_etl(&config)
        }

        Commands::Query {
            start,
            end,
            range,
            region,
            category,
            segment,
            top,
            exact,
        } => {
            let filters = Filters {
                region,
                category,
                segment,
                top,
                exact,
            };
            cmd_query(&config, start, end, range, filters)
        }

        Commands::Outliers {
            group,
            value,
            output,
        } => {
            config.outliers = OutlierConfig {
                group_col: group,
                value_col: value,
            };
            cmd_outliers(&config, output)
        }

        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            cmd_serve(&config).await
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

struct Filters {
    region: Vec<String>,
    category: Vec<String>,
    segment: Vec<String>,
    top: Option<usize>,
    exact: bool,
}

fn cmd_etl(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", config.raw_csv.display());

    let summary = run_etl(config)?;

    eprintln!("\n📊 Summary:");
    eprintln!("   Raw rows:         {}", summary.raw_rows);
    eprintln!("   Cleaned rows:     {}", summary.cleaned_rows);
    eprintln!("   Bad discount:     {}", summary.invalid_discount);
    eprintln!("   Duplicates:       {}", summary.duplicates);
    eprintln!("   Products:         {}", summary.products);
    eprintln!("   Months:           {}", summary.months);
    eprintln!("   Outliers:         {}", summary.outliers);
    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_query(
    config: &Config,
    start: Option<String>,
    end: Option<String>,
    range: Option<QuickRange>,
    filters: Filters,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = QueryEngine::load(&config.store)?;

    let mut request = match range {
        Some(range) => {
            let window = engine
                .quick_range(range)
                .ok_or("Fact table has no dated orders")?;
            eprintln!("📅 Window: {}", window);
            QueryRequest::with_window(window)
        }
        None => QueryRequest {
            start_date: start,
            end_date: end,
            ..QueryRequest::default()
        },
    };
    if !filters.region.is_empty() {
        request = request.regions(filters.region);
    }
    if !filters.category.is_empty() {
        request = request.categories(filters.category);
    }
    if !filters.segment.is_empty() {
        request = request.segments(filters.segment);
    }
    request.top_n = Some(filters.top.unwrap_or(config.top_n));
    request.exact = filters.exact;

    match engine.query(&request) {
        ordermart::QueryOutcome::Ready(response) => {
            eprintln!("   {}", response.context);
            eprintln!("   Path: {:?} (month-aligned: {})", response.path, response.month_aligned);
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        ordermart::QueryOutcome::NotReady(reason) => {
            Err(format!("Query not ready: {} (pass --start and --end, or --range)", reason).into())
        }
        ordermart::QueryOutcome::Error(e) => Err(e.into()),
    }
}

fn cmd_outliers(config: &Config, output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let store = CuratedStore::new(config.store.clone());
    let fact = store.load_fact_orders()?;
    eprintln!(
        "🔎 {} by {} over {} fact rows",
        config.outliers.value_col,
        config.outliers.group_col,
        fact.len()
    );

    let flags = iqr_flags(&fact, &config.outliers.group_col, &config.outliers.value_col)?;
    let path = match output {
        Some(path) => {
            write_outlier_rows(&path, &flags)?;
            path
        }
        None => store.write_outliers(&config.outliers, &flags)?,
    };

    for group in ordermart::transform::summarize(&flags, &config.outliers.group_col) {
        if group.outliers > 0 {
            eprintln!("   {}: {}/{}", group.group, group.outliers, group.rows);
        }
    }
    let total = flags.iter().filter(|f| f.is_outlier).count();
    eprintln!("✅ {} outliers flagged", total);
    eprintln!("💾 Output written to: {}", path.display());
    Ok(())
}

async fn cmd_serve(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📂 Loading curated tables from {}", config.store.curated_dir.display());
    let state = ordermart::server::AppState::load(&config.store, config.top_n)?;
    eprintln!(
        "   {} fact rows, {} months",
        state.engine.fact_rows().len(),
        state.engine.monthly_rows().len()
    );

    ordermart::server::start_server(state, config.port).await?;
    Ok(())
}
