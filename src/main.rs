use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use adops_budget_tracker::{
    analytics, build_router, db, export,
    import::{self, ImportOptions},
    models::{PerformanceRow, RecordType, RowFilter},
    report, AppState, DEFAULT_MAX_UPLOAD_BYTES,
};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlx::PgPool;
use tracing::info;

#[derive(Parser)]
#[command(name = "adops-budget-tracker")]
#[command(about = "Ad-operations budget, result and campaign tracker", long_about = None)]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    month: Option<i32>,
    #[arg(long)]
    client_id: Option<i64>,
    #[arg(long)]
    campaign_id: Option<i64>,
    #[arg(long)]
    platform: Option<String>,
    /// Department code (SO, HO, SLS, DIGITAL)
    #[arg(long)]
    department: Option<String>,
}

impl From<FilterArgs> for RowFilter {
    fn from(args: FilterArgs) -> Self {
        RowFilter {
            year: args.year,
            month: args.month,
            client_id: args.client_id,
            campaign_id: args.campaign_id,
            platform: args.platform,
            department: args.department,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Run the HTTP API
    Serve {
        #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
        #[arg(long, env = "IMPORT_TIMEOUT_SECS", default_value_t = 30)]
        import_timeout_secs: u64,
        #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
        max_upload_bytes: usize,
    },
    /// Import clients, campaigns, budgets or results from a CSV/XLSX file
    Import {
        #[arg(long)]
        file: PathBuf,
        /// results, budgets, clients, campaigns; detected from the header when omitted
        #[arg(long)]
        data_type: Option<RecordType>,
        /// Field delimiter; detected when omitted
        #[arg(long, default_value = "auto")]
        delimiter: String,
        #[arg(long, env = "IMPORT_TIMEOUT_SECS", default_value_t = 30)]
        import_timeout_secs: u64,
    },
    /// Write the budget/result sheet; `.csv` output writes CSV, anything else XLSX
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "budget_results.xlsx")]
        out: PathBuf,
    },
    /// Generate a markdown budget performance report
    Report {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

async fn fetch_rows(pool: &PgPool, filter: &RowFilter) -> anyhow::Result<Vec<PerformanceRow>> {
    let budgets = db::performance::fetch_budget_lines(pool, filter)
        .await
        .context("failed to load budgets")?;
    let results = db::performance::fetch_result_lines(pool, filter)
        .await
        .context("failed to load results")?;
    Ok(analytics::join_budgets_and_results(&budgets, &results))
}

fn is_csv_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let database_url = cli
        .database_url
        .context("DATABASE_URL must be set to a Postgres instance")?;
    let pool = db::connect(&database_url).await?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Serve {
            bind,
            import_timeout_secs,
            max_upload_bytes,
        } => {
            let state = AppState::new(pool)
                .with_import_timeout(Duration::from_secs(import_timeout_secs))
                .with_max_upload_bytes(max_upload_bytes);
            let app = build_router(state);

            let listener = tokio::net::TcpListener::bind(bind)
                .await
                .with_context(|| format!("failed to bind {bind}"))?;
            info!("Listening on http://{}", bind);
            axum::serve(listener, app).await?;
        }
        Commands::Import {
            file,
            data_type,
            delimiter,
            import_timeout_secs,
        } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let options = ImportOptions {
                delimiter,
                ..ImportOptions::default()
            };

            let summary = import::run_import(
                &pool,
                &file_name,
                &bytes,
                data_type,
                &options,
                Duration::from_secs(import_timeout_secs),
            )
            .await
            .map_err(|failure| {
                for error in failure.error.row_errors() {
                    eprintln!("{error}");
                }
                anyhow::Error::new(failure)
            })?;

            println!(
                "Imported {} {} from {}: {} created, {} updated, {} blank rows skipped.",
                summary.created + summary.updated,
                summary.data_type,
                file.display(),
                summary.created,
                summary.updated,
                summary.skipped_blank
            );
            for error in &summary.errors {
                println!("  skipped {error}");
            }
        }
        Commands::Export { filters, out } => {
            let rows = fetch_rows(&pool, &filters.into()).await?;
            let bytes = if is_csv_path(&out) {
                export::write_csv(&rows)?
            } else {
                export::write_xlsx(&rows)?
            };
            std::fs::write(&out, bytes)?;
            println!("Exported {} rows to {}.", rows.len(), out.display());
        }
        Commands::Report { filters, out } => {
            let filter: RowFilter = filters.into();
            let rows = fetch_rows(&pool, &filter).await?;
            let generated_on = chrono::Local::now().date_naive();
            let report = report::build_report(&report::describe_filter(&filter), generated_on, &rows);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
