use clap::Parser;
use rozetka_core::export;
use rozetka_core::storage::{self, PgProductStore};
use rozetka_core::{scrape, PageLayout, ProductRecord, ScrapeConfig, Strategy};
use std::path::PathBuf;
use tracing::Instrument;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Scrape one product page into a record, a workbook and optionally Postgres.
#[derive(Debug, Parser)]
#[command(name = "rozetka-scrape", version)]
struct Cli {
    /// static, classic or modern
    #[arg(long, env = "ROZETKA_STRATEGY", default_value = "static")]
    strategy: Strategy,

    #[arg(long, env = "ROZETKA_RESULTS_DIR", default_value = "results")]
    results_dir: PathBuf,

    /// Postgres URL. Without it the record is only written to the workbook.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// List every stored product after saving.
    #[arg(long)]
    print_stored: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rozetka_scrape=debug,rozetka_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = ScrapeConfig::from_env()?;

    let span = tracing::info_span!("run", run_id = %Uuid::now_v7(), strategy = %cli.strategy);
    run(&cli, &config).instrument(span).await
}

async fn run(cli: &Cli, config: &ScrapeConfig) -> anyhow::Result<()> {
    let record = scrape(cli.strategy, config, &PageLayout::default()).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);

    export::save_record(
        &cli.results_dir,
        &format!("{}_parse", cli.strategy),
        &record,
    )?;

    match &cli.database_url {
        Some(url) => store(url, &record, cli.print_stored).await?,
        None if cli.print_stored => {
            tracing::warn!("--print-stored needs DATABASE_URL; nothing to list")
        }
        None => tracing::info!("DATABASE_URL not set, skipping database"),
    }
    Ok(())
}

async fn store(database_url: &str, record: &ProductRecord, print_stored: bool) -> anyhow::Result<()> {
    let store = PgProductStore::connect(database_url).await?;
    store.migrate().await?;
    storage::persist(&store, record).await?;

    if print_stored {
        for row in store.list_products().await? {
            println!(
                "#{} {} | {} | {} ГБ | {} | {} photos | saved {}",
                row.id,
                row.name.as_deref().unwrap_or("-"),
                row.color.as_deref().unwrap_or("-"),
                row.memory_size.map_or_else(|| "-".to_string(), |m| m.to_string()),
                row.regular_price.map_or_else(|| "-".to_string(), |p| format!("{p}₴")),
                row.photos.len(),
                row.created_at.format("%Y-%m-%d %H:%M:%S"),
            );
        }
    }
    Ok(())
}
