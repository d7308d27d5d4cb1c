use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use customer_import_api::config::ImportConfig;
use customer_import_api::db::run_migrations;
use customer_import_api::import::{CustomerImporter, ImportError};
use customer_import_api::store::PgCustomerStore;

#[derive(Parser, Debug)]
#[command(
    name = "import_customers",
    about = "Import customers from a CSV file into the database"
)]
struct Args {
    /// CSV file with a `name,email,date_of_birth,annual_income` header.
    #[arg(long)]
    file: PathBuf,

    /// Rows per batch (defaults to IMPORT_BATCH_SIZE or 100).
    #[arg(long)]
    batch_size: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let config = ImportConfig::from_env();
    let batch_size = args.batch_size.unwrap_or(config.batch_size);

    let bytes = match tokio::fs::read(&args.file).await {
        Ok(bytes) => bytes,
        Err(err) => {
            writeln!(
                io::stderr(),
                "error: cannot read '{}': {err}",
                args.file.display()
            )?;
            std::process::exit(1);
        }
    };

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;
    run_migrations(&pool).await?;

    let store = PgCustomerStore::new(pool.clone());
    let result = CustomerImporter::new(&store)
        .with_batch_size(batch_size)
        .import(&bytes)
        .await;
    pool.close().await;

    match result {
        Ok(outcome) => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            serde_json::to_writer_pretty(&mut out, &outcome)?;
            writeln!(out)?;

            if outcome.aborted {
                std::process::exit(2);
            }
            Ok(())
        }
        Err(err @ (ImportError::FileInvalid(_) | ImportError::HeaderInvalid(_))) => {
            writeln!(io::stderr(), "error: {err}")?;
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}
