use std::{error::Error, path::Path};

use clap::Parser;
use wattle::db::nem::price_demand_archive::STORE_TIME_FORMAT;
use wattle::db::nem::price_demand_store::{MongoPriceStore, PriceStore};
use wattle::db::prod_db::ProdDb;
use wattle::elec::region::Region;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,
}

/// Run this job once a day; it resumes from the latest stored settlement date.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let _ = dotenvy::from_path(Path::new(format!(".env/{}.env", args.env).as_str()));
    let uri =
        std::env::var("MONGODB_URI").map_err(|_| "MONGODB_URI environment variable not set")?;

    let store = MongoPriceStore::connect(&uri)?;
    let archive = ProdDb::nem_price_demand();
    let stats = archive.update(&store, None, &Region::ALL)?;

    println!("\nUpdate Statistics:");
    println!("Records processed: {}", stats.processed);
    println!("Months skipped: {}", stats.skipped);
    println!("Operations failed: {}", stats.failed);

    println!("\nTotal documents in collection: {}", store.total_count()?);
    if let (Some(earliest), Some(latest)) = (
        store.earliest_settlement_date()?,
        store.latest_settlement_date()?,
    ) {
        println!(
            "Date range: {} to {}",
            earliest.strftime(STORE_TIME_FORMAT),
            latest.strftime(STORE_TIME_FORMAT)
        );
    }

    Ok(())
}
