#![deny(unused_crate_dependencies)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

mod browser;
mod config;
mod error;
mod ledger;
mod logging;
mod output;
mod pacing;
mod parse;
mod record;
mod scraper;
mod zipcodes;

use crate::{
    browser::WebDriverLauncher,
    config::Config,
    ledger::{Ledger, Store},
    output::{LocationsDump, OutputDir},
    pacing::Pacer,
    scraper::Scraper,
};

pub use error::Result;

#[cfg(all(target_env = "musl", target_pointer_width = "64"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

async fn run(config: &Config) -> Result<()> {
    let jobs = zipcodes::prepare(config).await?;
    let pacer = Pacer::new(config.pace_scale, config.navigations_per_minute);
    let launcher = WebDriverLauncher::new(
        config.webdriver_url.clone(),
        config.search_url.clone(),
        config.headless,
        pacer.clone(),
    )?;
    let mut scraper = Scraper::new(
        launcher,
        pacer,
        config.retries,
        config.search_radius,
        OutputDir::new(&config.output_dir),
    );
    if let Some(path) = &config.locations_dump {
        scraper = scraper.with_dump(LocationsDump::open(path).await?);
    }

    for job in jobs {
        log::info!("Processing {}", job.path.display());
        let mut ledger = Ledger::load(Store::local(&job.path).await?, job.country).await?;
        let tally = scraper.run_ledger(&mut ledger).await?;
        log::info!("{}: {tally}", job.path.display());
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> core::result::Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let log_path = logging::init(&config.logs_dir)?;
    log::info!("Logging to {}", log_path.display());

    // progress is saved after every row, so an interrupted run resumes cleanly
    tokio::select! {
        res = run(&config) => res?,
        _ = tokio::signal::ctrl_c() => log::warn!("Interrupted, stopping"),
    }
    Ok(())
}
