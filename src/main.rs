//! Command-line entry point.
//!
//! Parses flags, loads the layered configuration, sets up logging and runs
//! one update. Ctrl-C cancels in-flight downloads; the lock is still released
//! and no partial database is ever installed.

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, warn};
use std::process;
use tokio_util::sync::CancellationToken;

use geoipupdate::initialization::init_logger_with;
use geoipupdate::{load_config, Opt, Updater};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("geoipupdate error: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let opt = Opt::parse();

    let config = load_config(&opt).context("error loading configuration")?;

    init_logger_with(opt.level(&config).into(), opt.log_format)
        .context("failed to initialize logger")?;
    debug!("geoipupdate version {}", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling downloads");
                cancel.cancel();
            }
        }
    });

    let updater = Updater::new(config).context("error initializing updater")?;
    updater
        .run(&cancel)
        .await
        .context("error retrieving updates")?;

    Ok(())
}
