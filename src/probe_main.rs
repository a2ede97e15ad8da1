use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use whatnow::{
    probe::start_probe,
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, PROBE_PREFIX},
        runtime::single_thread_runtime,
    },
};

#[derive(Parser)]
#[command(name = "whatnow-probe")]
#[command(about = "Capture probe for whatnow. Spawned by the monitor, can be run standalone for debugging")]
struct ProbeArgs {
    #[arg(long)]
    dir: Option<PathBuf>,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    log_console: bool,
    #[arg(long = "log-filter")]
    log: Option<LevelFilter>,
}

fn main() {
    run_probe().unwrap();
}

fn run_probe() -> Result<()> {
    let args = ProbeArgs::parse();
    let application_dir = args
        .dir
        .map_or_else(create_application_default_path, Ok)?;
    enable_logging(PROBE_PREFIX, &application_dir, args.log, args.log_console)?;

    single_thread_runtime()?.block_on(async move { start_probe(application_dir).await })?;
    Ok(())
}
