use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use whatnow::{
    hover::start_hover_logger,
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, HOVER_PREFIX},
        runtime::single_thread_runtime,
    },
};

#[derive(Parser)]
#[command(name = "whatnow-hover")]
#[command(about = "Logs the focused text to hover_output.json on a right-click gesture")]
struct HoverArgs {
    #[arg(long)]
    dir: Option<PathBuf>,
    #[arg(long = "log-console")]
    log_console: bool,
    #[arg(long = "log-filter")]
    log: Option<LevelFilter>,
}

fn main() {
    run_hover().unwrap();
}

fn run_hover() -> Result<()> {
    let args = HoverArgs::parse();
    let application_dir = args
        .dir
        .map_or_else(create_application_default_path, Ok)?;
    enable_logging(HOVER_PREFIX, &application_dir, args.log, args.log_console)?;

    single_thread_runtime()?.block_on(async move { start_hover_logger(application_dir).await })?;
    Ok(())
}
