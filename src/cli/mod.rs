use std::{path::PathBuf, time::Duration};

use ansi_term::Colour;
use anyhow::Result;
use chrono::{DateTime, Local};
use clap::Parser;
use tracing::level_filters::LevelFilter;

use crate::{
    classify::{Classifier, ClassifierConfig},
    monitor::start_monitor,
    store::{entities::Verdict, ActivityStore},
    utils::{
        dir::{create_application_default_path, output_dir},
        logging::{enable_logging, CLI_PREFIX},
    },
};

const DEFAULT_RECENT_COUNT: &str = "5";
const WATCH_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "whatnow", version)]
#[command(about = "Samples on-screen activity and classifies what you're doing", long_about = None)]
struct Args {
    #[arg(
        long,
        value_name = "NAME",
        conflicts_with_all = ["recent", "watch"],
        help = "Classify one observation file from the output directory, print the verdict, and exit"
    )]
    file: Option<String>,
    #[arg(
        long,
        value_name = "N",
        num_args = 0..=1,
        default_missing_value = DEFAULT_RECENT_COUNT,
        conflicts_with = "watch",
        help = "Classify the N most recent observation files (default 5), print the verdicts, and exit"
    )]
    recent: Option<usize>,
    #[arg(long, help = "Poll the latest verdict and render it in the terminal")]
    watch: bool,
    #[arg(
        long,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, help = "Enable console logging")]
    log: bool,
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let application_dir = args
        .dir
        .map_or_else(create_application_default_path, Ok)?;
    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &application_dir, logging_level, args.log)?;

    if let Some(name) = args.file {
        return analyze_file(&application_dir, &name).await;
    }
    if let Some(count) = args.recent {
        return analyze_recent(&application_dir, count).await;
    }
    if args.watch {
        return watch_verdicts(&application_dir).await;
    }
    start_monitor(application_dir).await
}

fn offline_classifier() -> Result<Classifier> {
    Classifier::new(ClassifierConfig::from_env()?)
}

/// `--file`: classify one named snapshot without touching the live verdict
/// slot.
async fn analyze_file(application_dir: &std::path::Path, name: &str) -> Result<()> {
    let store = ActivityStore::new(output_dir(application_dir))?;
    let classifier = offline_classifier()?;

    let Some(observation) = store.read_observation(name).await else {
        println!("Could not read observation file: {name}");
        return Ok(());
    };
    let mut verdict = classifier.classify(&observation).await;
    verdict.source_file = Some(name.to_string());
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(())
}

/// `--recent [N]`: classify the latest snapshots, oldest first. Fewer files
/// than asked for is fine.
async fn analyze_recent(application_dir: &std::path::Path, count: usize) -> Result<()> {
    let store = ActivityStore::new(output_dir(application_dir))?;
    let classifier = offline_classifier()?;

    let names = store.recent_snapshots(count).await?;
    if names.is_empty() {
        println!("No observation files found");
        return Ok(());
    }

    for name in names {
        let Some(observation) = store.read_observation(&name).await else {
            println!("Could not read observation file: {name}");
            continue;
        };
        let mut verdict = classifier.classify(&observation).await;
        verdict.source_file = Some(name);
        print_verdict(&verdict);
    }
    Ok(())
}

/// `--watch`: poll the latest verdict slot and render it until interrupted.
async fn watch_verdicts(application_dir: &std::path::Path) -> Result<()> {
    let store = ActivityStore::new(output_dir(application_dir))?;
    println!("Watching for verdicts, press Ctrl+C to stop");
    loop {
        if let Some(verdict) = store.read_verdict().await {
            print_verdict(&verdict);
        } else {
            println!("No verdict yet");
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            _ = tokio::time::sleep(WATCH_INTERVAL) => (),
        }
    }
}

fn print_verdict(verdict: &Verdict) {
    if let Some(source) = &verdict.source_file {
        println!("{} {source}", Colour::Cyan.paint("File:"));
    }
    println!(
        "{} {}",
        Colour::Cyan.paint("Activity:"),
        Colour::Green.bold().paint(verdict.activity.to_string())
    );
    println!("{} {:.2}", Colour::Cyan.paint("Confidence:"), verdict.confidence);
    println!("{} {}", Colour::Cyan.paint("Description:"), verdict.description);
    if !verdict.details.is_empty() {
        println!("{} {}", Colour::Cyan.paint("Details:"), verdict.details);
    }
    if !verdict.data_sources.is_empty() {
        println!("{} {}", Colour::Cyan.paint("Sources:"), verdict.data_sources);
    }
    if let Some(moment) = DateTime::from_timestamp_millis((verdict.timestamp * 1000.0) as i64) {
        println!(
            "{} {}",
            Colour::Cyan.paint("Time:"),
            moment.with_timezone(&Local)
        );
    }
    println!("{}", "-".repeat(40));
}
