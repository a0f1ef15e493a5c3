//! Command-line interface for converting JMdict XML into SQLite.
//!
//! Usage: `jmdict_rs <INPUT> <OUTPUT>`. The input may be plain or gzipped
//! XML; the output database must not exist yet.

use clap::Parser;
use clap::error::ErrorKind;
use colored::*;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use jmdict_rs::{
    ConvertOptions, JmdictError, convert_with_options, error::Result, normalize_language,
    progress::{ProgressCallback, ProgressUpdate},
};
use log::{LevelFilter, error, info};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert JMdict XML into an SQLite database", long_about = None)]
struct Cli {
    /// The input JMdict file (XML, optionally gzip-compressed)
    input: PathBuf,

    /// The output SQLite3 file (must not exist)
    output: PathBuf,

    /// Gloss language to keep (e.g. ger, fre); falls back to English per entry
    #[arg(short, long)]
    lang: Option<String>,

    /// Set verbosity level (use -v, -vv, or -vvv for increasing verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Sets up logging based on verbosity level.
fn setup_logging(verbose: u8) {
    let log_level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter(None, log_level)
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

/// Prints the usage hint shown when the arguments don't fit.
fn print_usage() {
    println!("Please specify exactly two arguments:");
    println!("- First the input JMdict file");
    println!("- Second the output SQLite3 file");
}

/// Creates a progress callback that draws one bar per conversion stage.
fn create_progress_callback(
    multi_progress: MultiProgress,
    progress_bars: Arc<Mutex<HashMap<String, ProgressBar>>>,
) -> ProgressCallback {
    Box::new(move |update: ProgressUpdate| {
        let Ok(mut bars) = progress_bars.lock() else {
            return true;
        };

        let pb = bars
            .entry(update.stage_description.clone())
            .or_insert_with(|| {
                let pb = multi_progress.add(ProgressBar::new(update.total_items.unwrap_or(0)));
                let style_template = if update.total_items.is_some() {
                    "{prefix:>18.cyan.bold} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} ({percent}%) {msg}"
                } else {
                    "{prefix:>18.cyan.bold} [{elapsed_precise}] {spinner} {msg}"
                };
                let style = ProgressStyle::default_bar()
                    .template(style_template)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("##-");
                pb.set_style(style);
                pb.set_prefix(update.stage_description.clone());
                pb.enable_steady_tick(Duration::from_millis(100));
                pb
            });

        if let Some(total) = update.total_items {
            pb.set_length(total);
        }
        pb.set_position(update.current_item);
        if let Some(msg) = &update.message {
            pb.set_message(msg.clone());
        }
        if update.is_finished() {
            pb.finish_and_clear();
        }
        true
    })
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(_) => {
            // Wrong argument count is not treated as a failure.
            print_usage();
            std::process::exit(0);
        }
    };

    setup_logging(cli.verbose);

    let options = ConvertOptions {
        lang: normalize_language(cli.lang.as_deref()),
    };

    println!("Input file: {}", cli.input.display());
    println!("Output file: {}", cli.output.display());
    if let Some(lang) = &options.lang {
        println!("Using lang: {}", lang);
    }
    println!("Converting...");

    match run(cli, options).await {
        Ok(()) => {}
        Err(e) => {
            error!("Conversion failed: {}", e);
            eprintln!("{}", format!("Error: {}", e).red());
            std::process::exit(1);
        }
    }
}

/// Runs the conversion on a blocking thread while listening for Ctrl-C.
async fn run(cli: Cli, options: ConvertOptions) -> Result<()> {
    let multi_progress = MultiProgress::new();
    let progress_bars = Arc::new(Mutex::new(HashMap::<String, ProgressBar>::new()));
    let callback = create_progress_callback(multi_progress.clone(), progress_bars.clone());

    let input = cli.input;
    let output = cli.output;
    let convert_handle = tokio::task::spawn_blocking(move || {
        convert_with_options(&input, &output, &options, Some(callback))
    });

    let result = tokio::select! {
        joined = convert_handle => joined
            .map_err(|e| JmdictError::Internal(format!("conversion task failed: {}", e)))
            .and_then(|stats| stats),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, stopping.");
            // The blocking task can't be cancelled; leave without waiting for it.
            clear_bars(&progress_bars);
            println!("\nAborted");
            std::process::exit(0);
        }
    };

    clear_bars(&progress_bars);
    drop(multi_progress);
    std::io::stdout().flush().ok();

    let stats = result?;
    println!("{}", "Converting done!".green());
    println!("Converted entries: {}", stats.converted);
    println!("Not converted entries: {}", stats.not_converted);
    Ok(())
}

fn clear_bars(progress_bars: &Arc<Mutex<HashMap<String, ProgressBar>>>) {
    if let Ok(bars) = progress_bars.lock() {
        for pb in bars.values() {
            pb.finish_and_clear();
        }
    }
}
