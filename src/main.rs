//! Entry point for the EPUB to text converter.
//!
//! Responsibilities here are kept small:
//! - Parse command-line arguments.
//! - Load configuration from `conf/config.toml`.
//! - Run the batch conversion and print its summary.

mod batch;
mod config;
mod epub_loader;
mod interrupt;

use crate::batch::{BatchSettings, RunSummary, convert_tree};
use crate::config::load_config;
use crate::interrupt::InterruptFlag;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const USAGE_ERROR: u8 = 1;
const FATAL_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "ebook-text")]
#[command(version, about = "Convert a directory tree of EPUB books to plain text", long_about = None)]
#[command(after_help = "EXAMPLES:
    ebook-text ~/Books                 Write Book.txt next to every Book.epub
    ebook-text ~/Books ~/Text --quick  Mirror into ~/Text, skipping fresh outputs")]
struct Cli {
    /// Directory scanned for .epub files
    #[arg(value_name = "FROM")]
    from: PathBuf,

    /// Output directory (defaults to FROM)
    #[arg(value_name = "TO")]
    to: Option<PathBuf>,

    /// Rewrite outputs even when their text is unchanged
    #[arg(long)]
    force: bool,

    /// Skip books whose output is newer than the book
    #[arg(long)]
    quick: bool,

    /// ASCII-only emphasis instead of pseudo-tags
    #[arg(long)]
    bare: bool,

    /// Stop after N books
    #[arg(long, value_name = "N")]
    max: Option<usize>,

    /// Configuration file
    #[arg(long, value_name = "PATH", default_value = "conf/config.toml")]
    config: PathBuf,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(USAGE_ERROR)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    let reload_handle = init_tracing();
    match run(cli, &reload_handle) {
        Ok(summary) => {
            print!("{}", summary.report());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err:?}");
            ExitCode::from(FATAL_ERROR)
        }
    }
}

fn run(cli: Cli, reload_handle: &ReloadHandle) -> Result<RunSummary> {
    let config = load_config(&cli.config);
    set_log_level(reload_handle, config.log_level.as_filter_str());

    let to = cli.to.unwrap_or_else(|| cli.from.clone());
    let options = config.convert_options().with_bare(cli.bare || config.bare);
    info!(
        from = %cli.from.display(),
        to = %to.display(),
        bare = options.bare,
        force = cli.force,
        quick = cli.quick,
        "Starting conversion"
    );
    println!("ebook-text: \"{}\" to \"{}\"", cli.from.display(), to.display());

    let settings = BatchSettings {
        force: cli.force,
        quick: cli.quick,
        max: cli.max,
        options,
    };
    convert_tree(&cli.from, &to, &settings, &InterruptFlag::install())
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
