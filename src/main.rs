//! tiffnav - Inspect the directory graph of a TIFF or BigTIFF file.
//!
//! This binary opens a file through the block cache, walks its directories
//! and prints a text or JSON report.

use std::fs::File;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiffnav::{
    inspect, CachedStream, Config, InspectOptions, IoError, Navigator, OutputFormat,
    ReaderStream, TiffError,
};

fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}: {}", config.path.display(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), TiffError> {
    let file = File::open(&config.path).map_err(IoError::from)?;
    let reader = ReaderStream::new(file, config.path.display().to_string())?;
    let stream = CachedStream::with_capacity(reader, config.block_size, config.cache_blocks);

    let mut navigator = Navigator::open_with_options(stream, config.open_options())?;

    let options = InspectOptions {
        sub_directories: !config.no_sub_directories,
        values: !config.no_values,
        max_directories: config.max_directories,
    };
    let report = inspect(&mut navigator, &options)?;

    match config.format {
        OutputFormat::Text => print!("{}", report),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| IoError::Backend(e.to_string()))?;
            println!("{}", json);
        }
    }

    let stream = navigator.stream();
    debug!(
        hits = stream.hits(),
        misses = stream.misses(),
        "Block cache statistics"
    );

    navigator.close()?;
    Ok(())
}

/// Initialize the tracing/logging subsystem.
///
/// Logs go to stderr so the report on stdout stays parseable.
fn init_logging(verbose: bool) {
    let env_filter = if verbose { "tiffnav=debug" } else { "tiffnav=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
