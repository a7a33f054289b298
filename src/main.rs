//! framecache-walk: step through a folder of camera-trap frames the way a
//! reviewer would, exercising the cache and every difference view.
//!
//! ```text
//! framecache-walk <folder> [--config <file>]
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use framecache::{
    CacheConfig, FileSequence, FolderSequence, ImageCache, ImageDifference,
    ImageDifferenceResult,
};
use web_time::Instant;

const USAGE: &str = "usage: framecache-walk <folder> [--config <file>]";

struct Args {
    folder: PathBuf,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut folder = None;
    let mut config = None;

    let mut args = std::env::args_os().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            let path = args.next().ok_or("--config needs a file argument")?;
            config = Some(PathBuf::from(path));
        } else if arg == "--help" || arg == "-h" {
            return Err(USAGE.to_string());
        } else if folder.is_none() {
            folder = Some(PathBuf::from(arg));
        } else {
            return Err(format!("unexpected argument {:?}\n{}", arg, USAGE));
        }
    }

    Ok(Args {
        folder: folder.ok_or(USAGE)?,
        config,
    })
}

/// Tally of difference results per view.
#[derive(Default)]
struct Summary {
    moves: usize,
    results: BTreeMap<String, usize>,
}

impl Summary {
    fn record(&mut self, view: ImageDifference, result: ImageDifferenceResult) {
        *self
            .results
            .entry(format!("{:?} {:?}", view, result))
            .or_default() += 1;
    }
}

fn run(args: Args) -> Result<Summary, Box<dyn std::error::Error>> {
    // Default config errors are logged after the logger is set up
    let mut default_config_error = None;
    let config = match &args.config {
        Some(path) => CacheConfig::from_file(path)?,
        None => CacheConfig::load_from_default_path()
            .unwrap_or_else(|e| {
                default_config_error = Some(e);
                None
            })
            .unwrap_or_default(),
    };

    env_logger::Builder::new()
        .filter_level(config.log_level.to_level_filter())
        .parse_default_env()
        .init();

    match (&args.config, default_config_error) {
        (Some(path), _) => log::info!("Loaded configuration from {:?}", path),
        (None, Some(e)) => log::warn!(
            "Ignoring config file {:?}, using defaults: {}",
            CacheConfig::default_path(),
            e
        ),
        (None, None) => log::debug!("Configuration: {:?}", config),
    }

    let sequence = Arc::new(FolderSequence::open(&args.folder)?);

    let mut cache = ImageCache::new(Arc::clone(&sequence), &args.folder, &config)?;
    let mut summary = Summary::default();

    for row in 0..sequence.len() {
        if !cache.try_move_to_file(row).is_new_file() {
            continue;
        }
        summary.moves += 1;

        // Previous/next cycle until it wraps back to the unaltered frame
        loop {
            cache.advance_previous_next_cycle();
            let view = cache.current_difference_state();
            if view == ImageDifference::Unaltered {
                break;
            }
            summary.record(view, cache.compute_difference());
        }

        cache.advance_combined_cycle();
        let result = cache.compute_combined_difference(config.difference_threshold);
        summary.record(ImageDifference::Combined, result);
        cache.advance_combined_cycle();
    }

    log::debug!("{} bitmaps cached at exit", cache.cached_count());
    Ok(summary)
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    let start = Instant::now();
    match run(args) {
        Ok(summary) => {
            let elapsed = start.elapsed();
            log::info!("Walked {} files in {:?}", summary.moves, elapsed);
            println!("files: {}", summary.moves);
            for (outcome, count) in &summary.results {
                println!("{:<45} {}", outcome, count);
            }
            println!("elapsed: {:.2?}", elapsed);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("framecache-walk: {}", e);
            ExitCode::FAILURE
        }
    }
}
