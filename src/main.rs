//! ff - find files in the filesystem
//!
//! Entry point for the CLI application: argument collection
//! (including `FF_OPTIONS`), logging setup, help actions, cache
//! maintenance and the exit-code mapping.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use ff::cache::MetaCache;
use ff::config::{collect_argv, CliArgs, Config};
use ff::error::{Error, Result, EX_FAIL_EMPTY, EX_PROCESS, EX_SUBPROCESS};
use ff::registry::Registry;
use ff::search::Search;
use ff::{help, output};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    setup_logging();

    let args = CliArgs::parse_from(collect_argv());

    match run(args) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("ff: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_env("FF_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: CliArgs) -> Result<u8> {
    let registry = Arc::new(Registry::with_builtins()?);

    if let Some(topic) = &args.help {
        if topic == "all" {
            let _ = CliArgs::command().print_help();
        } else {
            help::print_plugin(&registry, topic)?;
        }
        return Ok(0);
    }
    if args.help_attributes {
        help::print_attributes(&registry);
        return Ok(0);
    }
    if args.help_plugins {
        help::print_plugins(&registry);
        return Ok(0);
    }
    if args.help_types {
        help::print_types();
        return Ok(0);
    }
    if args.help_full {
        help::print_full(&registry);
        return Ok(0);
    }

    let config = Config::from_args(args)?;

    if config.clean_cache {
        let Some(path) = &config.cache_path else {
            return Err(Error::Usage(
                "--clean-cache makes no sense with --no-cache".to_string(),
            ));
        };
        let cache = MetaCache::open(path)?;
        let removed = cache.clean()?;
        eprintln!("removed {removed} stale cache records");
        return Ok(0);
    }

    let search = Search::start(config.clone(), registry.clone())?;
    let counters = search.counters.clone();
    let cache = search.cache.clone();

    // First interrupt stops dispatch, the second one forces an exit.
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let counters = counters.clone();
        let interrupted = interrupted.clone();
        let presses = AtomicU32::new(0);
        let _ = ctrlc::set_handler(move || {
            if presses.fetch_add(1, Ordering::SeqCst) == 0 {
                interrupted.store(true, Ordering::SeqCst);
                counters.stop();
            } else {
                std::process::exit(130);
            }
        });
    }

    let (rx, handles) = search.into_parts();
    output::run(&config, registry, counters.clone(), rx, handles)?;

    if let Some(cache) = &cache {
        let (hits, misses) = cache.stats();
        if hits + misses > 0 {
            debug!("cache stats: {hits} hits, {misses} misses");
        }
    }

    if interrupted.load(Ordering::SeqCst) {
        return Ok(130);
    }
    if counters.internal_error.load(Ordering::SeqCst) {
        return Ok(EX_PROCESS);
    }
    if counters.subprocess_failed.load(Ordering::SeqCst) {
        return Ok(EX_SUBPROCESS);
    }
    if config.fail && counters.matched.load(Ordering::SeqCst) == 0 {
        return Ok(EX_FAIL_EMPTY);
    }
    Ok(0)
}
