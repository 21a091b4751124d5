//! Logging setup for GymGate.
//!
//! The `log` facade is used throughout the crate; the binary installs an
//! `env_logger` backend once at startup. Level selection, in priority order:
//!
//! 1. `RUST_LOG` (if set)
//! 2. `--quiet` (errors only) or `-v` / `-vv` / `-vvv` (info / debug / trace for this crate)
//! 3. Default: warnings, so command output is not interleaved with log lines
//!
//! Debug builds prefix every line with a timestamp and, when verbose, the
//! module path. Release builds print level and message only.
//!
//! ```rust,no_run
//! use gymgate::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("dispatcher ready");
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

const CRATE_TARGET: &str = "gymgate";

/// Install the global logger.
///
/// Returns `false` when a logger was already installed (e.g. `run_app` called
/// twice in one test process); the existing logger is left in place.
pub fn init_logging(verbose: u8, quiet: bool) -> bool {
    let from_env = env::var("RUST_LOG").is_ok();
    let level = determine_level(verbose, quiet);

    let mut builder = Builder::new();
    if from_env {
        builder.parse_default_env();
    } else {
        // Dependencies stay at warn; verbosity only opens up our own targets
        builder
            .filter_level(LevelFilter::Warn.min(level))
            .filter_module(CRATE_TARGET, level);
    }
    configure_format(&mut builder, verbose);

    let installed = builder.try_init().is_ok();
    if installed {
        log::debug!(
            "Logging initialized ({})",
            if from_env { "RUST_LOG" } else { current_level_name() }
        );
    }
    installed
}

/// Level for this crate's targets from the CLI flags.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn configure_format(builder: &mut Builder, verbose: u8) {
    #[cfg(debug_assertions)]
    {
        builder.format(move |buf, record| {
            let level = record.level();
            let style = buf.default_level_style(level);
            if verbose >= 2 {
                writeln!(
                    buf,
                    "{} {style}{:<5}{style:#} [{}] {}",
                    buf.timestamp_millis(),
                    level,
                    record.module_path().unwrap_or("unknown"),
                    record.args()
                )
            } else {
                writeln!(
                    buf,
                    "{} {style}{:<5}{style:#} {}",
                    buf.timestamp_seconds(),
                    level,
                    record.args()
                )
            }
        });
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = verbose;
        builder.format(|buf, record| {
            let level = record.level();
            let style = buf.default_level_style(level);
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        });
    }
}

/// The current maximum log level, for `--version`-style diagnostics.
pub fn current_level_name() -> &'static str {
    match log::max_level() {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}
