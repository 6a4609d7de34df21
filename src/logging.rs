//! Logging setup for the `esdump` binary.
//!
//! Library code logs through the [`log`] facade; the binary installs
//! `env_logger` once at startup. `RUST_LOG` wins when set, otherwise the level
//! follows the number of `-v` flags.
//!
//! ```no_run
//! esdump::logging::init(1);
//! log::info!("visible at -v");
//! ```

use log::LevelFilter;

/// Level used when `RUST_LOG` is unset.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the global logger. Later calls are ignored.
pub fn init(verbosity: u8) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level_for(verbosity))
        .format_timestamp_millis()
        .format_target(verbosity > 1)
        .parse_default_env();

    if builder.try_init().is_ok() {
        log::debug!("logging initialized at {}", level_for(verbosity));
    }
}
