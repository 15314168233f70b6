//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::Config;
use crate::error::{Error, Result};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "thinkstream=info";

/// Installs the global subscriber when `config.log_file` is set.
///
/// The terminal carries the styled conversation, so without a log file nothing is installed and
/// events are discarded.  Returns whether a subscriber was installed.
pub fn init(config: &Config) -> Result<bool> {
    let Some(path) = &config.log_file else {
        return Ok(false);
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io(format!("cannot open log file {}", path.display()), e))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|e| {
            Error::configuration(
                format!("cannot install log subscriber: {e}"),
                Some("THINKSTREAM_LOG".to_string()),
            )
        })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;

    #[test]
    fn no_log_file_installs_nothing() {
        let config = Config::new(ProviderKind::Replay);
        assert!(!init(&config).unwrap());
        assert!(!tracing::dispatcher::has_been_set());
    }

    #[test]
    fn unopenable_log_file_is_io_error() {
        let mut config = Config::new(ProviderKind::Replay);
        config.log_file = Some("/nonexistent/dir/thinkstream.log".into());
        let err = init(&config).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
