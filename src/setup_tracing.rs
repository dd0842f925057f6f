use thiserror::Error;
use time::format_description::parse;
use tracing_subscriber::{fmt::time::OffsetTime, util::TryInitError};

const TIME_FORMAT: &str = "[hour]:[minute]:[second].[subsecond digits:2]";

#[derive(Debug, Error)]
pub enum SetupTracingError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error("Invalid time format: {0}")]
    TimeFormat(#[from] time::error::InvalidFormatDescription),
    #[error("Global subscriber already installed: {0}")]
    Init(#[from] TryInitError),
}

/// Install a compact stdout subscriber.
///
/// `RUST_LOG` takes precedence over `log_level`.
///
/// # Errors
/// Fails if `log_level` is not a valid filter or a global subscriber is
/// already installed.
pub fn setup_tracing(log_level: &str) -> Result<(), SetupTracingError> {
    use tracing_subscriber::util::SubscriberInitExt as _;

    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => tracing_subscriber::EnvFilter::try_new(log_level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_ansi(true)
        .with_timer(OffsetTime::new(
            time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC),
            parse(TIME_FORMAT)?,
        ))
        .compact()
        .finish()
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_installation_fails() {
        let _ = setup_tracing("info");

        assert!(matches!(
            setup_tracing("info"),
            Err(SetupTracingError::Init(_))
        ));
    }
}
