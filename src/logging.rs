//! Process-wide log subscriber.

use std::sync::Once;

use tracing::level_filters::LevelFilter;
use tracing::{info, Level};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Environment variable selecting the log level.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

static INIT_ONCE: Once = Once::new();

/// Map a `LOG_LEVEL` value to a filter. Anything unrecognized is `info`.
pub fn level_from(value: Option<&str>) -> LevelFilter {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("debug") => LevelFilter::DEBUG,
        Some("warn") => LevelFilter::WARN,
        Some("error") => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

/// Install the subscriber. Later calls are no-ops.
///
/// `RUST_LOG` directives win over `LOG_LEVEL` when set. ERROR events are
/// written to stderr, everything else to stdout.
pub fn init() {
    INIT_ONCE.call_once(|| {
        let level = level_from(std::env::var(LOG_LEVEL_ENV).ok().as_deref());
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));
        let writer = std::io::stderr
            .with_max_level(Level::ERROR)
            .or_else(std::io::stdout);

        let installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_target(false)
            .try_init();

        if installed.is_ok() {
            info!(
                os = std::env::consts::OS,
                arch = std::env::consts::ARCH,
                version = env!("CARGO_PKG_VERSION"),
                "logging initialized"
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(level_from(Some("debug")), LevelFilter::DEBUG);
        assert_eq!(level_from(Some("WARN")), LevelFilter::WARN);
        assert_eq!(level_from(Some(" error ")), LevelFilter::ERROR);
    }

    #[test]
    fn unknown_level_is_info() {
        assert_eq!(level_from(None), LevelFilter::INFO);
        assert_eq!(level_from(Some("trace")), LevelFilter::INFO);
        assert_eq!(level_from(Some("")), LevelFilter::INFO);
    }

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }
}
