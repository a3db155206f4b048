//! Tracing subscriber setup for binaries built on these services.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// How much the process logs when `RUST_LOG` is not set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
    Trace,
}

impl Verbosity {
    #[must_use]
    pub fn level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Default filter directives covering this workspace's crates.
    #[must_use]
    pub fn filter_directives(self) -> String {
        let level = self.level();
        format!("services={level},storage={level},course_progress={level}")
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `verbosity`.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directives()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    let _ = subscriber.try_init();
}
