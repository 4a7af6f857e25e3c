use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "error" => Some(Self::Error),
            "warn" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }

    fn directive(self) -> &'static str {
        match self {
            Self::Error => "i18n_autowrap=error",
            Self::Warn => "i18n_autowrap=warn",
            Self::Info => "i18n_autowrap=info",
            Self::Debug => "i18n_autowrap=debug",
        }
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over `level` when set.
///
/// Calling this twice is harmless; the second call keeps the first subscriber.
pub fn init(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
