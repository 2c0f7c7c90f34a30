/// `env_logger` setup for binaries and tests built on this crate
use std::sync::Once;

/// Logger configuration.
///
/// `filter` uses the `env_logger` directive syntax (`"warn"`,
/// `"lumen_core=debug,lumen_glow=info"`). Without one, `RUST_LOG` is
/// consulted and the level falls back to `info`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    /// Route output through the test harness capture
    pub is_test: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            write_style: env_logger::WriteStyle::Auto,
            is_test: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn for_tests() -> Self {
        Self {
            is_test: true,
            ..Self::default()
        }
    }
}

static INIT: Once = Once::new();

/// Installs the global logger. Only the first call has any effect.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        match config.filter.or_else(|| std::env::var("RUST_LOG").ok()) {
            Some(filter) => {
                builder.parse_filters(&filter);
            }
            None => {
                builder.filter_level(log::LevelFilter::Info);
            }
        }
        builder.write_style(config.write_style).is_test(config.is_test);

        // Another logger may already be installed by the host application.
        if builder.try_init().is_err() {
            log::warn!("a global logger was already installed; keeping it");
            return;
        }
        log::debug!("logging initialized");
    });
}
