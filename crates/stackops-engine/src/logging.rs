//! Tracing subscriber setup

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// How the process-wide subscriber is configured
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Disable ANSI colors in log output
    pub no_color: bool,
    /// Filter directive used when `RUST_LOG` is unset (defaults to `info`)
    pub directive: Option<String>,
}

impl LogOptions {
    pub fn no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = Some(directive.into());
        self
    }

    fn filter(&self) -> Result<EnvFilter> {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return Ok(EnvFilter::from_default_env());
        }
        let directive = self.directive.as_deref().unwrap_or("info");
        EnvFilter::try_new(directive).map_err(|e| anyhow!("invalid log directive '{directive}': {e}"))
    }
}

/// Install the global fmt subscriber, writing to stderr.
///
/// Fails if a subscriber is already installed.
pub fn init(options: &LogOptions) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(options.filter()?)
        .with_ansi(!options.no_color)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_directive_rejected() {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return;
        }
        let options = LogOptions::default().directive("stackops=loudest");
        assert!(options.filter().is_err());
    }

    #[test]
    fn test_second_init_fails() {
        let options = LogOptions::default().no_color(true);
        let _ = init(&options);
        assert!(init(&options).is_err());
    }
}
