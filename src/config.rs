use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use bon::Builder;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(250);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Client configuration.
///
/// Every field has a documented default; the builder overrides defaults
/// field by field, so callers only name the fields they care about:
///
/// ```
/// use socket_client_sdk::Config;
///
/// let config = Config::builder().host("example.com").secure(true).build();
/// assert_eq!(config.port, 3000);
/// assert!(config.reconnect);
/// ```
#[expect(
    clippy::struct_excessive_bools,
    reason = "the configuration surface is a set of independent switches"
)]
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Server hostname. Default: `localhost`.
    #[builder(into, default = DEFAULT_HOST.to_owned())]
    pub host: String,
    /// Server port. Default: `3000`. A port of `0` omits the port segment
    /// from the connection address entirely.
    #[builder(default = DEFAULT_PORT)]
    pub port: u16,
    /// Use the encrypted scheme (`wss://`) instead of plaintext (`ws://`).
    /// Default: `false`.
    #[builder(default = false)]
    pub secure: bool,
    /// Open the connection during construction. Default: `true`.
    #[builder(default = true)]
    pub autoconnect: bool,
    /// Automatically reopen the connection after an unexpected close.
    /// Default: `true`.
    #[builder(default = true)]
    pub reconnect: bool,
    /// Emit diagnostic logs for lifecycle transitions. Warnings and errors
    /// are always logged. Default: `true`.
    #[builder(default = true)]
    pub debug: bool,
    /// Pacing for consecutive failed reopen attempts.
    #[builder(default)]
    pub reconnect_backoff: ReconnectConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Pacing for automatic reopen attempts.
///
/// The first reopen after a lost connection is immediate; only consecutive
/// *failed* attempts are delayed, doubling (by default) up to `max_delay`.
/// There is no attempt cap: the client retries for as long as the
/// `reconnect` flag stays true.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the second consecutive attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Growth factor applied to the delay after each failed attempt.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl From<ReconnectConfig> for ExponentialBackoff {
    fn from(config: ReconnectConfig) -> Self {
        ExponentialBackoffBuilder::default()
            .with_initial_interval(config.initial_delay)
            .with_max_interval(config.max_delay)
            .with_multiplier(config.multiplier)
            .with_max_elapsed_time(None)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use backoff::backoff::Backoff as _;

    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let config = Config::default();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 3000);
        assert!(!config.secure);
        assert!(config.autoconnect);
        assert!(config.reconnect);
        assert!(config.debug);
    }

    #[test]
    fn builder_overrides_field_by_field() {
        let config = Config::builder().host("h").reconnect(false).build();

        // Named fields take the given value, the rest keep their defaults.
        assert_eq!(config.host, "h");
        assert!(!config.reconnect);
        assert_eq!(config.port, 3000);
        assert!(config.autoconnect);
        assert!(config.debug);
    }

    #[test]
    fn backoff_delay_stays_within_bounds() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(2),
            multiplier: 3.0,
        };
        let mut backoff: ExponentialBackoff = config.into();

        for _ in 0..10 {
            let _next = backoff.next_backoff();
        }

        // Randomization can overshoot max_interval by at most 50%.
        let delay = backoff.next_backoff().expect("backoff must not give up");
        assert!(delay <= Duration::from_secs(3), "delay {delay:?} above cap");
    }

    #[test]
    fn backoff_never_gives_up() {
        let mut backoff: ExponentialBackoff = ReconnectConfig::default().into();

        for _ in 0..100 {
            assert!(backoff.next_backoff().is_some(), "backoff must be unbounded");
        }
    }
}
