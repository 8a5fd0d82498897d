//! Application configuration loaded from environment variables.
//!
//! Connection credentials are optional, but when any of them is set all
//! four must be present:
//! - `SMARTSTREAM_AUTH_TOKEN`: session JWT sent as `Authorization`
//! - `SMARTSTREAM_API_KEY`: sent as `x-api-key`
//! - `SMARTSTREAM_CLIENT_CODE`: sent as `x-client-code`
//! - `SMARTSTREAM_FEED_TOKEN`: sent as `x-feed-token`
//!
//! Everything else has a default; see [`fetch_config`].

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use zeroize::Zeroizing;

/// Default feed endpoint.
const DEFAULT_WEBSOCKET_URL: &str = "wss://smartapisocket.angelone.in/smart-stream";

const DEFAULT_CORRELATION_ID: &str = "default";
const DEFAULT_HEARTBEAT_SECS: u64 = 10;
const DEFAULT_SETTLE_MILLIS: u64 = 1000;
const DEFAULT_FANOUT_PORT: u16 = 5555;

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub fanout: FanoutConfig,
    /// Optional instrument master JSON file.
    pub instruments_path: Option<PathBuf>,
}

/// Settings for the upstream feed session.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub websocket_url: String,
    pub credentials: Option<Credentials>,
    pub correlation_id: String,
    pub heartbeat_interval: Duration,
    /// Pause after each subscribe/unsubscribe send.
    pub settle_delay: Duration,
    /// PEM file whose CA replaces the default web roots.
    pub ca_path: Option<PathBuf>,
}

/// Connection headers supplied by an external login flow.
#[derive(Clone)]
pub struct Credentials {
    pub auth_token: Zeroizing<String>,
    pub api_key: Zeroizing<String>,
    pub client_code: String,
    pub feed_token: Zeroizing<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_code", &self.client_code)
            .finish_non_exhaustive()
    }
}

/// Settings for the local fan-out channel.
#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// Republish raw frames instead of decoding them in-process.
    pub enabled: bool,
    pub port: u16,
    /// Prefix each frame with a latency envelope.
    pub stamped: bool,
}

impl FeedConfig {
    /// Feed settings pointing at `websocket_url` with all other defaults.
    pub fn new(websocket_url: &str) -> Self {
        Self {
            websocket_url: websocket_url.to_string(),
            credentials: None,
            correlation_id: DEFAULT_CORRELATION_ID.to_string(),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_MILLIS),
            ca_path: None,
        }
    }
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: DEFAULT_FANOUT_PORT,
            stamped: false,
        }
    }
}

/// Loads the application configuration from environment variables.
///
/// | Variable | Default |
/// |---|---|
/// | `SMARTSTREAM_WEBSOCKET_URL` | `wss://smartapisocket.angelone.in/smart-stream` |
/// | `SMARTSTREAM_CORRELATION_ID` | `default` |
/// | `SMARTSTREAM_HEARTBEAT_SECS` | `10` |
/// | `SMARTSTREAM_SETTLE_MILLIS` | `1000` |
/// | `SMARTSTREAM_FANOUT` | off |
/// | `SMARTSTREAM_FANOUT_PORT` | `5555` |
/// | `SMARTSTREAM_FANOUT_STAMPED` | off |
/// | `SMARTSTREAM_INSTRUMENTS_PATH` | unset |
/// | `SMARTSTREAM_CA_PATH` | unset |
///
/// # Errors
///
/// Returns [`StreamError::Config`](crate::StreamError::Config) if only some
/// of the credential variables are set, or a numeric or boolean variable
/// does not parse.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let mut feed = FeedConfig::new(
        &non_empty_var("SMARTSTREAM_WEBSOCKET_URL")
            .unwrap_or_else(|| DEFAULT_WEBSOCKET_URL.to_string()),
    );
    feed.credentials = credentials()?;
    if let Some(id) = non_empty_var("SMARTSTREAM_CORRELATION_ID") {
        feed.correlation_id = id;
    }
    if let Some(secs) = parsed_var::<u64>("SMARTSTREAM_HEARTBEAT_SECS")? {
        feed.heartbeat_interval = Duration::from_secs(secs);
    }
    if let Some(millis) = parsed_var::<u64>("SMARTSTREAM_SETTLE_MILLIS")? {
        feed.settle_delay = Duration::from_millis(millis);
    }
    feed.ca_path = non_empty_var("SMARTSTREAM_CA_PATH").map(PathBuf::from);

    let fanout = FanoutConfig {
        enabled: flag_var("SMARTSTREAM_FANOUT")?,
        port: parsed_var::<u16>("SMARTSTREAM_FANOUT_PORT")?.unwrap_or(DEFAULT_FANOUT_PORT),
        stamped: flag_var("SMARTSTREAM_FANOUT_STAMPED")?,
    };

    Ok(AppConfig {
        feed,
        fanout,
        instruments_path: non_empty_var("SMARTSTREAM_INSTRUMENTS_PATH").map(PathBuf::from),
    })
}

/// Reads the four credential variables; all or none must be present.
fn credentials() -> crate::Result<Option<Credentials>> {
    const NAMES: [&str; 4] = [
        "SMARTSTREAM_AUTH_TOKEN",
        "SMARTSTREAM_API_KEY",
        "SMARTSTREAM_CLIENT_CODE",
        "SMARTSTREAM_FEED_TOKEN",
    ];

    let values: Vec<Option<String>> = NAMES.iter().copied().map(non_empty_var).collect();
    if values.iter().all(Option::is_none) {
        return Ok(None);
    }

    let missing: Vec<&str> = NAMES
        .iter()
        .zip(&values)
        .filter(|(_, v)| v.is_none())
        .map(|(n, _)| *n)
        .collect();
    if !missing.is_empty() {
        return Err(crate::StreamError::Config(format!(
            "incomplete credentials: {} missing",
            missing.join(", ")
        )));
    }

    let mut values = values.into_iter().flatten();
    let mut next = || values.next().unwrap_or_default();
    Ok(Some(Credentials {
        auth_token: Zeroizing::new(next()),
        api_key: Zeroizing::new(next()),
        client_code: next(),
        feed_token: Zeroizing::new(next()),
    }))
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn parsed_var<T: FromStr>(name: &str) -> crate::Result<Option<T>> {
    non_empty_var(name)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| crate::StreamError::Config(format!("{name} is not valid: {raw}")))
        })
        .transpose()
}

fn flag_var(name: &str) -> crate::Result<bool> {
    match non_empty_var(name).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(crate::StreamError::Config(format!(
            "{name} must be a boolean, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Serialises tests that touch the process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_VARS: [&str; 13] = [
        "SMARTSTREAM_WEBSOCKET_URL",
        "SMARTSTREAM_AUTH_TOKEN",
        "SMARTSTREAM_API_KEY",
        "SMARTSTREAM_CLIENT_CODE",
        "SMARTSTREAM_FEED_TOKEN",
        "SMARTSTREAM_CORRELATION_ID",
        "SMARTSTREAM_HEARTBEAT_SECS",
        "SMARTSTREAM_SETTLE_MILLIS",
        "SMARTSTREAM_FANOUT",
        "SMARTSTREAM_FANOUT_PORT",
        "SMARTSTREAM_FANOUT_STAMPED",
        "SMARTSTREAM_INSTRUMENTS_PATH",
        "SMARTSTREAM_CA_PATH",
    ];

    /// Helper that clears every config var, applies `vars`, runs `f`, then
    /// restores originals.
    ///
    /// # Safety
    ///
    /// Holds [`ENV_LOCK`] for the duration so no other test in this module
    /// reads these env vars concurrently.
    fn with_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let originals: Vec<(&str, Option<String>)> = ALL_VARS
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();

        // SAFETY: ENV_LOCK is held; nothing else in the crate reads these vars.
        unsafe {
            for k in ALL_VARS {
                std::env::remove_var(k);
            }
            for (k, v) in vars {
                std::env::set_var(k, v);
            }
        }

        f();

        for (k, original) in originals {
            // SAFETY: restoring original values, same single-threaded context.
            unsafe {
                match original {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn defaults_without_env_vars() {
        with_env(&[], || {
            let config = fetch_config().unwrap();
            assert_eq!(config.feed.websocket_url, DEFAULT_WEBSOCKET_URL);
            assert!(config.feed.credentials.is_none());
            assert_eq!(config.feed.correlation_id, "default");
            assert_eq!(config.feed.heartbeat_interval, Duration::from_secs(10));
            assert_eq!(config.feed.settle_delay, Duration::from_millis(1000));
            assert!(!config.fanout.enabled);
            assert_eq!(config.fanout.port, 5555);
            assert!(config.instruments_path.is_none());
        });
    }

    #[test]
    fn loads_credentials_from_env() {
        with_env(
            &[
                ("SMARTSTREAM_AUTH_TOKEN", "jwt"),
                ("SMARTSTREAM_API_KEY", "key"),
                ("SMARTSTREAM_CLIENT_CODE", "A123"),
                ("SMARTSTREAM_FEED_TOKEN", "feed"),
            ],
            || {
                let creds = fetch_config().unwrap().feed.credentials.unwrap();
                assert_eq!(creds.auth_token.as_str(), "jwt");
                assert_eq!(creds.api_key.as_str(), "key");
                assert_eq!(creds.client_code, "A123");
                assert_eq!(creds.feed_token.as_str(), "feed");
                assert!(!format!("{creds:?}").contains("jwt"));
            },
        );
    }

    #[test]
    fn rejects_partial_credentials() {
        with_env(
            &[
                ("SMARTSTREAM_AUTH_TOKEN", "jwt"),
                ("SMARTSTREAM_API_KEY", "key"),
            ],
            || {
                let err = fetch_config().unwrap_err();
                let msg = err.to_string();
                assert!(msg.contains("SMARTSTREAM_CLIENT_CODE"));
                assert!(msg.contains("SMARTSTREAM_FEED_TOKEN"));
            },
        );
    }

    #[test]
    fn fanout_settings() {
        with_env(
            &[
                ("SMARTSTREAM_FANOUT", "true"),
                ("SMARTSTREAM_FANOUT_PORT", "6001"),
                ("SMARTSTREAM_FANOUT_STAMPED", "1"),
            ],
            || {
                let config = fetch_config().unwrap();
                assert!(config.fanout.enabled);
                assert!(config.fanout.stamped);
                assert_eq!(config.fanout.port, 6001);
            },
        );
    }

    #[test]
    fn rejects_bad_numbers_and_flags() {
        with_env(&[("SMARTSTREAM_FANOUT_PORT", "99999")], || {
            assert!(fetch_config().is_err());
        });
        with_env(&[("SMARTSTREAM_FANOUT", "maybe")], || {
            assert!(fetch_config().is_err());
        });
    }

    #[test]
    fn empty_values_treated_as_absent() {
        with_env(
            &[
                ("SMARTSTREAM_WEBSOCKET_URL", ""),
                ("SMARTSTREAM_AUTH_TOKEN", ""),
                ("SMARTSTREAM_HEARTBEAT_SECS", ""),
            ],
            || {
                let config = fetch_config().unwrap();
                assert_eq!(config.feed.websocket_url, DEFAULT_WEBSOCKET_URL);
                assert!(config.feed.credentials.is_none());
                assert_eq!(config.feed.heartbeat_interval, Duration::from_secs(10));
            },
        );
    }
}
