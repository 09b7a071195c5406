//! Engine configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`), with sensible defaults when a
//! variable is not set.

use crate::domain::ClockSettings;

/// Bounds for the scheduler tick interval: sub-second so a level advances
/// within one tick of the true boundary, never early.
const TICK_INTERVAL_BOUNDS_MS: (u64, u64) = (250, 1_000);

/// Top-level engine configuration.
///
/// Loaded once at startup via [`EngineConfig::from_env`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Milliseconds between scheduler passes (clamped to 250–1000).
    pub tick_interval_ms: u64,

    /// Snapshot the aggregate every N events (0 disables snapshots).
    pub snapshot_every_events: u64,

    /// Capacity of the notification broadcast channel.
    pub notifier_capacity: usize,

    /// Bounded timeout for every durable store call, in milliseconds.
    pub store_timeout_ms: u64,

    /// Default per-tournament settings applied when a command omits them.
    pub default_settings: ClockSettings,
}

impl EngineConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is missing or unparsable.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let tick_interval_ms = parse_env("TICK_INTERVAL_MS", 500)
            .clamp(TICK_INTERVAL_BOUNDS_MS.0, TICK_INTERVAL_BOUNDS_MS.1);
        let snapshot_every_events = parse_env("SNAPSHOT_EVERY_EVENTS", 100);
        let notifier_capacity = parse_env("NOTIFIER_CAPACITY", 10_000);
        let store_timeout_ms = parse_env("STORE_TIMEOUT_MS", 5_000);

        let default_settings = ClockSettings {
            auto_advance: parse_env_bool("DEFAULT_AUTO_ADVANCE", true),
            warning_thresholds_minutes: parse_env_list("DEFAULT_WARNING_THRESHOLDS_MINUTES")
                .unwrap_or_else(|| vec![5, 1]),
            drift_correction_threshold_ms: parse_env("DEFAULT_DRIFT_THRESHOLD_MS", 500),
            sync_interval_ms: parse_env("DEFAULT_SYNC_INTERVAL_MS", 10_000),
            breaks_enabled: parse_env_bool("DEFAULT_BREAKS_ENABLED", true),
        };

        Self {
            tick_interval_ms,
            snapshot_every_events,
            notifier_capacity,
            store_timeout_ms,
            default_settings,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            snapshot_every_events: 100,
            notifier_capacity: 10_000,
            store_timeout_ms: 5_000,
            default_settings: ClockSettings::default(),
        }
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("TRUE") | Some("1") => true,
        Some("false") | Some("FALSE") | Some("0") => false,
        _ => default,
    }
}

/// Parses a comma-separated environment variable as a list of minute
/// marks (e.g. `"10,5,1"`).
fn parse_env_list(key: &str) -> Option<Vec<u32>> {
    std::env::var(key)
        .ok()
        .and_then(|raw| parse_minutes_list(&raw))
}

/// Parses `"10, 5,1"` into `[10, 5, 1]`, dropping unparsable entries.
/// Returns `None` when nothing parses, so the default applies.
fn parse_minutes_list(raw: &str) -> Option<Vec<u32>> {
    let values: Vec<u32> = raw
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect();
    if values.is_empty() { None } else { Some(values) }
}
