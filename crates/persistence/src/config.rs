//! Autosave configuration loaded from environment variables.

/// Background tick interval used when nothing else is configured.
pub const DEFAULT_AUTOSAVE_INTERVAL: std::time::Duration = std::time::Duration::from_millis(3000);

/// Env var holding the tick interval in milliseconds.
pub const INTERVAL_ENV: &str = "PHANTOM_AUTOSAVE_INTERVAL_MS";
/// Env flag selecting atomic (temp file + rename) side-file writes.
pub const ATOMIC_SWAP_ENV: &str = "PHANTOM_ATOMIC_SWAP";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    pub interval: std::time::Duration,
    pub write_mode: io::WriteMode,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_AUTOSAVE_INTERVAL,
            write_mode: io::WriteMode::Atomic,
        }
    }
}

/// Parse a boolean-like environment flag value.
///
/// # Supported Values
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl AutosaveConfig {
    /// Load configuration from environment variables.
    ///
    /// Missing or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`AutosaveConfig::from_env`] but reads through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let interval = lookup(INTERVAL_ENV)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|millis| *millis > 0)
            .map_or(defaults.interval, std::time::Duration::from_millis);

        let atomic = lookup(ATOMIC_SWAP_ENV)
            .and_then(|raw| parse_env_flag(&raw))
            .unwrap_or(true);

        Self {
            interval,
            write_mode: if atomic {
                io::WriteMode::Atomic
            } else {
                io::WriteMode::Truncate
            },
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: std::time::Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_write_mode(mut self, write_mode: io::WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }
}
