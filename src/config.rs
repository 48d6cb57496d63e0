//! Environment configuration and window options.

use std::env;
use std::time::Duration;

use crate::core::color::{ConsoleColor, EffectiveColors, FrameCharSets};
use crate::core::control::validate_cursor_size;
use crate::core::keybindings::{KeyCombination, WindowKeyBindings};
use crate::error::Result;

pub const DEFAULT_LOG_FILTER: &str = "console_controls=info";
pub const DEFAULT_POLL_MS: u64 = 50;

#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// `CONCONTROLS_LOG`: log file path; file logging is off when unset.
    pub log_file: Option<String>,
    /// `CONCONTROLS_LOG_FILTER`: `EnvFilter` directives.
    pub log_filter: String,
    /// `CONCONTROLS_NO_ALT_SCREEN=1`: the process backend stays on the primary screen.
    pub no_alt_screen: bool,
    /// `CONCONTROLS_POLL_MS`: listener poll interval.
    pub poll_interval: Duration,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            log_file: env_string_opt("CONCONTROLS_LOG"),
            log_filter: env_string_opt("CONCONTROLS_LOG_FILTER")
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            no_alt_screen: env_flag("CONCONTROLS_NO_ALT_SCREEN"),
            poll_interval: Duration::from_millis(
                env_u64_opt("CONCONTROLS_POLL_MS")
                    .filter(|ms| *ms > 0)
                    .unwrap_or(DEFAULT_POLL_MS),
            ),
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            no_alt_screen: false,
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn env_u64_opt(key: &str) -> Option<u64> {
    env_string_opt(key).and_then(|value| value.trim().parse().ok())
}

/// Settings applied when a window is created.
#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub default_colors: EffectiveColors,
    /// `None` keeps the backend's cursor size.
    pub default_cursor_size: Option<u8>,
    pub key_bindings: WindowKeyBindings,
    pub frame_char_sets: FrameCharSets,
    pub poll_interval: Duration,
    pub title: Option<String>,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            default_colors: EffectiveColors::default(),
            default_cursor_size: None,
            key_bindings: WindowKeyBindings::default(),
            frame_char_sets: FrameCharSets::default(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
            title: None,
        }
    }
}

impl WindowOptions {
    pub fn from_env(config: &EnvConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            ..Self::default()
        }
    }

    pub fn with_foreground(mut self, color: ConsoleColor) -> Self {
        self.default_colors.foreground = color;
        self
    }

    pub fn with_background(mut self, color: ConsoleColor) -> Self {
        self.default_colors.background = color;
        self
    }

    pub fn with_border_color(mut self, color: ConsoleColor) -> Self {
        self.default_colors.border = color;
        self
    }

    pub fn with_cursor_size(mut self, size: u8) -> Result<Self> {
        self.default_cursor_size = Some(validate_cursor_size(size)?);
        Ok(self)
    }

    pub fn with_close_key(mut self, key: Option<KeyCombination>) -> Self {
        self.key_bindings.close = key;
        self
    }

    pub fn with_switch_screen_key(mut self, key: Option<KeyCombination>) -> Self {
        self.key_bindings.switch_screen = key;
        self
    }

    pub fn with_frame_char_sets(mut self, sets: FrameCharSets) -> Self {
        self.frame_char_sets = sets;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{EnvConfig, WindowOptions, DEFAULT_LOG_FILTER};
    use std::env;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.previous {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env lock poisoned")
    }

    fn set_env_guard(key: &'static str, value: Option<&str>) -> EnvGuard {
        let previous = env::var(key).ok();
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
        EnvGuard { key, previous }
    }

    #[test]
    fn env_defaults() {
        let _lock = env_lock();
        let _g1 = set_env_guard("CONCONTROLS_LOG", None);
        let _g2 = set_env_guard("CONCONTROLS_LOG_FILTER", None);
        let _g3 = set_env_guard("CONCONTROLS_NO_ALT_SCREEN", None);
        let _g4 = set_env_guard("CONCONTROLS_POLL_MS", None);

        let config = EnvConfig::from_env();
        assert!(config.log_file.is_none());
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert!(!config.no_alt_screen);
        assert_eq!(config.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn env_values_are_read() {
        let _lock = env_lock();
        let _g1 = set_env_guard("CONCONTROLS_LOG", Some("/tmp/concontrols.log"));
        let _g2 = set_env_guard("CONCONTROLS_LOG_FILTER", Some("console_controls=debug"));
        let _g3 = set_env_guard("CONCONTROLS_NO_ALT_SCREEN", Some("1"));
        let _g4 = set_env_guard("CONCONTROLS_POLL_MS", Some("15"));

        let config = EnvConfig::from_env();
        assert_eq!(config.log_file.as_deref(), Some("/tmp/concontrols.log"));
        assert_eq!(config.log_filter, "console_controls=debug");
        assert!(config.no_alt_screen);
        assert_eq!(config.poll_interval, Duration::from_millis(15));
        assert_eq!(
            WindowOptions::from_env(&config).poll_interval,
            Duration::from_millis(15)
        );
    }

    #[test]
    fn empty_and_invalid_values_fall_back() {
        let _lock = env_lock();
        let _g1 = set_env_guard("CONCONTROLS_LOG", Some(""));
        let _g2 = set_env_guard("CONCONTROLS_NO_ALT_SCREEN", Some("true"));
        let _g3 = set_env_guard("CONCONTROLS_POLL_MS", Some("soon"));

        let config = EnvConfig::from_env();
        assert!(config.log_file.is_none());
        assert!(!config.no_alt_screen);
        assert_eq!(config.poll_interval, Duration::from_millis(50));

        let _g4 = set_env_guard("CONCONTROLS_POLL_MS", Some("0"));
        assert_eq!(EnvConfig::from_env().poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn cursor_size_option_is_validated() {
        assert!(WindowOptions::default().with_cursor_size(0).is_err());
        let options = WindowOptions::default().with_cursor_size(100).unwrap();
        assert_eq!(options.default_cursor_size, Some(100));
    }
}
