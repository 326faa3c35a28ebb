//! Runtime configuration loaded from environment variables

use std::time::Duration;

/// Longest accepted `ROUND_SECONDS` (one day)
pub const MAX_ROUND_SECONDS: u64 = 24 * 60 * 60;

/// Rules of a round plus input limits
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Round duration in seconds
    pub round_seconds: u64,
    /// Guesses each player gets per round
    pub max_attempts: u32,
    /// Points awarded to the winner of a round
    pub win_points: u32,
    pub max_name_chars: usize,
    pub max_question_chars: usize,
    pub max_answer_chars: usize,
    pub max_guess_chars: usize,
    pub max_session_id_chars: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_seconds: 60,
            max_attempts: 3,
            win_points: 10,
            max_name_chars: 24,
            max_question_chars: 200,
            max_answer_chars: 100,
            max_guess_chars: 100,
            max_session_id_chars: 32,
        }
    }
}

impl GameConfig {
    /// Load config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            round_seconds: env_number_capped(
                "ROUND_SECONDS",
                defaults.round_seconds,
                MAX_ROUND_SECONDS,
            ),
            max_attempts: env_number("MAX_ATTEMPTS", defaults.max_attempts),
            win_points: env_number("WIN_POINTS", defaults.win_points),
            ..defaults
        }
    }

    pub fn round_duration(&self) -> Duration {
        Duration::from_secs(self.round_seconds)
    }
}

/// Process-level settings (listen port, static asset directory)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            static_dir: "static".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let static_dir = std::env::var("STATIC_DIR")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.static_dir);

        Self {
            port: env_number("PORT", defaults.port),
            static_dir,
        }
    }
}

/// Parse a positive number from `key`; missing or invalid values yield `default`
fn env_number<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value > T::default() => value,
            _ => {
                tracing::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

/// Like `env_number`, but values above `max` are rejected too
fn env_number_capped<T>(key: &str, default: T, max: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    let value = env_number(key, default);
    if value > max {
        tracing::warn!("{}={} exceeds {}, using {}", key, value, max, default);
        return default;
    }
    value
}
