//! Runtime-tunable synchronization constants.
//!
//! The defaults are the tolerances animation playback needs: a seek is
//! avoided while the decoded position is within three frame-durations of the
//! target, a pending seek is abandoned after twelve frame-durations, and the
//! element's playback rate is only ever adjusted within [0.125, 4.0].
//!
//! Each value can be overridden through a `VIDSYNC_*` environment variable,
//! read once at first access; call [`Config::reload`] to pick up changes.

use lazy_static::lazy_static;
use std::env;
use std::sync::RwLock;

lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::new());
}

/// Tuning knobs for the video position synchronizer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frames of drift tolerated before a seek is forced.
    pub tolerance_frames: u32,
    /// Frame-durations to wait on a pending seek before giving up.
    pub seek_timeout_frames: u32,
    /// Lower clamp for the element's playback rate.
    pub min_playback_rate: f64,
    /// Upper clamp for the element's playback rate.
    pub max_playback_rate: f64,
    /// Number of `prepare` observations kept for rate estimation.
    pub rate_history_len: usize,
}

impl Config {
    fn new() -> Self {
        let mut config = Config {
            tolerance_frames: 3,
            seek_timeout_frames: 12,
            min_playback_rate: 0.125,
            max_playback_rate: 4.0,
            rate_history_len: 5,
        };

        if let Some(v) = env_parse::<u32>("VIDSYNC_TOLERANCE_FRAMES") {
            config.tolerance_frames = v;
        }
        if let Some(v) = env_parse::<u32>("VIDSYNC_SEEK_TIMEOUT_FRAMES") {
            config.seek_timeout_frames = v;
        }
        if let Some(v) = env_parse::<f64>("VIDSYNC_MIN_PLAYBACK_RATE") {
            config.min_playback_rate = v;
        }
        if let Some(v) = env_parse::<f64>("VIDSYNC_MAX_PLAYBACK_RATE") {
            config.max_playback_rate = v;
        }
        if let Some(v) = env_parse::<usize>("VIDSYNC_RATE_HISTORY_LEN") {
            config.rate_history_len = v.max(2);
        }

        config
    }

    /// Re-reads the environment and replaces the global configuration.
    pub fn reload() {
        let new_config = Config::new();
        if let Ok(mut config) = CONFIG.write() {
            *config = new_config;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Returns a snapshot of the current configuration.
pub fn get() -> Config {
    CONFIG.read().expect("config lock poisoned").clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tolerances() {
        let config = Config::new();
        assert_eq!(config.tolerance_frames, 3);
        assert_eq!(config.seek_timeout_frames, 12);
        assert_eq!(config.min_playback_rate, 0.125);
        assert_eq!(config.max_playback_rate, 4.0);
        assert_eq!(config.rate_history_len, 5);
    }
}
