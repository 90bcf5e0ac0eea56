use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{FlashConfig, HitSyncError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sync: SyncConfig,
    pub overlay: FlashConfig,
    pub replay: ReplayConfig,
}

impl AppConfig {
    /// Reads a JSON config file. Omitted fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parses and validates a JSON config.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.sync.validate()?;
        self.replay.validate()
    }
}

/// What the engine does with cursors after a backward jump of the clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeekPolicy {
    /// Rewind to the first event; everything up to the new position fires
    /// again on the same tick.
    #[default]
    Replay,
    /// Rewind, then treat everything up to the new position as already fired.
    Skip,
}

/// Configuration of the synchronisation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Backward movement smaller than this, in seconds, is clock jitter and
    /// not a seek.
    pub discontinuity_epsilon: f64,
    pub seek_policy: SeekPolicy,
}

pub const DEFAULT_DISCONTINUITY_EPSILON: f64 = 0.15;

impl SyncConfig {
    /// Rejects an epsilon that would make forward ticks look like seeks
    /// (negative) or hide every seek (NaN).
    pub fn validate(&self) -> Result<()> {
        let epsilon = self.discontinuity_epsilon;
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(HitSyncError::InvalidInput(
                "discontinuity_epsilon must be a finite, non-negative number of seconds",
            ));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            discontinuity_epsilon: DEFAULT_DISCONTINUITY_EPSILON,
            seek_policy: SeekPolicy::Replay,
        }
    }
}

/// Settings for the simulated render loop of the replay driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub fps: u32,
    /// Extra playback after the last event when the duration is unknown.
    pub tail_seconds: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            tail_seconds: 1.0,
        }
    }
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(HitSyncError::InvalidInput("fps must be greater than zero"));
        }
        if !self.tail_seconds.is_finite() || self.tail_seconds < 0.0 {
            return Err(HitSyncError::InvalidInput(
                "tail_seconds must be a finite, non-negative number of seconds",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            AppConfig::from_json(r#"{"sync": {"seek_policy": "skip"}, "replay": {"fps": 30}}"#)
                .unwrap();

        assert_eq!(config.sync.seek_policy, SeekPolicy::Skip);
        assert_eq!(
            config.sync.discontinuity_epsilon,
            DEFAULT_DISCONTINUITY_EPSILON
        );
        assert_eq!(config.replay.fps, 30);
        assert_eq!(config.replay.tail_seconds, 1.0);
        assert_eq!(config.overlay.kick_decay_seconds, 0.15);
    }

    #[test]
    fn empty_object_is_the_default() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.sync.seek_policy, SeekPolicy::Replay);
        assert_eq!(config.replay.fps, 60);
    }

    #[test]
    fn rejects_negative_epsilon() {
        let err = AppConfig::from_json(r#"{"sync": {"discontinuity_epsilon": -0.5}}"#).unwrap_err();
        assert!(matches!(err, HitSyncError::InvalidInput(_)));
    }

    #[test]
    fn rejects_non_finite_epsilon() {
        let config = SyncConfig {
            discontinuity_epsilon: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SyncConfig {
            discontinuity_epsilon: f64::INFINITY,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(SyncConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_fps() {
        let err = AppConfig::from_json(r#"{"replay": {"fps": 0}}"#).unwrap_err();
        assert!(matches!(err, HitSyncError::InvalidInput(_)));
    }

    #[test]
    fn reports_missing_file() {
        let err = AppConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, HitSyncError::Io(_)));
    }
}
