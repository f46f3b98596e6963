use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse tuning: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid tuning: {0}")]
    Invalid(String),
}

/// Tunables governing the player's queueing and draw-wait behaviour.
///
/// The defaults match the shipped pipeline; a TOML form exists so deployments
/// can adjust them without recompiling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    /// Backpressure ceiling: processing requests allowed in flight before new
    /// ones are rejected outright.
    pub max_pending_frames: usize,
    /// Sleep between draw attempts while waiting for the engine to finish a
    /// frame. Bounds the busy-wait; pause/stop still break the wait early.
    #[serde(deserialize_with = "deserialize_backoff")]
    pub draw_backoff: Duration,
    /// Name given to the render worker thread.
    pub worker_thread_name: String,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            max_pending_frames: 5,
            draw_backoff: Duration::from_millis(10),
            worker_thread_name: "fx-render".to_string(),
        }
    }
}

impl PlayerTuning {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let tuning: PlayerTuning = toml::from_str(input)?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pending_frames == 0 {
            return Err(ConfigError::Invalid(
                "max_pending_frames must be at least 1".into(),
            ));
        }
        if self.worker_thread_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "worker_thread_name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn deserialize_backoff<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of milliseconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_millis(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_millis(v as u64))
        }
    }

    deserializer.deserialize_any(Visitor)
}
