//! Engine configuration
//!
//! Every tunable the composition uses, with defaults matching the piece as
//! performed: loops in the background, concrete one-shots peeking over them,
//! instrumentals in the foreground, 3 dB apart. Values arrive either as a
//! plain `Default` or from JSON; both paths go through `validate` before the
//! Director will accept them.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Loop bed volume, dB.
    pub loop_volume_db: f32,
    /// Concrete one-shot volume, dB.
    pub concrete_volume_db: f32,
    /// Instrumental one-shot volume, dB.
    pub instrumental_volume_db: f32,
    /// Drone bed volume, dB.
    pub drone_volume_db: f32,

    /// Fade-in/out applied to loop and drone players, seconds.
    pub loop_fade: f64,
    /// Fade-in/out applied to one-shot players, seconds.
    pub one_shot_fade: f64,
    /// Extra time past a stop point so effect tails can ring out, seconds.
    pub tail_margin: f64,

    /// How often a freshly played buffer runs backwards.
    pub reverse_probability: f64,
    /// Chance per loop tick of rotating the oldest loop voice.
    pub loop_change_probability: f64,
    /// Chance per one-shot tick of firing an available voice.
    pub one_shot_probability: f64,

    /// Concurrent loop voices.
    pub loops_count: usize,
    /// Concurrent one-shot voices per manager.
    pub one_shots_count: usize,
    /// Concurrent drone voices.
    pub drones_count: usize,

    /// Loop choice tick interval, clock seconds. First fire after one interval.
    pub loop_tick_interval: f64,
    /// One-shot choice tick interval, clock seconds.
    pub one_shot_tick_interval: f64,
    /// Delay before the first one-shot tick, staggering them behind the loops.
    pub one_shot_start_delay: f64,

    /// How many recently chosen keys are excluded from re-selection.
    pub history_window: usize,

    /// Whether the drone bed runs at all. Off by default.
    pub drones_enabled: bool,
    /// Playback-rate range for drone grain players.
    pub drone_rate_min: f64,
    pub drone_rate_max: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            loop_volume_db: -12.0,
            concrete_volume_db: -9.0,
            instrumental_volume_db: -6.0,
            drone_volume_db: -12.0,
            loop_fade: 4.0,
            one_shot_fade: 0.25,
            tail_margin: 3.0,
            reverse_probability: 0.25,
            loop_change_probability: 0.5,
            one_shot_probability: 0.25,
            loops_count: 2,
            one_shots_count: 2,
            drones_count: 2,
            loop_tick_interval: 20.0,
            one_shot_tick_interval: 2.0,
            one_shot_start_delay: 10.0,
            history_window: 2,
            drones_enabled: false,
            drone_rate_min: 0.1,
            drone_rate_max: 0.3,
        }
    }
}

impl EngineConfig {
    /// Parse a config from JSON. Missing fields fall back to the defaults;
    /// the result is validated before being returned.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would be programming or data errors at
    /// runtime: out-of-range probabilities, empty pools, degenerate timing.
    pub fn validate(&self) -> EngineResult<()> {
        let probabilities = [
            ("reverse_probability", self.reverse_probability),
            ("loop_change_probability", self.loop_change_probability),
            ("one_shot_probability", self.one_shot_probability),
        ];
        for (field, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, format!("{} is not a probability", value)));
            }
        }

        let counts = [
            ("loops_count", self.loops_count),
            ("one_shots_count", self.one_shots_count),
            ("drones_count", self.drones_count),
        ];
        for (field, value) in counts {
            if value == 0 {
                return Err(invalid(field, "pool must hold at least one voice".into()));
            }
        }

        let intervals = [
            ("loop_tick_interval", self.loop_tick_interval),
            ("one_shot_tick_interval", self.one_shot_tick_interval),
        ];
        for (field, value) in intervals {
            if value <= 0.0 {
                return Err(invalid(field, format!("{} is not a usable interval", value)));
            }
        }

        let non_negatives = [
            ("loop_fade", self.loop_fade),
            ("one_shot_fade", self.one_shot_fade),
            ("tail_margin", self.tail_margin),
            ("one_shot_start_delay", self.one_shot_start_delay),
        ];
        for (field, value) in non_negatives {
            if value < 0.0 {
                return Err(invalid(field, format!("{} is negative", value)));
            }
        }

        if self.drone_rate_min <= 0.0 || self.drone_rate_min > self.drone_rate_max {
            return Err(invalid(
                "drone_rate_min",
                format!(
                    "range {}..{} is not usable",
                    self.drone_rate_min, self.drone_rate_max
                ),
            ));
        }

        Ok(())
    }

    /// Loop swap completions run after the fade plus the effect tail.
    pub fn loop_swap_delay(&self) -> f64 {
        self.loop_fade + self.tail_margin
    }
}

fn invalid(field: &'static str, reason: String) -> EngineError {
    EngineError::InvalidConfig { field, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.loop_volume_db, -12.0);
        assert_eq!(config.concrete_volume_db, -9.0);
        assert_eq!(config.instrumental_volume_db, -6.0);
        assert_eq!(config.loop_swap_delay(), 7.0);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config =
            EngineConfig::from_json(r#"{ "loops_count": 3, "drones_enabled": true }"#).unwrap();
        assert_eq!(config.loops_count, 3);
        assert!(config.drones_enabled);
        assert_eq!(config.loop_tick_interval, 20.0);
    }

    #[test]
    fn test_bad_probability_rejected() {
        let err = EngineConfig::from_json(r#"{ "loop_change_probability": 1.5 }"#).unwrap_err();
        assert!(err.to_string().contains("loop_change_probability"));
    }

    #[test]
    fn test_empty_pool_rejected() {
        let mut config = EngineConfig::default();
        config.one_shots_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_degenerate_drone_range_rejected() {
        let mut config = EngineConfig::default();
        config.drone_rate_min = 0.5;
        config.drone_rate_max = 0.2;
        assert!(config.validate().is_err());

        config.drone_rate_min = 0.0;
        config.drone_rate_max = 0.3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(EngineConfig::from_json("{ not json").is_err());
    }
}
