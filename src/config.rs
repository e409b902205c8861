// Configuration for the swarm: defaults, validation and live partial updates

use serde::{Deserialize, Serialize};

use crate::fitness::FitnessNormalization;
use crate::genes::MIN_ALPHA;

/// Rejected configuration values
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Swarm size must be non-zero")]
    ZeroSwarmSize,
    #[error("Triangle count must be non-zero")]
    ZeroTriangles,
    #[error("{field} must be a finite number (got {value})")]
    NotFinite { field: &'static str, value: f64 },
    #[error("max_velocity must be positive (got {0})")]
    NonPositiveVelocity(f64),
}

/// Parameters controlling the swarm
///
/// Every field has a default, and `#[serde(default)]` lets a JSON file name
/// only the fields it wants to change.
///
/// Call `validate` before use: it rejects values that would poison the
/// search with NaN and clamps the rest into range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Triangles per particle at start (and after `reset`)
    pub num_triangles: usize,
    /// Number of particles; fixed for the lifetime of a swarm
    pub swarm_size: usize,

    /// Inertia weight `w`
    pub inertia: f64,
    /// Cognitive coefficient `c1` (pull toward the personal best)
    pub cognitive: f64,
    /// Social coefficient `c2` (pull toward the global best)
    pub social: f64,
    /// Optional per-dimension velocity limit; `None` leaves velocity unbounded
    pub max_velocity: Option<f64>,

    /// Upper bound for triangle opacity, clamped to `[0.1, 1.0]`
    pub max_alpha: f64,
    /// How far (in pixels) vertices may wander outside the canvas
    pub offscreen_margin: f64,

    /// Enable stagnation-triggered growth of the triangle count
    pub incremental_triangles: bool,
    /// Steps per growth window
    pub triangle_stagnation_threshold: u64,
    /// Minimum relative improvement per window, in percent, below which the swarm grows
    pub triangle_stagnation_percent: f64,
    /// Triangles added per growth event
    pub triangle_increment: usize,
    /// Growth never takes the triangle count past this
    pub max_triangles_cap: usize,

    /// Steps without global improvement before the worst particles are reseeded
    pub stagnation_window: u64,
    /// Fraction of the swarm reseeded by a kick
    pub reseed_fraction: f64,
    /// Also re-randomize every particle's velocity on a kick
    pub velocity_reset_on_kick: bool,

    /// Divisor used by the fitness evaluator
    pub normalization: FitnessNormalization,
    /// Evaluate particles on the rayon thread pool
    pub parallel_evaluation: bool,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            num_triangles: 50,
            swarm_size: 20,
            inertia: 0.7,
            cognitive: 1.5,
            social: 1.5,
            max_velocity: None,
            max_alpha: 0.8,
            offscreen_margin: 50.0,
            incremental_triangles: false,
            triangle_stagnation_threshold: 25,
            triangle_stagnation_percent: 2.0,
            triangle_increment: 1,
            max_triangles_cap: 1000,
            stagnation_window: 150,
            reseed_fraction: 0.2,
            velocity_reset_on_kick: true,
            normalization: FitnessNormalization::PerPixel,
            parallel_evaluation: true,
        }
    }
}

fn finite(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NotFinite { field, value })
    }
}

impl SwarmConfig {
    /// Check and sanitize the configuration
    ///
    /// Hard errors: zero swarm size, zero triangles, non-finite numbers and a
    /// non-positive velocity limit. Everything with a natural range is clamped.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.swarm_size == 0 {
            return Err(ConfigError::ZeroSwarmSize);
        }
        if self.num_triangles == 0 {
            return Err(ConfigError::ZeroTriangles);
        }

        self.inertia = finite("inertia", self.inertia)?;
        self.cognitive = finite("cognitive", self.cognitive)?;
        self.social = finite("social", self.social)?;
        self.max_alpha = finite("max_alpha", self.max_alpha)?.clamp(MIN_ALPHA, 1.0);
        self.offscreen_margin = finite("offscreen_margin", self.offscreen_margin)?.max(0.0);
        self.triangle_stagnation_percent =
            finite("triangle_stagnation_percent", self.triangle_stagnation_percent)?.max(0.0);
        self.reseed_fraction = finite("reseed_fraction", self.reseed_fraction)?.clamp(0.0, 1.0);

        if let Some(limit) = self.max_velocity {
            let limit = finite("max_velocity", limit)?;
            if limit <= 0.0 {
                return Err(ConfigError::NonPositiveVelocity(limit));
            }
        }

        self.triangle_stagnation_threshold = self.triangle_stagnation_threshold.max(1);
        self.stagnation_window = self.stagnation_window.max(1);
        self.triangle_increment = self.triangle_increment.max(1);
        self.max_triangles_cap = self.max_triangles_cap.max(self.num_triangles);

        Ok(self)
    }

    /// Apply a partial update and validate the result
    ///
    /// Returns the new configuration without touching `self`, so a rejected
    /// update leaves the caller's state unchanged.
    pub fn apply(&self, update: &ConfigUpdate) -> Result<Self, ConfigError> {
        let mut next = self.clone();

        if let Some(v) = update.inertia {
            next.inertia = v;
        }
        if let Some(v) = update.cognitive {
            next.cognitive = v;
        }
        if let Some(v) = update.social {
            next.social = v;
        }
        if let Some(v) = update.max_velocity {
            next.max_velocity = v;
        }
        if let Some(v) = update.max_alpha {
            next.max_alpha = v;
        }
        if let Some(v) = update.incremental_triangles {
            next.incremental_triangles = v;
        }
        if let Some(v) = update.triangle_stagnation_threshold {
            next.triangle_stagnation_threshold = v;
        }
        if let Some(v) = update.triangle_stagnation_percent {
            next.triangle_stagnation_percent = v;
        }
        if let Some(v) = update.triangle_increment {
            next.triangle_increment = v;
        }
        if let Some(v) = update.max_triangles_cap {
            next.max_triangles_cap = v;
        }
        if let Some(v) = update.stagnation_window {
            next.stagnation_window = v;
        }
        if let Some(v) = update.reseed_fraction {
            next.reseed_fraction = v;
        }
        if let Some(v) = update.velocity_reset_on_kick {
            next.velocity_reset_on_kick = v;
        }

        next.validate()
    }

    /// Minimum relative improvement per growth window as a fraction
    pub fn min_improvement_fraction(&self) -> f64 {
        self.triangle_stagnation_percent / 100.0
    }
}

/// A partial, live configuration change
///
/// Only parameters that can change without reinitializing the swarm appear
/// here; swarm size and starting triangle count need a new swarm.
/// `max_velocity: Some(None)` removes the velocity limit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    pub inertia: Option<f64>,
    pub cognitive: Option<f64>,
    pub social: Option<f64>,
    pub max_velocity: Option<Option<f64>>,
    pub max_alpha: Option<f64>,
    pub incremental_triangles: Option<bool>,
    pub triangle_stagnation_threshold: Option<u64>,
    pub triangle_stagnation_percent: Option<f64>,
    pub triangle_increment: Option<usize>,
    pub max_triangles_cap: Option<usize>,
    pub stagnation_window: Option<u64>,
    pub reseed_fraction: Option<f64>,
    pub velocity_reset_on_kick: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SwarmConfig::default();
        assert_eq!(config.num_triangles, 50);
        assert_eq!(config.swarm_size, 20);
        assert_eq!(config.inertia, 0.7);
        assert_eq!(config.cognitive, 1.5);
        assert_eq!(config.social, 1.5);
        assert_eq!(config.max_alpha, 0.8);
        assert!(!config.incremental_triangles);
        assert_eq!(config.triangle_stagnation_threshold, 25);
        assert_eq!(config.triangle_stagnation_percent, 2.0);
        assert_eq!(config.max_triangles_cap, 1000);
        assert_eq!(config.stagnation_window, 150);
        assert_eq!(config.reseed_fraction, 0.2);
        assert!(config.velocity_reset_on_kick);
        assert_eq!(config.offscreen_margin, 50.0);
        assert_eq!(config.max_velocity, None);

        // Defaults must pass validation untouched
        assert_eq!(config.clone().validate(), Ok(config));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_swarm = SwarmConfig {
            swarm_size: 0,
            ..Default::default()
        };
        assert_eq!(zero_swarm.validate(), Err(ConfigError::ZeroSwarmSize));

        let zero_triangles = SwarmConfig {
            num_triangles: 0,
            ..Default::default()
        };
        assert_eq!(zero_triangles.validate(), Err(ConfigError::ZeroTriangles));

        let nan_inertia = SwarmConfig {
            inertia: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            nan_inertia.validate(),
            Err(ConfigError::NotFinite { field: "inertia", .. })
        ));

        let negative_velocity = SwarmConfig {
            max_velocity: Some(-1.0),
            ..Default::default()
        };
        assert_eq!(
            negative_velocity.validate(),
            Err(ConfigError::NonPositiveVelocity(-1.0))
        );
    }

    #[test]
    fn test_validate_clamps_ranges() {
        let config = SwarmConfig {
            max_alpha: 4.0,
            reseed_fraction: 1.5,
            offscreen_margin: -10.0,
            stagnation_window: 0,
            triangle_stagnation_threshold: 0,
            triangle_increment: 0,
            num_triangles: 80,
            max_triangles_cap: 10,
            ..Default::default()
        }
        .validate()
        .unwrap();

        assert_eq!(config.max_alpha, 1.0);
        assert_eq!(config.reseed_fraction, 1.0);
        assert_eq!(config.offscreen_margin, 0.0);
        assert_eq!(config.stagnation_window, 1);
        assert_eq!(config.triangle_stagnation_threshold, 1);
        assert_eq!(config.triangle_increment, 1);
        assert_eq!(config.max_triangles_cap, 80);

        let low_alpha = SwarmConfig {
            max_alpha: 0.01,
            ..Default::default()
        };
        assert_eq!(low_alpha.validate().unwrap().max_alpha, MIN_ALPHA);
    }

    #[test]
    fn test_apply_partial_update() {
        let config = SwarmConfig::default();
        let update = ConfigUpdate {
            inertia: Some(0.4),
            max_alpha: Some(0.5),
            max_velocity: Some(Some(3.0)),
            ..Default::default()
        };

        let next = config.apply(&update).unwrap();
        assert_eq!(next.inertia, 0.4);
        assert_eq!(next.max_alpha, 0.5);
        assert_eq!(next.max_velocity, Some(3.0));
        // Untouched fields keep their values
        assert_eq!(next.cognitive, config.cognitive);
        assert_eq!(next.swarm_size, config.swarm_size);
    }

    #[test]
    fn test_rejected_update_leaves_original() {
        let config = SwarmConfig::default();
        let update = ConfigUpdate {
            social: Some(f64::INFINITY),
            ..Default::default()
        };
        assert!(config.apply(&update).is_err());
        assert_eq!(config, SwarmConfig::default());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SwarmConfig =
            serde_json::from_str(r#"{ "num_triangles": 12, "normalization": "per-channel" }"#)
                .unwrap();
        assert_eq!(config.num_triangles, 12);
        assert_eq!(config.normalization, FitnessNormalization::PerChannel);
        assert_eq!(config.swarm_size, 20);
    }
}
