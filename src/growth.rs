// Stagnation-triggered growth of the triangle count
//
// The triangle count is an expressiveness budget. Starting small keeps early
// steps cheap; once a window of steps fails to improve the global best by a
// configured fraction, every particle gets more triangles.

use crate::config::SwarmConfig;
use crate::error::SwarmError;
use crate::particle::random_triangles;
use crate::swarm::Swarm;

use rand::Rng;

/// Start of the current observation window
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GrowthWindow {
    pub start_fitness: f64,
    pub start_iteration: u64,
}

/// Relative improvement from `start` to `current`
///
/// `None` unless `start` is finite and positive and `current` is finite; a
/// zero or infinite baseline has no meaningful ratio.
pub fn relative_improvement(start: f64, current: f64) -> Option<f64> {
    if start.is_finite() && start > 0.0 && current.is_finite() {
        Some((start - current) / start)
    } else {
        None
    }
}

/// Watches the global-best trend and decides when the swarm should grow
#[derive(Clone, Copy, Debug, Default)]
pub struct GrowthController {
    window: Option<GrowthWindow>,
}

impl GrowthController {
    pub fn new() -> Self {
        Self::default()
    }

    /// The open window, if the global best has been finite since the last reset
    pub fn window(&self) -> Option<GrowthWindow> {
        self.window
    }

    /// Forget the current window; the next finite global best opens a new one
    pub fn reset(&mut self) {
        self.window = None;
    }

    /// Feed the state after a step; returns how many triangles to add, if any
    ///
    /// Once `triangle_stagnation_threshold` steps have passed since the window
    /// opened, the window is judged and then restarted from the current best
    /// whether or not growth is requested.
    pub fn observe(
        &mut self,
        iteration: u64,
        best_fitness: f64,
        num_triangles: usize,
        config: &SwarmConfig,
    ) -> Option<usize> {
        // **Rust Concept: let-else**
        // Destructure the window or handle the "no window yet" case and return
        // early, keeping the main path unindented.
        let Some(window) = self.window else {
            if best_fitness.is_finite() {
                self.window = Some(GrowthWindow {
                    start_fitness: best_fitness,
                    start_iteration: iteration,
                });
            }
            return None;
        };

        if iteration.saturating_sub(window.start_iteration) < config.triangle_stagnation_threshold {
            return None;
        }

        self.window = Some(GrowthWindow {
            start_fitness: best_fitness,
            start_iteration: iteration,
        });

        let improvement = relative_improvement(window.start_fitness, best_fitness)?;
        log::debug!(
            "growth window {}..{}: {:.3}% improvement",
            window.start_iteration,
            iteration,
            improvement * 100.0
        );
        if improvement >= config.min_improvement_fraction() {
            return None;
        }

        let room = config.max_triangles_cap.saturating_sub(num_triangles);
        let amount = config.triangle_increment.min(room);
        (amount > 0).then_some(amount)
    }
}

// Growth mutates the whole swarm, so it lives in its own impl block
impl<G: Rng> Swarm<G> {
    /// Consult the growth controller and grow if it asks for it
    pub(crate) fn run_growth(&mut self) -> Option<usize> {
        let amount = self.growth.observe(
            self.iteration,
            self.global_best_fitness,
            self.num_triangles,
            &self.config,
        )?;

        match self.grow(amount) {
            Ok(()) => {
                // Old scores are not comparable with the new dimensionality
                self.growth.reset();
                log::info!(
                    "iteration {}: grew to {} triangles",
                    self.iteration,
                    self.num_triangles
                );
                Some(amount)
            }
            Err(err) => {
                log::warn!("skipping growth at iteration {}: {err}", self.iteration);
                None
            }
        }
    }

    /// Append `amount` fresh triangles to every particle and to the global best
    ///
    /// All lengths are checked before anything changes, so a failure leaves
    /// the swarm exactly as it was.
    pub(crate) fn grow(&mut self, amount: usize) -> Result<(), SwarmError> {
        let expected = self.num_triangles;

        if let Some(bad) = self
            .particles
            .iter()
            .find(|p| !p.is_consistent() || p.num_triangles() != expected)
        {
            return Err(SwarmError::DimensionMismatch {
                expected,
                actual: bad.num_triangles(),
            });
        }
        if let Some(best) = &self.global_best {
            if best.len() != expected {
                return Err(SwarmError::DimensionMismatch {
                    expected,
                    actual: best.len(),
                });
            }
        }

        for particle in &mut self.particles {
            let fresh = random_triangles(amount, &self.bounds, &mut self.rng);
            particle.extend(&fresh, &mut self.rng);
        }

        if let Some(best) = &mut self.global_best {
            best.extend(random_triangles(amount, &self.bounds, &mut self.rng));
        }
        self.global_best_fitness = f64::INFINITY;
        self.num_triangles += amount;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::tests::small_config;
    use image::{Rgba, RgbaImage};

    fn growth_config(threshold: u64, percent: f64) -> SwarmConfig {
        SwarmConfig {
            incremental_triangles: true,
            triangle_stagnation_threshold: threshold,
            triangle_stagnation_percent: percent,
            ..SwarmConfig::default()
        }
    }

    #[test]
    fn test_relative_improvement_guards() {
        assert_eq!(relative_improvement(100.0, 75.0), Some(0.25));
        assert_eq!(relative_improvement(0.0, 0.0), None);
        assert_eq!(relative_improvement(f64::INFINITY, 10.0), None);
        assert_eq!(relative_improvement(10.0, f64::INFINITY), None);
    }

    #[test]
    fn test_window_opens_on_first_finite_best() {
        let config = growth_config(5, 2.0);
        let mut controller = GrowthController::new();

        assert_eq!(controller.observe(1, f64::INFINITY, 10, &config), None);
        assert!(controller.window().is_none());

        assert_eq!(controller.observe(2, 500.0, 10, &config), None);
        assert_eq!(
            controller.window(),
            Some(GrowthWindow {
                start_fitness: 500.0,
                start_iteration: 2
            })
        );
    }

    #[test]
    fn test_grows_when_improvement_too_small() {
        let config = growth_config(5, 2.0);
        let mut controller = GrowthController::new();
        controller.observe(0, 1000.0, 10, &config);

        // Not yet at the threshold
        assert_eq!(controller.observe(4, 995.0, 10, &config), None);
        // 0.5% improvement over the window, below 2%
        assert_eq!(controller.observe(5, 995.0, 10, &config), Some(1));
        assert_eq!(controller.window().map(|w| w.start_iteration), Some(5));
    }

    #[test]
    fn test_no_growth_when_improving_but_window_still_resets() {
        let config = growth_config(5, 2.0);
        let mut controller = GrowthController::new();
        controller.observe(0, 1000.0, 10, &config);

        // 10% improvement
        assert_eq!(controller.observe(5, 900.0, 10, &config), None);
        assert_eq!(
            controller.window(),
            Some(GrowthWindow {
                start_fitness: 900.0,
                start_iteration: 5
            })
        );
    }

    #[test]
    fn test_zero_baseline_is_skipped() {
        let config = growth_config(1, 100.0);
        let mut controller = GrowthController::new();
        controller.observe(0, 0.0, 10, &config);

        assert_eq!(controller.observe(1, 0.0, 10, &config), None);
    }

    #[test]
    fn test_growth_respects_cap() {
        let config = SwarmConfig {
            triangle_increment: 5,
            max_triangles_cap: 12,
            ..growth_config(1, 100.0)
        };
        let mut controller = GrowthController::new();

        controller.observe(0, 100.0, 10, &config);
        assert_eq!(controller.observe(1, 99.0, 10, &config), Some(2));

        controller.observe(2, 100.0, 12, &config);
        assert_eq!(controller.observe(3, 99.0, 12, &config), None);
    }

    #[test]
    fn test_swarm_grows_uniformly() {
        let config = SwarmConfig {
            triangle_increment: 2,
            ..small_config(4, 3)
        };
        let config = SwarmConfig {
            incremental_triangles: true,
            triangle_stagnation_threshold: 5,
            // Impossible to satisfy, so every window grows
            triangle_stagnation_percent: 100.0,
            ..config
        };
        let mut swarm = Swarm::with_seed(8, 8, config, 21).unwrap();
        swarm
            .set_target(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255])))
            .unwrap();

        // Window opens after step 1; five steps later the swarm grows
        for _ in 0..5 {
            let report = swarm.step().unwrap();
            assert_eq!(report.grown, None);
            assert_eq!(swarm.num_triangles(), 3);
        }

        let report = swarm.step().unwrap();
        assert_eq!(report.iteration, 6);
        assert_eq!(report.grown, Some(2));
        assert_eq!(swarm.num_triangles(), 5);

        // Comparability is reset everywhere
        assert_eq!(swarm.best_fitness(), f64::INFINITY);
        assert_eq!(report.best_fitness, f64::INFINITY);
        assert_eq!(swarm.best_triangles().map(<[_]>::len), Some(5));
        for particle in swarm.particles() {
            assert_eq!(particle.num_triangles(), 5);
            assert_eq!(particle.velocity().len(), 50);
            assert_eq!(particle.best_position().len(), 5);
            assert_eq!(particle.best_fitness(), f64::INFINITY);
        }
        assert!(swarm.is_consistent());

        // Next step re-evaluates at the new size
        swarm.step().unwrap();
        assert!(swarm.best_fitness().is_finite());
        assert!(swarm.is_consistent());
    }

    #[test]
    fn test_inconsistent_swarm_is_left_alone() {
        let mut swarm = Swarm::with_seed(8, 8, small_config(3, 2), 22).unwrap();
        swarm.particles[1].velocity.pop();

        assert!(swarm.grow(3).is_err());
        assert_eq!(swarm.num_triangles(), 2);
        assert_eq!(swarm.particles[0].num_triangles(), 2);
    }
}
