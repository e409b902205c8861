// Stagnation kick: reseed the worst particles when the global best stalls
use crate::swarm::Swarm;

use rand::Rng;

/// Number of particles a kick reseeds
///
/// `ceil(swarm_size * fraction)`, but always at least one and never more
/// than the swarm.
pub fn reseed_count(swarm_size: usize, fraction: f64) -> usize {
    let count = (swarm_size as f64 * fraction).ceil() as usize;
    count.clamp(1, swarm_size.max(1))
}

/// Counts steps without global improvement
#[derive(Clone, Copy, Debug, Default)]
pub struct StagnationKicker {
    stagnant: u64,
}

impl StagnationKicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one step; returns `true` once `window` stagnant steps have piled up
    pub fn observe(&mut self, improved: bool, window: u64) -> bool {
        if improved {
            self.stagnant = 0;
        } else {
            self.stagnant += 1;
        }
        self.stagnant >= window
    }

    pub fn stagnant_iterations(&self) -> u64 {
        self.stagnant
    }

    pub fn reset(&mut self) {
        self.stagnant = 0;
    }
}

impl<G: Rng> Swarm<G> {
    /// Count the step and kick the swarm when it has stalled for too long
    pub(crate) fn run_kicker(&mut self, improved: bool) -> Option<usize> {
        if !self.kicker.observe(improved, self.config.stagnation_window) {
            return None;
        }

        let reseeded = self.kick();
        self.kicker.reset();
        log::info!(
            "iteration {}: no improvement for {} steps, reseeded {} particles",
            self.iteration,
            self.config.stagnation_window,
            reseeded
        );
        Some(reseeded)
    }

    /// Reseed the worst particles and optionally shake up the rest
    ///
    /// Particles are ranked by current fitness, worst first; a NaN score
    /// counts as the worst possible. The global best is left alone.
    pub(crate) fn kick(&mut self) -> usize {
        let count = reseed_count(self.particles.len(), self.config.reseed_fraction);

        // **Rust Concept: Stable sorting with total_cmp**
        // `f64` is only `PartialOrd`, so `sort` is not available. Mapping NaN
        // to infinity and comparing with `total_cmp` gives a total order, and
        // `sort_by` is stable, so equal scores keep particle order.
        let mut ranking: Vec<usize> = (0..self.particles.len()).collect();
        let score = |fitness: f64| if fitness.is_nan() { f64::INFINITY } else { fitness };
        ranking.sort_by(|&a, &b| {
            score(self.particles[b].fitness).total_cmp(&score(self.particles[a].fitness))
        });

        let mut reseed = vec![false; self.particles.len()];
        for &index in ranking.iter().take(count) {
            reseed[index] = true;
        }
        log::debug!("reseeding particles {:?}", &ranking[..count]);

        for (particle, fresh) in self.particles.iter_mut().zip(reseed) {
            if fresh {
                particle.reseed(self.num_triangles, &self.bounds, &mut self.rng);
            } else if self.config.velocity_reset_on_kick {
                particle.randomize_velocity(&mut self.rng);
            }
        }

        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SwarmConfig;
    use crate::swarm::tests::{small_config, BlankRasterizer};
    use image::{Rgba, RgbaImage};

    fn stalled_swarm(config: SwarmConfig, seed: u64) -> Swarm {
        let mut swarm = Swarm::with_seed(6, 6, config, seed)
            .unwrap()
            .with_rasterizer(BlankRasterizer);
        swarm
            .set_target(RgbaImage::from_pixel(6, 6, Rgba([255, 255, 255, 255])))
            .unwrap();
        swarm
    }

    #[test]
    fn test_reseed_count() {
        assert_eq!(reseed_count(5, 0.2), 1);
        assert_eq!(reseed_count(10, 0.25), 3);
        assert_eq!(reseed_count(10, 0.0), 1);
        assert_eq!(reseed_count(10, 1.0), 10);
        assert_eq!(reseed_count(3, 0.5), 2);
    }

    #[test]
    fn test_kicker_counts_and_resets() {
        let mut kicker = StagnationKicker::new();
        assert!(!kicker.observe(false, 3));
        assert!(!kicker.observe(false, 3));
        assert_eq!(kicker.stagnant_iterations(), 2);

        assert!(!kicker.observe(true, 3));
        assert_eq!(kicker.stagnant_iterations(), 0);

        kicker.observe(false, 3);
        kicker.observe(false, 3);
        assert!(kicker.observe(false, 3));
    }

    #[test]
    fn test_kick_after_stagnation_window() {
        let config = SwarmConfig {
            stagnation_window: 10,
            reseed_fraction: 0.25,
            ..small_config(10, 2)
        };
        let mut swarm = stalled_swarm(config, 31);

        // The first step finds the only score there is
        assert!(swarm.step().unwrap().improved);
        let best = swarm.best_triangles().map(<[_]>::to_vec);

        for _ in 2..=10 {
            let report = swarm.step().unwrap();
            assert!(!report.improved);
            assert_eq!(report.reseeded, None);
        }
        assert_eq!(swarm.stagnant_iterations(), 9);

        let report = swarm.step().unwrap();
        assert_eq!(report.iteration, 11);
        assert_eq!(report.reseeded, Some(3));
        assert_eq!(swarm.stagnant_iterations(), 0);

        let fresh = swarm
            .particles()
            .iter()
            .filter(|p| p.fitness() == f64::INFINITY && p.best_fitness() == f64::INFINITY)
            .count();
        assert_eq!(fresh, 3);

        // The global best survives the kick
        assert_eq!(swarm.best_fitness(), 0.0);
        assert_eq!(swarm.best_triangles().map(<[_]>::to_vec), best);
        assert!(swarm.is_consistent());
    }

    #[test]
    fn test_kick_reseeds_worst_particles() {
        let config = SwarmConfig {
            reseed_fraction: 0.5,
            velocity_reset_on_kick: false,
            ..small_config(4, 2)
        };
        let mut swarm = Swarm::with_seed(6, 6, config, 32).unwrap();
        let scores = [3.0, f64::NAN, 1.0, 2.0];
        for (particle, score) in swarm.particles.iter_mut().zip(scores) {
            particle.fitness = score;
            particle.best_fitness = score;
        }
        let before: Vec<_> = swarm.particles().to_vec();

        assert_eq!(swarm.kick(), 2);

        // NaN and 3.0 are the two worst
        assert_eq!(swarm.particles()[0].fitness(), f64::INFINITY);
        assert_eq!(swarm.particles()[1].fitness(), f64::INFINITY);
        for index in [2, 3] {
            let (now, then) = (&swarm.particles()[index], &before[index]);
            assert_eq!(now.position(), then.position());
            assert_eq!(now.velocity(), then.velocity());
            assert_eq!(now.fitness(), then.fitness());
        }
    }

    #[test]
    fn test_kick_resets_velocity_of_survivors() {
        let config = SwarmConfig {
            reseed_fraction: 0.25,
            velocity_reset_on_kick: true,
            ..small_config(4, 2)
        };
        let mut swarm = Swarm::with_seed(6, 6, config, 33).unwrap();
        for (index, particle) in swarm.particles.iter_mut().enumerate() {
            particle.fitness = index as f64;
        }
        let before: Vec<_> = swarm.particles().to_vec();

        assert_eq!(swarm.kick(), 1);

        // Particle 3 was the worst; the others keep position but not velocity
        assert_eq!(swarm.particles()[3].fitness(), f64::INFINITY);
        for index in 0..3 {
            let (now, then) = (&swarm.particles()[index], &before[index]);
            assert_eq!(now.position(), then.position());
            assert_eq!(now.fitness(), then.fitness());
            assert_ne!(now.velocity(), then.velocity());
        }
    }
}
