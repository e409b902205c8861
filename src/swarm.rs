// The particle swarm: owns every particle, the global best and the control state
use crate::config::{ConfigUpdate, SwarmConfig};
use crate::error::SwarmError;
use crate::fitness::FitnessEvaluator;
use crate::genes::{GeneBounds, Triangle};
use crate::growth::GrowthController;
use crate::kick::StagnationKicker;
use crate::painting::{Canvas, Rasterizer, TriangleRasterizer};
use crate::particle::{Motion, Particle};

// Image type for the target and previews
use image::RgbaImage;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

// Rayon for parallel fitness evaluation
use rayon::prelude::*;

use serde::{Deserialize, Serialize};

/// Default generator: small, fast and seedable
pub type SwarmRng = Pcg64Mcg;

/// What happened during one `step`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// Iteration counter after the step
    pub iteration: u64,
    /// Whether any particle beat the global best
    pub improved: bool,
    /// Global-best fitness after the step (infinite right after growth)
    pub best_fitness: f64,
    /// Triangles added to every particle, if growth fired
    pub grown: Option<usize>,
    /// Particles reseeded, if a kick fired
    pub reseeded: Option<usize>,
}

/// Particle swarm optimizer approximating a target image with triangles
///
/// The swarm has two states: without a target it can be configured and
/// inspected but `step` returns `SwarmError::NoTarget`; after `set_target`
/// every `step` runs one full PSO iteration.
///
/// All randomness comes from the generator `G` supplied at construction, so a
/// seeded swarm replays exactly.
pub struct Swarm<G = SwarmRng> {
    pub(crate) config: SwarmConfig,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) bounds: GeneBounds,
    pub(crate) num_triangles: usize,

    pub(crate) particles: Vec<Particle>,
    /// One reusable drawing surface per particle
    canvases: Vec<Canvas>,

    /// `None` until the first evaluation
    ///
    /// **Rust Concept: Option instead of a sentinel**
    /// There is no "empty painting" value that could stand in for "nothing
    /// found yet", so the type says it: callers must handle `None` before
    /// they can touch the triangles, and `as_deref()` hands out a borrowed
    /// `&[Triangle]` without cloning.
    pub(crate) global_best: Option<Vec<Triangle>>,
    pub(crate) global_best_fitness: f64,
    pub(crate) iteration: u64,

    target: Option<RgbaImage>,
    rasterizer: Box<dyn Rasterizer>,
    evaluator: FitnessEvaluator,

    pub(crate) growth: GrowthController,
    pub(crate) kicker: StagnationKicker,
    pub(crate) rng: G,
}

impl Swarm<SwarmRng> {
    /// Create a swarm seeded from OS entropy
    pub fn new(width: u32, height: u32, config: SwarmConfig) -> Result<Self, SwarmError> {
        Self::with_rng(width, height, config, SwarmRng::from_entropy())
    }

    /// Create a swarm whose whole run is determined by `seed`
    pub fn with_seed(
        width: u32,
        height: u32,
        config: SwarmConfig,
        seed: u64,
    ) -> Result<Self, SwarmError> {
        Self::with_rng(width, height, config, SwarmRng::seed_from_u64(seed))
    }
}

impl<G: Rng> Swarm<G> {
    /// Create a swarm drawing all randomness from `rng`
    ///
    /// # Errors
    /// `EmptyCanvas` for a zero dimension, `Config` if validation fails.
    pub fn with_rng(
        width: u32,
        height: u32,
        config: SwarmConfig,
        mut rng: G,
    ) -> Result<Self, SwarmError> {
        if width == 0 || height == 0 {
            return Err(SwarmError::EmptyCanvas { width, height });
        }
        let config = config.validate()?;
        let bounds = GeneBounds::new(width, height, config.offscreen_margin, config.max_alpha);

        let particles = (0..config.swarm_size)
            .map(|_| Particle::new(config.num_triangles, &bounds, &mut rng))
            .collect();
        let canvases = vec![Canvas::new(width, height); config.swarm_size];

        log::debug!(
            "swarm of {} particles x {} triangles on {}x{}",
            config.swarm_size,
            config.num_triangles,
            width,
            height
        );

        Ok(Self {
            width,
            height,
            bounds,
            num_triangles: config.num_triangles,
            particles,
            canvases,
            global_best: None,
            global_best_fitness: f64::INFINITY,
            iteration: 0,
            target: None,
            rasterizer: Box::new(TriangleRasterizer),
            evaluator: FitnessEvaluator::new(config.normalization),
            growth: GrowthController::new(),
            kicker: StagnationKicker::new(),
            rng,
            config,
        })
    }

    /// Replace the rasterizer used for both fitness and previews
    pub fn with_rasterizer(mut self, rasterizer: impl Rasterizer + 'static) -> Self {
        self.rasterizer = Box::new(rasterizer);
        self
    }

    /// Supply the image to approximate
    ///
    /// Scores computed against a previous target are meaningless for the new
    /// one, so every fitness value and the global best are invalidated.
    ///
    /// # Errors
    /// `TargetSize` unless the image matches the swarm dimensions.
    pub fn set_target(&mut self, target: RgbaImage) -> Result<(), SwarmError> {
        if target.dimensions() != (self.width, self.height) {
            return Err(SwarmError::TargetSize {
                expected: (self.width, self.height),
                actual: target.dimensions(),
            });
        }

        self.target = Some(target);
        self.global_best = None;
        self.global_best_fitness = f64::INFINITY;
        for particle in &mut self.particles {
            particle.fitness = f64::INFINITY;
            particle.best_fitness = f64::INFINITY;
        }
        self.growth.reset();
        self.kicker.reset();
        Ok(())
    }

    /// Run one PSO iteration
    ///
    /// 1. Evaluate every particle, update personal bests and the global best
    /// 2. Move every particle against the final global best
    /// 3. Advance the iteration counter
    /// 4. Let the growth controller and the stagnation kicker react
    pub fn step(&mut self) -> Result<StepReport, SwarmError> {
        self.evaluate()?;
        let improved = self.update_bests();
        self.move_particles();
        self.iteration += 1;

        let grown = if self.config.incremental_triangles {
            self.run_growth()
        } else {
            None
        };
        let reseeded = self.run_kicker(improved);

        Ok(StepReport {
            iteration: self.iteration,
            improved,
            best_fitness: self.global_best_fitness,
            grown,
            reseeded,
        })
    }

    /// Render and score every particle's current position
    fn evaluate(&mut self) -> Result<(), SwarmError> {
        let target = self.target.as_ref().ok_or(SwarmError::NoTarget)?;
        let rasterizer = self.rasterizer.as_ref();
        let evaluator = self.evaluator;

        let score = |(particle, canvas): (&mut Particle, &mut Canvas)| {
            rasterizer.render_into(&particle.position, canvas);
            particle.fitness = evaluator.evaluate(canvas.image(), target);
        };

        // **Rust Concept: Fearless concurrency**
        // `par_iter_mut().zip(..)` hands each thread a disjoint `&mut Particle`
        // and `&mut Canvas`; the borrow checker proves no two threads share
        // one, so the parallel and sequential branches give identical results.
        if self.config.parallel_evaluation {
            self.particles
                .par_iter_mut()
                .zip(self.canvases.par_iter_mut())
                .for_each(score);
        } else {
            self.particles
                .iter_mut()
                .zip(self.canvases.iter_mut())
                .for_each(score);
        }
        Ok(())
    }

    /// Update personal bests and the global best in particle order
    ///
    /// Returns whether the global best improved.
    ///
    /// **Rust Concept: Independent snapshots**
    /// `Triangle` is `Copy`, so `position.clone()` is a plain memcpy into a new
    /// `Vec`. The snapshot shares nothing with the particle, and moving the
    /// particle afterwards cannot disturb the global best.
    fn update_bests(&mut self) -> bool {
        let mut improved = false;

        for particle in &mut self.particles {
            particle.update_personal_best();

            if particle.fitness < self.global_best_fitness {
                self.global_best_fitness = particle.fitness;
                self.global_best = Some(particle.position.clone());
                improved = true;
            }
        }

        improved
    }

    /// Apply the velocity/position update to every particle
    fn move_particles(&mut self) {
        let motion = self.motion();
        let Some(global_best) = self.global_best.as_deref() else {
            return;
        };

        for (index, particle) in self.particles.iter_mut().enumerate() {
            if let Err(err) = particle.update(global_best, &motion, &self.bounds, &mut self.rng) {
                log::warn!("skipping update of particle {index}: {err}");
            }
        }
    }

    /// Start over: fresh particles at the current triangle count, no global best
    pub fn reset(&mut self) {
        self.iteration = 0;
        self.global_best = None;
        self.global_best_fitness = f64::INFINITY;

        for particle in &mut self.particles {
            particle.reseed(self.num_triangles, &self.bounds, &mut self.rng);
        }

        self.growth.reset();
        self.kicker.reset();
    }

    /// Change live parameters
    ///
    /// The update is validated as a whole; on error nothing changes. A new
    /// `max_alpha` is enforced immediately on every position and every best
    /// snapshot. Touching any growth parameter restarts the growth window, so
    /// a window observed under the old settings is never judged by the new.
    pub fn update_config(&mut self, update: &ConfigUpdate) -> Result<(), SwarmError> {
        let next = self.config.apply(update)?;
        let alpha_changed = next.max_alpha != self.config.max_alpha;
        let growth_changed = next.incremental_triangles != self.config.incremental_triangles
            || next.triangle_stagnation_threshold != self.config.triangle_stagnation_threshold
            || next.triangle_stagnation_percent != self.config.triangle_stagnation_percent
            || next.triangle_increment != self.config.triangle_increment
            || next.max_triangles_cap != self.config.max_triangles_cap;

        self.config = next;
        self.bounds = GeneBounds::new(
            self.width,
            self.height,
            self.config.offscreen_margin,
            self.config.max_alpha,
        );

        if alpha_changed {
            for particle in &mut self.particles {
                particle.clamp_alpha(&self.bounds);
            }
            // `Option<Vec<_>>` as an iterator: zero or one list to fix up
            for triangle in self.global_best.iter_mut().flatten() {
                self.bounds.clamp_alpha(triangle);
            }
        }
        if growth_changed {
            self.growth.reset();
        }
        Ok(())
    }

    /// PSO coefficients from the live configuration
    pub fn motion(&self) -> Motion {
        Motion {
            inertia: self.config.inertia,
            cognitive: self.config.cognitive,
            social: self.config.social,
            max_velocity: self.config.max_velocity,
        }
    }

    /// Best triangle list found so far, `None` before the first evaluation
    pub fn best_triangles(&self) -> Option<&[Triangle]> {
        self.global_best.as_deref()
    }

    /// Best fitness so far; infinite until evaluated (and right after growth)
    pub fn best_fitness(&self) -> f64 {
        self.global_best_fitness
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Current triangles per particle
    pub fn num_triangles(&self) -> usize {
        self.num_triangles
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// The gene domain every particle is clamped into
    pub fn bounds(&self) -> &GeneBounds {
        &self.bounds
    }

    /// Steps since the global best last improved
    pub fn stagnant_iterations(&self) -> u64 {
        self.kicker.stagnant_iterations()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// Render the global best with the same rasterizer used for fitness
    pub fn render_best(&self) -> Option<RgbaImage> {
        self.global_best
            .as_deref()
            .map(|triangles| self.rasterizer.render(triangles, self.width, self.height))
    }

    /// Whether every particle and the global best share the current dimensionality
    pub fn is_consistent(&self) -> bool {
        self.particles
            .iter()
            .all(|p| p.is_consistent() && p.num_triangles() == self.num_triangles)
            && self
                .global_best
                .as_ref()
                .map_or(true, |best| best.len() == self.num_triangles)
    }
}
