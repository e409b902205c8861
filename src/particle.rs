// Import the triangle gene and its valid domain
use crate::genes::{GeneBounds, Triangle, GENES_PER_TRIANGLE};
use crate::error::SwarmError;

use rand::Rng;

// Serialization support so a particle can be inspected or saved
use serde::{Deserialize, Serialize};

/// Fresh velocity components are drawn uniformly from `[-INITIAL_VELOCITY, INITIAL_VELOCITY)`
pub const INITIAL_VELOCITY: f64 = 5.0;

/// Coefficients of the PSO velocity update
///
/// `v = w·v + c1·r1·(pbest - x) + c2·r2·(gbest - x)`, with an optional
/// per-dimension limit on `|v|`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Motion {
    pub inertia: f64,
    pub cognitive: f64,
    pub social: f64,
    pub max_velocity: Option<f64>,
}

/// One candidate solution in the swarm
///
/// The position is an ordered triangle list; viewed as a flat vector it has
/// `num_triangles * 10` dimensions, and the velocity always has exactly that
/// many components.
///
/// Fitness values start at `f64::INFINITY`, meaning "not evaluated yet".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Particle {
    pub(crate) position: Vec<Triangle>,
    pub(crate) velocity: Vec<f64>,
    pub(crate) best_position: Vec<Triangle>,
    pub(crate) best_fitness: f64,
    pub(crate) fitness: f64,
}

/// Draw `count` velocity components
pub(crate) fn random_velocity(count: usize, rng: &mut impl Rng) -> Vec<f64> {
    (0..count)
        .map(|_| rng.gen_range(-INITIAL_VELOCITY..INITIAL_VELOCITY))
        .collect()
}

/// Draw `count` triangles inside `bounds`
pub(crate) fn random_triangles(count: usize, bounds: &GeneBounds, rng: &mut impl Rng) -> Vec<Triangle> {
    (0..count)
        .map(|_| Triangle::random(bounds.width, bounds.height, bounds.max_alpha, rng))
        .collect()
}

impl Particle {
    /// Create a particle with random triangles and random velocity
    pub fn new(num_triangles: usize, bounds: &GeneBounds, rng: &mut impl Rng) -> Self {
        let position = random_triangles(num_triangles, bounds, rng);
        let velocity = random_velocity(num_triangles * GENES_PER_TRIANGLE, rng);

        Self {
            best_position: position.clone(),
            position,
            velocity,
            best_fitness: f64::INFINITY,
            fitness: f64::INFINITY,
        }
    }

    /// Current triangles
    pub fn position(&self) -> &[Triangle] {
        &self.position
    }

    /// Position as one flat gene vector
    pub fn flatten(&self) -> Vec<f64> {
        self.position.iter().flat_map(Triangle::to_vector).collect()
    }

    pub fn velocity(&self) -> &[f64] {
        &self.velocity
    }

    /// Snapshot of the best position this particle has held
    pub fn best_position(&self) -> &[Triangle] {
        &self.best_position
    }

    pub fn best_fitness(&self) -> f64 {
        self.best_fitness
    }

    /// Fitness of the current position at its last evaluation
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    pub fn num_triangles(&self) -> usize {
        self.position.len()
    }

    /// Whether position, velocity and personal best all agree on dimensionality
    pub fn is_consistent(&self) -> bool {
        self.velocity.len() == self.position.len() * GENES_PER_TRIANGLE
            && self.best_position.len() == self.position.len()
    }

    /// Record the current position as the personal best if it is strictly better
    ///
    /// Ties leave the snapshot alone. Returns `true` when the best changed.
    ///
    /// **Rust Concept: clone_from**
    /// `clone_from` copies into the snapshot's existing allocation instead of
    /// building a new `Vec`, which matters when this runs every step for
    /// every particle.
    pub fn update_personal_best(&mut self) -> bool {
        if self.fitness < self.best_fitness {
            self.best_fitness = self.fitness;
            self.best_position.clone_from(&self.position);
            true
        } else {
            false
        }
    }

    /// Move the particle one PSO step toward its personal best and `global_best`
    ///
    /// Two fresh uniform numbers are drawn for every dimension. The position is
    /// clamped into `bounds` once, after every dimension has moved.
    ///
    /// # Errors
    /// `DimensionMismatch` if `global_best` or the particle's own buffers have
    /// the wrong length; the particle is left untouched in that case.
    pub fn update(
        &mut self,
        global_best: &[Triangle],
        motion: &Motion,
        bounds: &GeneBounds,
        rng: &mut impl Rng,
    ) -> Result<(), SwarmError> {
        let expected = self.position.len();
        if global_best.len() != expected {
            return Err(SwarmError::DimensionMismatch {
                expected,
                actual: global_best.len(),
            });
        }
        if !self.is_consistent() {
            return Err(SwarmError::DimensionMismatch {
                expected,
                actual: self.velocity.len() / GENES_PER_TRIANGLE,
            });
        }

        let velocities = self.velocity.chunks_exact_mut(GENES_PER_TRIANGLE);
        let genes = self.position.iter_mut().zip(&self.best_position).zip(global_best);

        for (velocity, ((triangle, personal), global)) in velocities.zip(genes) {
            let mut x = triangle.to_vector();
            let p = personal.to_vector();
            let g = global.to_vector();

            for i in 0..GENES_PER_TRIANGLE {
                let r1: f64 = rng.gen();
                let r2: f64 = rng.gen();

                let mut v = motion.inertia * velocity[i]
                    + motion.cognitive * r1 * (p[i] - x[i])
                    + motion.social * r2 * (g[i] - x[i]);
                if let Some(limit) = motion.max_velocity {
                    v = v.clamp(-limit, limit);
                }

                velocity[i] = v;
                x[i] += v;
            }

            *triangle = Triangle::from_vector(x);
        }

        self.clamp(bounds);
        Ok(())
    }

    /// Pull every triangle of the current position into `bounds`
    pub fn clamp(&mut self, bounds: &GeneBounds) {
        for triangle in &mut self.position {
            bounds.clamp(triangle);
        }
    }

    /// Pull only the opacity genes into `bounds`
    ///
    /// Covers the personal-best snapshot too, otherwise `update` would keep
    /// pulling the particle back toward an opacity it may no longer hold.
    pub(crate) fn clamp_alpha(&mut self, bounds: &GeneBounds) {
        for triangle in self.position.iter_mut().chain(&mut self.best_position) {
            bounds.clamp_alpha(triangle);
        }
    }

    /// Throw the particle away and start over with `num_triangles` random triangles
    pub(crate) fn reseed(&mut self, num_triangles: usize, bounds: &GeneBounds, rng: &mut impl Rng) {
        *self = Particle::new(num_triangles, bounds, rng);
    }

    /// Re-randomize the velocity while keeping the position
    pub(crate) fn randomize_velocity(&mut self, rng: &mut impl Rng) {
        let len = self.velocity.len();
        self.velocity = random_velocity(len, rng);
    }

    /// Append `fresh` triangles to both position and personal best
    ///
    /// Velocity grows by matching random components and both fitness values
    /// go back to infinity: scores from the old dimensionality are not
    /// comparable.
    pub(crate) fn extend(&mut self, fresh: &[Triangle], rng: &mut impl Rng) {
        self.position.extend_from_slice(fresh);
        self.best_position.extend_from_slice(fresh);
        self.velocity
            .extend(random_velocity(fresh.len() * GENES_PER_TRIANGLE, rng));
        self.fitness = f64::INFINITY;
        self.best_fitness = f64::INFINITY;
    }
}
