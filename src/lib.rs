// Library root for the particle swarm art optimizer
//
// A swarm of particles, each an ordered list of translucent triangles, flies
// through triangle space toward a target image. The binary in main.rs is a
// thin driver around the `Swarm` exported here.

// Triangle genes and their valid domain
pub mod genes;

// Rendering and scoring
pub mod painting;
pub mod fitness;

// Configuration and errors
pub mod config;
pub mod error;

// The optimizer itself
pub mod particle;
pub mod swarm;
pub mod growth;
pub mod kick;

// Re-export commonly used types at the library root, so callers can write
//   use pso_art::Swarm;
// instead of:
//   use pso_art::swarm::Swarm;
pub use config::{ConfigError, ConfigUpdate, SwarmConfig};
pub use error::SwarmError;
pub use fitness::{FitnessEvaluator, FitnessNormalization};
pub use genes::{GeneBounds, Triangle};
pub use growth::GrowthController;
pub use kick::StagnationKicker;
pub use painting::{Canvas, Rasterizer, TriangleRasterizer};
pub use particle::{Motion, Particle};
pub use swarm::{StepReport, Swarm, SwarmRng};
