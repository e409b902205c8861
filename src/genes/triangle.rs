// Import the random number generator trait from the rand crate
use rand::Rng;
// Import serialization traits - these allow saving a triangle list as JSON
use serde::{Deserialize, Serialize};

/// Number of genes in one triangle: 6 vertex coordinates, 3 colour channels, 1 alpha
pub const GENES_PER_TRIANGLE: usize = 10;

/// Lowest alpha a triangle may carry
pub const MIN_ALPHA: f64 = 0.1;

/// A single triangle gene: three vertices, an RGB colour and an opacity
///
/// Gene order is fixed: `x1, y1, x2, y2, x3, y3, r, g, b, a`.
/// The particle swarm moves triangles through this 10-dimensional space,
/// so every field is a plain `f64` rather than pixel integers.
///
/// The type is `Copy`: storing a triangle in a best-position snapshot always
/// duplicates it, so later in-place updates never leak into the snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    /// Three vertices `(x, y)`; may lie partially outside the canvas
    pub points: [(f64, f64); 3],

    /// RGB colour, each channel in 0.0-255.0
    pub color: [f64; 3],

    /// Opacity in `[MIN_ALPHA, max_alpha]`
    pub alpha: f64,
}

impl Triangle {
    /// Create a new random triangle inside the canvas
    ///
    /// # Arguments
    /// * `width`, `height` - Canvas size; vertices are drawn from `[0, width)` and `[0, height)`
    /// * `max_alpha` - Upper bound for the opacity draw (lower bound is `MIN_ALPHA`)
    /// * `rng` - Any generator implementing `Rng`, so callers control seeding
    pub fn random(width: u32, height: u32, max_alpha: f64, rng: &mut impl Rng) -> Self {
        let w = f64::from(width.max(1));
        let h = f64::from(height.max(1));
        let max_alpha = max_alpha.max(MIN_ALPHA);

        Self {
            points: [
                (rng.gen_range(0.0..w), rng.gen_range(0.0..h)),
                (rng.gen_range(0.0..w), rng.gen_range(0.0..h)),
                (rng.gen_range(0.0..w), rng.gen_range(0.0..h)),
            ],
            color: [
                rng.gen_range(0.0..=255.0), // Red
                rng.gen_range(0.0..=255.0), // Green
                rng.gen_range(0.0..=255.0), // Blue
            ],
            alpha: rng.gen_range(MIN_ALPHA..=max_alpha),
        }
    }

    /// Flatten into the fixed 10-gene order
    pub fn to_vector(&self) -> [f64; GENES_PER_TRIANGLE] {
        let [(x1, y1), (x2, y2), (x3, y3)] = self.points;
        let [r, g, b] = self.color;
        [x1, y1, x2, y2, x3, y3, r, g, b, self.alpha]
    }

    /// Rebuild a triangle from the fixed 10-gene order
    ///
    /// This is the exact inverse of `to_vector`.
    pub fn from_vector(genes: [f64; GENES_PER_TRIANGLE]) -> Self {
        let [x1, y1, x2, y2, x3, y3, r, g, b, a] = genes;
        Self {
            points: [(x1, y1), (x2, y2), (x3, y3)],
            color: [r, g, b],
            alpha: a,
        }
    }

    /// Rebuild a triangle from a slice, returning `None` unless it holds exactly 10 genes
    pub fn from_slice(genes: &[f64]) -> Option<Self> {
        let genes: [f64; GENES_PER_TRIANGLE] = genes.try_into().ok()?;
        Some(Self::from_vector(genes))
    }
}
