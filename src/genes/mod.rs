// This file declares the genes module: the triangle gene itself plus the
// domain every gene must stay inside.

// Import serialization traits for GeneBounds
use serde::{Deserialize, Serialize};

// Declare the triangle submodule (looks for triangle.rs in this directory)
mod triangle;

// Re-export so users can write `use pso_art::genes::Triangle;`
pub use triangle::{Triangle, GENES_PER_TRIANGLE, MIN_ALPHA};

/// The valid region of the 10-dimensional gene space
///
/// Vertices may sit up to `margin` pixels outside the canvas, which lets the
/// swarm explore triangles that are only partly visible. Colours live in
/// 0-255 and alpha in `[MIN_ALPHA, max_alpha]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneBounds {
    pub width: u32,
    pub height: u32,
    pub margin: f64,
    pub max_alpha: f64,
}

impl GeneBounds {
    pub fn new(width: u32, height: u32, margin: f64, max_alpha: f64) -> Self {
        Self {
            width,
            height,
            margin: margin.max(0.0),
            max_alpha: max_alpha.clamp(MIN_ALPHA, 1.0),
        }
    }

    /// Pull every gene of `triangle` back into the valid domain
    pub fn clamp(&self, triangle: &mut Triangle) {
        let x_max = f64::from(self.width) + self.margin;
        let y_max = f64::from(self.height) + self.margin;

        for point in &mut triangle.points {
            point.0 = clamp_gene(point.0, -self.margin, x_max);
            point.1 = clamp_gene(point.1, -self.margin, y_max);
        }
        for channel in &mut triangle.color {
            *channel = clamp_gene(*channel, 0.0, 255.0);
        }
        self.clamp_alpha(triangle);
    }

    /// Clamp only the opacity gene (used when `max_alpha` changes mid-run)
    pub fn clamp_alpha(&self, triangle: &mut Triangle) {
        triangle.alpha = clamp_gene(triangle.alpha, MIN_ALPHA, self.max_alpha);
    }

    /// Whether every gene of `triangle` already lies inside the domain
    pub fn contains(&self, triangle: &Triangle) -> bool {
        let x_max = f64::from(self.width) + self.margin;
        let y_max = f64::from(self.height) + self.margin;

        triangle.points.iter().all(|&(x, y)| {
            (-self.margin..=x_max).contains(&x) && (-self.margin..=y_max).contains(&y)
        }) && triangle.color.iter().all(|c| (0.0..=255.0).contains(c))
            && (MIN_ALPHA..=self.max_alpha).contains(&triangle.alpha)
    }
}

/// `f64::clamp` keeps NaN; a NaN gene collapses to the lower bound instead
fn clamp_gene(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_max_alpha_is_clamped_on_construction() {
        assert_eq!(GeneBounds::new(10, 10, 5.0, 3.0).max_alpha, 1.0);
        assert_eq!(GeneBounds::new(10, 10, 5.0, 0.0).max_alpha, MIN_ALPHA);
        assert_eq!(GeneBounds::new(10, 10, -5.0, 0.5).margin, 0.0);
    }

    #[test]
    fn test_clamp_pulls_out_of_range_genes_back() {
        let bounds = GeneBounds::new(100, 50, 10.0, 0.6);
        let mut tri = Triangle {
            points: [(-500.0, 20.0), (300.0, -11.0), (50.0, 61.0)],
            color: [-3.0, 300.0, 128.0],
            alpha: 0.9,
        };

        bounds.clamp(&mut tri);

        assert_eq!(tri.points, [(-10.0, 20.0), (110.0, -10.0), (50.0, 60.0)]);
        assert_eq!(tri.color, [0.0, 255.0, 128.0]);
        assert_eq!(tri.alpha, 0.6);
        assert!(bounds.contains(&tri));
    }

    #[test]
    fn test_nan_genes_collapse_to_lower_bound() {
        let bounds = GeneBounds::new(10, 10, 2.0, 0.8);
        let mut tri = Triangle::from_vector([f64::NAN; 10]);

        bounds.clamp(&mut tri);

        assert_eq!(tri.points[0], (-2.0, -2.0));
        assert_eq!(tri.color, [0.0; 3]);
        assert_eq!(tri.alpha, MIN_ALPHA);
    }

    proptest! {
        #[test]
        fn prop_clamp_always_lands_in_domain(
            genes in prop::array::uniform10(-1.0e4f64..1.0e4),
            max_alpha in 0.1f64..1.0,
        ) {
            let bounds = GeneBounds::new(64, 48, 50.0, max_alpha);
            let mut tri = Triangle::from_vector(genes);
            bounds.clamp(&mut tri);
            prop_assert!(bounds.contains(&tri));
        }
    }
}
