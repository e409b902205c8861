// Image type for comparing pixels
use image::RgbaImage;

// Serialization support so the normalization can live in a JSON config
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// How the summed squared error is scaled into a fitness value
///
/// The sum runs over every pixel and the three colour channels. Dividing by
/// the pixel count gives the per-pixel error (up to `3 * 255²`); dividing by
/// three times the pixel count gives the per-channel mean (up to `255²`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitnessNormalization {
    /// Divide by `width * height`
    #[default]
    PerPixel,
    /// Divide by `width * height * 3`
    PerChannel,
}

impl FitnessNormalization {
    /// Divisor applied to the raw squared-error sum
    pub fn divisor(self, width: u32, height: u32) -> f64 {
        let pixels = f64::from(width) * f64::from(height);
        match self {
            FitnessNormalization::PerPixel => pixels,
            FitnessNormalization::PerChannel => pixels * 3.0,
        }
    }
}

impl FromStr for FitnessNormalization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "per-pixel" | "pixel" => Ok(FitnessNormalization::PerPixel),
            "per-channel" | "channel" => Ok(FitnessNormalization::PerChannel),
            other => Err(format!(
                "unknown normalization '{other}' (expected per-pixel or per-channel)"
            )),
        }
    }
}

impl fmt::Display for FitnessNormalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitnessNormalization::PerPixel => write!(f, "per-pixel"),
            FitnessNormalization::PerChannel => write!(f, "per-channel"),
        }
    }
}

/// Sum of squared RGB differences between two images
///
/// One linear pass over both raw buffers, nothing allocated. The alpha byte
/// of every pixel is skipped. Accumulating in `u64` keeps the result exact,
/// so the same pair of images always yields the same sum.
///
/// # Panics
/// Panics if images have different dimensions
pub fn squared_error(source: &RgbaImage, target: &RgbaImage) -> u64 {
    assert_eq!(
        source.dimensions(),
        target.dimensions(),
        "Images must have same dimensions"
    );

    source
        .as_raw()
        .chunks_exact(4)
        .zip(target.as_raw().chunks_exact(4))
        .map(|(s, t)| {
            let dr = i32::from(s[0]) - i32::from(t[0]);
            let dg = i32::from(s[1]) - i32::from(t[1]);
            let db = i32::from(s[2]) - i32::from(t[2]);
            // s[3] and t[3] are alpha - we ignore them
            (dr * dr + dg * dg + db * db) as u64
        })
        .sum()
}

/// Per-pixel squared error between two images (lower is better)
///
/// 0.0 means identical RGB; the maximum is `3 * 255² = 195075`.
pub fn image_diff(source: &RgbaImage, target: &RgbaImage) -> f64 {
    FitnessEvaluator::default().evaluate(source, target)
}

/// Scores a rendered candidate against the target
///
/// Stateless apart from its normalization, so evaluating the same pair twice
/// is bit-identical.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FitnessEvaluator {
    normalization: FitnessNormalization,
}

impl FitnessEvaluator {
    pub fn new(normalization: FitnessNormalization) -> Self {
        Self { normalization }
    }

    pub fn normalization(&self) -> FitnessNormalization {
        self.normalization
    }

    /// Normalized squared RGB error of `candidate` against `target`
    ///
    /// # Panics
    /// Panics if images have different dimensions
    pub fn evaluate(&self, candidate: &RgbaImage, target: &RgbaImage) -> f64 {
        let (width, height) = candidate.dimensions();
        let divisor = self.normalization.divisor(width, height);
        if divisor == 0.0 {
            // Empty images: still validate the dimensions, then report a perfect match
            squared_error(candidate, target);
            return 0.0;
        }
        squared_error(candidate, target) as f64 / divisor
    }
}
