//! # Interpolation Engine
//!
//! Pure blends between two latent vectors. `t` is any real; callers pass
//! remapped coefficients freely.

use crate::latent::LatentVector;
use serde::{Deserialize, Serialize};

/// Componentwise `a*(1-t) + b*t`.
pub fn linear_blend(a: &LatentVector, b: &LatentVector, t: f64) -> LatentVector {
    let a = a.components();
    let b = b.components();
    LatentVector::new(std::array::from_fn(|i| a[i] * (1.0 - t) + b[i] * t))
}

/// Linear blend rescaled so its norm is the blend of the input norms.
///
/// A zero-norm blend is returned unscaled.
pub fn magnitude_preserving_blend(a: &LatentVector, b: &LatentVector, t: f64) -> LatentVector {
    let blended = linear_blend(a, b, t);
    let target = (1.0 - t) * a.norm() + t * b.norm();
    blended.scaled(scale_factor(blended.norm(), target))
}

fn scale_factor(norm: f64, target: f64) -> f64 {
    if norm == 0.0 { 1.0 } else { target / norm }
}

/// Which blend a deployment uses for the interpolated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendPolicy {
    #[default]
    Linear,
    MagnitudePreserving,
}

impl BlendPolicy {
    pub fn blend(self, a: &LatentVector, b: &LatentVector, t: f64) -> LatentVector {
        match self {
            BlendPolicy::Linear => linear_blend(a, b, t),
            BlendPolicy::MagnitudePreserving => magnitude_preserving_blend(a, b, t),
        }
    }
}

/// Affine remap of the raw mix slider: `t' = t*scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixRemap {
    pub scale: f64,
    pub offset: f64,
}

impl MixRemap {
    pub const IDENTITY: MixRemap = MixRemap {
        scale: 1.0,
        offset: 0.0,
    };

    pub fn apply(&self, raw: f64) -> f64 {
        raw * self.scale + self.offset
    }
}

impl Default for MixRemap {
    fn default() -> Self {
        Self::IDENTITY
    }
}
