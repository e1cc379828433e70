use serde::{Deserialize, Serialize};
use std::ops::Index;

/// Number of components in every latent vector.
pub const LATENT_DIM: usize = 10;

/// A point in the engine's latent space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatentVector([f64; LATENT_DIM]);

impl LatentVector {
    pub const fn new(components: [f64; LATENT_DIM]) -> Self {
        Self(components)
    }

    pub const fn zeros() -> Self {
        Self([0.0; LATENT_DIM])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn components(&self) -> [f64; LATENT_DIM] {
        self.0
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        self.0.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self(self.0.map(|x| x * factor))
    }
}

impl Default for LatentVector {
    fn default() -> Self {
        Self::zeros()
    }
}

impl From<[f64; LATENT_DIM]> for LatentVector {
    fn from(components: [f64; LATENT_DIM]) -> Self {
        Self(components)
    }
}

impl Index<usize> for LatentVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}
