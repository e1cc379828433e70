use super::{InferenceEngine, shade_pixel};
use crate::arena::{Arena, BufferRegion, ElementType, F64View, HeapArena};
use crate::error::BridgeError;
use crate::latent::{LATENT_DIM, LatentVector};
use crate::pixels::ImageSize;
use anyhow::{Result, bail};
use std::f64::consts::TAU;

const INITIAL_SHARPNESS: f64 = 2.0;
const TRAINED_SHARPNESS: f64 = 12.0;
const LEARNING_RATE: f64 = 0.05;
const RING_RADIUS: f64 = 0.6;

/// A host-native engine for running without a compiled module.
///
/// Each latent component lights a soft blob on a ring around the image
/// centre. "Training" sharpens the blobs toward a fixed target, so the
/// training preview visibly converges.
#[derive(Debug, Clone)]
pub struct PatternEngine {
    size: ImageSize,
    sharpness: f64,
    steps: u64,
}

impl PatternEngine {
    pub fn new(size: ImageSize) -> Self {
        Self {
            size,
            sharpness: INITIAL_SHARPNESS,
            steps: 0,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn sharpness(&self) -> f64 {
        self.sharpness
    }

    /// The sample the last training step looked at: one-hot on `steps % 10`.
    fn training_sample(&self) -> LatentVector {
        let hot = (self.steps as usize + LATENT_DIM - 1) % LATENT_DIM;
        LatentVector::new(std::array::from_fn(|i| if i == hot { 1.0 } else { 0.0 }))
    }

    fn render(&self, latent: &LatentVector, sharpness: f64, out: &mut [u8]) -> Result<(), BridgeError> {
        let expected = self.size.byte_len();
        if out.len() != expected {
            return Err(BridgeError::DimensionMismatch {
                width: self.size.width,
                height: self.size.height,
                expected,
                actual: out.len(),
            });
        }

        let w = self.size.width as usize;
        let h = self.size.height as usize;
        for (i, px) in out.chunks_exact_mut(4).enumerate() {
            let u = ((i % w) as f64 + 0.5) / w as f64 * 2.0 - 1.0;
            let v = ((i / w) as f64 + 0.5) / h as f64 * 2.0 - 1.0;

            let intensity: f64 = latent
                .as_slice()
                .iter()
                .enumerate()
                .map(|(k, weight)| {
                    let angle = TAU * k as f64 / LATENT_DIM as f64;
                    let du = u - RING_RADIUS * angle.cos();
                    let dv = v - RING_RADIUS * angle.sin();
                    weight * (-sharpness * (du * du + dv * dv)).exp()
                })
                .sum();

            px.copy_from_slice(&shade_pixel(intensity));
        }
        Ok(())
    }

    fn read_latent(arena: &HeapArena, input: &BufferRegion) -> Result<LatentVector> {
        if input.element() != ElementType::Float64 {
            bail!("Predict input must be a float64 region");
        }
        let values = F64View::new(input.slice(arena.bytes())?).to_vec();
        if values.len() != LATENT_DIM {
            bail!(BridgeError::LengthMismatch {
                expected: LATENT_DIM,
                actual: values.len(),
            });
        }
        Ok(LatentVector::new(std::array::from_fn(|i| values[i])))
    }
}

impl InferenceEngine for PatternEngine {
    type Arena = HeapArena;

    fn predict(
        &mut self,
        arena: &mut HeapArena,
        input: &BufferRegion,
        output: &BufferRegion,
    ) -> Result<()> {
        let latent = Self::read_latent(arena, input)?;
        let out = output.slice_mut(arena.bytes_mut())?;
        self.render(&latent, self.sharpness, out)?;
        Ok(())
    }

    fn train(&mut self, _arena: &mut HeapArena) -> Result<()> {
        self.steps += 1;
        self.sharpness += (TRAINED_SHARPNESS - self.sharpness) * LEARNING_RATE;
        Ok(())
    }

    /// Weights, when given, start with the blob sharpness as a little-endian
    /// float64. The region's element type is not checked.
    fn load_pretrained_model(
        &mut self,
        arena: &mut HeapArena,
        weights: Option<&BufferRegion>,
    ) -> Result<()> {
        let sharpness = match weights {
            None => TRAINED_SHARPNESS,
            Some(region) => {
                let view = F64View::new(region.slice(arena.bytes())?);
                match view.get(0) {
                    Some(s) if s > 0.0 && s.is_finite() => s,
                    _ => bail!("Pattern weights must start with a positive sharpness"),
                }
            }
        };
        self.sharpness = sharpness;
        tracing::info!("Pattern engine loaded weights (sharpness {:.3})", sharpness);
        Ok(())
    }

    fn reset_model_weight(&mut self, _arena: &mut HeapArena) -> Result<()> {
        self.sharpness = INITIAL_SHARPNESS;
        self.steps = 0;
        Ok(())
    }

    fn last_input(&mut self, arena: &mut HeapArena, output: &BufferRegion) -> Result<()> {
        let sample = self.training_sample();
        let out = output.slice_mut(arena.bytes_mut())?;
        self.render(&sample, TRAINED_SHARPNESS, out)?;
        Ok(())
    }

    fn last_output(&mut self, arena: &mut HeapArena, output: &BufferRegion) -> Result<()> {
        let sample = self.training_sample();
        let out = output.slice_mut(arena.bytes_mut())?;
        self.render(&sample, self.sharpness, out)?;
        Ok(())
    }
}
