//! The inference engine contract.
//!
//! Every call works on [`BufferRegion`] handles inside the engine's arena.
//! Calls are synchronous and trusted: no timeout, no retry. Any error is
//! returned to the caller untouched.

use crate::arena::{Arena, BufferRegion};
use anyhow::{Result, bail};

pub mod pattern;

pub use pattern::PatternEngine;

pub trait InferenceEngine {
    /// The memory this engine reads inputs from and writes outputs to.
    type Arena: Arena;

    /// Read a latent vector from `input`, write an RGBA frame into `output`.
    fn predict(
        &mut self,
        arena: &mut Self::Arena,
        input: &BufferRegion,
        output: &BufferRegion,
    ) -> Result<()>;

    /// One training step.
    fn train(&mut self, arena: &mut Self::Arena) -> Result<()>;

    /// Load weights from `weights`, or the engine's bundled weights when `None`.
    fn load_pretrained_model(
        &mut self,
        _arena: &mut Self::Arena,
        _weights: Option<&BufferRegion>,
    ) -> Result<()> {
        bail!("Engine does not support LoadPretrainedModel")
    }

    fn reset_model_weight(&mut self, _arena: &mut Self::Arena) -> Result<()> {
        bail!("Engine does not support ResetModelWeight")
    }

    /// Write the most recent training input as RGBA into `output`.
    fn last_input(&mut self, _arena: &mut Self::Arena, _output: &BufferRegion) -> Result<()> {
        bail!("Engine does not support LastInput")
    }

    /// Write the most recent training output as RGBA into `output`.
    fn last_output(&mut self, _arena: &mut Self::Arena, _output: &BufferRegion) -> Result<()> {
        bail!("Engine does not support LastOutput")
    }
}

/// Shade an intensity in `[0,1]` the way the engines export pixels:
/// grey RGB, opaque alpha.
pub fn shade_pixel(intensity: f64) -> [u8; 4] {
    let v = (intensity.clamp(0.0, 1.0) * 255.0) as u8;
    [v, v, v, 255]
}
