//! Deployment profiles.
//!
//! The two shipped explorers differ in image size, sequence constants, mix
//! remapping and blend policy. Each stays its own profile; nothing is
//! unified between them.

use crate::controls::{ControlPreset, SliderDefaults, SliderRange};
use crate::error::BridgeError;
use crate::interpolation::{BlendPolicy, MixRemap};
use crate::pixels::ImageSize;
use crate::sequence::SequenceParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// What the explorer does once the engine is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupAction {
    /// Run one training step, then render.
    TrainOnce,
    /// Load the bundled weights, then render.
    LoadPretrained,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentProfile {
    pub name: String,
    pub image: ImageSize,
    pub sequence: SequenceParams,
    pub slider: SliderRange,
    pub defaults: SliderDefaults,
    #[serde(default)]
    pub mix_remap: MixRemap,
    #[serde(default)]
    pub blend: BlendPolicy,
    #[serde(default)]
    pub preset: Option<ControlPreset>,
    /// Show the engine's last training sample after every train call.
    #[serde(default)]
    pub training_preview: bool,
    /// Run a training step after loading pretrained weights.
    #[serde(default)]
    pub train_after_load: bool,
    pub startup: StartupAction,
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: f64,
}

fn default_tick_rate() -> f64 {
    30.0
}

impl DeploymentProfile {
    /// The MNIST autoencoder explorer: 27x27, plain blend over `[0,1]` sliders.
    pub fn autoencoder() -> Self {
        Self {
            name: "autoencoder".to_string(),
            image: ImageSize::new(27, 27),
            sequence: SequenceParams {
                seed: 132222,
                multiplier: 121,
                increment: 97,
                modulus: 562,
                iterations_per_call: 2,
            },
            slider: SliderRange {
                min: 0.0,
                max: 1.0,
                step: 0.1,
            },
            defaults: SliderDefaults {
                slots: 9,
                scale: 0.1,
                offset: 0.1,
            },
            mix_remap: MixRemap::IDENTITY,
            blend: BlendPolicy::Linear,
            preset: None,
            training_preview: true,
            train_after_load: true,
            startup: StartupAction::TrainOnce,
            tick_rate_hz: default_tick_rate(),
        }
    }

    /// The WGAN generator explorer: 29x29, magnitude-preserving blend over
    /// `[-2,2]` sliders with the mix slider remapped into `[0,1]`.
    pub fn wcgan() -> Self {
        Self {
            name: "wcgan".to_string(),
            image: ImageSize::new(29, 29),
            sequence: SequenceParams {
                seed: 5643,
                multiplier: 121,
                increment: 97,
                modulus: 9999,
                iterations_per_call: 10,
            },
            slider: SliderRange {
                min: -2.0,
                max: 2.0,
                step: 0.1,
            },
            defaults: SliderDefaults {
                slots: 9,
                scale: 0.2,
                offset: 0.2 - 1.0,
            },
            mix_remap: MixRemap {
                scale: 0.25,
                offset: 0.5,
            },
            blend: BlendPolicy::MagnitudePreserving,
            preset: Some(ControlPreset {
                a: [0.7, 0.1, 0.9, 0.6, 0.2, 0.6, 0.0, 0.6, 1.0, 0.4],
                b: [0.5, 0.1, 0.4, 0.5, 0.2, 0.8, 0.0, 0.4, 1.0, 0.1],
            }),
            training_preview: false,
            train_after_load: false,
            startup: StartupAction::LoadPretrained,
            tick_rate_hz: default_tick_rate(),
        }
    }

    /// Look up a built-in profile by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "autoencoder" | "ae" => Some(Self::autoencoder()),
            "wcgan" | "gan" => Some(Self::wcgan()),
            _ => None,
        }
    }

    pub fn builtin_names() -> &'static [&'static str] {
        &["autoencoder", "wcgan"]
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let profile: Self = serde_json::from_str(json).context("Malformed profile JSON")?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {:?}", path))?;
        Self::from_json_str(&raw).with_context(|| format!("Invalid profile {:?}", path))
    }

    /// Reject configurations the bridge cannot run with.
    pub fn validate(&self) -> Result<(), BridgeError> {
        let invalid = |msg: &str| Err(BridgeError::InvalidProfile(format!("{}: {}", self.name, msg)));

        if self.image.width == 0 || self.image.height == 0 {
            return invalid("image size must be non-zero");
        }
        if self.sequence.modulus == 0 {
            return invalid("sequence modulus must be non-zero");
        }
        if !(self.slider.min.is_finite() && self.slider.max.is_finite()) {
            return invalid("slider bounds must be finite");
        }
        if !(self.slider.min <= self.slider.max) {
            return invalid("slider min must not exceed max");
        }
        if !(self.slider.step > 0.0 && self.slider.step.is_finite()) {
            return invalid("slider step must be a positive number");
        }
        if self.defaults.slots == 0 {
            return invalid("default slots must be non-zero");
        }
        if !(self.defaults.scale.is_finite() && self.defaults.offset.is_finite()) {
            return invalid("default scale and offset must be finite");
        }
        self.tick_interval()?;
        Ok(())
    }

    /// Period between training ticks. Rates whose period rounds to zero or
    /// does not fit a `Duration` are rejected.
    pub fn tick_interval(&self) -> Result<Duration, BridgeError> {
        match Duration::try_from_secs_f64(1.0 / self.tick_rate_hz) {
            Ok(period) if !period.is_zero() => Ok(period),
            _ => Err(BridgeError::InvalidProfile(format!(
                "{}: tick rate {} Hz has no usable period",
                self.name, self.tick_rate_hz
            ))),
        }
    }
}
