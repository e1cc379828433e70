use crate::error::BridgeError;
use crate::latent::{LATENT_DIM, LatentVector};
use crate::sequence::SequenceGenerator;
use serde::{Deserialize, Serialize};

/// Bounds of a slider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl SliderRange {
    /// Clamp into `[min, max]` and snap to the nearest step counted from `min`,
    /// the way a range input sanitizes its value. NaN and infinities are
    /// rejected rather than stored.
    pub fn sanitize(&self, value: f64) -> Result<f64, BridgeError> {
        if !value.is_finite() {
            return Err(BridgeError::NonFiniteValue(value));
        }
        let clamped = value.clamp(self.min, self.max);
        if !(self.step > 0.0) {
            return Ok(clamped);
        }
        let steps = ((clamped - self.min) / self.step).round();
        Ok((self.min + steps * self.step).clamp(self.min, self.max))
    }
}

/// How a sequence value becomes a default slider position:
/// `(r % slots) * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderDefaults {
    pub slots: u64,
    pub scale: f64,
    pub offset: f64,
}

impl SliderDefaults {
    pub fn position(&self, draw: u64) -> f64 {
        (draw % self.slots.max(1)) as f64 * self.scale + self.offset
    }
}

/// One bounded scalar control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Control {
    range: SliderRange,
    value: f64,
}

impl Control {
    /// Values outside the range are clamped and snapped to the step.
    pub fn new(range: SliderRange, value: f64) -> Result<Self, BridgeError> {
        Ok(Self {
            range,
            value: range.sanitize(value)?,
        })
    }

    pub fn seeded(
        range: SliderRange,
        defaults: &SliderDefaults,
        seq: &mut SequenceGenerator,
    ) -> Result<Self, BridgeError> {
        Self::new(range, defaults.position(seq.next()))
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn range(&self) -> SliderRange {
        self.range
    }

    /// Returns true if the stored value changed. A rejected value leaves
    /// the control untouched.
    pub fn set(&mut self, value: f64) -> Result<bool, BridgeError> {
        let sanitized = self.range.sanitize(value)?;
        let changed = sanitized != self.value;
        self.value = sanitized;
        Ok(changed)
    }
}

/// Ten sliders, one per latent component.
#[derive(Debug, Clone, PartialEq)]
pub struct SliderGroup {
    controls: [Control; LATENT_DIM],
}

impl SliderGroup {
    fn at_min(range: SliderRange) -> Self {
        Self {
            controls: [Control {
                range,
                value: range.min,
            }; LATENT_DIM],
        }
    }

    pub fn from_values(range: SliderRange, values: [f64; LATENT_DIM]) -> Result<Self, BridgeError> {
        let mut group = Self::at_min(range);
        for (control, v) in group.controls.iter_mut().zip(values) {
            *control = Control::new(range, v)?;
        }
        Ok(group)
    }

    /// Draws one sequence value per slider, in slider order.
    pub fn seeded(
        range: SliderRange,
        defaults: &SliderDefaults,
        seq: &mut SequenceGenerator,
    ) -> Result<Self, BridgeError> {
        let mut group = Self::at_min(range);
        for control in group.controls.iter_mut() {
            *control = Control::seeded(range, defaults, seq)?;
        }
        Ok(group)
    }

    pub fn values(&self) -> LatentVector {
        LatentVector::new(self.controls.map(|c| c.value()))
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.controls.get(index).map(Control::value)
    }

    pub fn set(&mut self, index: usize, value: f64) -> Result<bool, BridgeError> {
        let control = self
            .controls
            .get_mut(index)
            .ok_or(BridgeError::ControlOutOfRange {
                index,
                dim: LATENT_DIM,
            })?;
        control.set(value)
    }

    /// Apply a preset given in normalized `[0,1]` units, mapped by `(v - 0.5) * 2`.
    pub fn apply_normalized(&mut self, values: &[f64; LATENT_DIM]) -> Result<(), BridgeError> {
        for (control, v) in self.controls.iter_mut().zip(values) {
            control.set((v - 0.5) * 2.0)?;
        }
        Ok(())
    }

    pub fn controls(&self) -> &[Control; LATENT_DIM] {
        &self.controls
    }
}

/// Starting positions for A and B in normalized units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPreset {
    pub a: [f64; LATENT_DIM],
    pub b: [f64; LATENT_DIM],
}
