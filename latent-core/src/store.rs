use crate::arena::{Arena, BufferBridge, BufferRegion, ElementType};
use crate::controls::{Control, SliderGroup};
use crate::error::BridgeError;
use crate::interpolation::{BlendPolicy, MixRemap};
use crate::latent::{LATENT_DIM, LatentVector};
use crate::pixels::{ImageSize, RenderTarget};
use crate::profile::DeploymentProfile;
use crate::sequence::SequenceGenerator;

/// Which control a change notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    A(usize),
    B(usize),
    Mix,
}

/// A and B plus the (already remapped) mix coefficient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPair {
    pub a: LatentVector,
    pub b: LatentVector,
    pub t: f64,
}

impl ControlPair {
    /// The three vectors a recompute pass renders, in render order.
    pub fn targets(&self, policy: BlendPolicy) -> [(RenderTarget, LatentVector); 3] {
        [
            (RenderTarget::A, self.a),
            (RenderTarget::B, self.b),
            (RenderTarget::Interpolated, policy.blend(&self.a, &self.b, self.t)),
        ]
    }
}

/// Current slider state and the regions the engine exchanges data through.
#[derive(Debug, Clone)]
pub struct LatentVectorStore {
    a: SliderGroup,
    b: SliderGroup,
    mix: Control,
    remap: MixRemap,
    image: ImageSize,
    latent: BufferRegion,
    frame: BufferRegion,
}

impl LatentVectorStore {
    /// Allocate the latent and frame regions and lay out default sliders.
    ///
    /// Defaults are drawn in creation order: ten for A, ten for B, one for
    /// the mix slider. A preset, if any, then overwrites A and B.
    pub fn new<A: Arena>(
        bridge: &mut BufferBridge<A>,
        profile: &DeploymentProfile,
        seq: &mut SequenceGenerator,
    ) -> Result<Self, BridgeError> {
        let latent = bridge.allocate(LATENT_DIM, ElementType::Float64)?;
        let frame = bridge.allocate(profile.image.byte_len(), ElementType::Byte)?;

        let mut a = SliderGroup::seeded(profile.slider, &profile.defaults, seq)?;
        let mut b = SliderGroup::seeded(profile.slider, &profile.defaults, seq)?;
        let mix = Control::seeded(profile.slider, &profile.defaults, seq)?;

        if let Some(preset) = &profile.preset {
            a.apply_normalized(&preset.a)?;
            b.apply_normalized(&preset.b)?;
        }

        Ok(Self {
            a,
            b,
            mix,
            remap: profile.mix_remap,
            image: profile.image,
            latent,
            frame,
        })
    }

    /// Reread every control into a pair ready for blending.
    pub fn control_pair(&self) -> ControlPair {
        ControlPair {
            a: self.a.values(),
            b: self.b.values(),
            t: self.remap.apply(self.mix.value()),
        }
    }

    /// Apply a control change. Returns true if the stored value moved.
    pub fn set(&mut self, control: ControlId, value: f64) -> Result<bool, BridgeError> {
        match control {
            ControlId::A(i) => self.a.set(i, value),
            ControlId::B(i) => self.b.set(i, value),
            ControlId::Mix => self.mix.set(value),
        }
    }

    pub fn get(&self, control: ControlId) -> Option<f64> {
        match control {
            ControlId::A(i) => self.a.get(i),
            ControlId::B(i) => self.b.get(i),
            ControlId::Mix => Some(self.mix.value()),
        }
    }

    pub fn sliders_a(&self) -> &SliderGroup {
        &self.a
    }

    pub fn sliders_b(&self) -> &SliderGroup {
        &self.b
    }

    /// Raw mix slider value, before remapping.
    pub fn mix(&self) -> f64 {
        self.mix.value()
    }

    pub fn image(&self) -> ImageSize {
        self.image
    }

    /// Float64 region the engine reads latent vectors from.
    pub fn latent_region(&self) -> &BufferRegion {
        &self.latent
    }

    /// Byte region the engine writes frames into.
    pub fn frame_region(&self) -> &BufferRegion {
        &self.frame
    }
}
