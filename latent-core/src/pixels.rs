use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Image dimensions the engine renders at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// RGBA byte length: `width * height * 4`.
    pub const fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// An RGBA frame whose length matches its size exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFrame {
    size: ImageSize,
    rgba: Vec<u8>,
}

impl PixelFrame {
    pub fn new(size: ImageSize, rgba: Vec<u8>) -> Result<Self, BridgeError> {
        let expected = size.byte_len();
        if rgba.len() != expected {
            return Err(BridgeError::DimensionMismatch {
                width: size.width,
                height: size.height,
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self { size, rgba })
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    pub fn into_rgba(self) -> Vec<u8> {
        self.rgba
    }

    /// Mean of the RGB channels at `(x, y)`, in `[0, 255]`.
    pub fn luminance(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let i = (y as usize * self.size.width as usize + x as usize) * 4;
        let px = &self.rgba[i..i + 3];
        Some(((px[0] as u16 + px[1] as u16 + px[2] as u16) / 3) as u8)
    }
}

/// Where a frame is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderTarget {
    /// Control point A.
    A,
    /// Control point B.
    B,
    /// The blend of A and B.
    Interpolated,
    /// Most recent training sample fed to the engine.
    TrainingInput,
    /// The engine's reconstruction of that sample.
    TrainingOutput,
}

impl RenderTarget {
    pub fn label(self) -> &'static str {
        match self {
            RenderTarget::A => "image_a",
            RenderTarget::B => "image_b",
            RenderTarget::Interpolated => "image_c",
            RenderTarget::TrainingInput => "input",
            RenderTarget::TrainingOutput => "output",
        }
    }
}

impl fmt::Display for RenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The rendering surface. Consumes fixed-size RGBA frames.
pub trait RenderSink {
    fn present(&mut self, target: RenderTarget, frame: &PixelFrame) -> anyhow::Result<()>;
}

impl<S: RenderSink + ?Sized> RenderSink for Box<S> {
    fn present(&mut self, target: RenderTarget, frame: &PixelFrame) -> anyhow::Result<()> {
        (**self).present(target, frame)
    }
}

/// Keeps the latest frame per target. Handy for tests and snapshots.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub frames: Vec<(RenderTarget, PixelFrame)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self, target: RenderTarget) -> Option<&PixelFrame> {
        self.frames
            .iter()
            .rev()
            .find(|(t, _)| *t == target)
            .map(|(_, frame)| frame)
    }

    pub fn count(&self, target: RenderTarget) -> usize {
        self.frames.iter().filter(|(t, _)| *t == target).count()
    }
}

impl RenderSink for RecordingSink {
    fn present(&mut self, target: RenderTarget, frame: &PixelFrame) -> anyhow::Result<()> {
        self.frames.push((target, frame.clone()));
        Ok(())
    }
}
