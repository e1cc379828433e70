use anyhow::{Context, Result};
use image::RgbaImage;
use latent_core::{PixelFrame, RenderSink, RenderTarget};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Darkest to brightest.
const RAMP: &[u8] = b" .:-=+*#%@";

/// Map a frame to rows of ASCII shades, one character per pixel.
pub fn ascii_rows(frame: &PixelFrame) -> Vec<String> {
    (0..frame.height())
        .map(|y| {
            (0..frame.width())
                .map(|x| {
                    let lum = frame.luminance(x, y).unwrap_or(0) as usize;
                    RAMP[lum * (RAMP.len() - 1) / 255] as char
                })
                .collect()
        })
        .collect()
}

/// Prints each frame as ASCII art.
pub struct TerminalSink<W> {
    out: W,
    show_training: bool,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            show_training: true,
        }
    }

    /// Skip the training preview frames.
    pub fn without_training(mut self) -> Self {
        self.show_training = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RenderSink for TerminalSink<W> {
    fn present(&mut self, target: RenderTarget, frame: &PixelFrame) -> Result<()> {
        if !self.show_training
            && matches!(
                target,
                RenderTarget::TrainingInput | RenderTarget::TrainingOutput
            )
        {
            return Ok(());
        }

        writeln!(self.out, "-- {} ({}x{}) --", target, frame.width(), frame.height())?;
        for row in ascii_rows(frame) {
            writeln!(self.out, "{}", row)?;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Writes `<target>.png` into a directory, replacing the previous frame.
#[derive(Debug)]
pub struct PngSink {
    dir: PathBuf,
    written: u64,
}

impl PngSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create frame directory {:?}", dir))?;
        tracing::info!("Writing frames to {:?}", dir);
        Ok(Self { dir, written: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, target: RenderTarget) -> PathBuf {
        self.dir.join(format!("{}.png", target.label()))
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl RenderSink for PngSink {
    fn present(&mut self, target: RenderTarget, frame: &PixelFrame) -> Result<()> {
        let image = RgbaImage::from_raw(frame.width(), frame.height(), frame.rgba().to_vec())
            .context("Frame does not fit its dimensions")?;
        let path = self.path_for(target);
        image
            .save(&path)
            .with_context(|| format!("Failed to write {:?}", path))?;
        self.written += 1;
        Ok(())
    }
}
