use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use directories::ProjectDirs;
use latent_core::DeploymentProfile;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "latent-bridge",
    version,
    about = "Explore an inference module's latent space from the terminal"
)]
pub struct Args {
    /// Built-in profile (autoencoder, wcgan) or a JSON profile file.
    #[arg(short, long, default_value = "autoencoder")]
    pub profile: String,

    /// Compiled inference module. The built-in pattern engine runs without one.
    #[arg(long)]
    pub wasm: Option<PathBuf>,

    /// Weights staged for LoadPretrainedModel.
    #[arg(long)]
    pub weights: Option<PathBuf>,

    /// Override the profile's tick rate (ticks per second).
    #[arg(long)]
    pub tick_rate: Option<f64>,

    /// Exit after this many timer ticks.
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Start training right after boot.
    #[arg(long)]
    pub run: bool,

    #[arg(long, value_enum, default_value_t = SinkKind::Terminal)]
    pub sink: SinkKind,

    /// Directory for PNG frames. Defaults to the user data directory.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// ASCII preview on stdout.
    Terminal,
    /// One PNG per render target, overwritten each pass.
    Png,
}

impl Args {
    /// Resolve `--profile` and apply overrides.
    pub fn resolve_profile(&self) -> Result<DeploymentProfile> {
        let mut profile = match DeploymentProfile::builtin(&self.profile) {
            Some(profile) => profile,
            None => {
                let path = Path::new(&self.profile);
                if !path.exists() {
                    bail!(
                        "Unknown profile '{}' (built-ins: {})",
                        self.profile,
                        DeploymentProfile::builtin_names().join(", ")
                    );
                }
                DeploymentProfile::from_file(path)?
            }
        };

        if let Some(rate) = self.tick_rate {
            profile.tick_rate_hz = rate;
            profile.validate()?;
        }
        Ok(profile)
    }

    pub fn output_dir(&self) -> Result<PathBuf> {
        match &self.out {
            Some(dir) => Ok(dir.clone()),
            None => default_output_dir(),
        }
    }

    pub fn read_weights(&self) -> Result<Option<Vec<u8>>> {
        self.weights
            .as_ref()
            .map(|path| {
                std::fs::read(path).with_context(|| format!("Failed to read weights {:?}", path))
            })
            .transpose()
    }
}

/// `<data dir>/latent-bridge/frames` on the current platform.
pub fn default_output_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("org", "latent", "latent-bridge")
        .context("No home directory to place frames in; pass --out")?;
    Ok(dirs.data_dir().join("frames"))
}
