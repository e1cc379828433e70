use anyhow::{Context, Result};
use clap::Parser;
use latent_bridge::cli::{Args, SinkKind};
use latent_bridge::driver::{self, Driver};
use latent_bridge::sinks::{PngSink, TerminalSink};
use latent_core::{
    DeploymentProfile, HeapArena, InferenceEngine, PatternEngine, RenderSink, SharedScheduler,
    UpdateScheduler,
};
use latent_wasm::WasmHost;
use tokio::sync::mpsc;

type BoxedSink = Box<dyn RenderSink + Send>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let profile = args.resolve_profile()?;
    let weights = args.read_weights()?;
    let sink = build_sink(&args)?;

    tracing::info!("=== Latent Bridge Starting ({}) ===", profile.name);

    match &args.wasm {
        Some(path) => {
            let host = WasmHost::new()?;
            let (arena, engine) = host.load_file(path)?;
            launch(&args, profile, arena, engine, weights, sink).await
        }
        None => {
            let capacity = 64 * 1024
                + profile.image.byte_len() * 3
                + weights.as_ref().map_or(0, |w| w.len());
            let engine = PatternEngine::new(profile.image);
            let arena = HeapArena::with_capacity(capacity);
            launch(&args, profile, arena, engine, weights, sink).await
        }
    }
}

fn build_sink(args: &Args) -> Result<BoxedSink> {
    Ok(match args.sink {
        SinkKind::Terminal => Box::new(TerminalSink::new(std::io::stdout())),
        SinkKind::Png => Box::new(PngSink::new(args.output_dir()?)?),
    })
}

async fn launch<E>(
    args: &Args,
    profile: DeploymentProfile,
    arena: E::Arena,
    engine: E,
    weights: Option<Vec<u8>>,
    sink: BoxedSink,
) -> Result<()>
where
    E: InferenceEngine + Send + 'static,
    E::Arena: Send,
{
    let period = profile.tick_interval()?;
    let mut scheduler = UpdateScheduler::new(profile, arena, engine, sink)?;

    if let Some(bytes) = weights {
        scheduler
            .context_mut()
            .stage_weights(&bytes)
            .context("Failed to stage weights")?;
    }

    scheduler.boot().context("Startup failed")?;
    if args.run {
        scheduler.start();
    }

    let (tx, rx) = mpsc::channel(64);
    driver::spawn_stdin(tx.clone());

    let report = Driver::new(SharedScheduler::new(scheduler), period, args.ticks)
        .run(tx, rx)
        .await?;

    eprintln!(
        "=== Latent Bridge Stopped: {} passes, {} train steps, {} ticks dropped ===",
        report.stats.passes, report.stats.train_steps, report.stats.dropped_ticks
    );
    Ok(())
}
