//! # Update Scheduler
//!
//! One logical queue receives timer ticks and control changes. Each event is
//! handled to completion before the next is dequeued, so no two writes to a
//! region ever overlap. Handlers are free functions over an explicit
//! [`SessionContext`]; there is no global state.
//!
//! [`SharedScheduler`] is the multi-threaded port: one lock around the whole
//! scheduler, with ticks dropped instead of queued while an engine call is
//! in flight.

use crate::arena::{BufferBridge, BufferRegion, ElementType};
use crate::engine::InferenceEngine;
use crate::error::BridgeError;
use crate::interpolation::BlendPolicy;
use crate::pixels::{PixelFrame, RenderSink, RenderTarget};
use crate::profile::{DeploymentProfile, StartupAction};
use crate::sequence::SequenceGenerator;
use crate::store::{ControlId, LatentVectorStore};
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::fmt;

pub mod shared;

pub use shared::SharedScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    Running,
}

/// Everything the scheduler reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Timer tick. Trains and renders while Running, ignored while Idle.
    Tick,
    /// A control moved. Always renders.
    ControlChanged { control: ControlId, value: f64 },
    /// Reread controls and render without changing anything.
    Refresh,
    Start,
    Stop,
    Toggle,
    /// One manual training step, whatever the state.
    Step,
    LoadPretrained,
    ResetWeights,
}

/// What handling an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A recompute pass ran, preceded by a training step if `trained`.
    Rendered { trained: bool },
    StateChanged(SchedulerState),
    /// Nothing to do: a tick while Idle, a start while Running.
    Unchanged,
    /// The tick arrived while an engine call was in flight.
    Dropped,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub train_steps: u64,
    pub passes: u64,
    pub dropped_ticks: u64,
}

/// FIFO of pending events.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// ════════════════════════════════════════════════════════════════════
// Session context
// ════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
struct PreviewRegions {
    input: BufferRegion,
    output: BufferRegion,
}

/// The engine, its arena and the slider state, passed into every handler.
pub struct SessionContext<E: InferenceEngine> {
    pub bridge: BufferBridge<E::Arena>,
    pub engine: E,
    pub store: LatentVectorStore,
    preview: Option<PreviewRegions>,
    weights: Option<BufferRegion>,
}

impl<E: InferenceEngine> fmt::Debug for SessionContext<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("store", &self.store)
            .field("regions", &self.bridge.regions().len())
            .finish()
    }
}

impl<E: InferenceEngine> SessionContext<E> {
    /// Allocate every region the profile needs. Any failure here is fatal.
    pub fn new(
        arena: E::Arena,
        engine: E,
        profile: &DeploymentProfile,
    ) -> Result<Self, BridgeError> {
        profile.validate()?;

        let mut bridge = BufferBridge::new(arena);
        let mut seq = SequenceGenerator::new(profile.sequence)?;
        let store = LatentVectorStore::new(&mut bridge, profile, &mut seq)?;

        let preview = if profile.training_preview {
            let len = profile.image.byte_len();
            Some(PreviewRegions {
                input: bridge.allocate(len, ElementType::Byte)?,
                output: bridge.allocate(len, ElementType::Byte)?,
            })
        } else {
            None
        };

        Ok(Self {
            bridge,
            engine,
            store,
            preview,
            weights: None,
        })
    }

    /// Copy weight bytes into the arena for the next `LoadPretrainedModel`.
    ///
    /// A region of the same size is reused; otherwise a new one is allocated
    /// (regions are never freed).
    pub fn stage_weights(&mut self, bytes: &[u8]) -> Result<BufferRegion, BridgeError> {
        let region = match self.weights {
            Some(region) if region.byte_len() == bytes.len() => region,
            _ => self.bridge.allocate(bytes.len(), ElementType::Byte)?,
        };
        self.bridge.bytes_mut(&region)?.copy_from_slice(bytes);
        self.weights = Some(region);
        Ok(region)
    }

    pub fn weights(&self) -> Option<&BufferRegion> {
        self.weights.as_ref()
    }

    pub fn has_training_preview(&self) -> bool {
        self.preview.is_some()
    }

    fn frame_from(&self, region: &BufferRegion) -> Result<PixelFrame> {
        let bytes = self.bridge.bytes(region)?.to_vec();
        Ok(PixelFrame::new(self.store.image(), bytes)?)
    }
}

// ════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════

/// Render A, B and their blend: write each vector into the latent region,
/// call `Predict`, forward the frame to the sink.
pub fn recompute_pass<E, S>(
    ctx: &mut SessionContext<E>,
    policy: BlendPolicy,
    sink: &mut S,
) -> Result<()>
where
    E: InferenceEngine,
    S: RenderSink + ?Sized,
{
    let pair = ctx.store.control_pair();
    let latent = *ctx.store.latent_region();
    let frame = *ctx.store.frame_region();

    for (target, vector) in pair.targets(policy) {
        ctx.bridge.floats_mut(&latent)?.copy_from(vector.as_slice())?;
        ctx.engine
            .predict(ctx.bridge.arena_mut(), &latent, &frame)
            .with_context(|| format!("Predict failed for {}", target))?;
        let pixels = ctx.frame_from(&frame)?;
        sink.present(target, &pixels)?;
    }

    tracing::debug!("Recompute pass done (t = {:.3})", pair.t);
    Ok(())
}

/// One `Train` call, then the training preview if the profile shows it.
pub fn train_step<E, S>(ctx: &mut SessionContext<E>, sink: &mut S) -> Result<()>
where
    E: InferenceEngine,
    S: RenderSink + ?Sized,
{
    ctx.engine
        .train(ctx.bridge.arena_mut())
        .context("Train failed")?;

    if let Some(preview) = ctx.preview {
        ctx.engine
            .last_input(ctx.bridge.arena_mut(), &preview.input)
            .context("LastInput failed")?;
        ctx.engine
            .last_output(ctx.bridge.arena_mut(), &preview.output)
            .context("LastOutput failed")?;

        for (target, region) in [
            (RenderTarget::TrainingInput, preview.input),
            (RenderTarget::TrainingOutput, preview.output),
        ] {
            let pixels = ctx.frame_from(&region)?;
            sink.present(target, &pixels)?;
        }
    }
    Ok(())
}

// ════════════════════════════════════════════════════════════════════
// Scheduler
// ════════════════════════════════════════════════════════════════════

/// Owns the session and drives it from events.
pub struct UpdateScheduler<E: InferenceEngine, S> {
    state: SchedulerState,
    profile: DeploymentProfile,
    context: SessionContext<E>,
    sink: S,
    stats: SchedulerStats,
}

impl<E: InferenceEngine, S> fmt::Debug for UpdateScheduler<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("profile", &self.profile.name)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<E: InferenceEngine, S: RenderSink> UpdateScheduler<E, S> {
    pub fn new(
        profile: DeploymentProfile,
        arena: E::Arena,
        engine: E,
        sink: S,
    ) -> Result<Self> {
        let context = SessionContext::new(arena, engine, &profile)
            .with_context(|| format!("Failed to initialise the {} session", profile.name))?;

        tracing::info!(
            "Scheduler ready: profile {} ({}x{}, {:?} blend)",
            profile.name,
            profile.image.width,
            profile.image.height,
            profile.blend
        );

        Ok(Self {
            state: SchedulerState::Idle,
            profile,
            context,
            sink,
            stats: SchedulerStats::default(),
        })
    }

    /// Run the profile's startup action.
    pub fn boot(&mut self) -> Result<Outcome> {
        match self.profile.startup {
            StartupAction::TrainOnce => self.step(),
            StartupAction::LoadPretrained => self.load_pretrained(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn profile(&self) -> &DeploymentProfile {
        &self.profile
    }

    pub fn context(&self) -> &SessionContext<E> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SessionContext<E> {
        &mut self.context
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn start(&mut self) -> Outcome {
        self.transition(SchedulerState::Running)
    }

    pub fn stop(&mut self) -> Outcome {
        self.transition(SchedulerState::Idle)
    }

    pub fn toggle(&mut self) -> Outcome {
        match self.state {
            SchedulerState::Idle => self.start(),
            SchedulerState::Running => self.stop(),
        }
    }

    fn transition(&mut self, next: SchedulerState) -> Outcome {
        if self.state == next {
            return Outcome::Unchanged;
        }
        tracing::info!("Scheduler {:?} -> {:?}", self.state, next);
        self.state = next;
        Outcome::StateChanged(next)
    }

    /// Timer tick: one training step and a pass while Running.
    pub fn tick(&mut self) -> Result<Outcome> {
        self.stats.ticks += 1;
        match self.state {
            SchedulerState::Idle => Ok(Outcome::Unchanged),
            SchedulerState::Running => self.step(),
        }
    }

    /// Manual training step followed by a pass.
    pub fn step(&mut self) -> Result<Outcome> {
        train_step(&mut self.context, &mut self.sink)?;
        self.stats.train_steps += 1;
        self.render(true)
    }

    /// Apply a control change and render, whatever the state.
    pub fn set_control(&mut self, control: ControlId, value: f64) -> Result<Outcome> {
        self.context.store.set(control, value)?;
        self.render(false)
    }

    pub fn refresh(&mut self) -> Result<Outcome> {
        self.render(false)
    }

    /// Load pretrained weights (staged ones if any), then render.
    pub fn load_pretrained(&mut self) -> Result<Outcome> {
        let weights = self.context.weights;
        self.context
            .engine
            .load_pretrained_model(self.context.bridge.arena_mut(), weights.as_ref())
            .context("LoadPretrainedModel failed")?;
        tracing::info!("Pretrained model loaded");

        if self.profile.train_after_load {
            self.step()
        } else {
            self.render(false)
        }
    }

    pub fn reset_weights(&mut self) -> Result<Outcome> {
        self.context
            .engine
            .reset_model_weight(self.context.bridge.arena_mut())
            .context("ResetModelWeight failed")?;
        tracing::info!("Model weights reset");
        self.render(false)
    }

    fn render(&mut self, trained: bool) -> Result<Outcome> {
        recompute_pass(&mut self.context, self.profile.blend, &mut self.sink)?;
        self.stats.passes += 1;
        Ok(Outcome::Rendered { trained })
    }

    /// Handle one event to completion.
    pub fn dispatch(&mut self, event: Event) -> Result<Outcome> {
        match event {
            Event::Tick => self.tick(),
            Event::ControlChanged { control, value } => self.set_control(control, value),
            Event::Refresh => self.refresh(),
            Event::Start => Ok(self.start()),
            Event::Stop => Ok(self.stop()),
            Event::Toggle => Ok(self.toggle()),
            Event::Step => self.step(),
            Event::LoadPretrained => self.load_pretrained(),
            Event::ResetWeights => self.reset_weights(),
        }
    }

    /// Dequeue and handle events until the queue is empty.
    ///
    /// Stops at the first error; the failing event is consumed.
    pub fn drain(&mut self, queue: &mut EventQueue) -> Result<Vec<Outcome>> {
        let mut outcomes = Vec::with_capacity(queue.len());
        while let Some(event) = queue.pop() {
            outcomes.push(self.dispatch(event)?);
        }
        Ok(outcomes)
    }
}
