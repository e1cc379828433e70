pub mod arena;
pub mod controls;
pub mod engine;
pub mod error;
pub mod interpolation;
pub mod latent;
pub mod pixels;
pub mod profile;
pub mod scheduler;
pub mod sequence;
pub mod store;

// Re-export the main types so users can just use `latent_core::UpdateScheduler`
pub use arena::{Arena, BufferBridge, BufferRegion, ElementType, HeapArena};
pub use engine::{InferenceEngine, PatternEngine};
pub use error::BridgeError;
pub use interpolation::{BlendPolicy, MixRemap, linear_blend, magnitude_preserving_blend};
pub use latent::{LATENT_DIM, LatentVector};
pub use pixels::{ImageSize, PixelFrame, RenderSink, RenderTarget};
pub use profile::{DeploymentProfile, StartupAction};
pub use scheduler::{Event, EventQueue, Outcome, SchedulerState, SharedScheduler, UpdateScheduler};
pub use sequence::{SequenceGenerator, SequenceParams};
pub use store::{ControlId, LatentVectorStore};
