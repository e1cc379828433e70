use crate::arena::ElementType;
use thiserror::Error;

/// Failures raised by the shared-buffer bridge and its configuration.
///
/// Every variant signals a setup problem between host and engine.
/// None of them is retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// The arena could not hand out the requested block. Fatal at init.
    #[error("arena cannot satisfy a {requested}-byte allocation: {reason}")]
    AllocationFailure { requested: usize, reason: String },

    /// A pixel buffer does not match the configured image size.
    #[error("pixel buffer holds {actual} bytes but a {width}x{height} RGBA image needs {expected}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// A region was used with a view of the wrong element type.
    #[error("region holds {actual:?} elements, {expected:?} view requested")]
    ElementMismatch {
        expected: ElementType,
        actual: ElementType,
    },

    /// A region no longer fits the arena it was allocated from.
    #[error("region [{offset}, {offset}+{length}) lies outside the {arena_len}-byte arena")]
    OutOfBounds {
        offset: u32,
        length: u32,
        arena_len: usize,
    },

    /// A slice written into a view does not have the view's length.
    #[error("expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A control index beyond the fixed latent dimension.
    #[error("control index {index} out of range (latent dimension is {dim})")]
    ControlOutOfRange { index: usize, dim: usize },

    /// A control was given NaN or an infinity.
    #[error("control value {0} is not a finite number")]
    NonFiniteValue(f64),

    #[error("invalid deployment profile: {0}")]
    InvalidProfile(String),
}
