//! Deterministic sequence for default slider positions.
//!
//! A plain linear congruential step, repeated a fixed number of times per
//! call. It is NOT a source of randomness for anything that matters; it only
//! has to produce the same numbers on every platform.

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceParams {
    pub seed: u64,
    pub multiplier: u64,
    pub increment: u64,
    pub modulus: u64,
    pub iterations_per_call: u32,
}

#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    params: SequenceParams,
    state: u64,
}

impl SequenceGenerator {
    pub fn new(params: SequenceParams) -> Result<Self, BridgeError> {
        if params.modulus == 0 {
            return Err(BridgeError::InvalidProfile(
                "sequence modulus must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            params,
            state: params.seed,
        })
    }

    /// Advance `iterations_per_call` steps and return the new state.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u64 {
        let SequenceParams {
            multiplier,
            increment,
            modulus,
            iterations_per_call,
            ..
        } = self.params;

        for _ in 0..iterations_per_call {
            // 128-bit intermediate keeps the step exact for any u64 params.
            let next = (self.state as u128 * multiplier as u128 + increment as u128)
                % modulus as u128;
            self.state = next as u64;
        }
        self.state
    }

    pub fn state(&self) -> u64 {
        self.state
    }

    pub fn params(&self) -> &SequenceParams {
        &self.params
    }
}
