use super::Arena;
use crate::error::BridgeError;

const ALIGN: usize = 8;

/// A host-owned arena with a fixed capacity.
///
/// Memory is allocated once and never moves, so views stay valid for the
/// life of the arena. Reservations are bump-allocated and never freed.
#[derive(Debug, Clone)]
pub struct HeapArena {
    memory: Vec<u8>,
    cursor: usize,
}

impl HeapArena {
    /// Capacities beyond the 32-bit address space are clamped.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(u32::MAX as usize);
        Self {
            memory: vec![0; capacity],
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.memory.len()
    }

    /// Bytes handed out so far, alignment padding included.
    pub fn used(&self) -> usize {
        self.cursor
    }
}

impl Arena for HeapArena {
    fn reserve(&mut self, size: usize) -> Result<u32, BridgeError> {
        let start = self.cursor.next_multiple_of(ALIGN);
        let end = start.checked_add(size).filter(|end| *end <= self.memory.len());

        match end {
            Some(end) => {
                self.cursor = end;
                Ok(start as u32)
            }
            None => Err(BridgeError::AllocationFailure {
                requested: size,
                reason: format!(
                    "only {} of {} bytes free",
                    self.memory.len().saturating_sub(start),
                    self.memory.len()
                ),
            }),
        }
    }

    fn bytes(&self) -> &[u8] {
        &self.memory
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }
}
