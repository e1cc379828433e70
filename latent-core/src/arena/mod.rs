//! # The Buffer Bridge
//!
//! Host data reaches the inference engine through a single linear arena.
//! The bridge hands out fixed regions of that arena and typed views over
//! them. Raw offsets stay inside [`BufferRegion`]; they only become plain
//! integers at the engine call site.
//!
//! A view borrows the bridge for as long as it lives, so the arena cannot be
//! relocated underneath it. Arena owners that can grow memory on their own
//! (a wasm module calling `memory.grow` inside `malloc`) must not be driven
//! while a view is held. The bridge does no relocation tracking.

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};

pub mod heap;

pub use heap::HeapArena;

/// Element type a region is addressed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    /// Pixel data.
    Byte,
    /// Numeric vectors, little-endian IEEE-754.
    Float64,
}

impl ElementType {
    /// Width of one element in bytes.
    pub const fn width(self) -> usize {
        match self {
            ElementType::Byte => 1,
            ElementType::Float64 => 8,
        }
    }
}

/// A fixed span inside the arena. Immutable once allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferRegion {
    offset: u32,
    length: u32,
    element: ElementType,
}

impl BufferRegion {
    /// Byte offset into the arena. Only engine call sites should need this.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Length in bytes.
    pub fn byte_len(&self) -> usize {
        self.length as usize
    }

    /// Length in elements of the region's type.
    pub fn len(&self) -> usize {
        self.byte_len() / self.element.width()
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn element(&self) -> ElementType {
        self.element
    }

    /// This region's bytes within an arena's memory.
    pub fn slice<'a>(&self, memory: &'a [u8]) -> Result<&'a [u8], BridgeError> {
        let arena_len = memory.len();
        memory.get(self.range()).ok_or(BridgeError::OutOfBounds {
            offset: self.offset,
            length: self.length,
            arena_len,
        })
    }

    /// This region's bytes within an arena's memory, mutably.
    pub fn slice_mut<'a>(&self, memory: &'a mut [u8]) -> Result<&'a mut [u8], BridgeError> {
        let arena_len = memory.len();
        memory.get_mut(self.range()).ok_or(BridgeError::OutOfBounds {
            offset: self.offset,
            length: self.length,
            arena_len,
        })
    }

    fn range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.length as usize
    }
}

/// The shared linear memory the engine reads from and writes to.
pub trait Arena {
    /// Reserve `size` bytes and return the offset of the block.
    ///
    /// Offsets must be 8-byte aligned so float64 regions are addressable.
    fn reserve(&mut self, size: usize) -> Result<u32, BridgeError>;

    /// The whole arena as bytes.
    fn bytes(&self) -> &[u8];

    /// The whole arena as mutable bytes.
    fn bytes_mut(&mut self) -> &mut [u8];
}

/// Owns an arena and the regions allocated from it.
///
/// Regions live as long as the bridge; there is no free path.
#[derive(Debug)]
pub struct BufferBridge<A> {
    arena: A,
    regions: Vec<BufferRegion>,
}

impl<A: Arena> BufferBridge<A> {
    pub fn new(arena: A) -> Self {
        Self {
            arena,
            regions: Vec::new(),
        }
    }

    /// Allocate `len` elements of `element` and zero-fill them.
    ///
    /// `len` counts elements: a float64 region of 10 spans 80 bytes.
    pub fn allocate(
        &mut self,
        len: usize,
        element: ElementType,
    ) -> Result<BufferRegion, BridgeError> {
        let size = len
            .checked_mul(element.width())
            .filter(|size| *size <= u32::MAX as usize)
            .ok_or_else(|| BridgeError::AllocationFailure {
                requested: len.saturating_mul(element.width()),
                reason: "size exceeds the 32-bit address space".to_string(),
            })?;

        let offset = self.arena.reserve(size)?;
        if element == ElementType::Float64 && offset % 8 != 0 {
            return Err(BridgeError::AllocationFailure {
                requested: size,
                reason: format!("offset {} is not 8-byte aligned", offset),
            });
        }

        let region = BufferRegion {
            offset,
            length: size as u32,
            element,
        };

        self.raw_mut(&region)?.fill(0);
        self.regions.push(region);

        tracing::info!(
            "Allocated {:?} region: {} bytes at offset {}",
            element,
            size,
            offset
        );
        Ok(region)
    }

    /// Read-only byte view of a byte region.
    pub fn bytes(&self, region: &BufferRegion) -> Result<&[u8], BridgeError> {
        expect_element(region, ElementType::Byte)?;
        self.raw(region)
    }

    /// Mutable byte view of a byte region.
    pub fn bytes_mut(&mut self, region: &BufferRegion) -> Result<&mut [u8], BridgeError> {
        expect_element(region, ElementType::Byte)?;
        self.raw_mut(region)
    }

    /// Read-only float64 view of a float64 region.
    pub fn floats(&self, region: &BufferRegion) -> Result<F64View<'_>, BridgeError> {
        expect_element(region, ElementType::Float64)?;
        Ok(F64View {
            bytes: self.raw(region)?,
        })
    }

    /// Mutable float64 view of a float64 region.
    pub fn floats_mut(&mut self, region: &BufferRegion) -> Result<F64ViewMut<'_>, BridgeError> {
        expect_element(region, ElementType::Float64)?;
        Ok(F64ViewMut {
            bytes: self.raw_mut(region)?,
        })
    }

    /// Every region handed out so far, in allocation order.
    pub fn regions(&self) -> &[BufferRegion] {
        &self.regions
    }

    pub fn arena(&self) -> &A {
        &self.arena
    }

    /// The arena itself, for the engine side of a call.
    pub fn arena_mut(&mut self) -> &mut A {
        &mut self.arena
    }

    fn raw(&self, region: &BufferRegion) -> Result<&[u8], BridgeError> {
        region.slice(self.arena.bytes())
    }

    fn raw_mut(&mut self, region: &BufferRegion) -> Result<&mut [u8], BridgeError> {
        region.slice_mut(self.arena.bytes_mut())
    }
}

fn expect_element(region: &BufferRegion, expected: ElementType) -> Result<(), BridgeError> {
    if region.element == expected {
        Ok(())
    } else {
        Err(BridgeError::ElementMismatch {
            expected,
            actual: region.element,
        })
    }
}

fn decode(chunk: &[u8]) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(chunk);
    f64::from_le_bytes(raw)
}

/// Read-only float64 view over arena bytes.
#[derive(Debug)]
pub struct F64View<'a> {
    bytes: &'a [u8],
}

impl<'a> F64View<'a> {
    /// View raw little-endian bytes as float64s. Trailing bytes are ignored.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len() / 8
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.bytes.chunks_exact(8).nth(index).map(decode)
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.bytes.chunks_exact(8).map(decode).collect()
    }
}

/// Mutable float64 view over arena bytes.
///
/// Values are encoded little-endian, which is what wasm linear memory uses,
/// so the arena does not have to be aligned in host address space.
#[derive(Debug)]
pub struct F64ViewMut<'a> {
    bytes: &'a mut [u8],
}

impl F64ViewMut<'_> {
    pub fn len(&self) -> usize {
        self.bytes.len() / 8
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.bytes.chunks_exact(8).nth(index).map(decode)
    }

    /// Overwrite one element. Returns false when `index` is out of range.
    pub fn set(&mut self, index: usize, value: f64) -> bool {
        match self.bytes.chunks_exact_mut(8).nth(index) {
            Some(slot) => {
                slot.copy_from_slice(&value.to_le_bytes());
                true
            }
            None => false,
        }
    }

    /// Overwrite the whole view. `values` must match the view length exactly.
    pub fn copy_from(&mut self, values: &[f64]) -> Result<(), BridgeError> {
        if values.len() != self.len() {
            return Err(BridgeError::LengthMismatch {
                expected: self.len(),
                actual: values.len(),
            });
        }
        for (slot, value) in self.bytes.chunks_exact_mut(8).zip(values) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.bytes.chunks_exact(8).map(decode).collect()
    }
}
