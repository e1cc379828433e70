use latent_core::{Arena, BridgeError};
use wasmtime::{Memory, Store, TypedFunc};

/// A module's exported linear memory, allocated through its own `malloc`.
///
/// `malloc` may grow the memory, which moves the host-side buffer. The
/// bridge only ever hands out views borrowed from this arena, so no view can
/// outlive a `reserve` or an engine call.
pub struct WasmArena {
    store: Store<()>,
    memory: Memory,
    malloc: TypedFunc<i32, i32>,
}

impl std::fmt::Debug for WasmArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmArena")
            .field("bytes", &self.memory.data_size(&self.store))
            .finish()
    }
}

impl WasmArena {
    pub(crate) fn new(store: Store<()>, memory: Memory, malloc: TypedFunc<i32, i32>) -> Self {
        Self {
            store,
            memory,
            malloc,
        }
    }

    /// Current size of the linear memory in bytes.
    pub fn size(&self) -> usize {
        self.memory.data_size(&self.store)
    }

    pub(crate) fn store_mut(&mut self) -> &mut Store<()> {
        &mut self.store
    }
}

impl Arena for WasmArena {
    fn reserve(&mut self, size: usize) -> Result<u32, BridgeError> {
        let failure = |reason: String| BridgeError::AllocationFailure {
            requested: size,
            reason,
        };

        let request = i32::try_from(size.max(1))
            .map_err(|_| failure("request exceeds the module's address space".to_string()))?;
        let ptr = self
            .malloc
            .call(&mut self.store, request)
            .map_err(|e| failure(format!("malloc trapped: {}", e)))?;

        if ptr == 0 {
            return Err(failure("malloc returned null".to_string()));
        }

        let offset = ptr as u32;
        if offset as usize + size > self.size() {
            return Err(failure(format!(
                "malloc returned {} but memory is only {} bytes",
                offset,
                self.size()
            )));
        }
        Ok(offset)
    }

    fn bytes(&self) -> &[u8] {
        self.memory.data(&self.store)
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self.memory.data_mut(&mut self.store)
    }
}
