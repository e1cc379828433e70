use crate::arena::WasmArena;
use crate::engine::WasmEngine;
use anyhow::{Context, Result, anyhow};
use std::path::Path;
use wasmtime::{Engine, Func, Instance, Linker, Module, Store, TypedFunc, WasmParams, WasmResults};

/// Compiles inference modules and splits each instance into an arena and an
/// engine handle that share one store.
pub struct WasmHost {
    engine: Engine,
}

impl std::fmt::Debug for WasmHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmHost").finish()
    }
}

impl WasmHost {
    pub fn new() -> Result<Self> {
        let engine = Engine::default();
        Ok(Self { engine })
    }

    /// Read and instantiate a module from disk.
    pub fn load_file(&self, path: &Path) -> Result<(WasmArena, WasmEngine)> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read wasm module {:?}", path))?;
        self.instantiate(&bytes)
            .with_context(|| format!("Failed to load wasm module {:?}", path))
    }

    /// Instantiate a module (binary, or WAT text).
    ///
    /// The module must be standalone: no imports are provided. It has to
    /// export `memory`, `malloc`, `Predict` and `Train`; the remaining engine
    /// operations are optional.
    pub fn instantiate(&self, bytes: &[u8]) -> Result<(WasmArena, WasmEngine)> {
        let module = Module::new(&self.engine, bytes)
            .map_err(|e| anyhow!("Invalid wasm module: {}", e))?;
        let mut store = Store::new(&self.engine, ());
        let linker = Linker::new(&self.engine);

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| anyhow!("Failed to instantiate module: {}", e))?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| anyhow!("Module does not export `memory`"))?;
        let malloc = required::<i32, i32>(&instance, &mut store, "malloc")?;
        let engine = WasmEngine::from_instance(&instance, &mut store)?;

        tracing::info!(
            "Wasm module loaded: {} pages of linear memory",
            memory.size(&store)
        );
        Ok((WasmArena::new(store, memory, malloc), engine))
    }
}

/// Look up an export by name, falling back to the underscore-prefixed
/// emscripten name.
pub(crate) fn find_export(instance: &Instance, store: &mut Store<()>, name: &str) -> Option<Func> {
    instance
        .get_func(&mut *store, name)
        .or_else(|| instance.get_func(&mut *store, &format!("_{}", name)))
}

pub(crate) fn typed<P: WasmParams, R: WasmResults>(
    func: Func,
    store: &Store<()>,
    name: &str,
) -> Result<TypedFunc<P, R>> {
    func.typed::<P, R>(store)
        .map_err(|e| anyhow!("Export `{}` has an unexpected signature: {}", name, e))
}

pub(crate) fn optional<P: WasmParams, R: WasmResults>(
    instance: &Instance,
    store: &mut Store<()>,
    name: &str,
) -> Result<Option<TypedFunc<P, R>>> {
    match find_export(instance, store, name) {
        Some(func) => typed(func, store, name).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn required<P: WasmParams, R: WasmResults>(
    instance: &Instance,
    store: &mut Store<()>,
    name: &str,
) -> Result<TypedFunc<P, R>> {
    optional(instance, store, name)?.ok_or_else(|| anyhow!("Module does not export `{}`", name))
}
