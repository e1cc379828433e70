use crate::arena::WasmArena;
use crate::wasm_host::{find_export, optional, required, typed};
use anyhow::{Result, anyhow, bail};
use latent_core::{BufferRegion, InferenceEngine};
use wasmtime::{Instance, Store, TypedFunc};

/// `LoadPretrainedModel` comes in two shapes: with a weights offset, or with
/// weights compiled into the module.
enum LoadExport {
    FromRegion(TypedFunc<i32, ()>),
    Bundled(TypedFunc<(), ()>),
}

/// Typed handles to a module's engine exports.
pub struct WasmEngine {
    predict: TypedFunc<(i32, i32), ()>,
    train: TypedFunc<(), ()>,
    load: Option<LoadExport>,
    reset: Option<TypedFunc<(), ()>>,
    last_input: Option<TypedFunc<i32, ()>>,
    last_output: Option<TypedFunc<i32, ()>>,
}

impl std::fmt::Debug for WasmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmEngine")
            .field("load", &self.load.is_some())
            .field("reset", &self.reset.is_some())
            .field("preview", &self.supports_preview())
            .finish()
    }
}

fn ptr(region: &BufferRegion) -> i32 {
    region.offset() as i32
}

fn trapped(export: &'static str) -> impl FnOnce(wasmtime::Error) -> anyhow::Error {
    move |e| anyhow!("{} trapped: {}", export, e)
}

impl WasmEngine {
    pub(crate) fn from_instance(instance: &Instance, store: &mut Store<()>) -> Result<Self> {
        let load = match find_export(instance, store, "LoadPretrainedModel") {
            Some(func) if func.ty(&*store).params().len() == 0 => Some(LoadExport::Bundled(
                typed(func, store, "LoadPretrainedModel")?,
            )),
            Some(func) => Some(LoadExport::FromRegion(typed(
                func,
                store,
                "LoadPretrainedModel",
            )?)),
            None => None,
        };

        Ok(Self {
            predict: required(instance, store, "Predict")?,
            train: required(instance, store, "Train")?,
            load,
            reset: optional(instance, store, "ResetModelWeight")?,
            last_input: optional(instance, store, "LastInput")?,
            last_output: optional(instance, store, "LastOutput")?,
        })
    }

    /// Whether `LastInput` and `LastOutput` are both exported.
    pub fn supports_preview(&self) -> bool {
        self.last_input.is_some() && self.last_output.is_some()
    }
}

impl InferenceEngine for WasmEngine {
    type Arena = WasmArena;

    fn predict(
        &mut self,
        arena: &mut WasmArena,
        input: &BufferRegion,
        output: &BufferRegion,
    ) -> Result<()> {
        self.predict
            .call(arena.store_mut(), (ptr(input), ptr(output)))
            .map_err(trapped("Predict"))
    }

    fn train(&mut self, arena: &mut WasmArena) -> Result<()> {
        self.train.call(arena.store_mut(), ()).map_err(trapped("Train"))
    }

    fn load_pretrained_model(
        &mut self,
        arena: &mut WasmArena,
        weights: Option<&BufferRegion>,
    ) -> Result<()> {
        match (&self.load, weights) {
            (None, _) => bail!("Module does not export LoadPretrainedModel"),
            (Some(LoadExport::FromRegion(load)), Some(region)) => load
                .call(arena.store_mut(), ptr(region))
                .map_err(trapped("LoadPretrainedModel")),
            (Some(LoadExport::FromRegion(_)), None) => {
                bail!("LoadPretrainedModel expects a weights region; none was staged")
            }
            (Some(LoadExport::Bundled(load)), staged) => {
                if staged.is_some() {
                    tracing::warn!("Module bundles its own weights; staged weights ignored");
                }
                load.call(arena.store_mut(), ())
                    .map_err(trapped("LoadPretrainedModel"))
            }
        }
    }

    fn reset_model_weight(&mut self, arena: &mut WasmArena) -> Result<()> {
        let reset = self
            .reset
            .as_ref()
            .ok_or_else(|| anyhow!("Module does not export ResetModelWeight"))?;
        reset
            .call(arena.store_mut(), ())
            .map_err(trapped("ResetModelWeight"))
    }

    fn last_input(&mut self, arena: &mut WasmArena, output: &BufferRegion) -> Result<()> {
        let export = self
            .last_input
            .as_ref()
            .ok_or_else(|| anyhow!("Module does not export LastInput"))?;
        export
            .call(arena.store_mut(), ptr(output))
            .map_err(trapped("LastInput"))
    }

    fn last_output(&mut self, arena: &mut WasmArena, output: &BufferRegion) -> Result<()> {
        let export = self
            .last_output
            .as_ref()
            .ok_or_else(|| anyhow!("Module does not export LastOutput"))?;
        export
            .call(arena.store_mut(), ptr(output))
            .map_err(trapped("LastOutput"))
    }
}
