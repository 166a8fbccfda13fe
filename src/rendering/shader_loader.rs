use std::{
    path::Path,
    sync::{
        mpsc::{self, channel},
        Arc, RwLock,
    },
    time::Duration,
};

use anyhow::Context;
use id_arena::{Arena, Id};
use naga::{
    back::wgsl::WriterFlags,
    valid::{Capabilities, ValidationFlags},
};
use naga_oil::compose::{
    ComposableModuleDescriptor, Composer, NagaModuleDescriptor, ShaderLanguage,
};
use notify_debouncer_mini::{
    new_debouncer_opt, notify::*, DebounceEventResult, DebouncedEventKind, Debouncer,
};
use pollster::block_on;
use wgpu::{PollType, RenderPipeline};

const SHADER_FOLDER: &str = "assets/shaders";
const SHARED_SHADER_MODULES_FOLDER: &str = "assets/shaders/shared";

pub type PipelineFactory = Box<
    dyn Sync
        + Send
        + Fn(&wgpu::Device, &ShaderDefinition, &str) -> anyhow::Result<wgpu::RenderPipeline>,
>;

#[derive(Debug, Clone)]
pub struct ShaderDefinition {
    pub name: &'static str,
    pub path: &'static str,
}

pub struct ShaderEntry {
    pipeline_id: PipelineId,
    def: ShaderDefinition,
    factory: PipelineFactory,
}

pub type PipelineId = Id<PipelineCacheEntry>;

#[derive(Default)]
pub struct PipelineCacheEntry(Option<wgpu::RenderPipeline>);

pub struct PipelineCacheBuilder {
    shaders: Arena<ShaderEntry>,
    pipelines: Arena<PipelineCacheEntry>,
}

impl PipelineCacheBuilder {
    pub fn new() -> Self {
        Self {
            shaders: Arena::new(),
            pipelines: Arena::new(),
        }
    }

    pub fn add_shader(
        &mut self,
        shader_def: ShaderDefinition,
        factory: PipelineFactory,
    ) -> PipelineId {
        let pipeline_id = self.pipelines.alloc(PipelineCacheEntry::default());
        self.shaders.alloc(ShaderEntry {
            pipeline_id,
            def: shader_def,
            factory,
        });
        pipeline_id
    }

    fn build(self) -> PipelineCache {
        PipelineCache {
            shaders: Arc::new(self.shaders),
            pipelines: self.pipelines,
        }
    }
}

pub struct PipelineCache {
    shaders: Arc<Arena<ShaderEntry>>,
    pipelines: Arena<PipelineCacheEntry>,
}

impl PipelineCache {
    pub fn get(&self, id: PipelineId) -> Option<&RenderPipeline> {
        self.pipelines.get(id).and_then(|entry| entry.0.as_ref())
    }

    fn set(&mut self, id: PipelineId, pipeline: wgpu::RenderPipeline) {
        if let Some(entry) = self.pipelines.get_mut(id) {
            entry.0 = Some(pipeline);
        }
    }
}

/// Compiles every registered shader up front, then recompiles changed files on a
/// watcher thread. New pipelines are swapped in by `load_pending_shaders`.
pub struct ShaderLoader {
    pub cache: PipelineCache,
    receiver: mpsc::Receiver<(&'static str, PipelineId, wgpu::RenderPipeline)>,
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl ShaderLoader {
    pub fn new(device: wgpu::Device, cache_builder: PipelineCacheBuilder) -> anyhow::Result<Self> {
        let mut cache = cache_builder.build();

        let composer = create_composer().context("Failed to create shader composer")?;
        let composer = Arc::new(RwLock::new(composer));

        let shaders = cache.shaders.clone();
        for (_, shader) in shaders.iter() {
            let pipeline = compile_file(&device, &shader.def, &shader.factory, &composer)
                .with_context(|| format!("Failed to compile shader: {}", shader.def.name))?;
            cache.set(shader.pipeline_id, pipeline);
        }

        let (send_new_pipelines, recv_new_pipelines) = channel();

        let shared_folder = Path::new(SHARED_SHADER_MODULES_FOLDER)
            .canonicalize()
            .with_context(|| format!("Shader folder {} not found", SHARED_SHADER_MODULES_FOLDER))?;

        let mut debouncer: Debouncer<RecommendedWatcher> = new_debouncer_opt(
            notify_debouncer_mini::Config::default().with_timeout(Duration::from_millis(100)),
            move |res: DebounceEventResult| {
                let events = match res {
                    Ok(events) => events,
                    Err(e) => {
                        log::error!("Error debouncing shader changes: {}", e);
                        return;
                    }
                };

                for event in events {
                    if event.kind != DebouncedEventKind::Any {
                        continue;
                    }

                    // A shared module change can affect every shader.
                    let shared = event.path.starts_with(&shared_folder);

                    if shared {
                        match create_composer() {
                            Ok(new_composer) => match composer.write() {
                                Ok(mut guard) => *guard = new_composer,
                                Err(e) => log::error!("Shader composer lock poisoned: {}", e),
                            },
                            Err(e) => {
                                log::error!("Failed to reload shared shader modules: {:?}", e);
                                continue;
                            }
                        }
                    }

                    for (_, entry) in shaders
                        .iter()
                        .filter(|(_, entry)| shared || event.path.ends_with(entry.def.path))
                    {
                        match compile_file(&device, &entry.def, &entry.factory, &composer) {
                            Ok(pipeline) => {
                                if send_new_pipelines
                                    .send((entry.def.name, entry.pipeline_id, pipeline))
                                    .is_err()
                                {
                                    return;
                                }
                            }
                            Err(e) => log::error!("Failed to reload shader: {:?}", e),
                        }
                    }
                }
            },
        )
        .context("Failed to create shader watcher")?;

        let absolute_shader_folder = Path::new(SHADER_FOLDER)
            .canonicalize()
            .with_context(|| format!("Shader folder {} not found", SHADER_FOLDER))?;

        debouncer
            .watcher()
            .watch(&absolute_shader_folder, RecursiveMode::Recursive)
            .context("Failed to watch shader folder")?;

        Ok(Self {
            cache,
            receiver: recv_new_pipelines,
            _debouncer: debouncer,
        })
    }

    pub fn load_pending_shaders(&mut self) {
        while let Ok((name, pipeline_id, pipeline)) = self.receiver.try_recv() {
            log::info!("Shader reloaded: {}", name);
            self.cache.set(pipeline_id, pipeline);
        }
    }
}

fn compile_file(
    device: &wgpu::Device,
    shader_def: &ShaderDefinition,
    factory: &PipelineFactory,
    composer: &RwLock<Composer>,
) -> anyhow::Result<wgpu::RenderPipeline> {
    let module = {
        let mut composer = composer
            .write()
            .map_err(|e| anyhow::anyhow!("Shader composer lock poisoned: {}", e))?;

        make_module(&mut composer, shader_def.path)?
    };

    // wgpu validates the final module again when the pipeline is created.
    let info = naga::valid::Validator::new(ValidationFlags::empty(), Capabilities::all())
        .validate(&module)
        .context("Failed to validate Naga module")?;

    let shader_code = naga::back::wgsl::write_string(&module, &info, WriterFlags::empty())
        .context("Failed to convert Naga module to WGSL string")?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let pipeline = factory(device, shader_def, &shader_code);

    device
        .poll(PollType::Wait)
        .context("Failed to poll device after shader compilation.")?;

    if let Some(error) = block_on(device.pop_error_scope()) {
        anyhow::bail!("Shader compilation failed for {}: {}", shader_def.name, error);
    }

    pipeline
}

/// Reads a shader from the shader folder and resolves its imports.
fn make_module(composer: &mut Composer, shader_path: &str) -> anyhow::Result<naga::Module> {
    let path = Path::new(SHADER_FOLDER).join(shader_path);
    let shader_code = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read shader file {}", path.display()))?;

    let file_path = path.to_string_lossy().to_string();

    composer
        .make_naga_module(NagaModuleDescriptor {
            file_path: &file_path,
            source: &shader_code,
            ..Default::default()
        })
        .map_err(|e| anyhow::anyhow!("{}", e.emit_to_string(composer)))
        .context("Failed to create Naga module from shader code")
}

fn create_composer() -> anyhow::Result<Composer> {
    let shared_files = std::fs::read_dir(SHARED_SHADER_MODULES_FOLDER).with_context(|| {
        format!(
            "Failed to read shared shader modules directory {}",
            SHARED_SHADER_MODULES_FOLDER
        )
    })?;

    let mut composer = Composer::default();

    for entry in shared_files {
        let path = entry
            .context("Failed to read entry in shared shader modules directory")?
            .path();

        if !path.is_file() || path.extension().map_or(true, |ext| ext != "wgsl") {
            continue;
        }

        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read shared module {}", path.display()))?;

        let file_path = path.to_string_lossy().to_string();

        composer
            .add_composable_module(ComposableModuleDescriptor {
                source: &source,
                file_path: &file_path,
                language: ShaderLanguage::Wgsl,
                ..Default::default()
            })
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("{}", e.emit_to_string(&composer)))
            .with_context(|| format!("Failed to add shared shader module: {}", file_path))?;
    }

    Ok(composer)
}

#[cfg(test)]
mod tests {
    use naga::{ArraySize, Binding, ScalarKind, TypeInner};

    use super::*;
    use crate::rendering::{
        batching::MAX_BATCH_SIZE,
        letter_mesh::{LETTER_VBL, MODEL_INDEX_VBL},
        uniform_layout::{ObjectIndex, MATRIX_SIZE},
    };

    const SHADERS: [&str; 4] = [
        "per_object.wgsl",
        "instance_attribute.wgsl",
        "uniform_index.wgsl",
        "indexed_batch.wgsl",
    ];

    fn compose(shader_path: &str) -> naga::Module {
        let mut composer = create_composer().unwrap();
        let module = make_module(&mut composer, shader_path).unwrap();

        naga::valid::Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .unwrap_or_else(|e| panic!("{shader_path} failed validation: {e:?}"));

        module
    }

    /// Imported names carry a module suffix, so match on the prefix.
    fn find_struct<'a>(module: &'a naga::Module, name: &str) -> Option<&'a TypeInner> {
        module
            .types
            .iter()
            .find(|(_, ty)| ty.name.as_deref().is_some_and(|n| n.starts_with(name)))
            .map(|(_, ty)| &ty.inner)
    }

    fn scalar_shape(inner: &TypeInner) -> (ScalarKind, u32) {
        match *inner {
            TypeInner::Scalar(scalar) => (scalar.kind, 1),
            TypeInner::Vector { size, scalar } => (scalar.kind, size as u32),
            ref other => panic!("unexpected vertex input type {other:?}"),
        }
    }

    fn format_shape(format: wgpu::VertexFormat) -> (ScalarKind, u32) {
        match format {
            wgpu::VertexFormat::Float32x3 => (ScalarKind::Float, 3),
            wgpu::VertexFormat::Unorm8x4 => (ScalarKind::Float, 4),
            wgpu::VertexFormat::Uint32 => (ScalarKind::Uint, 1),
            other => panic!("unexpected vertex format {other:?}"),
        }
    }

    /// `(location, shape)` of every vertex input of `vs_main`, including struct members.
    fn vertex_inputs(module: &naga::Module) -> Vec<(u32, (ScalarKind, u32))> {
        let entry_point = module
            .entry_points
            .iter()
            .find(|entry_point| entry_point.name == "vs_main")
            .unwrap();

        let mut inputs = Vec::new();
        for argument in &entry_point.function.arguments {
            let inner = &module.types[argument.ty].inner;
            match (&argument.binding, inner) {
                (Some(Binding::Location { location, .. }), _) => {
                    inputs.push((*location, scalar_shape(inner)));
                }
                (None, TypeInner::Struct { members, .. }) => {
                    for member in members {
                        if let Some(Binding::Location { location, .. }) = member.binding {
                            inputs.push((location, scalar_shape(&module.types[member.ty].inner)));
                        }
                    }
                }
                _ => {}
            }
        }

        inputs.sort_by_key(|(location, _)| *location);
        inputs
    }

    #[test]
    fn every_shader_composes_and_validates() {
        for shader in SHADERS {
            let module = compose(shader);
            for entry in ["vs_main", "fs_main"] {
                assert!(
                    module.entry_points.iter().any(|ep| ep.name == entry),
                    "{shader} is missing {entry}"
                );
            }
        }
    }

    #[test]
    fn model_batch_holds_max_batch_size_matrices() {
        let module = compose("indexed_batch.wgsl");

        let Some(TypeInner::Struct { members, span }) = find_struct(&module, "ModelBatch") else {
            panic!("ModelBatch struct not found");
        };
        assert_eq!(u64::from(*span), MATRIX_SIZE * u64::from(MAX_BATCH_SIZE));

        match module.types[members[0].ty].inner {
            TypeInner::Array {
                size: ArraySize::Constant(length),
                ..
            } => assert_eq!(length.get(), MAX_BATCH_SIZE),
            ref other => panic!("models is not a fixed-size array: {other:?}"),
        }
    }

    #[test]
    fn object_index_matches_cpu_layout() {
        let module = compose("uniform_index.wgsl");

        let Some(TypeInner::Struct { span, .. }) = find_struct(&module, "ObjectIndex") else {
            panic!("ObjectIndex struct not found");
        };
        assert_eq!(u64::from(*span), ObjectIndex::SIZE);
    }

    #[test]
    fn vertex_layouts_match_shader_inputs() {
        let letter: Vec<_> = LETTER_VBL
            .attributes
            .iter()
            .map(|attribute| (attribute.shader_location, format_shape(attribute.format)))
            .collect();

        for shader in SHADERS {
            let inputs = vertex_inputs(&compose(shader));

            let mut expected = letter.clone();
            if shader == "instance_attribute.wgsl" {
                expected.extend(
                    MODEL_INDEX_VBL
                        .attributes
                        .iter()
                        .map(|attribute| (attribute.shader_location, format_shape(attribute.format))),
                );
            }

            assert_eq!(inputs, expected, "{shader}");
        }
    }
}
