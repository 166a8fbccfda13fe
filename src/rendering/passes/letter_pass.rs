use wgpu::{
    DepthBiasState, Device, MultisampleState, PipelineCompilationOptions, RenderPassDescriptor,
    ShaderSource, StencilState,
};

use crate::{
    config::Technique,
    rendering::{
        draw_plan::DrawCommand,
        instancing::InstancingResources,
        letter_mesh::{LETTER_VBL, MODEL_INDEX_VBL},
        render_common::RenderCommon,
        shader_loader::{
            PipelineCache, PipelineCacheBuilder, PipelineFactory, PipelineId, ShaderDefinition,
        },
        texture::DepthTexture,
    },
};

const LETTER_BUFFERS: &[wgpu::VertexBufferLayout<'static>] = &[LETTER_VBL];
const LETTER_WITH_INDEX_BUFFERS: &[wgpu::VertexBufferLayout<'static>] =
    &[LETTER_VBL, MODEL_INDEX_VBL];

pub struct LetterTextureViews {
    pub color: wgpu::TextureView,
    pub depth: wgpu::TextureView,
}

struct TechniquePipelines {
    per_object: PipelineId,
    instance_attribute: PipelineId,
    uniform_index: PipelineId,
    indexed_batch: PipelineId,
}

impl TechniquePipelines {
    fn get(&self, technique: Technique) -> PipelineId {
        match technique {
            Technique::PerObject => self.per_object,
            Technique::InstanceAttribute => self.instance_attribute,
            Technique::UniformIndex => self.uniform_index,
            Technique::IndexedBatch => self.indexed_batch,
        }
    }
}

/// Clears the frame and draws every letter with the active technique.
pub struct LetterPass {
    pipelines: TechniquePipelines,
}

impl LetterPass {
    pub fn create(
        device: &wgpu::Device,
        common: &RenderCommon,
        resources: &InstancingResources,
        cache_builder: &mut PipelineCacheBuilder,
    ) -> Self {
        let format = common.output_surface_config.format;
        let camera = &common.camera_bind_group_layout;
        let batch = resources.batches.bind_group_layout();

        let mut add = |technique: Technique,
                       bind_group_layouts: &[&wgpu::BindGroupLayout],
                       buffers: &'static [wgpu::VertexBufferLayout<'static>]| {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{} pipeline layout", technique)),
                bind_group_layouts,
                push_constant_ranges: &[],
            });

            cache_builder.add_shader(
                shader_definition(technique),
                pipeline_factory(layout, buffers, format),
            )
        };

        let pipelines = TechniquePipelines {
            per_object: add(
                Technique::PerObject,
                &[camera, resources.objects.bind_group_layout()],
                LETTER_BUFFERS,
            ),
            instance_attribute: add(
                Technique::InstanceAttribute,
                &[camera, batch],
                LETTER_WITH_INDEX_BUFFERS,
            ),
            uniform_index: add(
                Technique::UniformIndex,
                &[camera, batch, resources.indices.bind_group_layout()],
                LETTER_BUFFERS,
            ),
            indexed_batch: add(Technique::IndexedBatch, &[camera, batch], LETTER_BUFFERS),
        };

        Self { pipelines }
    }

    pub fn render(
        &self,
        texture_views: &LetterTextureViews,
        encoder: &mut wgpu::CommandEncoder,
        pipeline_cache: &PipelineCache,
        common: &RenderCommon,
        technique: Technique,
        commands: &[DrawCommand],
        resources: &InstancingResources,
    ) {
        let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Letter Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &texture_views.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &texture_views.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let Some(pipeline) = pipeline_cache.get(self.pipelines.get(technique)) else {
            log::warn!("No pipeline for {}, skipping draw", technique);
            return;
        };

        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &common.camera_bind_group, &[]);

        let (slot_group, slot_bind_group) = match technique {
            Technique::PerObject => (1, resources.objects.bind_group()),
            _ => (2, resources.indices.bind_group()),
        };
        let model_index = technique == Technique::InstanceAttribute;

        for command in commands {
            match command {
                DrawCommand::BindGeometry { indexed } => {
                    resources.mesh.bind(&mut render_pass, *indexed, model_index);
                }
                DrawCommand::BindBatch { batch } => {
                    if let Some(bind_group) = resources.batches.bind_group(*batch) {
                        render_pass.set_bind_group(1, bind_group, &[]);
                    }
                }
                DrawCommand::BindObjectSlot { offset } => {
                    render_pass.set_bind_group(slot_group, slot_bind_group, &[*offset]);
                }
                DrawCommand::Draw { instances } => {
                    render_pass.draw(0..resources.mesh.vertex_count(), instances.clone());
                }
                DrawCommand::DrawIndexed { instances } => {
                    render_pass.draw_indexed(
                        0..resources.mesh.index_count(),
                        0,
                        instances.clone(),
                    );
                }
            }
        }
    }
}

fn shader_definition(technique: Technique) -> ShaderDefinition {
    match technique {
        Technique::PerObject => ShaderDefinition {
            name: "Per-object shader",
            path: "per_object.wgsl",
        },
        Technique::InstanceAttribute => ShaderDefinition {
            name: "Instance attribute shader",
            path: "instance_attribute.wgsl",
        },
        Technique::UniformIndex => ShaderDefinition {
            name: "Uniform index shader",
            path: "uniform_index.wgsl",
        },
        Technique::IndexedBatch => ShaderDefinition {
            name: "Indexed batch shader",
            path: "indexed_batch.wgsl",
        },
    }
}

fn pipeline_factory(
    render_pipeline_layout: wgpu::PipelineLayout,
    buffers: &'static [wgpu::VertexBufferLayout<'static>],
    format: wgpu::TextureFormat,
) -> PipelineFactory {
    Box::new(
        move |device: &Device, shader_def: &ShaderDefinition, source: &str| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(shader_def.name),
                source: ShaderSource::Wgsl(source.into()),
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(shader_def.name),
                layout: Some(&render_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers,
                    compilation_options: PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DepthTexture::DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: StencilState::default(),
                    bias: DepthBiasState::default(),
                }),
                multisample: MultisampleState::default(),
                multiview: None,
                cache: None,
            });

            Ok(pipeline)
        },
    )
}
