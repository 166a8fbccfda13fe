use std::sync::Arc;

use anyhow::Context;
use wgpu::CommandEncoderDescriptor;
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    config::{DemoConfig, Technique},
    demo::DemoState,
    rendering::{
        batching::BatchLayout,
        draw_plan::{DrawPlan, DrawStats},
        imgui_renderer::ImguiRendererState,
        instancing::InstancingResources,
        passes::letter_pass::{LetterPass, LetterTextureViews},
        render_common::RenderCommon,
        shader_loader::{PipelineCacheBuilder, ShaderLoader},
        texture::DepthTexture,
    },
};

/// A frame whose letters are recorded but which still needs the overlay and presenting.
pub struct PendingFrame {
    output: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

pub struct Renderer {
    pub window: Arc<Window>,
    pub size: PhysicalSize<u32>,

    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,

    common: RenderCommon,
    depth_texture: DepthTexture,
    resources: InstancingResources,

    shader_loader: ShaderLoader,
    letter_pass: LetterPass,
    imgui_renderer: ImguiRendererState,

    technique: Technique,
    plan: DrawPlan,
    stats: DrawStats,
}

impl Renderer {
    pub async fn new(
        window: Arc<Window>,
        config: &DemoConfig,
        demo_state: &DemoState,
        imgui_context: &mut imgui::Context,
    ) -> anyhow::Result<Renderer> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable graphics adapter")?;

        log::info!("Using adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                label: None,
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to create device")?;

        let common = RenderCommon::new(&device, &adapter, &surface, size, &demo_state.camera)?;
        let depth_texture = DepthTexture::new(&device, size, "Depth Texture");

        let layout = BatchLayout::new(demo_state.instance_count(), config.batch_size)?;
        let resources = InstancingResources::new(&device, &queue, layout)?;

        let mut cache_builder = PipelineCacheBuilder::new();
        let letter_pass = LetterPass::create(&device, &common, &resources, &mut cache_builder);
        let shader_loader = ShaderLoader::new(device.clone(), cache_builder)
            .context("Failed to compile shaders")?;

        let imgui_renderer = ImguiRendererState::new(
            &device,
            &queue,
            common.output_surface_config.format,
            imgui_context,
        );

        Ok(Self {
            window,
            size,
            surface,
            device,
            queue,
            common,
            depth_texture,
            resources,
            shader_loader,
            letter_pass,
            imgui_renderer,
            technique: config.technique,
            plan: DrawPlan::new(),
            stats: DrawStats::default(),
        })
    }

    pub fn technique(&self) -> Technique {
        self.technique
    }

    pub fn set_technique(&mut self, technique: Technique) {
        if technique != self.technique {
            log::info!("Switching technique: {} -> {}", self.technique, technique);
            self.technique = technique;
        }
    }

    /// Statistics of the last recorded frame.
    pub fn stats(&self) -> DrawStats {
        self.stats
    }

    pub fn batch_layout(&self) -> &BatchLayout {
        self.resources.layout()
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.common.output_surface_config.width = new_size.width;
            self.common.output_surface_config.height = new_size.height;
            self.surface
                .configure(&self.device, &self.common.output_surface_config);
            self.depth_texture.resize(&self.device, new_size);
        }
    }

    pub fn render(&mut self, demo_state: &DemoState) -> Result<PendingFrame, wgpu::SurfaceError> {
        self.shader_loader.load_pending_shaders();

        self.common
            .update_camera(&self.queue, self.size, &demo_state.camera);
        self.resources
            .upload(&self.queue, self.technique, &demo_state.model_matrices);

        self.plan.build(
            self.technique,
            self.resources.layout(),
            self.resources.slots_for(self.technique),
        );
        self.stats = self.plan.stats();

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        self.letter_pass.render(
            &LetterTextureViews {
                color: view.clone(),
                depth: self.depth_texture.view().clone(),
            },
            &mut encoder,
            &self.shader_loader.cache,
            &self.common,
            self.technique,
            self.plan.commands(),
            &self.resources,
        );

        Ok(PendingFrame {
            output,
            view,
            encoder,
        })
    }

    pub fn finish_frame(&mut self, frame: PendingFrame, imgui_context: &mut imgui::Context) {
        let PendingFrame {
            output,
            view,
            mut encoder,
        } = frame;

        if let Err(e) = self.imgui_renderer.render(
            &view,
            imgui_context,
            &self.device,
            &self.queue,
            &mut encoder,
        ) {
            log::error!("{:?}", e);
        }

        self.queue.submit([encoder.finish()]);
        self.window.pre_present_notify();
        output.present();
    }
}
