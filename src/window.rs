use std::{sync::Arc, time::Instant};

use anyhow::Context;
use imgui::{FontConfig, FontSource};
use imgui_winit_support::WinitPlatform;
use winit::{
    application::ApplicationHandler,
    event::{Event, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use crate::{config::DemoConfig, demo::DemoState, engine, rendering::renderer::Renderer};

struct ImguiState {
    context: imgui::Context,
    platform: WinitPlatform,
}

struct App {
    config: DemoConfig,
    renderer: Option<Renderer>,
    demo_state: DemoState,
    imgui: Option<ImguiState>,
    last_frame: Instant,
    /// First fatal error, returned from `run` once the event loop exits.
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: DemoConfig) -> Self {
        let demo_state = DemoState::new(&config);

        Self {
            config,
            renderer: None,
            demo_state,
            imgui: None,
            last_frame: Instant::now(),
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:?}", error);
        self.error.get_or_insert(error);
        event_loop.exit();
    }

    fn into_result(self) -> anyhow::Result<()> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn create_imgui(window: &Window) -> ImguiState {
        let mut context = imgui::Context::create();
        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(
            context.io_mut(),
            window,
            imgui_winit_support::HiDpiMode::Default,
        );

        context.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                oversample_h: 1,
                pixel_snap_h: true,
                size_pixels: 14.0,
                ..Default::default()
            }),
        }]);

        // INI support is broken in the published version of imgui
        context.set_ini_filename(None);

        ImguiState { context, platform }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_attributes = Window::default_attributes()
            .with_title(format!("{} letters", self.demo_state.instance_count()));
        let window = event_loop
            .create_window(window_attributes)
            .context("Failed to create window")?;

        let mut imgui = Self::create_imgui(&window);

        let renderer = pollster::block_on(Renderer::new(
            Arc::new(window),
            &self.config,
            &self.demo_state,
            &mut imgui.context,
        ))
        .context("Failed to create renderer")?;

        renderer.window.request_redraw();

        self.imgui = Some(imgui);
        self.renderer = Some(renderer);

        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(renderer), Some(imgui)) = (self.renderer.as_mut(), self.imgui.as_mut()) else {
            return;
        };

        let now = Instant::now();
        imgui
            .context
            .io_mut()
            .update_delta_time(now - self.last_frame);
        self.last_frame = now;

        // Redraw continuously, one frame per display refresh.
        renderer.window.request_redraw();

        if let Err(e) = imgui
            .platform
            .prepare_frame(imgui.context.io_mut(), &renderer.window)
        {
            log::error!("Failed to prepare Imgui frame: {}", e);
            return;
        }

        let ui = imgui.context.new_frame();

        if let Err(e) = engine::update(&mut self.demo_state, renderer, ui) {
            self.fail(event_loop, e.context("Error during engine::update"));
            return;
        }

        imgui.platform.prepare_render(ui, &renderer.window);

        match renderer.render(&self.demo_state) {
            Ok(frame) => {
                renderer.finish_frame(frame, &mut imgui.context);
            }
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                renderer.resize(renderer.size);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                self.fail(event_loop, anyhow::anyhow!("Surface is out of memory"));
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timeout");
            }
            Err(other) => {
                log::error!("Unexpected error: {:?}", other);
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }

        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        match &event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(*new_size);
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => (),
        }

        if let (Some(renderer), Some(imgui)) = (self.renderer.as_ref(), self.imgui.as_mut()) {
            imgui.platform.handle_event::<()>(
                imgui.context.io_mut(),
                &renderer.window,
                &Event::WindowEvent { window_id, event },
            );
        }
    }
}

pub async fn run(config: DemoConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    app.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_exit_is_ok() {
        let app = App::new(DemoConfig::default());
        assert!(app.into_result().is_ok());
    }

    #[test]
    fn startup_error_is_returned() {
        let mut app = App::new(DemoConfig::default());
        app.error = Some(anyhow::anyhow!("Failed to compile shaders"));

        let error = app.into_result().unwrap_err();
        assert!(error.to_string().contains("compile shaders"));
    }
}
