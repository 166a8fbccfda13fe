use glam::{Mat4, Vec2};
use wgpu::util::DeviceExt;

use crate::config::DemoConfig;

/// A fixed camera at the origin looking down -Z.
#[derive(Debug, Clone)]
pub struct Camera {
    pub field_of_view: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn from_config(config: &DemoConfig) -> Self {
        Self {
            field_of_view: config.field_of_view_degrees.to_radians(),
            z_near: config.z_near,
            z_far: config.z_far,
        }
    }

    pub fn get_vp_matrix(&self, resolution: Vec2) -> Mat4 {
        let aspect = resolution.x / resolution.y.max(1.0);
        Mat4::perspective_rh(self.field_of_view, aspect, self.z_near, self.z_far)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Default)]
pub struct CameraUniform {
    view_proj: Mat4,
}

impl CameraUniform {
    pub fn update(&mut self, resolution: winit::dpi::PhysicalSize<u32>, camera: &Camera) {
        self.view_proj =
            camera.get_vp_matrix(Vec2::new(resolution.width as f32, resolution.height as f32));
    }

    pub fn create_buffer(&self, device: &wgpu::Device) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Uniform Buffer"),
            contents: bytemuck::cast_slice(&[*self]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        })
    }

    pub fn update_buffer(&self, queue: &wgpu::Queue, buffer: &wgpu::Buffer) {
        queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[*self]));
    }
}
