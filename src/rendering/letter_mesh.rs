use std::mem::offset_of;

use anyhow::Context;
use wgpu::util::DeviceExt;

use crate::{
    f_model::{self, IndexedMesh, Vertex},
    rendering::batching::MAX_BATCH_SIZE,
};

pub const LETTER_VBL: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, position) as wgpu::BufferAddress,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, color) as wgpu::BufferAddress,
            shader_location: 1,
            format: wgpu::VertexFormat::Unorm8x4,
        },
    ],
};

/// Instance-rate slot index, 0..MAX_BATCH_SIZE. Selects the matrix inside the bound batch.
pub const MODEL_INDEX_VBL: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<u32>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Instance,
    attributes: &[wgpu::VertexAttribute {
        offset: 0,
        shader_location: 2,
        format: wgpu::VertexFormat::Uint32,
    }],
};

/// The letter geometry, uploaded once in both triangle-list and indexed form.
pub struct LetterMesh {
    vertices: wgpu::Buffer,
    vertex_count: u32,
    indexed_vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
    model_indices: wgpu::Buffer,
}

impl LetterMesh {
    pub fn new(device: &wgpu::Device) -> anyhow::Result<Self> {
        let triangles = f_model::triangle_list();
        let indexed = IndexedMesh::from_triangle_list(&triangles)
            .context("Failed to build indexed letter mesh")?;

        log::debug!(
            "Letter mesh: {} vertices, {} unique when indexed",
            triangles.len(),
            indexed.vertices.len()
        );

        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Letter vertex buffer"),
            contents: bytemuck::cast_slice(&triangles),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let indexed_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Letter indexed vertex buffer"),
            contents: bytemuck::cast_slice(&indexed.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Letter index buffer"),
            contents: bytemuck::cast_slice(&indexed.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let slots: Vec<u32> = (0..MAX_BATCH_SIZE).collect();
        let model_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Model index buffer"),
            contents: bytemuck::cast_slice(&slots),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Ok(Self {
            vertices,
            vertex_count: triangles.len() as u32,
            indexed_vertices,
            indices,
            index_count: indexed.indices.len() as u32,
            model_indices,
        })
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn bind(&self, render_pass: &mut wgpu::RenderPass<'_>, indexed: bool, model_index: bool) {
        if indexed {
            render_pass.set_vertex_buffer(0, self.indexed_vertices.slice(..));
            render_pass.set_index_buffer(self.indices.slice(..), wgpu::IndexFormat::Uint16);
        } else {
            render_pass.set_vertex_buffer(0, self.vertices.slice(..));
        }

        if model_index {
            render_pass.set_vertex_buffer(1, self.model_indices.slice(..));
        }
    }
}
