use std::num::NonZeroU64;

use anyhow::Context;
use glam::Mat4;
use wgpu::{BindingType, BufferBindingType, BufferUsages, ShaderStages};

use crate::rendering::{
    batching::{BatchLayout, MAX_BATCH_SIZE},
    uniform_layout::{ObjectSlots, MATRIX_SIZE},
};

/// Size of one batch buffer. Partial batches still bind the full array the shader declares.
const BATCH_BUFFER_SIZE: u64 = MATRIX_SIZE * MAX_BATCH_SIZE as u64;

fn uniform_layout_entry(has_dynamic_offset: bool, size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: ShaderStages::VERTEX,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset,
            min_binding_size: NonZeroU64::new(size),
        },
        count: None,
    }
}

struct BatchBuffer {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// One fixed-size uniform buffer of matrices per batch, each with its own bind group.
pub struct BatchUniforms {
    bind_group_layout: wgpu::BindGroupLayout,
    batches: Vec<BatchBuffer>,
}

impl BatchUniforms {
    pub fn new(device: &wgpu::Device, layout: &BatchLayout) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Model batch bind group layout"),
            entries: &[uniform_layout_entry(false, BATCH_BUFFER_SIZE)],
        });

        let batches = layout
            .batches()
            .map(|batch| {
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("Model batch buffer {}", batch.index)),
                    size: BATCH_BUFFER_SIZE,
                    usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });

                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("Model batch bind group {}", batch.index)),
                    layout: &bind_group_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                });

                BatchBuffer { buffer, bind_group }
            })
            .collect();

        Self {
            bind_group_layout,
            batches,
        }
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    pub fn bind_group(&self, batch: u32) -> Option<&wgpu::BindGroup> {
        self.batches
            .get(batch as usize)
            .map(|batch| &batch.bind_group)
    }

    /// Uploads each batch's matrices with a single write.
    pub fn write(&self, queue: &wgpu::Queue, layout: &BatchLayout, matrices: &[Mat4]) {
        for (batch, target) in layout.batches().zip(&self.batches) {
            let Some(batch_matrices) = matrices.get(batch.range()) else {
                log::warn!("Batch {} is out of range of the model matrices", batch.index);
                continue;
            };

            queue.write_buffer(&target.buffer, 0, bytemuck::cast_slice(batch_matrices));
        }
    }
}

/// A single uniform buffer split into `ObjectSlots`, bound through a dynamic offset.
pub struct SlotUniforms {
    slots: ObjectSlots,
    element_size: u64,
    buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

impl SlotUniforms {
    pub fn new(
        device: &wgpu::Device,
        name: &str,
        element_size: u64,
        count: u32,
    ) -> anyhow::Result<Self> {
        let limits = device.limits();
        let alignment = u64::from(limits.min_uniform_buffer_offset_alignment);
        let slots = ObjectSlots::new(element_size, count, alignment)
            .with_context(|| format!("{} slots do not fit a dynamic offset", name))?;
        slots
            .check_buffer_limit(limits.max_buffer_size)
            .with_context(|| format!("{} buffer is too large", name))?;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{} buffer", name)),
            size: slots.buffer_size(),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{} bind group layout", name)),
            entries: &[uniform_layout_entry(true, element_size)],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} bind group", name)),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(element_size),
                }),
            }],
        });

        Ok(Self {
            slots,
            element_size,
            buffer,
            bind_group_layout,
            bind_group,
        })
    }

    pub fn slots(&self) -> &ObjectSlots {
        &self.slots
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    /// Packs `elements` into their slots through `staging` and uploads them.
    pub fn write<T: bytemuck::Pod>(
        &self,
        queue: &wgpu::Queue,
        elements: &[T],
        staging: &mut Vec<u8>,
    ) {
        debug_assert_eq!(std::mem::size_of::<T>() as u64, self.element_size);

        if elements.is_empty() {
            return;
        }

        let count = elements.len().min(self.slots.count() as usize);
        self.slots.pack(&elements[..count], staging);
        queue.write_buffer(&self.buffer, 0, staging);
    }
}
