use anyhow::Context;
use glam::Mat4;

use crate::{
    config::Technique,
    rendering::{
        batch_uniforms::{BatchUniforms, SlotUniforms},
        batching::{BatchLayout, MAX_BATCH_SIZE},
        letter_mesh::LetterMesh,
        uniform_layout::{ObjectIndex, ObjectSlots, MATRIX_SIZE},
    },
};

/// Every GPU resource the letter techniques draw from. All of it is allocated once.
pub struct InstancingResources {
    pub mesh: LetterMesh,
    pub batches: BatchUniforms,
    /// Per-object matrices for `Technique::PerObject`.
    pub objects: SlotUniforms,
    /// Scalar batch slot indices for `Technique::UniformIndex`.
    pub indices: SlotUniforms,
    layout: BatchLayout,
    staging: Vec<u8>,
}

impl InstancingResources {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: BatchLayout,
    ) -> anyhow::Result<Self> {
        let mesh = LetterMesh::new(device).context("Failed to upload letter mesh")?;
        let batches = BatchUniforms::new(device, &layout);
        let objects = SlotUniforms::new(
            device,
            "Object matrix",
            MATRIX_SIZE,
            layout.instance_count(),
        )?;
        let indices =
            SlotUniforms::new(device, "Object index", ObjectIndex::SIZE, MAX_BATCH_SIZE)?;

        let mut staging = Vec::new();

        let slot_indices: Vec<ObjectIndex> = (0..MAX_BATCH_SIZE).map(ObjectIndex::new).collect();
        indices.write(queue, &slot_indices, &mut staging);

        log::info!(
            "Allocated {} batch buffers for {} instances ({} per batch), object slot stride {} bytes",
            layout.batch_count(),
            layout.instance_count(),
            layout.batch_size(),
            objects.slots().stride()
        );

        Ok(Self {
            mesh,
            batches,
            objects,
            indices,
            layout,
            staging,
        })
    }

    pub fn layout(&self) -> &BatchLayout {
        &self.layout
    }

    /// The dynamic-offset slots a technique's `BindObjectSlot` commands address.
    pub fn slots_for(&self, technique: Technique) -> &ObjectSlots {
        match technique {
            Technique::PerObject => self.objects.slots(),
            _ => self.indices.slots(),
        }
    }

    /// Uploads this frame's transforms in the form the technique reads them.
    pub fn upload(&mut self, queue: &wgpu::Queue, technique: Technique, matrices: &[Mat4]) {
        if technique.uses_batches() {
            self.batches.write(queue, &self.layout, matrices);
        } else {
            self.objects.write(queue, matrices, &mut self.staging);
        }
    }
}
