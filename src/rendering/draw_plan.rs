use std::ops::Range;

use crate::{
    config::Technique,
    rendering::{batching::BatchLayout, uniform_layout::ObjectSlots},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawCommand {
    /// Bind the letter geometry, optionally the indexed variant.
    BindGeometry { indexed: bool },
    /// Bind the uniform buffer holding the matrices of one batch.
    BindBatch { batch: u32 },
    /// Bind a dynamic-offset uniform slot (object matrix or scalar index).
    BindObjectSlot { offset: u32 },
    Draw { instances: Range<u32> },
    DrawIndexed { instances: Range<u32> },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrawStats {
    pub draw_calls: u32,
    pub batch_binds: u32,
    pub slot_binds: u32,
    pub geometry_binds: u32,
    pub instances: u32,
}

impl DrawStats {
    pub fn from_commands(commands: &[DrawCommand]) -> Self {
        let mut stats = Self::default();

        for command in commands {
            match command {
                DrawCommand::BindGeometry { .. } => stats.geometry_binds += 1,
                DrawCommand::BindBatch { .. } => stats.batch_binds += 1,
                DrawCommand::BindObjectSlot { .. } => stats.slot_binds += 1,
                DrawCommand::Draw { instances } | DrawCommand::DrawIndexed { instances } => {
                    stats.draw_calls += 1;
                    stats.instances += instances.len() as u32;
                }
            }
        }

        stats
    }
}

/// The command list of one frame. The vector is reused between frames.
#[derive(Debug, Default)]
pub struct DrawPlan {
    commands: Vec<DrawCommand>,
}

impl DrawPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(&mut self, technique: Technique, layout: &BatchLayout, slots: &ObjectSlots) {
        self.commands.clear();

        match technique {
            Technique::PerObject => {
                for object in 0..layout.instance_count() {
                    let Some(offset) = slots.offset(object) else {
                        log::warn!("Object {} has no uniform slot, skipping", object);
                        break;
                    };

                    self.commands.extend([
                        DrawCommand::BindGeometry { indexed: false },
                        DrawCommand::BindObjectSlot { offset },
                        DrawCommand::Draw { instances: 0..1 },
                    ]);
                }
            }
            Technique::InstanceAttribute => {
                for batch in layout.batches() {
                    self.commands
                        .push(DrawCommand::BindBatch { batch: batch.index });

                    // The instance-step index buffer holds 0..MAX_BATCH_SIZE, so drawing
                    // instance `slot` feeds `slot` to the shader.
                    for slot in 0..batch.count {
                        self.commands.extend([
                            DrawCommand::BindGeometry { indexed: false },
                            DrawCommand::Draw {
                                instances: slot..slot + 1,
                            },
                        ]);
                    }
                }
            }
            Technique::UniformIndex => {
                for batch in layout.batches() {
                    self.commands
                        .push(DrawCommand::BindBatch { batch: batch.index });

                    for slot in 0..batch.count {
                        let Some(offset) = slots.offset(slot) else {
                            log::warn!("Batch slot {} has no index slot, skipping", slot);
                            break;
                        };

                        self.commands.extend([
                            DrawCommand::BindGeometry { indexed: false },
                            DrawCommand::BindObjectSlot { offset },
                            DrawCommand::Draw { instances: 0..1 },
                        ]);
                    }
                }
            }
            Technique::IndexedBatch => {
                for batch in layout.batches() {
                    self.commands.extend([
                        DrawCommand::BindBatch { batch: batch.index },
                        DrawCommand::BindGeometry { indexed: true },
                        DrawCommand::DrawIndexed {
                            instances: 0..batch.count,
                        },
                    ]);
                }
            }
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn stats(&self) -> DrawStats {
        DrawStats::from_commands(&self.commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::{batching::MAX_BATCH_SIZE, uniform_layout::MATRIX_SIZE};

    fn plan(technique: Technique, instances: u32) -> DrawPlan {
        let layout = BatchLayout::new(instances, MAX_BATCH_SIZE).unwrap();
        let slots = match technique {
            Technique::PerObject => ObjectSlots::new(MATRIX_SIZE, instances, 256).unwrap(),
            _ => ObjectSlots::new(16, MAX_BATCH_SIZE, 256).unwrap(),
        };

        let mut plan = DrawPlan::new();
        plan.build(technique, &layout, &slots);
        plan
    }

    #[test]
    fn per_object_draws_every_object_separately() {
        let stats = plan(Technique::PerObject, 4096).stats();
        assert_eq!(
            stats,
            DrawStats {
                draw_calls: 4096,
                batch_binds: 0,
                slot_binds: 4096,
                geometry_binds: 4096,
                instances: 4096,
            }
        );
    }

    #[test]
    fn instance_attribute_binds_each_batch_once() {
        let stats = plan(Technique::InstanceAttribute, 4096).stats();
        assert_eq!(stats.draw_calls, 4096);
        assert_eq!(stats.batch_binds, 4);
        assert_eq!(stats.slot_binds, 0);
        assert_eq!(stats.instances, 4096);
    }

    #[test]
    fn instance_attribute_draws_select_slots() {
        let plan = plan(Technique::InstanceAttribute, 1030);
        let draws: Vec<_> = plan
            .commands()
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Draw { instances } => Some(instances.start),
                _ => None,
            })
            .collect();

        assert_eq!(draws.len(), 1030);
        assert_eq!(draws[1023], 1023);
        // The second batch starts over at slot zero.
        assert_eq!(draws[1024], 0);
        assert_eq!(draws[1029], 5);
    }

    #[test]
    fn uniform_index_binds_a_slot_per_draw() {
        let plan = plan(Technique::UniformIndex, 2048);
        let stats = plan.stats();
        assert_eq!(stats.draw_calls, 2048);
        assert_eq!(stats.batch_binds, 2);
        assert_eq!(stats.slot_binds, 2048);

        let offsets: Vec<_> = plan
            .commands()
            .iter()
            .filter_map(|command| match command {
                DrawCommand::BindObjectSlot { offset } => Some(*offset),
                _ => None,
            })
            .take(3)
            .collect();
        assert_eq!(offsets, vec![0, 256, 512]);
    }

    #[test]
    fn indexed_batch_draws_once_per_batch() {
        let plan = plan(Technique::IndexedBatch, 4097);
        assert_eq!(
            plan.stats(),
            DrawStats {
                draw_calls: 5,
                batch_binds: 5,
                slot_binds: 0,
                geometry_binds: 5,
                instances: 4097,
            }
        );
        assert_eq!(
            plan.commands().last(),
            Some(&DrawCommand::DrawIndexed { instances: 0..1 })
        );
    }

    #[test]
    fn every_technique_draws_each_instance_once() {
        for technique in Technique::ALL {
            assert_eq!(plan(technique, 3000).stats().instances, 3000, "{technique}");
        }
    }

    #[test]
    fn rebuilding_replaces_previous_commands() {
        let layout = BatchLayout::new(10, 4).unwrap();
        let slots = ObjectSlots::new(MATRIX_SIZE, 10, 256).unwrap();

        let mut plan = DrawPlan::new();
        plan.build(Technique::PerObject, &layout, &slots);
        plan.build(Technique::IndexedBatch, &layout, &slots);

        assert_eq!(plan.commands().len(), 9);
    }

    #[test]
    fn empty_scene_has_no_commands() {
        for technique in Technique::ALL {
            assert!(plan(technique, 0).commands().is_empty());
        }
    }
}
