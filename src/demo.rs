use glam::{EulerRot, Mat4, Quat, Vec3};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{camera::Camera, config::DemoConfig};

/// Orientation every letter starts with, as (x, y, z) degrees.
const INITIAL_EULER_DEGREES: Vec3 = Vec3::new(190.0, 40.0, 30.0);

pub struct DemoState {
    pub camera: Camera,
    /// One model matrix per letter, contiguous so a batch uploads as a single slice.
    pub model_matrices: Vec<Mat4>,
    max_spin: f32,
    rng: StdRng,
}

impl DemoState {
    pub fn new(config: &DemoConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);

        let rotation = Quat::from_euler(
            EulerRot::ZYX,
            INITIAL_EULER_DEGREES.z.to_radians(),
            INITIAL_EULER_DEGREES.y.to_radians(),
            INITIAL_EULER_DEGREES.x.to_radians(),
        );

        let model_matrices = (0..config.instance_count)
            .map(|_| {
                let translation = random_translation(&mut rng);
                Mat4::from_scale_rotation_translation(Vec3::ONE, rotation, translation)
            })
            .collect();

        Self {
            camera: Camera::from_config(config),
            model_matrices,
            max_spin: config.max_spin_degrees.to_radians(),
            rng,
        }
    }

    pub fn instance_count(&self) -> u32 {
        self.model_matrices.len() as u32
    }

    /// Spins every letter around its own X axis by a random amount.
    pub fn update(&mut self) {
        if self.max_spin <= 0.0 {
            return;
        }

        for model in &mut self.model_matrices {
            let angle = self.rng.gen_range(0.0..self.max_spin);
            *model *= Mat4::from_rotation_x(angle);
        }
    }
}

fn random_translation(rng: &mut impl Rng) -> Vec3 {
    Vec3::new(
        rng.gen::<f32>() * -400.0 + 200.0,
        rng.gen::<f32>() * 400.0 - 100.0,
        rng.gen::<f32>() * -100.0 - 200.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(instance_count: u32) -> DemoConfig {
        DemoConfig {
            instance_count,
            ..Default::default()
        }
    }

    #[test]
    fn spawns_within_the_spawn_volume() {
        let state = DemoState::new(&config(500));
        assert_eq!(state.instance_count(), 500);

        for model in &state.model_matrices {
            let translation = model.w_axis.truncate();
            assert!(translation.x > -200.0 && translation.x <= 200.0);
            assert!(translation.y >= -100.0 && translation.y < 300.0);
            assert!(translation.z > -300.0 && translation.z <= -200.0);
        }
    }

    #[test]
    fn same_seed_spawns_same_scene() {
        let a = DemoState::new(&config(64));
        let b = DemoState::new(&config(64));
        assert_eq!(a.model_matrices, b.model_matrices);

        let c = DemoState::new(&DemoConfig {
            seed: 1,
            ..config(64)
        });
        assert_ne!(a.model_matrices, c.model_matrices);
    }

    #[test]
    fn all_letters_start_with_the_same_orientation() {
        let state = DemoState::new(&config(8));
        let (_, first, _) = state.model_matrices[0].to_scale_rotation_translation();

        for model in &state.model_matrices {
            let (scale, rotation, _) = model.to_scale_rotation_translation();
            assert!(scale.abs_diff_eq(Vec3::ONE, 1e-5));
            assert!(rotation.abs_diff_eq(first, 1e-5) || rotation.abs_diff_eq(-first, 1e-5));
        }
    }

    #[test]
    fn update_keeps_translation_and_scale() {
        let mut state = DemoState::new(&config(32));
        let before = state.model_matrices.clone();

        for _ in 0..100 {
            state.update();
        }

        for (old, new) in before.iter().zip(&state.model_matrices) {
            assert!(old.w_axis.abs_diff_eq(new.w_axis, 1e-3));
            let (scale, _, _) = new.to_scale_rotation_translation();
            assert!(scale.abs_diff_eq(Vec3::ONE, 1e-3));
        }
    }

    #[test]
    fn update_spins_around_local_x_by_a_bounded_angle() {
        let mut state = DemoState::new(&config(32));
        let before = state.model_matrices.clone();

        state.update();

        let max_spin = 3.0_f32.to_radians();
        for (old, new) in before.iter().zip(&state.model_matrices) {
            // The local X axis is the rotation axis and stays put.
            assert!(old.x_axis.abs_diff_eq(new.x_axis, 1e-4));

            let delta = old.inverse() * *new;
            assert!(delta.x_axis.abs_diff_eq(glam::Vec4::X, 1e-3));

            let angle = delta.y_axis.z.atan2(delta.y_axis.y);
            assert!(angle >= -1e-3 && angle <= max_spin + 1e-3);
        }
    }

    #[test]
    fn zero_spin_freezes_the_scene() {
        let mut state = DemoState::new(&DemoConfig {
            max_spin_degrees: 0.0,
            ..config(16)
        });
        let before = state.model_matrices.clone();

        state.update();

        assert_eq!(before, state.model_matrices);
    }
}
