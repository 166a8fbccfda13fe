use crate::{config::Technique, demo::DemoState, rendering::renderer::Renderer};

pub fn update(
    state: &mut DemoState,
    renderer: &mut Renderer,
    ui: &mut imgui::Ui,
) -> anyhow::Result<()> {
    state.update();
    draw_overlay(renderer, ui);

    Ok(())
}

fn draw_overlay(renderer: &mut Renderer, ui: &imgui::Ui) {
    let stats = renderer.stats();
    let layout = *renderer.batch_layout();
    let mut selected = Technique::ALL
        .iter()
        .position(|&technique| technique == renderer.technique())
        .unwrap_or_default();

    ui.window("Instancing")
        .size([320.0, 220.0], imgui::Condition::FirstUseEver)
        .build(|| {
            let names = Technique::ALL.map(Technique::name);
            if ui.combo_simple_string("Technique", &mut selected, &names) {
                renderer.set_technique(Technique::ALL[selected]);
            }

            ui.separator();
            ui.text(format!("Instances: {}", layout.instance_count()));
            ui.text(format!(
                "Batches: {} x {}",
                layout.batch_count(),
                layout.batch_size()
            ));
            ui.text(format!("Draw calls: {}", stats.draw_calls));
            ui.text(format!("Batch binds: {}", stats.batch_binds));
            ui.text(format!("Slot binds: {}", stats.slot_binds));
            ui.text(format!("Geometry binds: {}", stats.geometry_binds));

            let framerate = ui.io().framerate;
            ui.text(format!(
                "Frame: {:.2} ms ({:.0} fps)",
                1000.0 / framerate.max(f32::EPSILON),
                framerate
            ));
        });
}
