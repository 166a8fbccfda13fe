pub mod batch_uniforms;
pub mod batching;
pub mod draw_plan;
pub mod imgui_renderer;
pub mod instancing;
pub mod letter_mesh;
pub mod passes;
pub mod render_common;
pub mod renderer;
pub mod shader_loader;
pub mod texture;
pub mod uniform_layout;
