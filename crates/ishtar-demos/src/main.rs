//! Lit cubes exercise.
//!
//! A colored cube lit by a point light, with a small white cube marking the
//! light itself. Fly around with WASD, look with the mouse, zoom with the
//! scroll wheel, leave with Escape.
//!
//! Run: `cargo run --bin lit-cubes`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use winit::dpi::LogicalSize;

use ishtar_engine::core::{App, AppControl, FrameCtx};
use ishtar_engine::device::GpuInit;
use ishtar_engine::input::Key;
use ishtar_engine::logging::{LoggingConfig, init_logging};
use ishtar_engine::window::{Runtime, RuntimeConfig};
use ishtar_graphics::{CameraMovement, FpsCamera, Mesh, ProgramDesc, ShaderProgram, Vertex};

fn shader_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders")
}

struct Scene {
    cube_shader: ShaderProgram,
    light_shader: ShaderProgram,
    cube: Mesh,
}

impl Scene {
    fn new(device: &wgpu::Device, queue: &wgpu::Queue, surface_format: wgpu::TextureFormat) -> Result<Self> {
        let layouts = [Vertex::layout()];
        let desc = ProgramDesc {
            label: Some("lit cubes"),
            color_format: surface_format,
            depth_format: Some(ishtar_engine::device::DEPTH_FORMAT),
            vertex_layouts: &layouts,
        };

        let shaders = shader_dir();

        let cube_shader = ShaderProgram::from_paths(
            device,
            queue,
            &desc,
            &shaders.join("cube.vert.wgsl"),
            Some(&shaders.join("cube.frag.wgsl")),
        )
        .context("cube shader")?;

        let light_shader = ShaderProgram::from_paths(
            device,
            queue,
            &desc,
            &shaders.join("light.vert.wgsl"),
            Some(&shaders.join("light.frag.wgsl")),
        )
        .context("light shader")?;

        let cube = Mesh::new(device, Some("cube"), &ishtar_graphics::mesh::cube_vertices());

        Ok(Self {
            cube_shader,
            light_shader,
            cube,
        })
    }
}

struct LitCubes {
    camera: FpsCamera,
    scene: Option<Scene>,
}

impl LitCubes {
    fn new() -> Self {
        Self {
            camera: FpsCamera::new(Vec3::new(0.0, 0.0, 3.0)),
            scene: None,
        }
    }
}

impl App for LitCubes {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if ctx.input.key_down(Key::Escape) {
            return AppControl::Exit;
        }

        // Camera input: held keys move, accumulated deltas look/zoom.
        let dt = ctx.time.dt;
        if ctx.input.key_down(Key::W) {
            self.camera.move_keyboard(CameraMovement::Forward, dt);
        }
        if ctx.input.key_down(Key::S) {
            self.camera.move_keyboard(CameraMovement::Backward, dt);
        }
        if ctx.input.key_down(Key::A) {
            self.camera.move_keyboard(CameraMovement::Left, dt);
        }
        if ctx.input.key_down(Key::D) {
            self.camera.move_keyboard(CameraMovement::Right, dt);
        }

        let (dx, dy) = ctx.input_frame.look_delta;
        if dx != 0.0 || dy != 0.0 {
            // Screen +y is down; pitch up is positive.
            self.camera.look_mouse(dx, -dy, true);
        }
        if ctx.input_frame.scroll_lines != 0.0 {
            self.camera.scroll_zoom(ctx.input_frame.scroll_lines);
        }

        // GPU resources are created lazily on the first frame, once the
        // device exists.
        if self.scene.is_none() {
            match Scene::new(ctx.gpu.device(), ctx.gpu.queue(), ctx.gpu.surface_format()) {
                Ok(scene) => self.scene = Some(scene),
                Err(e) => {
                    log::error!("failed to build scene: {e:#}");
                    return AppControl::Exit;
                }
            }
        }
        let Some(scene) = &mut self.scene else {
            return AppControl::Exit;
        };

        let view = self.camera.view_matrix();
        let projection = self
            .camera
            .projection_matrix(ctx.gpu.aspect_ratio(), 0.1, 100.0);

        // The light slowly orbits the cube.
        let t = ctx.time.elapsed * 0.5;
        let light_position = Vec3::new(1.2 * t.cos(), 1.0, 1.2 * t.sin());

        scene.cube_shader.set_mat4("model", Mat4::IDENTITY);
        scene.cube_shader.set_mat4("view", view);
        scene.cube_shader.set_mat4("projection", projection);
        scene
            .cube_shader
            .set_vec3("object_color", Vec3::new(1.0, 0.5, 0.31));
        scene.cube_shader.set_vec3("light_color", Vec3::ONE);
        scene.cube_shader.set_vec3("light_position", light_position);
        scene.cube_shader.set_vec3("view_position", self.camera.position);

        let light_model =
            Mat4::from_translation(light_position) * Mat4::from_scale(Vec3::splat(0.2));
        scene.light_shader.set_mat4("model", light_model);
        scene.light_shader.set_mat4("view", view);
        scene.light_shader.set_mat4("projection", projection);
        scene.light_shader.set_vec3("light_color", Vec3::ONE);

        let clear = wgpu::Color {
            r: 0.1,
            g: 0.1,
            b: 0.1,
            a: 1.0,
        };

        ctx.render(clear, |rctx, rpass| {
            scene.cube_shader.apply(rpass, rctx.device, rctx.queue);
            scene.cube.draw(rpass);

            scene.light_shader.apply(rpass, rctx.device, rctx.queue);
            scene.cube.draw(rpass);
        })
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    Runtime::run(
        RuntimeConfig {
            title: "ishtar: lit cubes".to_string(),
            initial_size: LogicalSize::new(800.0, 600.0),
            capture_cursor: true,
        },
        GpuInit::default(),
        LitCubes::new(),
    )
}
