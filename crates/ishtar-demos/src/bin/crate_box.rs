//! Textured crate exercise.
//!
//! A spinning cube sampling two texture units: a checkerboard base layer
//! and a tile overlay, blended in the fragment stage. Mouse look, WASD and
//! scroll zoom as in the lit-cubes exercise.
//!
//! Run: `cargo run --bin crate_box`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use winit::dpi::LogicalSize;

use ishtar_engine::core::{App, AppControl, FrameCtx};
use ishtar_engine::device::GpuInit;
use ishtar_engine::input::Key;
use ishtar_engine::logging::{LoggingConfig, init_logging};
use ishtar_engine::window::{Runtime, RuntimeConfig};
use ishtar_graphics::{
    CameraMovement, FpsCamera, Mesh, ProgramDesc, ShaderProgram, Texture2D, Vertex,
};

fn demo_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).to_path_buf()
}

struct Scene {
    shader: ShaderProgram,
    cube: Mesh,
}

impl Scene {
    fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let layouts = [Vertex::layout()];
        let desc = ProgramDesc {
            label: Some("crate box"),
            color_format: surface_format,
            depth_format: Some(ishtar_engine::device::DEPTH_FORMAT),
            vertex_layouts: &layouts,
        };

        let root = demo_dir();

        let mut shader = ShaderProgram::from_paths(
            device,
            queue,
            &desc,
            &root.join("shaders/crate.vert.wgsl"),
            Some(&root.join("shaders/crate.frag.wgsl")),
        )
        .context("crate shader")?;

        let base = Texture2D::from_path(device, queue, &root.join("assets/checker.png"), true)
            .context("base texture")?;
        let overlay = Texture2D::from_path(device, queue, &root.join("assets/tiles.png"), true)
            .context("overlay texture")?;

        log::info!(
            "loaded textures: {}x{} ({}ch) and {}x{} ({}ch)",
            base.width(),
            base.height(),
            base.channels(),
            overlay.width(),
            overlay.height(),
            overlay.channels()
        );

        shader.set_texture(0, &base);
        shader.set_texture(1, &overlay);
        shader.set_float("mix_amount", 0.35);

        let cube = Mesh::new(device, Some("crate"), &ishtar_graphics::mesh::cube_vertices());

        Ok(Self { shader, cube })
    }
}

struct CrateBox {
    camera: FpsCamera,
    scene: Option<Scene>,
}

impl App for CrateBox {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if ctx.input.key_down(Key::Escape) {
            return AppControl::Exit;
        }

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
            self.camera.look_mouse(dx, -dy, true);
        }
        if ctx.input_frame.scroll_lines != 0.0 {
            self.camera.scroll_zoom(ctx.input_frame.scroll_lines);
        }

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

        let model = Mat4::from_axis_angle(
            Vec3::new(0.5, 1.0, 0.0).normalize(),
            ctx.time.elapsed * 0.8,
        );
        scene.shader.set_mat4("model", model);
        scene.shader.set_mat4("view", self.camera.view_matrix());
        scene.shader.set_mat4(
            "projection",
            self.camera
                .projection_matrix(ctx.gpu.aspect_ratio(), 0.1, 100.0),
        );

        let clear = wgpu::Color {
            r: 0.2,
            g: 0.3,
            b: 0.3,
            a: 1.0,
        };

        ctx.render(clear, |rctx, rpass| {
            scene.shader.apply(rpass, rctx.device, rctx.queue);
            scene.cube.draw(rpass);
        })
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    Runtime::run(
        RuntimeConfig {
            title: "ishtar: crate box".to_string(),
            initial_size: LogicalSize::new(800.0, 600.0),
            capture_cursor: true,
        },
        GpuInit::default(),
        CrateBox {
            camera: FpsCamera::new(Vec3::new(0.0, 0.0, 3.0)),
            scene: None,
        },
    )
}
