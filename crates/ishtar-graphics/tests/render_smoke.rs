//! End-to-end offscreen rendering checks.
//!
//! Each test draws one fullscreen triangle into an offscreen target and
//! reads the pixels back. Skips (with a note) when the host exposes no GPU
//! adapter, so the suite stays green on headless CI boxes.

use std::path::Path;

use ishtar_graphics::{ProgramDesc, ShaderProgram, Texture2D};

const TARGET_SIZE: u32 = 64; // 64 * 4 bytes per row satisfies copy alignment

const FULLSCREEN_VERTEX: &str = r#"
struct VsOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VsOut {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -3.0),
        vec2<f32>(3.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    var out: VsOut;
    let p = positions[index];
    out.clip_position = vec4<f32>(p, 0.0, 1.0);
    out.uv = p * 0.5 + vec2<f32>(0.5, 0.5);
    return out;
}
"#;

const TEXTURED_FRAGMENT: &str = r#"
@group(1) @binding(0) var base_texture: texture_2d<f32>;
@group(1) @binding(1) var base_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(base_texture, base_sampler, uv);
}
"#;

fn request_test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

    let adapter = match pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: None,
        force_fallback_adapter: false,
    })) {
        Ok(adapter) => adapter,
        Err(e) => {
            eprintln!("no GPU adapter available ({e}); skipping render smoke test");
            return None;
        }
    };

    match pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("render smoke device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::downlevel_defaults(),
        experimental_features: wgpu::ExperimentalFeatures::disabled(),
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::Off,
    })) {
        Ok(pair) => Some(pair),
        Err(e) => {
            eprintln!("GPU device unavailable ({e}); skipping render smoke test");
            None
        }
    }
}

/// Draws one fullscreen triangle with `program` and returns the RGBA pixels
/// of the offscreen target.
fn draw_and_read(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    program: &mut ShaderProgram,
) -> Vec<u8> {
    let target = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("smoke target"),
        size: wgpu::Extent3d {
            width: TARGET_SIZE,
            height: TARGET_SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("smoke readback"),
        size: (TARGET_SIZE * TARGET_SIZE * 4) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });

    {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("smoke pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        program.apply(&mut rpass, device, queue);
        rpass.draw(0..3, 0..1);
    }

    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &target,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &readback,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(TARGET_SIZE * 4),
                rows_per_image: Some(TARGET_SIZE),
            },
        },
        wgpu::Extent3d {
            width: TARGET_SIZE,
            height: TARGET_SIZE,
            depth_or_array_layers: 1,
        },
    );

    queue.submit(std::iter::once(encoder.finish()));

    let slice = readback.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        tx.send(result).ok();
    });
    device.poll(wgpu::PollType::wait_indefinitely()).expect("device poll");
    rx.recv()
        .expect("map callback ran")
        .expect("readback buffer mapped");

    let data = slice.get_mapped_range().to_vec();
    readback.unmap();
    data
}

fn offscreen_desc() -> ProgramDesc<'static> {
    ProgramDesc {
        label: Some("smoke program"),
        color_format: wgpu::TextureFormat::Rgba8UnormSrgb,
        depth_format: None,
        vertex_layouts: &[],
    }
}

#[test]
fn missing_fragment_source_renders_uniform_red() {
    let Some((device, queue)) = request_test_device() else {
        return;
    };

    // No fragment source selects the built-in solid-red stage.
    let mut program =
        ShaderProgram::from_sources(&device, &queue, &offscreen_desc(), FULLSCREEN_VERTEX, None)
            .expect("program with fallback fragment builds");

    let pixels = draw_and_read(&device, &queue, &mut program);
    for pixel in pixels.chunks_exact(4) {
        assert_eq!(pixel, &[0xFF, 0x00, 0x00, 0xFF], "expected solid red");
    }
}

#[test]
fn solid_red_texture_renders_uniform_red() {
    let Some((device, queue)) = request_test_device() else {
        return;
    };

    // A 2×2 solid-red image through the texture path.
    let red = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        2,
        2,
        image::Rgba([0xFF, 0x00, 0x00, 0xFF]),
    ));
    let texture = Texture2D::from_image(&device, &queue, Path::new("solid-red"), &red, true)
        .expect("solid red texture uploads");
    assert_eq!(texture.channels(), 4);

    let mut program = ShaderProgram::from_sources(
        &device,
        &queue,
        &offscreen_desc(),
        FULLSCREEN_VERTEX,
        Some(TEXTURED_FRAGMENT),
    )
    .expect("textured program builds");
    program.set_texture(0, &texture);

    let pixels = draw_and_read(&device, &queue, &mut program);
    for pixel in pixels.chunks_exact(4) {
        assert_eq!(pixel, &[0xFF, 0x00, 0x00, 0xFF], "expected solid red");
    }
}
