//! Shader program wrapper.
//!
//! A [`ShaderProgram`] compiles a vertex + fragment WGSL pair into a ready
//! render pipeline and exposes by-name uniform setters and texture units.
//!
//! Compilation is stage-local (naga parse + validate, diagnostics tagged
//! with the stage); pipeline creation runs inside a wgpu validation error
//! scope so cross-stage interface mismatches surface as link errors instead
//! of panics. A missing or unreadable fragment source is replaced by a
//! built-in stage that paints solid red — visibly wrong beats crashing in
//! an exercise setting.

use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroU64;
use std::path::Path;

use naga::{AddressSpace, Module, TypeInner};

use crate::error::{ShaderError, ShaderStage};
use crate::texture::Texture2D;
use crate::uniform::{TEXTURE_GROUP, UniformBlock, UniformLayout};

/// Fragment stage used when no fragment source is provided (or the file
/// cannot be read): every pixel solid red.
const FALLBACK_FRAGMENT_WGSL: &str = r#"
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.0, 0.0, 1.0);
}
"#;

/// Fixed-function state for the program's pipeline.
///
/// The exercises all draw triangle lists into one color target; only the
/// target formats and vertex layout vary per program.
pub struct ProgramDesc<'a> {
    pub label: Option<&'a str>,
    pub color_format: wgpu::TextureFormat,
    /// `None` disables the depth test (e.g. offscreen quads).
    pub depth_format: Option<wgpu::TextureFormat>,
    pub vertex_layouts: &'a [wgpu::VertexBufferLayout<'a>],
}

/// A linked, drawable shader program.
///
/// Owns the render pipeline, the uniform block buffer, and the texture-unit
/// bind group. Not `Clone`: one program, one set of GPU resources.
pub struct ShaderProgram {
    pipeline: wgpu::RenderPipeline,

    uniforms: ProgramUniforms,
    textures: Option<ProgramTextures>,
}

struct ProgramUniforms {
    block: UniformBlock,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct ProgramTextures {
    layout: wgpu::BindGroupLayout,
    /// Declared units, ascending.
    units: Vec<u32>,
    /// Views/samplers bound per unit; unfilled units use the fallback.
    bound: HashMap<u32, (wgpu::TextureView, wgpu::Sampler)>,
    fallback: (wgpu::TextureView, wgpu::Sampler),
    bind_group: Option<wgpu::BindGroup>,
}

/// One stage after parse + validation + reflection.
#[derive(Debug)]
struct CompiledStage {
    source: String,
    entry_point: String,
    uniforms: Option<UniformLayout>,
    /// Texture-unit indices this stage samples.
    units: BTreeSet<u32>,
}

impl ShaderProgram {
    /// Builds a program from shader source files.
    ///
    /// The vertex source is required; a missing or unreadable fragment file
    /// falls back to the built-in red shader with a logged warning.
    pub fn from_paths(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        desc: &ProgramDesc<'_>,
        vertex_path: &Path,
        fragment_path: Option<&Path>,
    ) -> Result<Self, ShaderError> {
        let vertex_src = std::fs::read_to_string(vertex_path).map_err(|e| {
            log::error!("cannot read vertex shader {}: {e}", vertex_path.display());
            ShaderError::SourceRead {
                stage: ShaderStage::Vertex,
                path: vertex_path.to_path_buf(),
                source: e,
            }
        })?;

        let fragment_src = match fragment_path {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(src) => Some(src),
                Err(e) => {
                    log::warn!(
                        "cannot read fragment shader {}: {e}; using built-in red shader",
                        path.display()
                    );
                    None
                }
            },
            None => None,
        };

        Self::from_sources(device, queue, desc, &vertex_src, fragment_src.as_deref())
    }

    /// Builds a program from in-memory WGSL sources.
    ///
    /// `fragment_src = None` selects the built-in red fragment stage.
    pub fn from_sources(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        desc: &ProgramDesc<'_>,
        vertex_src: &str,
        fragment_src: Option<&str>,
    ) -> Result<Self, ShaderError> {
        let vertex = compile_stage(vertex_src, ShaderStage::Vertex)?;
        let fragment = compile_stage(
            fragment_src.unwrap_or(FALLBACK_FRAGMENT_WGSL),
            ShaderStage::Fragment,
        )?;

        // Merge the per-stage uniform views of the shared block; layout
        // disagreements between the stages are a link failure.
        let mut uniform_layout = vertex.uniforms.clone().unwrap_or_default();
        if let Some(frag_layout) = fragment.uniforms.clone() {
            uniform_layout
                .merge(frag_layout)
                .map_err(|log| link_error(log))?;
        }

        let mut units: BTreeSet<u32> = vertex.units.clone();
        units.extend(&fragment.units);

        // Everything from module creation through pipeline creation runs in
        // a validation error scope; wgpu reports interface mismatches here.
        let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: desc.label,
            source: wgpu::ShaderSource::Wgsl(vertex.source.as_str().into()),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: desc.label,
            source: wgpu::ShaderSource::Wgsl(fragment.source.as_str().into()),
        });

        // Group 0 always carries the block buffer, even when no stage
        // declares one — an unreferenced binding keeps the group indices
        // aligned with the pipeline layout at no cost.
        let uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: desc.label,
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(uniform_layout.byte_size() as u64),
                },
                count: None,
            }],
        });

        let texture_bgl = if units.is_empty() {
            None
        } else {
            let mut entries = Vec::new();
            for &unit in &units {
                entries.push(wgpu::BindGroupLayoutEntry {
                    binding: 2 * unit,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                });
                entries.push(wgpu::BindGroupLayoutEntry {
                    binding: 2 * unit + 1,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                });
            }
            Some(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: desc.label,
                entries: &entries,
            }))
        };

        let mut bgls: Vec<&wgpu::BindGroupLayout> = vec![&uniform_bgl];
        if let Some(bgl) = &texture_bgl {
            bgls.push(bgl);
        }

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: desc.label,
            bind_group_layouts: &bgls,
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: desc.label,
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some(&vertex.entry_point),
                compilation_options: Default::default(),
                buffers: desc.vertex_layouts,
            },

            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some(&fragment.entry_point),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: desc.color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: desc.depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),

            multiview_mask: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(error_scope.pop()) {
            let log = err.to_string();
            log::error!("shader program failed to link: {log}");
            return Err(ShaderError::Link { log });
        }

        let block = UniformBlock::new(uniform_layout);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label,
            size: block.bytes().len() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: desc.label,
            layout: &uniform_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        let textures = texture_bgl.map(|layout| ProgramTextures {
            layout,
            units: units.iter().copied().collect(),
            bound: HashMap::new(),
            fallback: fallback_texture(device, queue),
            bind_group: None,
        });

        Ok(Self {
            pipeline,
            uniforms: ProgramUniforms {
                block,
                buffer,
                bind_group,
            },
            textures,
        })
    }

    // ── uniform setters ───────────────────────────────────────────────────
    //
    // Each setter resolves the member by name on this call; a name the
    // program does not declare is a silent no-op.

    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.set_int(name, value as i32);
    }

    pub fn set_int(&mut self, name: &str, value: i32) {
        self.uniforms.block.write(name, &value.to_ne_bytes());
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        self.uniforms.block.write(name, &value.to_ne_bytes());
    }

    pub fn set_vec3(&mut self, name: &str, value: glam::Vec3) {
        self.uniforms
            .block
            .write(name, bytemuck::bytes_of(&value.to_array()));
    }

    pub fn set_mat4(&mut self, name: &str, value: glam::Mat4) {
        self.uniforms
            .block
            .write(name, bytemuck::bytes_of(&value.to_cols_array()));
    }

    /// Binds `texture` to a texture unit.
    ///
    /// A unit the program does not sample is ignored, mirroring the uniform
    /// setters' unknown-name behavior.
    pub fn set_texture(&mut self, unit: u32, texture: &Texture2D) {
        let Some(t) = &mut self.textures else {
            log::debug!("program samples no textures; unit {unit} ignored");
            return;
        };
        if !t.units.contains(&unit) {
            log::debug!("program does not sample texture unit {unit}; ignored");
            return;
        }
        t.bound
            .insert(unit, (texture.view().clone(), texture.sampler().clone()));
        t.bind_group = None;
    }

    /// Makes the program current on `rpass` and flushes staged uniforms.
    ///
    /// Uniform writes are queue-ordered: the values staged before the frame
    /// is submitted are the ones this program's draws observe.
    pub fn apply(
        &mut self,
        rpass: &mut wgpu::RenderPass<'_>,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) {
        if self.uniforms.block.dirty() {
            queue.write_buffer(&self.uniforms.buffer, 0, self.uniforms.block.bytes());
            self.uniforms.block.mark_clean();
        }

        if let Some(t) = &mut self.textures {
            if t.bind_group.is_none() {
                let mut entries = Vec::new();
                for &unit in &t.units {
                    let (view, sampler) = t.bound.get(&unit).unwrap_or(&t.fallback);
                    entries.push(wgpu::BindGroupEntry {
                        binding: 2 * unit,
                        resource: wgpu::BindingResource::TextureView(view),
                    });
                    entries.push(wgpu::BindGroupEntry {
                        binding: 2 * unit + 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    });
                }
                t.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("ishtar program textures"),
                    layout: &t.layout,
                    entries: &entries,
                }));
            }
        }

        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.uniforms.bind_group, &[]);
        if let Some(t) = &self.textures {
            if let Some(bg) = &t.bind_group {
                rpass.set_bind_group(1, bg, &[]);
            }
        }
    }
}

fn link_error(log: String) -> ShaderError {
    log::error!("shader program failed to link: {log}");
    ShaderError::Link { log }
}

/// Parses and validates one stage, then reflects its interface.
fn compile_stage(source: &str, stage: ShaderStage) -> Result<CompiledStage, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| {
        let log = e.emit_to_string(source);
        log::error!("{stage} shader failed to compile:\n{log}");
        ShaderError::Compile { stage, log }
    })?;

    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module);
    if let Err(e) = info {
        let log = e.emit_to_string(source);
        log::error!("{stage} shader failed to compile:\n{log}");
        return Err(ShaderError::Compile { stage, log });
    }

    let entry_point = entry_point_for(&module, stage).ok_or_else(|| {
        let log = format!("source declares no {stage} entry point");
        log::error!("{stage} shader failed to compile: {log}");
        ShaderError::Compile { stage, log }
    })?;

    let uniforms = UniformLayout::reflect(&module)
        .map_err(|log| ShaderError::Compile { stage, log })?;

    let units = reflect_texture_units(&module).map_err(|log| ShaderError::Compile { stage, log })?;

    Ok(CompiledStage {
        source: source.to_string(),
        entry_point,
        uniforms,
        units,
    })
}

fn entry_point_for(module: &Module, stage: ShaderStage) -> Option<String> {
    let wanted = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == wanted)
        .map(|ep| ep.name.clone())
}

/// Collects the texture units a stage samples.
///
/// Units follow a fixed convention: unit `u` is the texture at
/// `@group(1) @binding(2u)` paired with the sampler at `@binding(2u + 1)`.
fn reflect_texture_units(module: &Module) -> Result<BTreeSet<u32>, String> {
    let mut textures = BTreeSet::new();
    let mut samplers = BTreeSet::new();

    for (_, var) in module.global_variables.iter() {
        if var.space != AddressSpace::Handle {
            continue;
        }
        let Some(binding) = &var.binding else { continue };

        match &module.types[var.ty].inner {
            TypeInner::Image { .. } => {
                if binding.group != TEXTURE_GROUP || binding.binding % 2 != 0 {
                    return Err(format!(
                        "texture `{}` must live at group {TEXTURE_GROUP}, even binding \
                         (unit convention: texture 2u, sampler 2u+1)",
                        var.name.as_deref().unwrap_or("<unnamed>")
                    ));
                }
                textures.insert(binding.binding / 2);
            }
            TypeInner::Sampler { .. } => {
                if binding.group != TEXTURE_GROUP || binding.binding % 2 != 1 {
                    return Err(format!(
                        "sampler `{}` must live at group {TEXTURE_GROUP}, odd binding \
                         (unit convention: texture 2u, sampler 2u+1)",
                        var.name.as_deref().unwrap_or("<unnamed>")
                    ));
                }
                samplers.insert(binding.binding / 2);
            }
            _ => {}
        }
    }

    for unit in &textures {
        if !samplers.contains(unit) {
            return Err(format!("texture unit {unit} has no paired sampler"));
        }
    }
    for unit in &samplers {
        if !textures.contains(unit) {
            return Err(format!("sampler at unit {unit} has no paired texture"));
        }
    }

    Ok(textures)
}

/// 1×1 white texture bound to units the caller never filled.
fn fallback_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> (wgpu::TextureView, wgpu::Sampler) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("ishtar unit fallback"),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[0xFF, 0xFF, 0xFF, 0xFF],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor::default());

    (view, sampler)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_VERTEX: &str = r#"
        @vertex
        fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
            return vec4<f32>(0.0, 0.0, 0.0, 1.0);
        }
    "#;

    // ── stage compilation ─────────────────────────────────────────────────

    #[test]
    fn valid_vertex_stage_compiles() {
        let stage = compile_stage(GOOD_VERTEX, ShaderStage::Vertex).unwrap();
        assert_eq!(stage.entry_point, "vs_main");
        assert!(stage.uniforms.is_none());
        assert!(stage.units.is_empty());
    }

    #[test]
    fn parse_failure_is_tagged_with_the_stage() {
        let err = compile_stage("not wgsl at all", ShaderStage::Fragment).unwrap_err();
        match err {
            ShaderError::Compile { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(!log.is_empty());
            }
            other => panic!("expected Compile error, got {other:?}"),
        }
    }

    #[test]
    fn missing_entry_point_is_a_compile_error() {
        // A valid module, but with no fragment entry point.
        let err = compile_stage(GOOD_VERTEX, ShaderStage::Fragment).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Compile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
    }

    #[test]
    fn fallback_fragment_source_compiles_and_exists() {
        let stage = compile_stage(FALLBACK_FRAGMENT_WGSL, ShaderStage::Fragment).unwrap();
        assert_eq!(stage.entry_point, "fs_main");
    }

    // ── texture unit reflection ───────────────────────────────────────────

    #[test]
    fn paired_units_reflect() {
        let stage = compile_stage(
            r#"
            @group(1) @binding(0) var t0: texture_2d<f32>;
            @group(1) @binding(1) var s0: sampler;
            @group(1) @binding(2) var t1: texture_2d<f32>;
            @group(1) @binding(3) var s1: sampler;

            @fragment
            fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
                return textureSample(t0, s0, uv) * textureSample(t1, s1, uv);
            }
            "#,
            ShaderStage::Fragment,
        )
        .unwrap();

        assert_eq!(stage.units.iter().copied().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn texture_without_sampler_is_rejected() {
        let err = compile_stage(
            r#"
            @group(1) @binding(0) var t0: texture_2d<f32>;

            @fragment
            fn fs_main() -> @location(0) vec4<f32> {
                return vec4<f32>(textureLoad(t0, vec2<i32>(0, 0), 0).rgb, 1.0);
            }
            "#,
            ShaderStage::Fragment,
        )
        .unwrap_err();

        assert!(matches!(err, ShaderError::Compile { .. }));
    }

    #[test]
    fn texture_outside_the_unit_group_is_rejected() {
        let err = compile_stage(
            r#"
            @group(0) @binding(2) var t0: texture_2d<f32>;
            @group(0) @binding(3) var s0: sampler;

            @fragment
            fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
                return textureSample(t0, s0, uv);
            }
            "#,
            ShaderStage::Fragment,
        )
        .unwrap_err();

        assert!(matches!(err, ShaderError::Compile { .. }));
    }
}
