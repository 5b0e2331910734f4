//! Uniform-block reflection and CPU-side staging.
//!
//! A program's uniforms live in one block at `@group(0) @binding(0)`. The
//! block is reflected from the WGSL with naga so setters can address members
//! by name, like classic by-name uniform upload. Setters stage bytes on the
//! CPU; the program uploads the block when it is applied for drawing.

use std::collections::HashMap;

use naga::{AddressSpace, Module, TypeInner, VectorSize};

/// Bind group holding the reflected uniform block.
pub(crate) const UNIFORM_GROUP: u32 = 0;

/// Bind group holding texture units (texture at `2u`, sampler at `2u + 1`).
pub(crate) const TEXTURE_GROUP: u32 = 1;

/// Byte span of one named member inside the uniform block.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct Member {
    pub offset: u32,
    pub size: u32,
}

/// Name → byte-span table for the uniform block, merged across stages.
#[derive(Debug, Clone, Default)]
pub(crate) struct UniformLayout {
    members: HashMap<String, Member>,
    size: u32,
}

impl UniformLayout {
    /// Reflects the uniform block of one stage's module, if it declares one.
    ///
    /// Returns `Err` with a human-readable reason when the module declares a
    /// uniform at the reserved slot that is not a struct.
    pub fn reflect(module: &Module) -> Result<Option<Self>, String> {
        for (_, var) in module.global_variables.iter() {
            if var.space != AddressSpace::Uniform {
                continue;
            }
            let Some(binding) = &var.binding else { continue };
            if binding.group != UNIFORM_GROUP || binding.binding != 0 {
                continue;
            }

            let ty = &module.types[var.ty];
            let TypeInner::Struct { members, span } = &ty.inner else {
                return Err(format!(
                    "uniform at group {UNIFORM_GROUP} binding 0 must be a struct, found {:?}",
                    ty.inner
                ));
            };

            let mut table = HashMap::new();
            for member in members {
                let Some(name) = &member.name else { continue };
                let Some(size) = host_size(&module.types[member.ty].inner) else {
                    return Err(format!(
                        "uniform member `{name}` has a type the setters cannot address"
                    ));
                };
                table.insert(
                    name.clone(),
                    Member {
                        offset: member.offset,
                        size,
                    },
                );
            }

            return Ok(Some(Self {
                members: table,
                size: *span,
            }));
        }

        Ok(None)
    }

    /// Merges the layout reflected from another stage into this one.
    ///
    /// Both stages may declare the block; the declarations must agree member
    /// by member, or the program does not link.
    pub fn merge(&mut self, other: Self) -> Result<(), String> {
        for (name, member) in other.members {
            match self.members.get(&name) {
                Some(existing) if *existing != member => {
                    return Err(format!(
                        "uniform member `{name}` has mismatched layout between stages \
                         (offset {} vs {}, size {} vs {})",
                        existing.offset, member.offset, existing.size, member.size
                    ));
                }
                Some(_) => {}
                None => {
                    self.members.insert(name, member);
                }
            }
        }
        self.size = self.size.max(other.size);
        Ok(())
    }

    /// Block size in bytes, padded to the 16-byte uniform alignment.
    pub fn byte_size(&self) -> u32 {
        self.size.next_multiple_of(16).max(16)
    }

    fn resolve(&self, name: &str) -> Option<Member> {
        self.members.get(name).copied()
    }
}

/// CPU staging for the uniform block.
///
/// Setters resolve the member name on every call (there is no slot cache)
/// and write into the staged bytes. A name the block does not contain is a
/// silent no-op, matching by-name uniform semantics where an unused name
/// resolves to no location.
#[derive(Debug)]
pub(crate) struct UniformBlock {
    layout: UniformLayout,
    bytes: Vec<u8>,
    dirty: bool,
}

impl UniformBlock {
    pub fn new(layout: UniformLayout) -> Self {
        let bytes = vec![0u8; layout.byte_size() as usize];
        Self {
            layout,
            bytes,
            dirty: true,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Writes `data` at the member's offset. No-op for unknown names; a
    /// size mismatch means the caller used the wrong setter for the member's
    /// type and is logged rather than partially written.
    pub fn write(&mut self, name: &str, data: &[u8]) {
        let Some(member) = self.layout.resolve(name) else {
            return;
        };

        if member.size as usize != data.len() {
            log::debug!(
                "uniform `{name}`: setter wrote {} bytes but member is {} bytes; ignored",
                data.len(),
                member.size
            );
            return;
        }

        let start = member.offset as usize;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        self.dirty = true;
    }
}

/// Host-shareable byte size for the member types the setters support.
///
/// Matrix columns are padded to their WGSL column stride, so `mat4x4<f32>`
/// is 64 bytes and `mat3x3<f32>` is 48.
fn host_size(inner: &TypeInner) -> Option<u32> {
    match inner {
        TypeInner::Scalar(scalar) => Some(scalar.width as u32),
        TypeInner::Vector { size, scalar } => Some(vector_count(*size) * scalar.width as u32),
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } => {
            let column_stride = match rows {
                VectorSize::Bi => 2 * scalar.width as u32,
                VectorSize::Tri | VectorSize::Quad => 4 * scalar.width as u32,
            };
            Some(vector_count(*columns) * column_stride)
        }
        _ => None,
    }
}

fn vector_count(size: VectorSize) -> u32 {
    match size {
        VectorSize::Bi => 2,
        VectorSize::Tri => 3,
        VectorSize::Quad => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK_WGSL: &str = r#"
        struct SceneUniforms {
            model: mat4x4<f32>,
            tint: vec3<f32>,
            strength: f32,
            lit: i32,
        }
        @group(0) @binding(0) var<uniform> u: SceneUniforms;

        @vertex
        fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
            return u.model * vec4<f32>(position * u.strength, 1.0);
        }
    "#;

    fn layout_of(src: &str) -> UniformLayout {
        let module = naga::front::wgsl::parse_str(src).expect("test WGSL parses");
        UniformLayout::reflect(&module)
            .expect("reflection succeeds")
            .expect("module declares a uniform block")
    }

    // ── reflection ────────────────────────────────────────────────────────

    #[test]
    fn members_reflect_with_std140_like_offsets() {
        let layout = layout_of(BLOCK_WGSL);

        assert_eq!(layout.resolve("model"), Some(Member { offset: 0, size: 64 }));
        assert_eq!(layout.resolve("tint"), Some(Member { offset: 64, size: 12 }));
        assert_eq!(
            layout.resolve("strength"),
            Some(Member { offset: 76, size: 4 })
        );
        assert_eq!(layout.resolve("lit"), Some(Member { offset: 80, size: 4 }));
    }

    #[test]
    fn unknown_name_resolves_to_none() {
        let layout = layout_of(BLOCK_WGSL);
        assert_eq!(layout.resolve("missing"), None);
    }

    #[test]
    fn block_size_is_padded_to_uniform_alignment() {
        let layout = layout_of(BLOCK_WGSL);
        assert_eq!(layout.byte_size() % 16, 0);
        assert!(layout.byte_size() >= 84);
    }

    #[test]
    fn module_without_uniform_block_reflects_none() {
        let module = naga::front::wgsl::parse_str(
            r#"
            @vertex
            fn vs_main() -> @builtin(position) vec4<f32> {
                return vec4<f32>(0.0, 0.0, 0.0, 1.0);
            }
            "#,
        )
        .expect("test WGSL parses");
        assert!(UniformLayout::reflect(&module).unwrap().is_none());
    }

    // ── merge ─────────────────────────────────────────────────────────────

    #[test]
    fn identical_declarations_merge() {
        let mut a = layout_of(BLOCK_WGSL);
        let b = layout_of(BLOCK_WGSL);
        assert!(a.merge(b).is_ok());
        assert_eq!(a.resolve("model"), Some(Member { offset: 0, size: 64 }));
    }

    #[test]
    fn conflicting_declarations_fail_to_merge() {
        let mut a = layout_of(BLOCK_WGSL);
        let b = layout_of(
            r#"
            struct Other {
                tint: vec4<f32>,
            }
            @group(0) @binding(0) var<uniform> u: Other;

            @fragment
            fn fs_main() -> @location(0) vec4<f32> {
                return u.tint;
            }
            "#,
        );
        assert!(a.merge(b).is_err());
    }

    // ── staging writes ────────────────────────────────────────────────────

    #[test]
    fn write_lands_at_member_offset() {
        let mut block = UniformBlock::new(layout_of(BLOCK_WGSL));
        block.mark_clean();

        block.write("strength", &2.5f32.to_ne_bytes());

        assert!(block.dirty());
        let bytes = block.bytes();
        assert_eq!(&bytes[76..80], &2.5f32.to_ne_bytes());
    }

    #[test]
    fn unknown_name_is_a_silent_no_op() {
        let mut block = UniformBlock::new(layout_of(BLOCK_WGSL));
        block.mark_clean();
        let before = block.bytes().to_vec();

        block.write("nonexistent", &1.0f32.to_ne_bytes());

        assert!(!block.dirty());
        assert_eq!(block.bytes(), &before[..]);
    }

    #[test]
    fn size_mismatch_writes_nothing() {
        let mut block = UniformBlock::new(layout_of(BLOCK_WGSL));
        block.mark_clean();

        // `tint` is a vec3; a mat4-sized write must not spill into the
        // neighboring members.
        block.write("tint", &[0xAA; 64]);

        assert!(!block.dirty());
        assert!(block.bytes().iter().all(|&b| b == 0));
    }
}
