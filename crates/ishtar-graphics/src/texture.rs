//! 2D texture loading.
//!
//! [`Texture2D`] decodes an image file, uploads it with a full mip chain,
//! and owns the resulting GPU texture, view, and sampler. The sampling
//! policy is fixed: repeat wrap on both axes, trilinear minification,
//! linear magnification.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use image::imageops::FilterType;

use crate::error::TextureError;

/// Logical storage class selected by the decoded channel count.
///
/// `Rgb` keeps its 3-channel identity even though the upload expands to
/// RGBA — wgpu exposes no 24-bit texel format. Channel counts outside
/// {1, 3, 4} are rejected up front rather than mis-uploaded.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StorageFormat {
    Rgba,
    Rgb,
    Gray,
}

impl StorageFormat {
    pub fn from_channel_count(channels: u8) -> Option<Self> {
        match channels {
            4 => Some(StorageFormat::Rgba),
            3 => Some(StorageFormat::Rgb),
            1 => Some(StorageFormat::Gray),
            _ => None,
        }
    }

    /// Texel format of the GPU allocation.
    pub fn texel_format(self) -> wgpu::TextureFormat {
        match self {
            StorageFormat::Rgba | StorageFormat::Rgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            StorageFormat::Gray => wgpu::TextureFormat::R8Unorm,
        }
    }

    /// Bytes per pixel of the uploaded data (after any RGBA expansion).
    pub fn upload_bytes_per_pixel(self) -> u32 {
        match self {
            StorageFormat::Rgba | StorageFormat::Rgb => 4,
            StorageFormat::Gray => 1,
        }
    }
}

/// Full mip chain length for a base level of `width` × `height`.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// A decoded, mipmapped 2D texture on the GPU.
///
/// Movable, not `Clone`: each instance owns its GPU handles, and dropping
/// it releases them exactly once.
pub struct Texture2D {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    width: u32,
    height: u32,
    channels: u8,
}

impl Texture2D {
    /// Decodes `path` and uploads it.
    ///
    /// `flip_vertically` flips the decoded image before upload; most image
    /// formats store the first pixel top-left while texture coordinates in
    /// these exercises put v = 0 at the bottom.
    pub fn from_path(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: &Path,
        flip_vertically: bool,
    ) -> Result<Self, TextureError> {
        let image = image::open(path).map_err(|e| {
            log::error!("failed to load texture {}: {e}", path.display());
            TextureError::Decode {
                path: path.to_path_buf(),
                source: e,
            }
        })?;

        Self::from_image(device, queue, path, &image, flip_vertically)
    }

    /// Uploads an already-decoded image. `origin` labels the texture and
    /// appears in errors.
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        origin: &Path,
        image: &DynamicImage,
        flip_vertically: bool,
    ) -> Result<Self, TextureError> {
        let channels = image.color().channel_count();
        let Some(format) = StorageFormat::from_channel_count(channels) else {
            log::error!(
                "texture {} has unsupported channel count {channels}",
                origin.display()
            );
            return Err(TextureError::UnsupportedChannels {
                path: origin.to_path_buf(),
                channels,
            });
        };

        let image = if flip_vertically {
            image.flipv()
        } else {
            image.clone()
        };

        let (width, height) = (image.width(), image.height());
        let levels = mip_level_count(width, height);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: origin.to_str(),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: format.texel_format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        // The chain is downsampled on the CPU and every level uploaded; the
        // decode buffers drop at the end of this scope, only the metadata
        // stays resident.
        match format {
            StorageFormat::Rgba | StorageFormat::Rgb => {
                let base = image.to_rgba8();
                for level in 0..levels {
                    let (lw, lh) = level_extent(width, height, level);
                    let data = if level == 0 {
                        base.clone()
                    } else {
                        image::imageops::resize(&base, lw, lh, FilterType::Triangle)
                    };
                    write_level(queue, &texture, level, lw, lh, 4, &data);
                }
            }
            StorageFormat::Gray => {
                let base = image.to_luma8();
                for level in 0..levels {
                    let (lw, lh) = level_extent(width, height, level);
                    let data = if level == 0 {
                        base.clone()
                    } else {
                        image::imageops::resize(&base, lw, lh, FilterType::Triangle)
                    };
                    write_level(queue, &texture, level, lw, lh, 1, &data);
                }
            }
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: origin.to_str(),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            texture,
            view,
            sampler,
            width,
            height,
            channels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channel count of the decoded image (1, 3, or 4) — not of the GPU
    /// allocation.
    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }
}

fn level_extent(width: u32, height: u32, level: u32) -> (u32, u32) {
    ((width >> level).max(1), (height >> level).max(1))
}

fn write_level(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    level: u32,
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
    data: &[u8],
) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: level,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(bytes_per_pixel * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── channel → storage mapping ─────────────────────────────────────────

    #[test]
    fn four_channels_map_to_rgba() {
        assert_eq!(
            StorageFormat::from_channel_count(4),
            Some(StorageFormat::Rgba)
        );
        assert_eq!(
            StorageFormat::Rgba.texel_format(),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
    }

    #[test]
    fn three_channels_map_to_rgb_with_rgba_upload() {
        let format = StorageFormat::from_channel_count(3).unwrap();
        assert_eq!(format, StorageFormat::Rgb);
        // No 24-bit texel format exists; the upload expands.
        assert_eq!(format.upload_bytes_per_pixel(), 4);
    }

    #[test]
    fn one_channel_maps_to_gray() {
        let format = StorageFormat::from_channel_count(1).unwrap();
        assert_eq!(format, StorageFormat::Gray);
        assert_eq!(format.texel_format(), wgpu::TextureFormat::R8Unorm);
        assert_eq!(format.upload_bytes_per_pixel(), 1);
    }

    #[test]
    fn other_channel_counts_are_rejected() {
        assert_eq!(StorageFormat::from_channel_count(0), None);
        assert_eq!(StorageFormat::from_channel_count(2), None);
        assert_eq!(StorageFormat::from_channel_count(5), None);
    }

    // ── mip chain ─────────────────────────────────────────────────────────

    #[test]
    fn mip_count_covers_the_full_chain() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(640, 480), 10);
    }

    #[test]
    fn level_extents_halve_and_clamp_to_one() {
        assert_eq!(level_extent(8, 2, 0), (8, 2));
        assert_eq!(level_extent(8, 2, 2), (2, 1));
        assert_eq!(level_extent(8, 2, 3), (1, 1));
    }
}
