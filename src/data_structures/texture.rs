//! GPU textures and texture creation utilities.
//!
//! This module provides [`Texture`], a wrapper around WGPU texture resources,
//! and helpers for the three kinds the engine needs: depth buffers, HDR
//! panoramas uploaded from decoded images, and cubemaps used as render
//! targets for panorama conversion.

use std::sync::Arc;

use anyhow::*;
use image::GenericImageView;

use crate::diagnostics::{ResourceKind, ResourceLedger, Tracked};

/// Number of faces of a cubemap, ordered +X, -X, +Y, -Y, +Z, -Z.
pub const CUBE_FACES: u32 = 6;

/// A GPU texture with a view and optional sampler.
///
/// Asset textures (panoramas, cubemaps) carry a ledger entry and are released
/// when dropped. Textures are deliberately not `Clone`: every texture has a
/// single owner.
#[derive(Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
    pub view_dimension: wgpu::TextureViewDimension,
    _tracked: Option<Tracked>,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
    /// Panoramas are kept as full floats; sampled without filtering.
    pub const PANORAMA_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
    /// Renderable and filterable HDR format for generated cubemaps.
    pub const CUBEMAP_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

    /// Create a depth texture for depth-testing during rendering.
    ///
    /// # Arguments
    ///
    /// * `size` is [width, height] of the texture in pixels
    /// * `label` is used as a debug label for the GPU resource
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            sampler: None,
            view_dimension: wgpu::TextureViewDimension::D2,
            _tracked: None,
        }
    }

    /// Upload a decoded HDR image as an [`Self::PANORAMA_FORMAT`] texture.
    pub fn from_hdr_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &image::DynamicImage,
        label: &str,
        ledger: &Arc<ResourceLedger>,
    ) -> Result<Self> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            bail!("texture '{}' has no pixels ({}x{})", label, width, height);
        }
        let rgba = img.to_rgba32f();

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::PANORAMA_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            bytemuck::cast_slice(rgba.as_raw()),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                // four f32 channels per texel
                bytes_per_row: Some(16 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("panorama sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        }));

        Ok(Self {
            texture,
            view,
            sampler,
            view_dimension: wgpu::TextureViewDimension::D2,
            _tracked: Some(ledger.track(ResourceKind::Texture, label)),
        })
    }

    /// Create an empty cubemap with `size`×`size` faces that can be rendered
    /// into face by face (see [`Self::face_view`]) and sampled as a cube.
    pub fn create_cubemap(
        device: &wgpu::Device,
        size: u32,
        label: &str,
        ledger: &Arc<ResourceLedger>,
    ) -> Result<Self> {
        if size == 0 {
            bail!("cubemap '{}' needs a non-zero face size", label);
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: CUBE_FACES,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::CUBEMAP_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            array_layer_count: Some(CUBE_FACES),
            ..Default::default()
        });
        let sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("cubemap sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        }));

        Ok(Self {
            texture,
            view,
            sampler,
            view_dimension: wgpu::TextureViewDimension::Cube,
            _tracked: Some(ledger.track(ResourceKind::Texture, label)),
        })
    }

    /// 2D view of a single cubemap face, usable as a colour attachment.
    pub fn face_view(&self, face: u32) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("cubemap face"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_array_layer: face,
            array_layer_count: Some(1),
            ..Default::default()
        })
    }

    pub fn size(&self) -> wgpu::Extent3d {
        self.texture.size()
    }

    pub fn is_cubemap(&self) -> bool {
        self.view_dimension == wgpu::TextureViewDimension::Cube
            && self.texture.depth_or_array_layers() == CUBE_FACES
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }
}
