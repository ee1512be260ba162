//! Equirectangular panorama to cubemap conversion.
//!
//! Each face is rendered with a fullscreen triangle whose fragment shader
//! turns the face pixel into a direction and samples the panorama at that
//! direction's longitude/latitude.

use anyhow::*;
use wgpu::util::DeviceExt;

use crate::{
    context::InitContext,
    data_structures::{
        shader::Shader,
        texture::{CUBE_FACES, Texture},
    },
    pipelines::basic::{mk_pipeline_layout, mk_render_pipeline, primitive_state},
    resources::texture::{equirect_layout, uniform_layout},
};

pub const FACE_UNIFORM: &str = "face";
pub const EQUIRECTANGULAR_MAP: &str = "equirectangular_map";
pub const EQUIRECTANGULAR_SAMPLER: &str = "equirectangular_sampler";

/// Group of the per-face uniform.
const FACE_GROUP: u32 = 0;
/// Group of the panorama texture and sampler.
const PANORAMA_GROUP: u32 = 1;

/// Face index in the first component; padded to 16 bytes for uniform layout.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct FaceUniform {
    face: [u32; 4],
}

/// Render `panorama` into a new `size`×`size` cubemap using `shader`.
///
/// The shader must declare `face` (uniform, group 0) and
/// `equirectangular_map`/`equirectangular_sampler` (group 1).
pub fn gen_texture_cubemap(
    ctx: &InitContext,
    shader: &Shader,
    panorama: &Texture,
    size: u32,
) -> Result<Texture> {
    let face = shader.require_location(FACE_UNIFORM)?;
    let map = shader.require_location(EQUIRECTANGULAR_MAP)?;
    let sampler = shader.require_location(EQUIRECTANGULAR_SAMPLER)?;
    ensure!(
        face.group == FACE_GROUP,
        "'{}' must be in group {}",
        FACE_UNIFORM,
        FACE_GROUP
    );
    ensure!(
        map.group == PANORAMA_GROUP && sampler.group == PANORAMA_GROUP,
        "panorama bindings must be in group {}",
        PANORAMA_GROUP
    );
    let panorama_sampler = panorama
        .sampler
        .as_ref()
        .context("panorama texture has no sampler")?;

    let device = &ctx.device;
    let cubemap = Texture::create_cubemap(device, size, "skybox cubemap", &ctx.ledger)?;

    let face_layout = uniform_layout(device, face.binding, "cubemap_face_layout");
    let panorama_layout = equirect_layout(device, map.binding, sampler.binding);
    let layout = mk_pipeline_layout(
        device,
        "Cubemap Conversion Layout",
        &[&face_layout, &panorama_layout],
    );
    let pipeline = mk_render_pipeline(
        device,
        "Cubemap Conversion Pipeline",
        &layout,
        Texture::CUBEMAP_FORMAT,
        None,
        None,
        &[],
        &shader.vertex,
        &shader.fragment,
        primitive_state(wgpu::PrimitiveTopology::TriangleList, None),
    );

    let panorama_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: &panorama_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: map.binding,
                resource: wgpu::BindingResource::TextureView(&panorama.view),
            },
            wgpu::BindGroupEntry {
                binding: sampler.binding,
                resource: wgpu::BindingResource::Sampler(panorama_sampler),
            },
        ],
        label: Some("panorama bind group"),
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Cubemap Conversion Encoder"),
    });
    for index in 0..CUBE_FACES {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cubemap face"),
            contents: bytemuck::cast_slice(&[FaceUniform {
                face: [index, 0, 0, 0],
            }]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let face_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &face_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: face.binding,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("cubemap face bind group"),
        });
        let view = cubemap.face_view(index);

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Cubemap Face Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(FACE_GROUP, &face_group, &[]);
        pass.set_bind_group(PANORAMA_GROUP, &panorama_group, &[]);
        pass.draw(0..3, 0..1);
    }
    ctx.queue.submit(std::iter::once(encoder.finish()));
    log::info!("Generated {}x{} cubemap from panorama", size, size);

    Ok(cubemap)
}
