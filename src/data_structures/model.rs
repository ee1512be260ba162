//! Meshes, materials and models.
//!
//! A [`Model`] owns its meshes and its [`Material`]; the material owns its
//! shader and (once assigned) its cubemap. Dropping the model releases all of
//! them.

use std::sync::Arc;

use anyhow::*;
use wgpu::util::DeviceExt;

use crate::{
    context::InitContext,
    data_structures::{shader::Shader, texture::Texture},
    diagnostics::{ResourceKind, ResourceLedger, Tracked},
    pipelines::skybox::mk_skybox_pipeline,
    resources::texture::cubemap_material_layout,
};

/// Bind group index of the camera uniform.
pub const CAMERA_GROUP: u32 = 0;
/// Bind group index of material textures.
pub const MATERIAL_GROUP: u32 = 1;
/// Bind group index of the per-model uniform.
pub const MODEL_GROUP: u32 = 2;

/// Material binding names the skybox shader has to declare.
pub const ENVIRONMENT_MAP: &str = "environment_map";
pub const ENVIRONMENT_SAMPLER: &str = "environment_sampler";

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x3];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
    _tracked: Tracked,
}

impl Mesh {
    pub fn new(
        name: &str,
        vertex_buffer: wgpu::Buffer,
        index_buffer: wgpu::Buffer,
        num_elements: u32,
        ledger: &Arc<ResourceLedger>,
    ) -> Self {
        Self {
            name: name.to_string(),
            vertex_buffer,
            index_buffer,
            num_elements,
            _tracked: ledger.track(ResourceKind::Mesh, name),
        }
    }
}

/// Per-model data at [`MODEL_GROUP`]: world transform and colour tint.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniform {
    pub transform: [[f32; 4]; 4],
    pub tint: [f32; 4],
}

impl ModelUniform {
    pub fn new(position: cgmath::Vector3<f32>, scale: f32, tint: [f32; 4]) -> Self {
        let transform = cgmath::Matrix4::from_translation(position) * cgmath::Matrix4::from_scale(scale);
        Self {
            transform: transform.into(),
            tint,
        }
    }
}

impl Default for ModelUniform {
    fn default() -> Self {
        Self::new(cgmath::Vector3::new(0.0, 0.0, 0.0), 1.0, [1.0; 4])
    }
}

pub fn mk_model_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("model_bind_group_layout"),
    })
}

/// Shader plus texture slots. Only the cubemap slot is used by the skybox.
#[derive(Debug)]
pub struct Material {
    pub name: String,
    shader: Shader,
    layout: wgpu::BindGroupLayout,
    pub pipeline: wgpu::RenderPipeline,
    cubemap: Option<Texture>,
    bind_group: Option<wgpu::BindGroup>,
}

impl Material {
    /// Build a material around `shader`, which must declare
    /// [`ENVIRONMENT_MAP`] and [`ENVIRONMENT_SAMPLER`] in [`MATERIAL_GROUP`].
    pub fn new(ctx: &InitContext, name: &str, shader: Shader) -> Result<Self> {
        let map = shader.require_location(ENVIRONMENT_MAP)?;
        let sampler = shader.require_location(ENVIRONMENT_SAMPLER)?;
        ensure!(
            map.group == MATERIAL_GROUP && sampler.group == MATERIAL_GROUP,
            "material bindings of shader '{}' must live in group {}",
            shader.label(),
            MATERIAL_GROUP
        );

        let layout = cubemap_material_layout(&ctx.device, map.binding, sampler.binding);
        let pipeline = mk_skybox_pipeline(
            &ctx.device,
            ctx.format,
            &[&ctx.camera_layout, &layout, &ctx.model_layout],
            &shader,
        );

        Ok(Self {
            name: name.to_string(),
            shader,
            layout,
            pipeline,
            cubemap: None,
            bind_group: None,
        })
    }

    /// Attach `cubemap`, replacing (and releasing) any previous one.
    pub fn set_cubemap(&mut self, device: &wgpu::Device, cubemap: Texture) -> Result<()> {
        ensure!(cubemap.is_cubemap(), "material '{}' expects a cube texture", self.name);
        let sampler = cubemap
            .sampler
            .as_ref()
            .with_context(|| format!("cubemap for material '{}' has no sampler", self.name))?;
        let map = self.shader.require_location(ENVIRONMENT_MAP)?;
        let sampler_location = self.shader.require_location(ENVIRONMENT_SAMPLER)?;

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: map.binding,
                    resource: wgpu::BindingResource::TextureView(&cubemap.view),
                },
                wgpu::BindGroupEntry {
                    binding: sampler_location.binding,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
            label: Some(&format!("{} material", self.name)),
        });
        self.bind_group = Some(bind_group);
        self.cubemap = Some(cubemap);
        Ok(())
    }

    pub fn shader(&self) -> &Shader {
        &self.shader
    }

    pub fn cubemap(&self) -> Option<&Texture> {
        self.cubemap.as_ref()
    }

    /// Number of occupied texture slots.
    pub fn texture_count(&self) -> usize {
        self.cubemap.iter().count()
    }

    pub fn bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.bind_group.as_ref()
    }
}

#[derive(Debug)]
pub struct Model {
    pub name: String,
    pub meshes: Vec<Mesh>,
    pub material: Material,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    _tracked: Tracked,
}

impl Model {
    pub fn new(ctx: &InitContext, name: &str, meshes: Vec<Mesh>, material: Material) -> Self {
        let uniform_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} model buffer", name)),
                contents: bytemuck::cast_slice(&[ModelUniform::default()]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &ctx.model_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some(&format!("{} model bind group", name)),
        });

        Self {
            name: name.to_string(),
            meshes,
            material,
            uniform_buffer,
            bind_group,
            _tracked: ctx.ledger.track(ResourceKind::Model, name),
        }
    }

    pub fn set_transform(
        &self,
        queue: &wgpu::Queue,
        position: cgmath::Vector3<f32>,
        scale: f32,
        tint: [f32; 4],
    ) {
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::cast_slice(&[ModelUniform::new(position, scale, tint)]),
        );
    }
}

pub trait DrawModel {
    fn draw_mesh(
        &mut self,
        mesh: &Mesh,
        material_bind_group: &wgpu::BindGroup,
        model_bind_group: &wgpu::BindGroup,
        camera_bind_group: &wgpu::BindGroup,
    );

    /// Draw every mesh of `model` with its material pipeline. Returns `false`
    /// when the material has nothing to sample yet.
    fn draw_model(&mut self, model: &Model, camera_bind_group: &wgpu::BindGroup) -> bool;
}

impl DrawModel for wgpu::RenderPass<'_> {
    fn draw_mesh(
        &mut self,
        mesh: &Mesh,
        material_bind_group: &wgpu::BindGroup,
        model_bind_group: &wgpu::BindGroup,
        camera_bind_group: &wgpu::BindGroup,
    ) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        self.set_bind_group(CAMERA_GROUP, camera_bind_group, &[]);
        self.set_bind_group(MATERIAL_GROUP, material_bind_group, &[]);
        self.set_bind_group(MODEL_GROUP, model_bind_group, &[]);
        self.draw_indexed(0..mesh.num_elements, 0, 0..1);
    }

    fn draw_model(&mut self, model: &Model, camera_bind_group: &wgpu::BindGroup) -> bool {
        let Some(material_bind_group) = model.material.bind_group() else {
            return false;
        };
        self.set_pipeline(&model.material.pipeline);
        for mesh in &model.meshes {
            self.draw_mesh(mesh, material_bind_group, &model.bind_group, camera_bind_group);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Matrix4, SquareMatrix, Vector3};

    #[test]
    fn default_uniform_is_identity_and_white() {
        let uniform = ModelUniform::default();
        let identity: [[f32; 4]; 4] = Matrix4::<f32>::identity().into();
        assert_eq!(uniform.transform, identity);
        assert_eq!(uniform.tint, [1.0; 4]);
    }

    #[test]
    fn uniform_scales_then_translates() {
        let uniform = ModelUniform::new(Vector3::new(1.0, 2.0, 3.0), 2.0, [1.0; 4]);
        // column-major: translation in the last column, scale on the diagonal
        assert_eq!(uniform.transform[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(uniform.transform[0][0], 2.0);
        assert_eq!(uniform.transform[2][2], 2.0);
    }

    #[test]
    fn vertex_layout_matches_struct() {
        let desc = ModelVertex::desc();
        assert_eq!(desc.array_stride, 32);
        assert_eq!(desc.attributes.len(), 3);
        assert_eq!(desc.attributes[2].offset, 20);
    }
}
