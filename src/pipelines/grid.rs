//! Reference grid on the XZ plane, drawn as a line list.

use wgpu::util::DeviceExt;

use crate::pipelines::basic::{depth_state, mk_pipeline_layout, mk_render_pipeline, primitive_state};

/// Colour of the two lines through the origin.
pub const AXIS_COLOUR: [f32; 3] = [0.5, 0.5, 0.5];
pub const LINE_COLOUR: [f32; 3] = [0.75, 0.75, 0.75];

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GridVertex {
    pub position: [f32; 3],
    pub colour: [f32; 3],
}

impl GridVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GridVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Line endpoints of a `slices`×`slices` grid centred on the origin.
///
/// Lines run at every multiple of `spacing` from `-slices/2` to `slices/2`
/// (integer division) in both directions, so an even `slices` yields
/// `slices + 1` lines per direction.
pub fn gen_grid_vertices(slices: u32, spacing: f32) -> Vec<GridVertex> {
    let half = (slices / 2) as i32;
    let extent = half as f32 * spacing;
    let mut vertices = Vec::with_capacity(4 * (2 * half as usize + 1));

    for i in -half..=half {
        let colour = if i == 0 { AXIS_COLOUR } else { LINE_COLOUR };
        let offset = i as f32 * spacing;
        vertices.extend_from_slice(&[
            GridVertex {
                position: [offset, 0.0, -extent],
                colour,
            },
            GridVertex {
                position: [offset, 0.0, extent],
                colour,
            },
            GridVertex {
                position: [-extent, 0.0, offset],
                colour,
            },
            GridVertex {
                position: [extent, 0.0, offset],
                colour,
            },
        ]);
    }
    vertices
}

#[derive(Debug)]
pub struct GridResources {
    pub pipeline: wgpu::RenderPipeline,
    pub vertex_buffer: wgpu::Buffer,
    pub vertex_count: u32,
    slices: u32,
    spacing: f32,
}

impl GridResources {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        camera_layout: &wgpu::BindGroupLayout,
        slices: u32,
        spacing: f32,
    ) -> Self {
        let layout = mk_pipeline_layout(device, "Grid Pipeline Layout", &[camera_layout]);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Grid Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("grid.wgsl").into()),
        });
        let pipeline = mk_render_pipeline(
            device,
            "Grid Pipeline",
            &layout,
            color_format,
            Some(wgpu::BlendState::REPLACE),
            Some(depth_state(true, wgpu::CompareFunction::Less)),
            &[GridVertex::desc()],
            &module,
            &module,
            primitive_state(wgpu::PrimitiveTopology::LineList, None),
        );
        let (vertex_buffer, vertex_count) = Self::mk_vertex_buffer(device, slices, spacing);

        Self {
            pipeline,
            vertex_buffer,
            vertex_count,
            slices,
            spacing,
        }
    }

    fn mk_vertex_buffer(device: &wgpu::Device, slices: u32, spacing: f32) -> (wgpu::Buffer, u32) {
        let vertices = gen_grid_vertices(slices, spacing);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Grid Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        (buffer, vertices.len() as u32)
    }

    /// Rebuild the line buffer if the requested grid differs from the cached one.
    pub fn prepare(&mut self, device: &wgpu::Device, slices: u32, spacing: f32) {
        if self.slices != slices || self.spacing != spacing {
            log::debug!("Rebuilding grid: {} slices, spacing {}", slices, spacing);
            let (vertex_buffer, vertex_count) = Self::mk_vertex_buffer(device, slices, spacing);
            self.vertex_buffer = vertex_buffer;
            self.vertex_count = vertex_count;
            self.slices = slices;
            self.spacing = spacing;
        }
    }
}
