use crate::{
    data_structures::{
        model::{ModelVertex, Vertex},
        shader::Shader,
    },
    pipelines::basic::{depth_state, mk_pipeline_layout, mk_render_pipeline, primitive_state},
};

/// Pipeline for a cube drawn around the camera.
///
/// The camera sits inside the cube, so nothing is culled. The vertex shader
/// pushes fragments to the far plane (`clip.xyww`), so the skybox is tested
/// with `LessEqual` and never writes depth: everything else in the scene
/// draws in front of it.
pub fn mk_skybox_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
    shader: &Shader,
) -> wgpu::RenderPipeline {
    let layout = mk_pipeline_layout(device, "Skybox Pipeline Layout", bind_group_layouts);
    mk_render_pipeline(
        device,
        &format!("{} pipeline", shader.label()),
        &layout,
        color_format,
        Some(wgpu::BlendState::REPLACE),
        Some(depth_state(false, wgpu::CompareFunction::LessEqual)),
        &[ModelVertex::desc()],
        &shader.vertex,
        &shader.fragment,
        primitive_state(wgpu::PrimitiveTopology::TriangleList, None),
    )
}
