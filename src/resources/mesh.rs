use std::sync::Arc;

use anyhow::*;
use cgmath::{ElementWise, Vector3};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::model::{Mesh, ModelVertex},
    diagnostics::ResourceLedger,
};

/// CPU-side geometry before upload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u16>,
}

/// Normal, right and up axis of each cube face. `right × up == normal`, so
/// faces wind counter-clockwise seen from outside.
const CUBE_FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
    ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
    ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
    ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
];

/// Axis-aligned box centred on the origin with four vertices per face so
/// every face has its own normal and texture coordinates.
pub fn gen_mesh_cube(width: f32, height: f32, length: f32) -> MeshData {
    let half = Vector3::new(width, height, length) * 0.5;
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, right, up) in CUBE_FACES {
        let normal = Vector3::from(normal);
        let right = Vector3::from(right);
        let up = Vector3::from(up);
        let base = vertices.len() as u16;

        for (s, t) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let corner = normal + right * s + up * t;
            vertices.push(ModelVertex {
                position: corner.mul_element_wise(half).into(),
                tex_coords: [(s + 1.0) * 0.5, (1.0 - t) * 0.5],
                normal: normal.into(),
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    MeshData { vertices, indices }
}

pub fn upload_mesh(
    device: &wgpu::Device,
    name: &str,
    data: &MeshData,
    ledger: &Arc<ResourceLedger>,
) -> Result<Mesh> {
    ensure!(
        !data.vertices.is_empty() && !data.indices.is_empty(),
        "mesh '{}' has no geometry",
        name
    );
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Vertex Buffer", name)),
        contents: bytemuck::cast_slice(&data.vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    // Uint16 index buffers must be padded to a multiple of four bytes
    let mut indices = data.indices.clone();
    if indices.len() % 2 == 1 {
        indices.push(0);
    }
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Index Buffer", name)),
        contents: bytemuck::cast_slice(&indices),
        usage: wgpu::BufferUsages::INDEX,
    });

    Ok(Mesh::new(
        name,
        vertex_buffer,
        index_buffer,
        data.indices.len() as u32,
        ledger,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::InnerSpace;

    #[test]
    fn cube_has_four_vertices_per_face() {
        let cube = gen_mesh_cube(1.0, 1.0, 1.0);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert!(cube.indices.iter().all(|&i| (i as usize) < cube.vertices.len()));
    }

    #[test]
    fn cube_respects_extents() {
        let cube = gen_mesh_cube(2.0, 4.0, 6.0);
        for vertex in &cube.vertices {
            let [x, y, z] = vertex.position;
            assert_eq!(x.abs(), 1.0);
            assert_eq!(y.abs(), 2.0);
            assert_eq!(z.abs(), 3.0);
        }
    }

    #[test]
    fn triangles_face_outwards() {
        let cube = gen_mesh_cube(1.0, 1.0, 1.0);
        for triangle in cube.indices.chunks(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]]
                .map(|i| Vector3::from(cube.vertices[i as usize].position));
            let winding = (b - a).cross(c - a);
            let normal = Vector3::from(cube.vertices[triangle[0] as usize].normal);
            assert!(winding.dot(normal) > 0.0);
            // the face normal points away from the centre
            assert!(a.dot(normal) > 0.0);
        }
    }

    #[test]
    fn texture_coordinates_cover_each_face() {
        let cube = gen_mesh_cube(1.0, 1.0, 1.0);
        for face in cube.vertices.chunks(4) {
            let mut uvs: Vec<_> = face.iter().map(|v| v.tex_coords).collect();
            uvs.sort_by(|a, b| a.partial_cmp(b).unwrap());
            assert_eq!(uvs, vec![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]]);
        }
    }
}
