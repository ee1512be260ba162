//! Screen-space overlay: the frame-rate counter.
//!
//! Text is drawn from a built-in 5×7 bitmap font, one quad per lit pixel.
//! Only the characters an FPS readout needs are defined.

use crate::pipelines::basic::{depth_state, mk_pipeline_layout, mk_render_pipeline, primitive_state};

pub const GLYPH_WIDTH: u32 = 5;
pub const GLYPH_HEIGHT: u32 = 7;
/// Horizontal distance between glyph origins, in font pixels.
pub const GLYPH_ADVANCE: u32 = GLYPH_WIDTH + 1;
/// Screen pixels per font pixel.
pub const HUD_PIXEL: f32 = 2.0;

pub const FPS_GOOD: [f32; 4] = [0.0, 0.89, 0.19, 1.0];
pub const FPS_FAIR: [f32; 4] = [1.0, 0.63, 0.0, 1.0];
pub const FPS_POOR: [f32; 4] = [0.9, 0.16, 0.22, 1.0];

/// Rows top to bottom, bit 4 is the leftmost column.
fn glyph(c: char) -> Option<[u8; GLYPH_HEIGHT as usize]> {
    let rows = match c {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        ' ' => [0; 7],
        _ => return None,
    };
    Some(rows)
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct HudVertex {
    pub position: [f32; 2],
    pub colour: [f32; 4],
}

impl HudVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<HudVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Text of the counter, right-aligned to two digits.
pub fn fps_text(fps: u32) -> String {
    format!("{:2} FPS", fps)
}

pub fn fps_colour(fps: u32) -> [f32; 4] {
    match fps {
        30.. => FPS_GOOD,
        15..30 => FPS_FAIR,
        _ => FPS_POOR,
    }
}

/// Triangles for `text` with its top-left corner at (`x`, `y`) window pixels.
/// Characters without a glyph are skipped but still advance the cursor.
pub fn gen_text_quads(
    text: &str,
    x: f32,
    y: f32,
    pixel: f32,
    screen: (u32, u32),
    colour: [f32; 4],
) -> Vec<HudVertex> {
    let (width, height) = (screen.0.max(1) as f32, screen.1.max(1) as f32);
    let to_ndc = |px: f32, py: f32| [px / width * 2.0 - 1.0, 1.0 - py / height * 2.0];
    let mut vertices = Vec::new();

    for (index, c) in text.chars().enumerate() {
        let Some(rows) = glyph(c) else {
            log::trace!("No glyph for {:?}", c);
            continue;
        };
        let origin_x = x + (index as u32 * GLYPH_ADVANCE) as f32 * pixel;
        for (row, bits) in rows.iter().enumerate() {
            for column in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - column)) == 0 {
                    continue;
                }
                let left = origin_x + column as f32 * pixel;
                let top = y + row as f32 * pixel;
                let [l, t] = to_ndc(left, top);
                let [r, b] = to_ndc(left + pixel, top + pixel);
                for position in [[l, t], [l, b], [r, b], [l, t], [r, b], [r, t]] {
                    vertices.push(HudVertex { position, colour });
                }
            }
        }
    }
    vertices
}

#[derive(Debug)]
pub struct HudResources {
    pub pipeline: wgpu::RenderPipeline,
    pub vertex_buffer: wgpu::Buffer,
    pub vertex_count: u32,
    capacity: u64,
}

impl HudResources {
    /// Vertices of the widest readout the buffer starts out with ("999 FPS").
    const INITIAL_CAPACITY: u64 = 7 * 35 * 6;

    pub fn new(device: &wgpu::Device, color_format: wgpu::TextureFormat) -> Self {
        let layout = mk_pipeline_layout(device, "HUD Pipeline Layout", &[]);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("HUD Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("hud.wgsl").into()),
        });
        let pipeline = mk_render_pipeline(
            device,
            "HUD Pipeline",
            &layout,
            color_format,
            Some(wgpu::BlendState::ALPHA_BLENDING),
            // the pass has a depth attachment, the overlay ignores it
            Some(depth_state(false, wgpu::CompareFunction::Always)),
            &[HudVertex::desc()],
            &module,
            &module,
            primitive_state(wgpu::PrimitiveTopology::TriangleList, None),
        );

        Self {
            pipeline,
            vertex_buffer: Self::mk_vertex_buffer(device, Self::INITIAL_CAPACITY),
            vertex_count: 0,
            capacity: Self::INITIAL_CAPACITY,
        }
    }

    fn mk_vertex_buffer(device: &wgpu::Device, capacity: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("HUD Vertex Buffer"),
            size: capacity * std::mem::size_of::<HudVertex>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Upload `vertices`, growing the buffer when they don't fit.
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, vertices: &[HudVertex]) {
        let needed = vertices.len() as u64;
        if needed > self.capacity {
            self.capacity = needed.next_power_of_two();
            self.vertex_buffer = Self::mk_vertex_buffer(device, self.capacity);
        }
        if !vertices.is_empty() {
            queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(vertices));
        }
        self.vertex_count = vertices.len() as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit_pixels(c: char) -> u32 {
        glyph(c).unwrap().iter().map(|row| row.count_ones()).sum()
    }

    #[test]
    fn every_readout_character_has_a_glyph() {
        for c in "0123456789 FPS".chars() {
            assert!(glyph(c).is_some(), "missing glyph {:?}", c);
        }
        assert!(glyph('x').is_none());
    }

    #[test]
    fn fps_text_pads_to_two_digits() {
        assert_eq!(fps_text(7), " 7 FPS");
        assert_eq!(fps_text(60), "60 FPS");
        assert_eq!(fps_text(144), "144 FPS");
    }

    #[test]
    fn colour_follows_thresholds() {
        assert_eq!(fps_colour(60), FPS_GOOD);
        assert_eq!(fps_colour(30), FPS_GOOD);
        assert_eq!(fps_colour(29), FPS_FAIR);
        assert_eq!(fps_colour(15), FPS_FAIR);
        assert_eq!(fps_colour(14), FPS_POOR);
        assert_eq!(fps_colour(0), FPS_POOR);
    }

    #[test]
    fn one_quad_per_lit_pixel() {
        let vertices = gen_text_quads("1", 0.0, 0.0, 1.0, (800, 450), FPS_GOOD);
        assert_eq!(vertices.len() as u32, lit_pixels('1') * 6);
        assert!(gen_text_quads("  ", 0.0, 0.0, 1.0, (800, 450), FPS_GOOD).is_empty());
    }

    #[test]
    fn quads_stay_in_the_top_left_corner() {
        let vertices = gen_text_quads("60 FPS", 10.0, 10.0, HUD_PIXEL, (800, 450), FPS_GOOD);
        assert!(!vertices.is_empty());
        for vertex in &vertices {
            let [x, y] = vertex.position;
            assert!((-1.0..0.0).contains(&x), "x = {}", x);
            assert!((0.0..=1.0).contains(&y), "y = {}", y);
        }
        // '6' has a lit pixel in its first column
        let left = vertices
            .iter()
            .map(|v| v.position[0])
            .fold(f32::MAX, f32::min);
        assert_eq!(left, 10.0 / 800.0 * 2.0 - 1.0);
    }

    #[test]
    fn unknown_characters_advance_the_cursor() {
        let a = gen_text_quads("?1", 0.0, 0.0, 1.0, (100, 100), FPS_GOOD);
        let b = gen_text_quads(" 1", 0.0, 0.0, 1.0, (100, 100), FPS_GOOD);
        assert_eq!(a, b);
    }
}
