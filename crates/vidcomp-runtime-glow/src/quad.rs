//! The textured quad every draw goes through.

use glow::HasContext;
use vidcomp_core::{RectF, Size, TextureTarget, VideoError};

/// Floats per vertex: position then texture coordinate.
const VERTEX_FLOATS: usize = 4;
const VERTICES: usize = 4;

pub const QUAD_VERT: &str = r#"#version 330 core
layout (location = 0) in vec2 a_pos;
layout (location = 1) in vec2 a_uv;
out vec2 v_uv;
void main() {
    v_uv = a_uv;
    gl_Position = vec4(a_pos, 0.0, 1.0);
}
"#;

/// Maps a texel rectangle to sampler coordinates: normalised for 2D textures,
/// unchanged for rectangle textures. Returns `[left, top, right, bottom]`.
pub fn texture_coords(source: RectF, storage: Size, target: TextureTarget) -> [f32; 4] {
    match target {
        TextureTarget::Rectangle => [source.left, source.top, source.right, source.bottom],
        TextureTarget::Texture2D => {
            let w = storage.width.max(1) as f32;
            let h = storage.height.max(1) as f32;
            [source.left / w, source.top / h, source.right / w, source.bottom / h]
        }
    }
}

/// Triangle strip for `dest` in a viewport with `y` growing downwards.
pub fn quad_vertices(dest: RectF, viewport: Size, uv: [f32; 4]) -> [f32; VERTEX_FLOATS * VERTICES] {
    let w = viewport.width.max(1) as f32;
    let h = viewport.height.max(1) as f32;
    let x = |v: f32| v / w * 2.0 - 1.0;
    let y = |v: f32| 1.0 - v / h * 2.0;
    let [u0, v0, u1, v1] = uv;
    [
        x(dest.left), y(dest.top), u0, v0,
        x(dest.right), y(dest.top), u1, v0,
        x(dest.left), y(dest.bottom), u0, v1,
        x(dest.right), y(dest.bottom), u1, v1,
    ]
}

/// Dynamic vertex buffer holding one quad.
#[derive(Debug)]
pub struct Quad {
    vao: glow::NativeVertexArray,
    vbo: glow::NativeBuffer,
}

impl Quad {
    pub unsafe fn new(gl: &glow::Context) -> Result<Self, VideoError> {
        let vao = gl
            .create_vertex_array()
            .map_err(|e| VideoError::alloc(format!("create_vertex_array: {e}")))?;
        let vbo = match gl.create_buffer() {
            Ok(vbo) => vbo,
            Err(e) => {
                gl.delete_vertex_array(vao);
                return Err(VideoError::alloc(format!("create_buffer: {e}")));
            }
        };

        gl.bind_vertex_array(Some(vao));
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
        let bytes = (VERTEX_FLOATS * VERTICES * std::mem::size_of::<f32>()) as i32;
        gl.buffer_data_size(glow::ARRAY_BUFFER, bytes, glow::DYNAMIC_DRAW);

        let stride = (VERTEX_FLOATS * std::mem::size_of::<f32>()) as i32;
        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, stride, 0);
        gl.enable_vertex_attrib_array(1);
        gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, stride, 2 * 4);

        gl.bind_buffer(glow::ARRAY_BUFFER, None);
        gl.bind_vertex_array(None);
        Ok(Self { vao, vbo })
    }

    pub unsafe fn draw(&self, gl: &glow::Context, vertices: &[f32; VERTEX_FLOATS * VERTICES]) {
        gl.bind_vertex_array(Some(self.vao));
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
        gl.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, 0, bytemuck::cast_slice(vertices));
        gl.draw_arrays(glow::TRIANGLE_STRIP, 0, VERTICES as i32);
        gl.bind_buffer(glow::ARRAY_BUFFER, None);
        gl.bind_vertex_array(None);
    }

    pub unsafe fn destroy(&mut self, gl: &glow::Context) {
        gl.delete_vertex_array(self.vao);
        gl.delete_buffer(self.vbo);
    }
}
