//! vidcomp OpenGL backend (glow)
//
// Implements `RenderContext` on top of a current glow context: textures with optional
// pixel buffer uploads, framebuffers, fragment programs and one textured quad.
// Window and context creation stay with the host.
#![allow(clippy::missing_safety_doc)]

mod caps;
mod quad;

use std::collections::HashMap;

use glow::HasContext;
use vidcomp_core::{
    ColourMatrix, DrawCall, Features, FramebufferId, ProgramId, Rect, RectF, RenderContext, Size,
    TextureDesc, TextureFilter, TextureFormat, TextureId, TextureTarget, VideoError,
};

pub use caps::detect_features;
pub use quad::{quad_vertices, texture_coords};

use quad::{Quad, QUAD_VERT};

// GL_MESA_ycbcr_texture
const YCBCR_MESA: u32 = 0x8757;
const UNSIGNED_SHORT_8_8_MESA: u32 = 0x85BA;

/// Highest sampler unit a generated program reads (`s_texture0..3`).
const SAMPLER_UNITS: u32 = 4;

const BLIT_2D_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_colour;
uniform sampler2D s_texture0;
void main() {
    frag_colour = texture(s_texture0, v_uv);
}
"#;

const BLIT_RECT_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_colour;
uniform sampler2DRect s_texture0;
void main() {
    frag_colour = texture(s_texture0, v_uv);
}
"#;

const SOLID_FRAG: &str = r#"#version 330 core
out vec4 frag_colour;
uniform vec4 u_colour;
void main() {
    frag_colour = u_colour;
}
"#;

pub unsafe fn compile_program(
    gl: &glow::Context,
    vert_src: &str,
    frag_src: &str,
) -> Result<glow::NativeProgram, VideoError> {
    let vs = gl
        .create_shader(glow::VERTEX_SHADER)
        .map_err(|e| VideoError::alloc(format!("create_shader(VS) failed: {e:?}")))?;
    gl.shader_source(vs, vert_src);
    gl.compile_shader(vs);
    if !gl.get_shader_compile_status(vs) {
        let log = gl.get_shader_info_log(vs);
        gl.delete_shader(vs);
        return Err(VideoError::VertexCompile(log));
    }

    let fs = match gl.create_shader(glow::FRAGMENT_SHADER) {
        Ok(fs) => fs,
        Err(e) => {
            gl.delete_shader(vs);
            return Err(VideoError::alloc(format!("create_shader(FS) failed: {e:?}")));
        }
    };
    gl.shader_source(fs, frag_src);
    gl.compile_shader(fs);
    if !gl.get_shader_compile_status(fs) {
        let log = gl.get_shader_info_log(fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);
        return Err(VideoError::FragmentCompile(log));
    }

    let program = match gl.create_program() {
        Ok(p) => p,
        Err(e) => {
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            return Err(VideoError::alloc(format!("create_program failed: {e:?}")));
        }
    };
    gl.attach_shader(program, vs);
    gl.attach_shader(program, fs);
    gl.link_program(program);

    gl.detach_shader(program, vs);
    gl.detach_shader(program, fs);
    gl.delete_shader(vs);
    gl.delete_shader(fs);

    if !gl.get_program_link_status(program) {
        let log = gl.get_program_info_log(program);
        gl.delete_program(program);
        return Err(VideoError::Link(log));
    }

    // Samplers are bound to fixed units: s_textureN reads unit N.
    gl.use_program(Some(program));
    for unit in 0..SAMPLER_UNITS {
        let name = format!("s_texture{unit}");
        if let Some(loc) = gl.get_uniform_location(program, &name) {
            gl.uniform_1_i32(Some(&loc), unit as i32);
        }
    }
    gl.use_program(None);

    Ok(program)
}

fn gl_target(target: TextureTarget) -> u32 {
    match target {
        TextureTarget::Texture2D => glow::TEXTURE_2D,
        TextureTarget::Rectangle => glow::TEXTURE_RECTANGLE,
    }
}

fn gl_filter(filter: TextureFilter) -> i32 {
    match filter {
        TextureFilter::Linear => glow::LINEAR as i32,
        TextureFilter::Nearest => glow::NEAREST as i32,
    }
}

/// `(internal format, format, type)` for a storage layout.
fn gl_format(format: TextureFormat) -> (i32, u32, u32) {
    match format {
        TextureFormat::Rgba8 => (glow::RGBA8 as i32, glow::RGBA, glow::UNSIGNED_BYTE),
        TextureFormat::YCbCr422 => (YCBCR_MESA as i32, YCBCR_MESA, UNSIGNED_SHORT_8_8_MESA),
    }
}

fn rgba_f32(rgba: [u8; 4]) -> [f32; 4] {
    rgba.map(|c| c as f32 / 255.0)
}

struct TextureEntry {
    native: glow::NativeTexture,
    desc: TextureDesc,
    /// Allocated on first `texture_buffer` call.
    staging: Vec<u8>,
    pbo: Option<glow::NativeBuffer>,
}

impl TextureEntry {
    fn staging_len(&self) -> usize {
        let Size { width, height } = self.desc.size;
        width.max(0) as usize * height.max(0) as usize * self.desc.format.bytes_per_pixel()
    }
}

struct ProgramEntry {
    native: glow::NativeProgram,
    yuv: Option<glow::NativeUniformLocation>,
}

/// OpenGL implementation of [`RenderContext`].
///
/// The host keeps the underlying GL context current on the calling thread while the
/// compositor holds the lock; `make_current`/`done_current` are left to the host.
pub struct GlowContext {
    gl: glow::Context,
    hardware: Features,
    features: Features,
    next_id: u32,
    textures: HashMap<TextureId, TextureEntry>,
    framebuffers: HashMap<FramebufferId, glow::NativeFramebuffer>,
    programs: HashMap<ProgramId, ProgramEntry>,
    quad: Quad,
    blit_2d: glow::NativeProgram,
    blit_rect: Option<glow::NativeProgram>,
    solid: glow::NativeProgram,
    solid_colour: Option<glow::NativeUniformLocation>,
    viewport: Size,
    background: [u8; 4],
    fence: Option<glow::NativeFence>,
}

impl std::fmt::Debug for GlowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlowContext")
            .field("hardware", &self.hardware)
            .field("features", &self.features)
            .field("textures", &self.textures.len())
            .field("framebuffers", &self.framebuffers.len())
            .field("programs", &self.programs.len())
            .field("viewport", &self.viewport)
            .finish_non_exhaustive()
    }
}

impl GlowContext {
    /// Wraps a context that is current on this thread.
    pub unsafe fn new(gl: glow::Context) -> Result<Self, VideoError> {
        let version = gl.version();
        let hardware = detect_features(
            version.major,
            version.minor,
            version.is_embedded,
            gl.supported_extensions(),
        );
        tracing::info!(
            version = %format!("{}.{}", version.major, version.minor),
            features = ?hardware,
            "OpenGL context"
        );

        let quad = Quad::new(&gl)?;
        let blit_2d = compile_program(&gl, QUAD_VERT, BLIT_2D_FRAG)?;
        let blit_rect = if hardware.contains(Features::RECT_TEXTURE) {
            Some(compile_program(&gl, QUAD_VERT, BLIT_RECT_FRAG)?)
        } else {
            None
        };
        let solid = compile_program(&gl, QUAD_VERT, SOLID_FRAG)?;
        let solid_colour = gl.get_uniform_location(solid, "u_colour");

        Ok(Self {
            gl,
            hardware,
            features: hardware,
            next_id: 1,
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            quad,
            blit_2d,
            blit_rect,
            solid,
            solid_colour,
            viewport: Size::new(1, 1),
            background: [0, 0, 0, 255],
            fence: None,
        })
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    /// Features detected on the driver, before any restriction.
    pub fn hardware_features(&self) -> Features {
        self.hardware
    }

    /// Blocks until the commands before the last `set_fence` have completed.
    pub fn wait_fence(&mut self) {
        if let Some(fence) = self.fence.take() {
            unsafe {
                self.gl
                    .client_wait_sync(fence, glow::SYNC_FLUSH_COMMANDS_BIT, 1_000_000_000);
                self.gl.delete_sync(fence);
            }
        }
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    unsafe fn create_native_texture(
        &self,
        target: u32,
        size: Size,
        format: (i32, u32, u32),
        filter: i32,
        wrap: i32,
        pixels: Option<&[u8]>,
    ) -> Result<glow::NativeTexture, VideoError> {
        let gl = &self.gl;
        let tex = gl
            .create_texture()
            .map_err(|e| VideoError::alloc(format!("create_texture failed: {e:?}")))?;
        gl.bind_texture(target, Some(tex));
        gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, filter);
        gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, filter);
        gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, wrap);
        gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, wrap);

        let (internal, fmt, ty) = format;
        gl.tex_image_2d(
            target,
            0,
            internal,
            size.width.max(1),
            size.height.max(1),
            0,
            fmt,
            ty,
            pixels,
        );
        gl.bind_texture(target, None);

        let err = gl.get_error();
        if err != glow::NO_ERROR {
            gl.delete_texture(tex);
            return Err(VideoError::alloc(format!(
                "tex_image_2d {}x{} failed: 0x{err:x}",
                size.width, size.height
            )));
        }
        Ok(tex)
    }

    unsafe fn draw_quad(&self, program: glow::NativeProgram, dest: RectF, uv: [f32; 4]) {
        self.gl.use_program(Some(program));
        self.quad.draw(&self.gl, &quad_vertices(dest, self.viewport, uv));
        self.gl.use_program(None);
    }
}

impl RenderContext for GlowContext {
    fn features(&self) -> Features {
        self.features
    }

    fn set_features(&mut self, features: Features) {
        self.features = self.hardware & features;
    }

    fn set_fence(&mut self) {
        if !self.features.contains(Features::FENCE) {
            return;
        }
        unsafe {
            if let Some(old) = self.fence.take() {
                self.gl.delete_sync(old);
            }
            match self.gl.fence_sync(glow::SYNC_GPU_COMMANDS_COMPLETE, 0) {
                Ok(fence) => self.fence = Some(fence),
                Err(e) => tracing::warn!("fence_sync failed: {e}"),
            }
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, VideoError> {
        if desc.target == TextureTarget::Rectangle && !self.hardware.contains(Features::RECT_TEXTURE) {
            return Err(VideoError::CapabilityUnavailable {
                feature: "rectangle textures",
                purpose: "texture creation",
            });
        }
        if desc.format == TextureFormat::YCbCr422 && !self.hardware.contains(Features::YCBCR_TEXTURE) {
            return Err(VideoError::CapabilityUnavailable {
                feature: "YCbCr textures",
                purpose: "texture creation",
            });
        }

        let native = unsafe {
            self.create_native_texture(
                gl_target(desc.target),
                desc.size,
                gl_format(desc.format),
                gl_filter(desc.filter),
                glow::CLAMP_TO_EDGE as i32,
                None,
            )?
        };

        let pbo = if desc.pixel_buffer && self.features.contains(Features::PIXEL_BUFFER) {
            match unsafe { self.gl.create_buffer() } {
                Ok(buf) => Some(buf),
                Err(e) => {
                    tracing::warn!("pixel buffer unavailable, uploading directly: {e}");
                    None
                }
            }
        } else {
            None
        };

        let id = TextureId(self.alloc_id());
        self.textures.insert(
            id,
            TextureEntry {
                native,
                desc: *desc,
                staging: Vec::new(),
                pbo,
            },
        );
        tracing::debug!(?id, size = ?desc.size, target = ?desc.target, format = ?desc.format, "created texture");
        Ok(id)
    }

    fn delete_texture(&mut self, tex: TextureId) {
        if let Some(entry) = self.textures.remove(&tex) {
            unsafe {
                self.gl.delete_texture(entry.native);
                if let Some(pbo) = entry.pbo {
                    self.gl.delete_buffer(pbo);
                }
            }
        }
    }

    fn set_texture_filter(&mut self, tex: TextureId, filter: TextureFilter) {
        let Some(entry) = self.textures.get_mut(&tex) else {
            return;
        };
        entry.desc.filter = filter;
        let target = gl_target(entry.desc.target);
        unsafe {
            self.gl.bind_texture(target, Some(entry.native));
            self.gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, gl_filter(filter));
            self.gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, gl_filter(filter));
            self.gl.bind_texture(target, None);
        }
    }

    fn create_helper_texture(&mut self, weights: &[[f32; 4]]) -> Result<TextureId, VideoError> {
        let size = Size::new(weights.len() as i32, 1);
        let native = unsafe {
            self.create_native_texture(
                glow::TEXTURE_2D,
                size,
                (glow::RGBA32F as i32, glow::RGBA, glow::FLOAT),
                glow::LINEAR as i32,
                glow::REPEAT as i32,
                Some(bytemuck::cast_slice(weights)),
            )?
        };
        let id = TextureId(self.alloc_id());
        self.textures.insert(
            id,
            TextureEntry {
                native,
                desc: TextureDesc {
                    size,
                    target: TextureTarget::Texture2D,
                    format: TextureFormat::Rgba8,
                    filter: TextureFilter::Linear,
                    pixel_buffer: false,
                },
                staging: Vec::new(),
                pbo: None,
            },
        );
        Ok(id)
    }

    fn create_framebuffer(&mut self, tex: TextureId) -> Result<FramebufferId, VideoError> {
        let entry = self
            .textures
            .get(&tex)
            .ok_or_else(|| VideoError::alloc(format!("framebuffer for unknown texture {tex:?}")))?;
        let gl = &self.gl;
        let fb = unsafe {
            let fb = gl
                .create_framebuffer()
                .map_err(|e| VideoError::alloc(format!("create_framebuffer failed: {e:?}")))?;
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fb));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                gl_target(entry.desc.target),
                Some(entry.native),
                0,
            );
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.delete_framebuffer(fb);
                return Err(VideoError::alloc(format!(
                    "framebuffer incomplete (status=0x{status:x})"
                )));
            }
            fb
        };
        let id = FramebufferId(self.alloc_id());
        self.framebuffers.insert(id, fb);
        Ok(id)
    }

    fn delete_framebuffer(&mut self, fb: FramebufferId) {
        if let Some(native) = self.framebuffers.remove(&fb) {
            unsafe { self.gl.delete_framebuffer(native) };
        }
    }

    fn create_fragment_program(&mut self, source: &str) -> Result<ProgramId, VideoError> {
        let native = unsafe { compile_program(&self.gl, QUAD_VERT, source) }.map_err(|e| {
            tracing::error!(error = %e, "fragment program rejected");
            e
        })?;
        let yuv = unsafe { self.gl.get_uniform_location(native, "u_yuv") };
        let id = ProgramId(self.alloc_id());
        self.programs.insert(id, ProgramEntry { native, yuv });
        Ok(id)
    }

    fn delete_fragment_program(&mut self, program: ProgramId) {
        if let Some(entry) = self.programs.remove(&program) {
            unsafe { self.gl.delete_program(entry.native) };
        }
    }

    fn bind_framebuffer(&mut self, fb: Option<FramebufferId>) {
        let native = fb.and_then(|id| self.framebuffers.get(&id).copied());
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, native) };
    }

    fn set_viewport(&mut self, size: Size) {
        self.viewport = size;
        unsafe { self.gl.viewport(0, 0, size.width, size.height) };
    }

    fn set_background(&mut self, rgba: [u8; 4]) {
        self.background = rgba;
    }

    fn clear_framebuffer(&mut self) {
        let [r, g, b, a] = rgba_f32(self.background);
        unsafe {
            self.gl.clear_color(r, g, b, a);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    fn draw_rect(&mut self, rect: Rect, colour: [u8; 4]) {
        let dest = RectF::new(
            rect.left() as f32,
            rect.top() as f32,
            rect.right() as f32,
            rect.bottom() as f32,
        );
        let [r, g, b, a] = rgba_f32(colour);
        unsafe {
            self.gl.use_program(Some(self.solid));
            self.gl.uniform_4_f32(self.solid_colour.as_ref(), r, g, b, a);
            self.draw_quad(self.solid, dest, [0.0; 4]);
        }
    }

    fn set_fragment_params(&mut self, program: ProgramId, matrix: &ColourMatrix) {
        let Some(entry) = self.programs.get(&program) else {
            return;
        };
        let Some(loc) = entry.yuv.as_ref() else {
            return;
        };
        unsafe {
            self.gl.use_program(Some(entry.native));
            self.gl
                .uniform_4_f32_slice(Some(loc), bytemuck::cast_slice(&matrix[..]));
            self.gl.use_program(None);
        }
    }

    fn draw_bitmap(&mut self, call: &DrawCall<'_>) {
        let Some(first) = call.textures.first().and_then(|t| self.textures.get(t)) else {
            tracing::warn!("draw without a known input texture");
            return;
        };
        let uv = texture_coords(call.source, first.desc.size, first.desc.target);
        let program = match call.program.and_then(|p| self.programs.get(&p)) {
            Some(entry) => entry.native,
            None => match first.desc.target {
                TextureTarget::Texture2D => self.blit_2d,
                TextureTarget::Rectangle => match self.blit_rect {
                    Some(p) => p,
                    None => return,
                },
            },
        };

        let target = call.target.and_then(|id| self.framebuffers.get(&id).copied());
        let gl = &self.gl;
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, target);

            let mut bound = Vec::with_capacity(call.textures.len());
            for (unit, tex) in call.textures.iter().take(SAMPLER_UNITS as usize).enumerate() {
                if let Some(entry) = self.textures.get(tex) {
                    let t = gl_target(entry.desc.target);
                    gl.active_texture(glow::TEXTURE0 + unit as u32);
                    gl.bind_texture(t, Some(entry.native));
                    bound.push((unit as u32, t));
                }
            }

            self.draw_quad(program, call.dest, uv);

            for (unit, t) in bound {
                gl.active_texture(glow::TEXTURE0 + unit);
                gl.bind_texture(t, None);
            }
            gl.active_texture(glow::TEXTURE0);
        }
    }

    fn texture_buffer(&mut self, tex: TextureId) -> Option<&mut [u8]> {
        let entry = self.textures.get_mut(&tex)?;
        let len = entry.staging_len();
        if entry.staging.len() != len {
            entry.staging.resize(len, 0);
        }
        Some(entry.staging.as_mut_slice())
    }

    fn update_texture(&mut self, tex: TextureId) {
        let Some(entry) = self.textures.get(&tex) else {
            return;
        };
        if entry.staging.is_empty() {
            return;
        }
        let target = gl_target(entry.desc.target);
        let (_, fmt, ty) = gl_format(entry.desc.format);
        let Size { width, height } = entry.desc.size;
        let gl = &self.gl;
        unsafe {
            gl.bind_texture(target, Some(entry.native));
            match entry.pbo {
                Some(pbo) => {
                    gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, Some(pbo));
                    gl.buffer_data_u8_slice(glow::PIXEL_UNPACK_BUFFER, &entry.staging, glow::STREAM_DRAW);
                    gl.tex_sub_image_2d(
                        target,
                        0,
                        0,
                        0,
                        width,
                        height,
                        fmt,
                        ty,
                        glow::PixelUnpackData::BufferOffset(0),
                    );
                    gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, None);
                }
                None => {
                    gl.tex_sub_image_2d(
                        target,
                        0,
                        0,
                        0,
                        width,
                        height,
                        fmt,
                        ty,
                        glow::PixelUnpackData::Slice(&entry.staging),
                    );
                }
            }
            gl.bind_texture(target, None);
        }
    }
}

impl Drop for GlowContext {
    fn drop(&mut self) {
        if !self.textures.is_empty() || !self.programs.is_empty() || !self.framebuffers.is_empty() {
            tracing::warn!(
                textures = self.textures.len(),
                framebuffers = self.framebuffers.len(),
                programs = self.programs.len(),
                "context dropped with live objects"
            );
        }
        unsafe {
            let gl = &self.gl;
            for (_, fb) in self.framebuffers.drain() {
                gl.delete_framebuffer(fb);
            }
            for (_, entry) in self.textures.drain() {
                gl.delete_texture(entry.native);
                if let Some(pbo) = entry.pbo {
                    gl.delete_buffer(pbo);
                }
            }
            for (_, entry) in self.programs.drain() {
                gl.delete_program(entry.native);
            }
            if let Some(fence) = self.fence.take() {
                gl.delete_sync(fence);
            }
            gl.delete_program(self.blit_2d);
            if let Some(p) = self.blit_rect {
                gl.delete_program(p);
            }
            gl.delete_program(self.solid);
            self.quad.destroy(gl);
        }
    }
}
