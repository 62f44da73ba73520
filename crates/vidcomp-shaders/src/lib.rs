#![forbid(unsafe_code)]

//! Fragment program generation.
//!
//! [`generate`] is a pure function of a [`ProgramRequest`]: the same request always
//! yields byte-identical GLSL 330 source. It never touches a context.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod bicubic;
pub mod deinterlace;
pub mod template;

pub use bicubic::{bicubic_weights, HELPER_WIDTH};
pub use deinterlace::{Deinterlacer, Field};
pub use template::{ShaderTemplate, Value};

use vidcomp_core::{FilterKind, ScanType, Size};

/// Texture sizes the generated offsets are derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureGeometry {
    /// Allocated size of the input (video) textures.
    pub input_size: Size,
    /// Allocated size of the intermediate framebuffer textures.
    pub framebuffer_size: Size,
    /// Rectangle textures address texels in pixels rather than 0..1.
    pub rect_textures: bool,
}

impl TextureGeometry {
    /// Geometry for a stage that reads the input texture instead of a framebuffer.
    pub fn sampling_input(self) -> Self {
        Self {
            framebuffer_size: self.input_size,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramRequest<'a> {
    pub kind: FilterKind,
    /// Shader deinterlacer name, e.g. `openglyadif`.
    pub deinterlacer: Option<&'a str>,
    /// Selects the field variant; `SecondField` picks the second, anything else the first.
    pub scan: ScanType,
    pub geometry: TextureGeometry,
}

const HEADER: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_colour;

uniform ${SAMPLER} s_texture0;
uniform vec4 u_yuv[3];

"#;

const BASE_SAMPLE: &str = "void main() {\n    vec4 res = texture(s_texture0, v_uv);\n";
const NO_BASE_SAMPLE: &str = "void main() {\n    vec4 res;\n";

// Input texels hold (Y, U, V, A).
const TAIL: &str = r#"    vec4 yuv = vec4(res.rgb, 1.0);
    frag_colour = vec4(dot(yuv, u_yuv[0]), dot(yuv, u_yuv[1]), dot(yuv, u_yuv[2]), res.a);
}
"#;

fn placeholders(kind: FilterKind, geo: &TextureGeometry) -> ShaderTemplate {
    // Offsets are measured against the texture the stage samples.
    let sampled = match kind {
        FilterKind::Bicubic => geo.framebuffer_size,
        FilterKind::YuvToRgb | FilterKind::Resize => geo.input_size,
    };
    let (line_height, col_width, fb_scale) = if geo.rect_textures || sampled.is_empty() {
        (1.0, 1.0, None)
    } else {
        (
            1.0 / sampled.height as f32,
            1.0 / sampled.width as f32,
            Some(geo.framebuffer_size),
        )
    };
    let (fb_width, fb_height) = match fb_scale {
        Some(s) => (s.width as f32, s.height as f32),
        // Rectangle coordinates are already in texels.
        None => (1.0, 1.0),
    };
    let sampler = if geo.rect_textures {
        "sampler2DRect"
    } else {
        "sampler2D"
    };

    ShaderTemplate::new()
        .text("SAMPLER", sampler)
        .float("FIELD_SIZE", 1.0 / (line_height * 2.0), 8)
        .float("LINE_HEIGHT", line_height, 8)
        .float("LINE_HEIGHT_2", line_height * 2.0, 8)
        .float("COL_WIDTH", col_width, 8)
        .float("FB_WIDTH", fb_width, 1)
        .float("FB_HEIGHT", fb_height, 1)
}

fn yuv_program(deinterlacer: Option<&str>, scan: ScanType) -> String {
    let field = if scan == ScanType::SecondField {
        Field::Second
    } else {
        Field::First
    };
    let deint = match deinterlacer.filter(|d| !d.is_empty()) {
        None => None,
        Some(name) => match Deinterlacer::from_name(name) {
            Some(d) => Some(d),
            None => {
                tracing::warn!(deinterlacer = name, "unrecognised shader deinterlacer");
                None
            }
        },
    };

    let mut src = String::from(HEADER);
    if let Some(d) = deint {
        src.push_str(deinterlace::DECLARATIONS);
        src.push_str(if d.needs_base_sample(field) {
            BASE_SAMPLE
        } else {
            NO_BASE_SAMPLE
        });
        src.push_str(&d.body(field));
    } else {
        src.push_str(BASE_SAMPLE);
    }
    src.push_str(TAIL);
    src
}

/// Builds the fragment program for a stage, or `None` for stages drawn without one.
pub fn generate(req: &ProgramRequest<'_>) -> Option<String> {
    let template = match req.kind {
        FilterKind::Resize => return None,
        FilterKind::YuvToRgb => yuv_program(req.deinterlacer, req.scan),
        FilterKind::Bicubic => bicubic::BICUBIC.to_owned(),
    };
    let program = placeholders(req.kind, &req.geometry).render(&template);

    tracing::trace!(target: "vidcomp::shaders", "\n{program}");
    tracing::debug!(
        kind = req.kind.name(),
        deinterlacer = req.deinterlacer.unwrap_or(""),
        "generated fragment program"
    );
    Some(program)
}
