//! Bicubic upscaling with four bilinear taps.
//!
//! A B-spline cubic over 4x4 texels can be evaluated as four bilinear fetches
//! whose positions and blend weight depend only on the fractional texel position.
//! Those three numbers are tabulated in a one-row helper texture.

/// Entries in the helper texture.
pub const HELPER_WIDTH: usize = 256;

/// Lookup table for [`HELPER_WIDTH`] (or any other) fractional positions.
///
/// Each entry is `[h0, h1, g0, 0]`: the distance of the left and right bilinear
/// taps from the sample point (in texels) and the weight of the left pair.
pub fn bicubic_weights(n: usize) -> Vec<[f32; 4]> {
    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            let x2 = x * x;
            let x3 = x2 * x;
            let w0 = (-x3 + 3.0 * x2 - 3.0 * x + 1.0) / 6.0;
            let w1 = (3.0 * x3 - 6.0 * x2 + 4.0) / 6.0;
            let w2 = (-3.0 * x3 + 3.0 * x2 + 3.0 * x + 1.0) / 6.0;
            let w3 = x3 / 6.0;
            let g0 = w0 + w1;
            let g1 = w2 + w3;
            let h0 = 1.0 - w1 / g0 + x;
            let h1 = 1.0 + w3 / g1 - x;
            [h0, h1, g0, 0.0]
        })
        .collect()
}

pub(crate) const BICUBIC: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_colour;

uniform ${SAMPLER} s_texture0;
uniform sampler2D s_texture1;

void main() {
    vec2 coord = v_uv * vec2(${FB_WIDTH}, ${FB_HEIGHT}) + vec2(0.5);
    vec4 wx = texture(s_texture1, vec2(fract(coord.x), 0.5));
    vec4 wy = texture(s_texture1, vec2(fract(coord.y), 0.5));

    vec2 lo = v_uv - vec2(wx.r * ${COL_WIDTH}, wy.r * ${LINE_HEIGHT});
    vec2 hi = v_uv + vec2(wx.g * ${COL_WIDTH}, wy.g * ${LINE_HEIGHT});

    vec4 left = mix(texture(s_texture0, vec2(lo.x, hi.y)), texture(s_texture0, lo), wy.b);
    vec4 right = mix(texture(s_texture0, hi), texture(s_texture0, vec2(hi.x, lo.y)), wy.b);
    frag_colour = mix(right, left, wx.b);
}
"#;
