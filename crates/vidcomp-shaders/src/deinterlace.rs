//! Shader deinterlacers.
//!
//! Every deinterlacer is fused into the YUV → RGB program and comes as a pair of
//! bodies, one per field. Texture units: `s_texture0` is the frame just uploaded,
//! `s_texture1` and `s_texture2` are the previous two frames from the reference ring.
//! The algorithms with reference frames output the frame in `s_texture1`, one frame
//! behind the upload.

/// Which field of an interlaced frame is being reconstructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    First,
    Second,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Deinterlacer {
    /// Line doubling inside the current frame.
    Bob,
    /// Missing lines are the average of their neighbours.
    LinearBlend,
    /// Five-tap vertical kernel mixing the current and one neighbouring frame.
    Kernel,
    /// Motion-adaptive, edge-directed interpolation.
    Yadif,
}

impl Deinterlacer {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "openglbobdeint" | "openglonefield" | "opengldoubleratefieldorder" => {
                Some(Deinterlacer::Bob)
            }
            "opengllinearblend" | "opengldoubleratelinearblend" => Some(Deinterlacer::LinearBlend),
            "openglkerneldeint" | "opengldoubleratekerneldeint" => Some(Deinterlacer::Kernel),
            "openglyadif" | "opengldoublerateyadif" => Some(Deinterlacer::Yadif),
            _ => None,
        }
    }

    /// Frames the reference ring must hold besides the input texture.
    pub fn reference_frames(self) -> usize {
        match self {
            Deinterlacer::Bob => 0,
            Deinterlacer::LinearBlend | Deinterlacer::Kernel | Deinterlacer::Yadif => 2,
        }
    }

    /// Whether the body reads the plain `res` sample of texture 0.
    pub(crate) fn needs_base_sample(self, field: Field) -> bool {
        match (self, field) {
            (Deinterlacer::Bob, _) => true,
            (Deinterlacer::Kernel, Field::Second) => true,
            _ => false,
        }
    }

    pub(crate) fn body(self, field: Field) -> String {
        match (self, field) {
            (Deinterlacer::Bob, Field::First) => BOB_FIRST.to_owned(),
            (Deinterlacer::Bob, Field::Second) => BOB_SECOND.to_owned(),
            (Deinterlacer::LinearBlend, Field::First) => {
                format!("{LINEARBLEND}{KEEP_FIRST_FIELD}")
            }
            (Deinterlacer::LinearBlend, Field::Second) => {
                format!("{LINEARBLEND}{KEEP_SECOND_FIELD}")
            }
            (Deinterlacer::Kernel, Field::First) => format!(
                "{}{KEEP_FIRST_FIELD}",
                KERNEL.replace("NEIGHBOUR", "texture(s_texture2, v_uv)").replace("FAR", "s_texture2")
            ),
            (Deinterlacer::Kernel, Field::Second) => format!(
                "{}{KEEP_SECOND_FIELD}",
                KERNEL.replace("NEIGHBOUR", "res").replace("FAR", "s_texture0")
            ),
            (Deinterlacer::Yadif, Field::First) => {
                format!("{YADIF_FIRST}{YADIF}{YADIF_KEEP_FIRST}")
            }
            (Deinterlacer::Yadif, Field::Second) => {
                format!("{YADIF_SECOND}{YADIF}{YADIF_KEEP_SECOND}")
            }
        }
    }
}

/// Declarations shared by all deinterlacer bodies, placed before `main`.
pub(crate) const DECLARATIONS: &str = r#"uniform ${SAMPLER} s_texture1;
uniform ${SAMPLER} s_texture2;

const vec2 LINE = vec2(0.0, ${LINE_HEIGHT});
const vec2 LINE2 = vec2(0.0, ${LINE_HEIGHT_2});
const vec2 COL = vec2(${COL_WIDTH}, 0.0);

// Negative on lines of the first field, positive on the second.
float field_phase(vec2 tc) {
    return fract(tc.y * ${FIELD_SIZE}) - 0.5;
}

"#;

const BOB_FIRST: &str = r#"    vec4 other = texture(s_texture0, v_uv + LINE);
    res = field_phase(v_uv) < 0.0 ? res : other;
"#;

const BOB_SECOND: &str = r#"    vec4 other = texture(s_texture0, v_uv - LINE);
    res = field_phase(v_uv) < 0.0 ? other : res;
"#;

const LINEARBLEND: &str = r#"    vec4 current = texture(s_texture1, v_uv);
    vec4 other = mix(texture(s_texture1, v_uv + LINE), texture(s_texture1, v_uv - LINE), 0.5);
"#;

// NEIGHBOUR is the co-sited sample of the other frame, FAR its sampler.
const KERNEL: &str = r#"    vec4 current = texture(s_texture1, v_uv);
    vec4 other = 0.125 * NEIGHBOUR + 0.125 * current
        + 0.5 * (texture(s_texture1, v_uv + LINE) + texture(s_texture1, v_uv - LINE))
        - 0.0625 * (texture(s_texture1, v_uv + LINE2) + texture(FAR, v_uv + LINE2)
                  + texture(s_texture1, v_uv - LINE2) + texture(FAR, v_uv - LINE2));
"#;

const KEEP_FIRST_FIELD: &str = "    res = field_phase(v_uv) < 0.0 ? current : other;\n";
const KEEP_SECOND_FIELD: &str = "    res = field_phase(v_uv) < 0.0 ? other : current;\n";

const YADIF_FIRST: &str = "#define PREV2 s_texture2\n#define NEXT2 s_texture1\n";
const YADIF_SECOND: &str = "#define PREV2 s_texture1\n#define NEXT2 s_texture0\n";

const YADIF: &str = r#"    vec4 current = texture(s_texture1, v_uv);
    vec4 up = texture(s_texture1, v_uv + LINE);
    vec4 down = texture(s_texture1, v_uv - LINE);

    // Temporal prediction and how far it may be trusted.
    vec4 prev2 = texture(PREV2, v_uv);
    vec4 next2 = texture(NEXT2, v_uv);
    vec4 temporal = mix(prev2, next2, 0.5);
    vec4 diff0 = abs(prev2 - next2);
    vec4 diff1 = mix(abs(texture(s_texture2, v_uv + LINE) - up),
                     abs(texture(s_texture2, v_uv - LINE) - down), 0.5);
    vec4 diff2 = mix(abs(texture(s_texture0, v_uv + LINE) - up),
                     abs(texture(s_texture0, v_uv - LINE) - down), 0.5);
    vec4 diff = max(max(diff0, diff1), diff2);

    vec4 up2 = mix(texture(PREV2, v_uv + LINE2), texture(NEXT2, v_uv + LINE2), 0.5);
    vec4 down2 = mix(texture(PREV2, v_uv - LINE2), texture(NEXT2, v_uv - LINE2), 0.5);
    vec4 dmax = max(max(temporal - down, temporal - up), min(up2 - up, down2 - down));
    vec4 dmin = min(min(temporal - down, temporal - up), max(up2 - up, down2 - down));
    diff = max(max(diff, dmin), -dmax);

    // Edge-directed spatial prediction over a 7 pixel window.
    vec4 above[7];
    vec4 below[7];
    for (int i = 0; i < 7; i++) {
        vec2 dx = COL * float(i - 3);
        above[i] = texture(s_texture1, v_uv + LINE + dx);
        below[i] = texture(s_texture1, v_uv - LINE + dx);
    }
    vec4 spatial = mix(above[3], below[3], 0.5);
    vec4 best = abs(above[2] - below[2]) + abs(above[3] - below[3])
              + abs(above[4] - below[4]) - 1.0;
    for (int dir = -1; dir <= 1; dir += 2) {
        vec4 open = vec4(1.0);
        for (int j = 1; j <= 2; j++) {
            int o = dir * j;
            vec4 score = abs(above[2 + o] - below[2 - o]) + abs(above[3 + o] - below[3 - o])
                       + abs(above[4 + o] - below[4 - o]);
            vec4 take = open * vec4(lessThan(score, best));
            best = mix(best, score, take);
            spatial = mix(spatial, mix(above[3 + o], below[3 - o], 0.5), take);
            open = take;
        }
    }
    spatial = clamp(spatial, temporal - diff, temporal + diff);
"#;

const YADIF_KEEP_FIRST: &str = "    res = field_phase(v_uv) < 0.0 ? current : spatial;\n";
const YADIF_KEEP_SECOND: &str = "    res = field_phase(v_uv) < 0.0 ? spatial : current;\n";
