//! Capability negotiation.
//!
//! A session's feature set is the AND of what the user left enabled through the option
//! string and what the context reports. It is computed once in
//! `VideoCompositor::new` and never changes afterwards.

use bitflags::bitflags;

bitflags! {
    /// Hardware/driver features the pipeline can make use of.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Features: u32 {
        /// Programmable fragment stage (colour conversion, deinterlacing, bicubic).
        const FRAGMENT_PROGRAM   = 1 << 0;
        /// Offscreen framebuffer objects (intermediate stages).
        const FRAMEBUFFER_OBJECT = 1 << 1;
        /// Pixel buffer objects for faster texture uploads.
        const PIXEL_BUFFER       = 1 << 2;
        /// Non power-of-two rectangle textures.
        const RECT_TEXTURE       = 1 << 3;
        /// Packed 4:2:2 YCbCr texture format with driver-side conversion.
        const YCBCR_TEXTURE      = 1 << 4;
        /// Fence sync objects.
        const FENCE              = 1 << 5;
    }
}

/// Option keys whose value list carries disable flags.
const OPTION_KEYS: [&str; 2] = ["options", "opengloptions"];

/// Maps a single disable flag to the feature it clears.
fn disable_flag(flag: &str) -> Option<Features> {
    match flag {
        "no-pixel-buffers" | "nopbo" => Some(Features::PIXEL_BUFFER),
        "no-framebuffers" | "nofbo" => Some(Features::FRAMEBUFFER_OBJECT),
        "no-fragment-programs" | "nofrag" => Some(Features::FRAGMENT_PROGRAM),
        "no-rect-textures" | "norect" => Some(Features::RECT_TEXTURE),
        "no-ycbcr" | "noycbcr" => Some(Features::YCBCR_TEXTURE),
        "no-fence" | "nofence" => Some(Features::FENCE),
        _ => None,
    }
}

/// Splits a comma separated `key=value` list into `(key, values)` groups.
///
/// A token without `=` continues the value list of the key before it, so
/// `opengloptions=nopbo,nofbo` yields one group with two values. Keys are lower-cased.
pub fn option_groups(options: &str) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for token in options.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match token.split_once('=') {
            Some((key, value)) => {
                let mut values = Vec::new();
                let value = value.trim().to_ascii_lowercase();
                if !value.is_empty() {
                    values.push(value);
                }
                groups.push((key.trim().to_ascii_lowercase(), values));
            }
            None => match groups.last_mut() {
                Some((_, values)) => values.push(token.to_ascii_lowercase()),
                None => groups.push((token.to_ascii_lowercase(), Vec::new())),
            },
        }
    }
    groups
}

/// Features left enabled by the option string (before looking at the hardware).
pub fn parse_enabled(options: &str) -> Features {
    let mut enabled = Features::all();
    for (key, values) in option_groups(options) {
        if !OPTION_KEYS.contains(&key.as_str()) {
            continue;
        }
        for v in &values {
            if let Some(f) = disable_flag(v) {
                enabled.remove(f);
            }
        }
    }
    enabled
}

/// Negotiates the session feature set. Never fails; the result may be empty.
pub fn negotiate(options: &str, hardware: Features) -> Features {
    parse_enabled(options) & hardware
}

impl Features {
    /// Fragment programs and framebuffer objects together: everything the shader pipeline needs.
    pub fn full_shader_pipeline(self) -> bool {
        self.contains(Features::FRAGMENT_PROGRAM | Features::FRAMEBUFFER_OBJECT)
    }
}
