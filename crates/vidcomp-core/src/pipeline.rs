//! Stage vocabulary shared by the shader generator, the stage graph and the compositor.

/// Kind of processing stage.
///
/// The declaration order is the pipeline order: an ordered map keyed by `FilterKind`
/// iterates convert → resize → bicubic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKind {
    /// YUV → RGB conversion, optionally fused with a deinterlacer.
    YuvToRgb,
    /// Plain scaled blit, no fragment program.
    Resize,
    /// Bicubic upscale.
    Bicubic,
}

impl FilterKind {
    pub const ALL: [FilterKind; 3] = [FilterKind::YuvToRgb, FilterKind::Resize, FilterKind::Bicubic];

    pub fn name(self) -> &'static str {
        match self {
            FilterKind::YuvToRgb => "master",
            FilterKind::Resize => "resize",
            FilterKind::Bicubic => "bicubic",
        }
    }

    /// Upstream textures the stage samples per draw (reference and helper textures excluded).
    pub fn required_inputs(self) -> usize {
        match self {
            FilterKind::YuvToRgb | FilterKind::Resize | FilterKind::Bicubic => 1,
        }
    }

    /// Whether the stage draws with a fragment program rather than a plain blit.
    pub fn uses_program(self) -> bool {
        match self {
            FilterKind::YuvToRgb | FilterKind::Bicubic => true,
            FilterKind::Resize => false,
        }
    }

    /// Whether the stage samples the bicubic weight lookup texture.
    pub fn uses_helper_texture(self) -> bool {
        matches!(self, FilterKind::Bicubic)
    }
}

/// Where a stage draws to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputTarget {
    /// The stage's own offscreen framebuffer, consumed by the next stage.
    Intermediate,
    /// The default (on-screen) framebuffer.
    Display,
}

/// Scan mode of the frame being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanType {
    #[default]
    Progressive,
    /// Interlaced, showing the first field.
    Interlaced,
    /// Interlaced, showing the second field.
    SecondField,
}

impl ScanType {
    pub fn is_interlaced(self) -> bool {
        !matches!(self, ScanType::Progressive)
    }
}
