use vidcomp_buffers::InputTextureMode;
use vidcomp_core::{Features, FilterKind, RenderOptions, TextureTarget, VideoGeometry, VideoOutputConfig};

/// Everything a compositor needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompositorSetup {
    pub geometry: VideoGeometry,
    pub config: VideoOutputConfig,
}

/// How frames enter the pipeline, derived once from the negotiated features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPlan {
    pub mode: InputTextureMode,
    pub target: TextureTarget,
    pub use_pbo: bool,
    pub bicubic: bool,
    /// First stage to try; `None` goes straight to software conversion.
    pub primary: Option<FilterKind>,
}

pub fn plan_inputs(features: Features, options: &RenderOptions, hardware_decoded: bool) -> InputPlan {
    let full = features.full_shader_pipeline();
    let ycbcr = !hardware_decoded && !full && features.contains(Features::YCBCR_TEXTURE);

    let bicubic = options.bicubic_upscale && full;
    if options.bicubic_upscale && !full {
        tracing::warn!("no feature support for the bicubic filter");
    }

    let target = if !hardware_decoded && !bicubic && features.contains(Features::RECT_TEXTURE) {
        TextureTarget::Rectangle
    } else {
        TextureTarget::Texture2D
    };

    let (mode, primary) = if hardware_decoded {
        (InputTextureMode::Hardware, Some(FilterKind::Resize))
    } else if ycbcr {
        (InputTextureMode::PackedYCbCr, Some(FilterKind::Resize))
    } else if features.contains(Features::FRAGMENT_PROGRAM) {
        (InputTextureMode::ShaderYuv, Some(FilterKind::YuvToRgb))
    } else {
        (InputTextureMode::ShaderYuv, None)
    };

    InputPlan {
        mode,
        target,
        use_pbo: !hardware_decoded && features.contains(Features::PIXEL_BUFFER),
        bicubic,
        primary,
    }
}
