use vidcomp_core::Size;

/// What the resize check found out about the current geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResizeInputs {
    /// The display rectangle is larger than the video in some dimension.
    pub upscale: bool,
    /// The display rectangle is shorter than the video.
    pub downscale: bool,
    /// A shader deinterlacer that needs the video's own line grid is active.
    pub deinterlacing: bool,
    /// Bicubic is the configured upscaler.
    pub bicubic: bool,
}

impl ResizeInputs {
    /// `allow` is false while a software deinterlacer owns the line structure.
    pub fn from_sizes(video: Size, display: Size, deinterlacing: bool, allow: bool, bicubic: bool) -> Self {
        Self {
            upscale: allow && (video.height < display.height || video.width < display.width),
            downscale: allow && video.height > display.height,
            deinterlacing,
            bicubic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizePlan {
    /// Bicubic stage, no plain resize.
    Bicubic,
    /// Plain resize stage, no bicubic.
    Resize,
    /// Neither; the last stage scales while drawing to the display.
    Direct,
}

/// Upscaling is checked before deinterlace-driven downscaling.
pub fn resize_decision(inputs: &ResizeInputs) -> ResizePlan {
    if inputs.upscale {
        if inputs.bicubic {
            ResizePlan::Bicubic
        } else {
            ResizePlan::Resize
        }
    } else if inputs.downscale && inputs.deinterlacing {
        ResizePlan::Resize
    } else {
        ResizePlan::Direct
    }
}
