#![forbid(unsafe_code)]

//! Shared vocabulary for the vidcomp video compositor.
//!
//! Nothing in here issues GPU calls. Backends implement [`RenderContext`];
//! the rest of the workspace only ever talks to the GPU through that trait.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod colourspace;
pub mod config;
pub mod context;
pub mod error;
pub mod features;
pub mod geometry;
pub mod pipeline;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use colourspace::{
    ColourMatrix, ColourSpace, PictureAttribute, PictureAttributes, SharedColourSpace,
};
pub use config::{LetterboxColour, RenderOptions, SettingsSource, VideoOutputConfig};
pub use context::{
    lock_context, shared_context, ContextGuard, DrawCall, FramebufferId, ProgramId, RenderContext,
    SharedContext, TextureDesc, TextureFilter, TextureFormat, TextureId, TextureTarget,
};
pub use error::VideoError;
pub use features::{negotiate, Features};
pub use geometry::{Rect, RectF, Size, VideoGeometry};
pub use pipeline::{FilterKind, OutputTarget, ScanType};
