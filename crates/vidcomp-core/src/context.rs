//! The graphics context contract.
//!
//! The compositor never talks to OpenGL directly. Everything it needs from the GPU goes
//! through [`RenderContext`], which a backend (e.g. `vidcomp-runtime-glow`) implements.
//! Handles are plain ids handed out by the backend; the compositor owns them and is
//! responsible for deleting them.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::colourspace::ColourMatrix;
use crate::{Features, Rect, RectF, Size, VideoError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// Texture binding target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureTarget {
    /// Normalised coordinates, power-of-two storage.
    #[default]
    Texture2D,
    /// Pixel coordinates, exact storage.
    Rectangle,
}

/// Storage layout of a texture and of its CPU-side upload buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// Four bytes per pixel. Holds either RGBA or packed Y/U/V/A for shader conversion.
    #[default]
    Rgba8,
    /// Packed 4:2:2 (UYVY), converted to RGB by the driver.
    YCbCr422,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TextureFormat::Rgba8 => 4,
            TextureFormat::YCbCr422 => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFilter {
    #[default]
    Linear,
    Nearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    /// Allocated storage size (already rounded by the caller's size policy).
    pub size: Size,
    pub target: TextureTarget,
    pub format: TextureFormat,
    pub filter: TextureFilter,
    /// Back the upload buffer with a pixel buffer object.
    pub pixel_buffer: bool,
}

/// One textured quad.
///
/// `source` is in texels of the first texture; the backend normalises it for
/// [`TextureTarget::Texture2D`]. `dest` is in viewport pixels and may be flipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall<'a> {
    pub textures: &'a [TextureId],
    pub target: Option<FramebufferId>,
    pub program: Option<ProgramId>,
    pub source: RectF,
    pub dest: RectF,
}

/// Capabilities the compositor consumes from a graphics context.
///
/// Every call must happen while the context is current; use [`lock_context`].
pub trait RenderContext {
    /// Features reported by the driver.
    fn features(&self) -> Features;

    fn make_current(&mut self) {}
    fn done_current(&mut self) {}

    /// Restricts the context to the negotiated feature set.
    fn set_features(&mut self, _features: Features) {}
    fn set_fence(&mut self) {}

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, VideoError>;
    fn delete_texture(&mut self, tex: TextureId);
    fn set_texture_filter(&mut self, tex: TextureId, filter: TextureFilter);

    /// Creates the bicubic lookup texture from one `[h0, h1, g0, 0]` entry per texel.
    fn create_helper_texture(&mut self, weights: &[[f32; 4]]) -> Result<TextureId, VideoError>;

    /// Creates a framebuffer with `tex` as its colour attachment.
    fn create_framebuffer(&mut self, tex: TextureId) -> Result<FramebufferId, VideoError>;
    fn delete_framebuffer(&mut self, fb: FramebufferId);

    fn create_fragment_program(&mut self, source: &str) -> Result<ProgramId, VideoError>;
    fn delete_fragment_program(&mut self, program: ProgramId);

    /// `None` binds the default framebuffer.
    fn bind_framebuffer(&mut self, fb: Option<FramebufferId>);
    fn set_viewport(&mut self, size: Size);
    fn set_background(&mut self, rgba: [u8; 4]);
    fn clear_framebuffer(&mut self);

    /// Filled rectangle in viewport pixels. Drawn under the video it shows as a border.
    fn draw_rect(&mut self, rect: Rect, colour: [u8; 4]);

    fn set_fragment_params(&mut self, program: ProgramId, matrix: &ColourMatrix);
    fn draw_bitmap(&mut self, call: &DrawCall<'_>);

    /// CPU-side upload buffer of a texture, sized `width * height * bytes_per_pixel`
    /// of the allocated storage.
    fn texture_buffer(&mut self, tex: TextureId) -> Option<&mut [u8]>;
    /// Pushes the upload buffer to the GPU texture.
    fn update_texture(&mut self, tex: TextureId);
}

/// A context shared by every compositor instance drawing into it.
pub type SharedContext<C> = Arc<Mutex<C>>;

pub fn shared_context<C: RenderContext>(ctx: C) -> SharedContext<C> {
    Arc::new(Mutex::new(ctx))
}

/// Exclusive, current access to a context. Released (and made non-current) on drop.
pub struct ContextGuard<'a, C: RenderContext> {
    guard: MutexGuard<'a, C>,
}

impl<C: RenderContext> std::fmt::Debug for ContextGuard<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextGuard").finish_non_exhaustive()
    }
}

/// Locks the context and makes it current for the lifetime of the guard.
pub fn lock_context<C: RenderContext>(shared: &SharedContext<C>) -> ContextGuard<'_, C> {
    let mut guard = shared.lock();
    guard.make_current();
    ContextGuard { guard }
}

impl<C: RenderContext> Deref for ContextGuard<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.guard
    }
}

impl<C: RenderContext> DerefMut for ContextGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.guard
    }
}

impl<C: RenderContext> Drop for ContextGuard<'_, C> {
    fn drop(&mut self) {
        self.guard.done_current();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{GlCall, RecordingContext};

    #[test]
    fn guard_makes_current_and_releases_on_every_path() {
        let shared = shared_context(RecordingContext::new(Features::all()));

        fn early_return(shared: &SharedContext<RecordingContext>) -> Result<(), VideoError> {
            let mut ctx = lock_context(shared);
            ctx.set_viewport(Size::new(1, 1));
            Err(VideoError::other("bail"))
        }
        assert!(early_return(&shared).is_err());

        // The mutex must be free again.
        let ctx = shared.try_lock().expect("context lock released");
        assert_eq!(
            ctx.calls(),
            &[
                GlCall::MakeCurrent,
                GlCall::SetViewport(Size::new(1, 1)),
                GlCall::DoneCurrent
            ]
        );
    }
}
