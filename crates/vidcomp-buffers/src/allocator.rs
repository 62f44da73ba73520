use vidcomp_core::{
    Features, FramebufferId, RenderContext, Size, TextureDesc, TextureFilter, TextureFormat,
    TextureId, TextureTarget, VideoError,
};

/// Smallest edge of a power-of-two texture.
const MIN_POT_EDGE: i32 = 64;

/// How decoded frames reach the input texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputTextureMode {
    /// RGBA8 storage: packed Y/U/V/A bytes for the `YuvToRgb` program, or RGBA
    /// converted on the CPU when there is no such stage.
    #[default]
    ShaderYuv,
    /// UYVY bytes, converted by the driver.
    PackedYCbCr,
    /// RGBA frames from a hardware decoder.
    Hardware,
}

/// Creates textures and framebuffers with one size and format policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureAllocator {
    features: Features,
    mode: InputTextureMode,
    target: TextureTarget,
}

fn next_pot(n: i32) -> i32 {
    let mut edge = MIN_POT_EDGE;
    while edge < n {
        edge *= 2;
    }
    edge
}

impl TextureAllocator {
    pub fn new(features: Features, mode: InputTextureMode, target: TextureTarget) -> Self {
        Self {
            features,
            mode,
            target,
        }
    }

    pub fn features(&self) -> Features {
        self.features
    }

    pub fn mode(&self) -> InputTextureMode {
        self.mode
    }

    pub fn target(&self) -> TextureTarget {
        self.target
    }

    pub fn rect_textures(&self) -> bool {
        self.target == TextureTarget::Rectangle
    }

    /// Storage size for an image of `size`: exact for rectangle textures, otherwise
    /// each edge rounded up to a power of two of at least 64.
    pub fn texture_size(&self, size: Size) -> Size {
        if self.rect_textures() {
            size
        } else {
            Size::new(next_pot(size.width), next_pot(size.height))
        }
    }

    /// Creates a texture able to hold one decoded frame of `size`.
    /// Returns the handle and the allocated storage size.
    pub fn create_video_texture<C: RenderContext + ?Sized>(
        &self,
        ctx: &mut C,
        size: Size,
        use_pbo: bool,
    ) -> Result<(TextureId, Size), VideoError> {
        let format = match self.mode {
            InputTextureMode::PackedYCbCr => TextureFormat::YCbCr422,
            InputTextureMode::ShaderYuv | InputTextureMode::Hardware => TextureFormat::Rgba8,
        };
        let storage = self.texture_size(size);
        let desc = TextureDesc {
            size: storage,
            target: self.target,
            format,
            filter: TextureFilter::Linear,
            pixel_buffer: use_pbo && self.features.contains(Features::PIXEL_BUFFER),
        };
        let tex = ctx.create_texture(&desc)?;
        tracing::debug!(
            ?tex,
            width = storage.width,
            height = storage.height,
            ?format,
            pbo = desc.pixel_buffer,
            "created video texture"
        );
        Ok((tex, storage))
    }

    /// Creates an offscreen render target for an image of `size`.
    ///
    /// The texture is deleted again if the framebuffer cannot be created.
    pub fn create_intermediate_buffer<C: RenderContext + ?Sized>(
        &self,
        ctx: &mut C,
        size: Size,
    ) -> Result<(FramebufferId, TextureId), VideoError> {
        if !self.features.contains(Features::FRAMEBUFFER_OBJECT) {
            return Err(VideoError::CapabilityUnavailable {
                feature: "framebuffer objects",
                purpose: "intermediate buffers",
            });
        }
        let desc = TextureDesc {
            size: self.texture_size(size),
            target: self.target,
            format: TextureFormat::Rgba8,
            filter: TextureFilter::Linear,
            pixel_buffer: false,
        };
        let tex = ctx.create_texture(&desc)?;
        match ctx.create_framebuffer(tex) {
            Ok(fb) => Ok((fb, tex)),
            Err(e) => {
                ctx.delete_texture(tex);
                Err(e)
            }
        }
    }

    /// Deletes and clears a list of textures.
    pub fn destroy_textures<C: RenderContext + ?Sized>(ctx: &mut C, textures: &mut Vec<TextureId>) {
        for tex in textures.drain(..) {
            ctx.delete_texture(tex);
        }
    }

    /// Deletes and clears a list of framebuffer/texture pairs.
    pub fn destroy_buffers<C: RenderContext + ?Sized>(
        ctx: &mut C,
        buffers: &mut Vec<(FramebufferId, TextureId)>,
    ) {
        for (fb, tex) in buffers.drain(..) {
            ctx.delete_framebuffer(fb);
            ctx.delete_texture(tex);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidcomp_core::testing::RecordingContext;

    fn allocator(target: TextureTarget) -> TextureAllocator {
        TextureAllocator::new(Features::all(), InputTextureMode::ShaderYuv, target)
    }

    #[test]
    fn pot_sizes_round_up_with_a_floor() {
        let a = allocator(TextureTarget::Texture2D);
        assert_eq!(a.texture_size(Size::new(720, 480)), Size::new(1024, 512));
        assert_eq!(a.texture_size(Size::new(16, 64)), Size::new(64, 64));
        assert_eq!(a.texture_size(Size::new(1920, 1088)), Size::new(2048, 2048));
    }

    #[test]
    fn rect_sizes_are_exact() {
        let a = allocator(TextureTarget::Rectangle);
        assert_eq!(a.texture_size(Size::new(720, 480)), Size::new(720, 480));
    }

    #[test]
    fn video_texture_format_follows_mode() {
        let mut ctx = RecordingContext::new(Features::all());
        let packed = TextureAllocator::new(
            Features::YCBCR_TEXTURE,
            InputTextureMode::PackedYCbCr,
            TextureTarget::Texture2D,
        );
        let (tex, storage) = packed
            .create_video_texture(&mut ctx, Size::new(720, 576), true)
            .expect("texture");
        let desc = ctx.texture_desc(tex).expect("live");
        assert_eq!(desc.format, TextureFormat::YCbCr422);
        assert_eq!(storage, Size::new(1024, 1024));
        // PBO requested but not negotiated.
        assert!(!desc.pixel_buffer);
    }

    #[test]
    fn failed_framebuffer_releases_its_texture() {
        let mut ctx = RecordingContext::new(Features::all());
        ctx.fail_framebuffers(true);
        let a = allocator(TextureTarget::Texture2D);
        assert!(a.create_intermediate_buffer(&mut ctx, Size::new(720, 480)).is_err());
        assert_eq!(ctx.live_textures(), 0);
        assert_eq!(ctx.invalid_deletes(), 0);
    }

    #[test]
    fn intermediate_buffers_need_fbos() {
        let mut ctx = RecordingContext::new(Features::all());
        let a = TextureAllocator::new(
            Features::FRAGMENT_PROGRAM,
            InputTextureMode::ShaderYuv,
            TextureTarget::Texture2D,
        );
        let err = a
            .create_intermediate_buffer(&mut ctx, Size::new(720, 480))
            .expect_err("no fbo");
        assert!(matches!(err, VideoError::CapabilityUnavailable { .. }));
        assert_eq!(ctx.live_textures(), 0);
    }

    #[test]
    fn destroy_helpers_empty_their_lists() {
        let mut ctx = RecordingContext::new(Features::all());
        let a = allocator(TextureTarget::Texture2D);
        let mut buffers = vec![
            a.create_intermediate_buffer(&mut ctx, Size::new(64, 64)).expect("fb"),
            a.create_intermediate_buffer(&mut ctx, Size::new(64, 64)).expect("fb"),
        ];
        let mut textures = vec![a
            .create_video_texture(&mut ctx, Size::new(64, 64), false)
            .expect("tex")
            .0];
        TextureAllocator::destroy_buffers(&mut ctx, &mut buffers);
        TextureAllocator::destroy_textures(&mut ctx, &mut textures);
        assert!(buffers.is_empty() && textures.is_empty());
        assert_eq!(ctx.live_textures(), 0);
        assert_eq!(ctx.live_framebuffers(), 0);
    }
}
