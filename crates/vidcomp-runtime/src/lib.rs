#![forbid(unsafe_code)]

//! The video compositor.
//!
//! [`VideoCompositor`] owns one video pipeline on a shared [`RenderContext`]: the input
//! texture, the reference ring of a shader deinterlacer and the [`FilterGraph`]. It picks
//! the pipeline from the negotiated features at construction, keeps the resize stages in
//! line with the geometry, uploads frames and draws them.
//!
//! Every public call holds the context lock for its whole duration. Several compositors
//! (video and OSD, say) may share one context, each with its own resources.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod render;
mod setup;
pub mod upload;

pub use setup::{plan_inputs, CompositorSetup, InputPlan};
pub use upload::{PixelFormat, VideoFrame};

use std::sync::Arc;

use vidcomp_buffers::{InputTextureMode, ReferenceRing, TextureAllocator};
use vidcomp_core::{
    lock_context, negotiate, DrawCall, Features, FilterKind, OutputTarget, PictureAttributes,
    RectF, RenderContext, ScanType, SharedColourSpace, SharedContext, Size, TextureId,
    VideoError, VideoGeometry, VideoOutputConfig,
};
use vidcomp_graph::{resize_decision, FilterGraph, ResizeInputs};
use vidcomp_shaders::{generate, Deinterlacer, ProgramRequest, TextureGeometry};

/// Viewport drawn into when another instance owns the window.
const MASTER_VIEWPORT: Size = Size::new(1920, 1080);
/// Software deinterlacer that keeps one field per frame; resizing would mix the fields.
const SOFTWARE_BOB: &str = "bobdeint";
/// Shader deinterlacer that moves the quad by half a line per field.
const HARDWARE_BOB: &str = "openglbobdeint";

fn new_graph(plan: &InputPlan, features: Features, geometry: &VideoGeometry) -> FilterGraph {
    let allocator = TextureAllocator::new(features, plan.mode, plan.target);
    let working = geometry.working_size();
    let textures = TextureGeometry {
        input_size: allocator.texture_size(geometry.video_size),
        framebuffer_size: allocator.texture_size(working),
        rect_textures: allocator.rect_textures(),
    };
    FilterGraph::new(allocator, working, textures)
}

#[derive(Debug)]
pub struct VideoCompositor<C: RenderContext> {
    ctx: SharedContext<C>,
    colour_space: SharedColourSpace,
    config: VideoOutputConfig,
    features: Features,
    plan: InputPlan,
    geometry: VideoGeometry,
    viewport: Size,
    graph: FilterGraph,
    /// Upload target; slot 0 is the texture the next frame goes into.
    inputs: Vec<TextureId>,
    input_texture_size: Size,
    refs: ReferenceRing,
    hardware_deinterlacing: bool,
    hardware_deinterlacer: String,
    software_deinterlacer: String,
    input_updated: bool,
    current_frame: Option<i64>,
}

impl<C: RenderContext> VideoCompositor<C> {
    /// Builds the best pipeline the context supports.
    ///
    /// Falls back to software conversion into an RGBA texture when shader conversion
    /// cannot be set up. Fails with [`VideoError::FatalInit`] only when even that
    /// pipeline cannot be built.
    pub fn new(
        ctx: SharedContext<C>,
        colour_space: SharedColourSpace,
        setup: CompositorSetup,
    ) -> Result<Self, VideoError> {
        let CompositorSetup { geometry, config } = setup;
        geometry
            .validate()
            .map_err(|e| VideoError::FatalInit(e.to_string()))?;

        let shared = Arc::clone(&ctx);
        let mut guard = lock_context(&shared);

        let features = negotiate(&config.options, guard.features());
        tracing::info!(?features, "negotiated features");
        if config.viewport_control {
            guard.set_features(features);
            guard.set_fence();
        }

        let plan = plan_inputs(features, &config.render_options(), config.hardware_decoded);
        let mut compositor = Self {
            ctx,
            colour_space,
            graph: new_graph(&plan, features, &geometry),
            software_deinterlacer: config.software_deinterlacer.trim().to_owned(),
            config,
            features,
            plan,
            geometry,
            viewport: Size::default(),
            inputs: Vec::new(),
            input_texture_size: Size::default(),
            refs: ReferenceRing::new(),
            hardware_deinterlacing: false,
            hardware_deinterlacer: String::new(),
            input_updated: false,
            current_frame: None,
        };

        let started = compositor.start(&mut *guard);
        // Dropping a failed compositor locks the context again.
        drop(guard);
        started.map(|()| compositor)
    }

    fn start(&mut self, ctx: &mut C) -> Result<(), VideoError> {
        self.apply_viewport(ctx, self.geometry.display_visible_rect.size());
        self.build(ctx)?;

        let allow = self.software_allows_resize();
        self.check_resize(ctx, false, allow);

        let name = self.config.hardware_deinterlacer.trim().to_owned();
        if !name.is_empty() && !self.add_deinterlacer_locked(ctx, &name) {
            tracing::warn!(deinterlacer = %name, "configured shader deinterlacer unavailable");
        }

        tracing::info!(
            mode = ?self.plan.mode,
            pbo = self.plan.use_pbo,
            stages = ?self.graph.kinds(),
            "video pipeline ready"
        );
        Ok(())
    }

    /// Creates the input texture and the first stage, falling back to an RGBA blit.
    fn build(&mut self, ctx: &mut C) -> Result<(), VideoError> {
        let primary = match self.plan.primary {
            Some(kind) => self.build_inputs(ctx, kind),
            None => Err(VideoError::CapabilityUnavailable {
                feature: "fragment programs",
                purpose: "colour conversion",
            }),
        };
        match primary {
            Ok(()) => {
                if self.plan.primary != Some(FilterKind::YuvToRgb) {
                    self.disable_picture_controls();
                }
                return Ok(());
            }
            Err(e) => tracing::warn!(
                error = %e,
                "GPU colour conversion failed, falling back to software conversion; shader filters are disabled"
            ),
        }

        self.release_all(ctx);
        self.plan.mode = InputTextureMode::ShaderYuv;
        self.plan.primary = None;
        self.plan.bicubic = false;
        self.graph = new_graph(&self.plan, self.features, &self.geometry);

        match self.build_inputs(ctx, FilterKind::Resize) {
            Ok(()) => {
                self.disable_picture_controls();
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "no usable video pipeline");
                self.release_all(ctx);
                Err(VideoError::FatalInit(e.to_string()))
            }
        }
    }

    fn build_inputs(&mut self, ctx: &mut C, kind: FilterKind) -> Result<(), VideoError> {
        let (tex, size) = self.graph.allocator().create_video_texture(
            ctx,
            self.geometry.video_size,
            self.plan.use_pbo,
        )?;
        if let Err(e) = self.graph.add_stage(ctx, kind) {
            ctx.delete_texture(tex);
            return Err(e);
        }
        self.inputs.push(tex);
        self.input_texture_size = size;
        match self.plan.mode {
            InputTextureMode::PackedYCbCr => {
                tracing::info!("using packed YCbCr textures for colour conversion")
            }
            InputTextureMode::Hardware => tracing::info!("using plain RGBA textures for decoded frames"),
            InputTextureMode::ShaderYuv => {}
        }
        Ok(())
    }

    fn disable_picture_controls(&self) {
        self.colour_space
            .lock()
            .set_supported_attributes(PictureAttributes::empty());
    }

    fn release_all(&mut self, ctx: &mut C) {
        self.graph.clear(ctx);
        self.refs.clear(ctx);
        TextureAllocator::destroy_textures(ctx, &mut self.inputs);
        self.input_texture_size = Size::default();
        self.hardware_deinterlacer.clear();
    }

    fn software_allows_resize(&self) -> bool {
        self.software_deinterlacer != SOFTWARE_BOB
    }

    fn check_resize(&mut self, ctx: &mut C, deinterlacing: bool, allow: bool) {
        let mut inputs = ResizeInputs::from_sizes(
            self.geometry.working_size(),
            self.geometry.display_video_rect.size(),
            deinterlacing,
            allow,
            self.plan.bicubic,
        );
        inputs.upscale &= self.config.allow_upscale;
        let wanted = resize_decision(&inputs);
        let applied = self.graph.apply_resize_plan(ctx, wanted);
        tracing::debug!(?wanted, ?applied, stages = ?self.graph.kinds(), "resize check");
        self.apply_input_filter(ctx);
    }

    fn apply_input_filter(&self, ctx: &mut C) {
        self.graph.apply_input_filter(ctx, &self.inputs);
        self.graph.apply_input_filter(ctx, self.refs.textures());
    }

    fn apply_viewport(&mut self, ctx: &mut C, requested: Size) {
        self.viewport = requested.max(self.geometry.working_size());
        if !self.config.viewport_control {
            return;
        }
        tracing::info!(
            width = self.viewport.width,
            height = self.viewport.height,
            "viewport"
        );
        ctx.set_viewport(self.viewport);
    }

    // ---------------------------------------------------------------------------------
    // Reconfiguration
    // ---------------------------------------------------------------------------------

    /// Sets the viewport to `size`, grown to at least the video size.
    pub fn set_viewport(&mut self, size: Size) {
        let shared = Arc::clone(&self.ctx);
        let mut ctx = lock_context(&shared);
        self.apply_viewport(&mut *ctx, size);
    }

    /// Turns the shader deinterlacer on or off.
    pub fn set_deinterlacing(&mut self, on: bool) {
        if on == self.hardware_deinterlacing {
            return;
        }
        self.hardware_deinterlacing = on;
        let shared = Arc::clone(&self.ctx);
        let mut ctx = lock_context(&shared);
        let allow = self.software_allows_resize();
        self.check_resize(&mut *ctx, on, allow);
    }

    /// Records the CPU deinterlacer in use. Software bob forbids resizing.
    pub fn set_software_deinterlacer(&mut self, name: &str) {
        let name = name.trim();
        if self.software_deinterlacer != name {
            self.software_deinterlacer = name.to_owned();
            let shared = Arc::clone(&self.ctx);
            let mut ctx = lock_context(&shared);
            let allow = self.software_allows_resize();
            let deinterlacing = self.hardware_deinterlacing;
            self.check_resize(&mut *ctx, deinterlacing, allow);
        }
    }

    /// Fuses the named shader deinterlacer into the conversion stage.
    ///
    /// Returns false, with nothing changed but the previous deinterlacer removed, when
    /// the algorithm is unknown or its resources cannot be created.
    pub fn add_deinterlacer(&mut self, name: &str) -> bool {
        let shared = Arc::clone(&self.ctx);
        let mut ctx = lock_context(&shared);
        self.add_deinterlacer_locked(&mut *ctx, name)
    }

    fn add_deinterlacer_locked(&mut self, ctx: &mut C, name: &str) -> bool {
        if !self.features.contains(Features::FRAGMENT_PROGRAM) {
            tracing::warn!("fragment programs not available for shader deinterlacing");
            return false;
        }
        if !self.graph.contains(FilterKind::YuvToRgb) {
            tracing::warn!(
                packed_ycbcr = self.plan.mode == InputTextureMode::PackedYCbCr,
                "no conversion stage for shader deinterlacing"
            );
            return false;
        }
        if self.hardware_deinterlacer == name {
            return true;
        }
        let Some(algorithm) = Deinterlacer::from_name(name) else {
            tracing::warn!(deinterlacer = name, "unrecognised shader deinterlacer");
            return false;
        };

        self.teardown_deinterlacer_locked(ctx);
        match self.create_deinterlacer(ctx, name, algorithm) {
            Ok(()) => {
                tracing::info!(deinterlacer = name, refs = self.refs.len(), "shader deinterlacer ready");
                self.hardware_deinterlacer = name.to_owned();
                let allow = self.software_allows_resize();
                let deinterlacing = self.hardware_deinterlacing;
                self.check_resize(ctx, deinterlacing, allow);
                true
            }
            Err(e) => {
                tracing::warn!(deinterlacer = name, error = %e, "shader deinterlacer failed");
                self.teardown_deinterlacer_locked(ctx);
                false
            }
        }
    }

    fn create_deinterlacer(
        &mut self,
        ctx: &mut C,
        name: &str,
        algorithm: Deinterlacer,
    ) -> Result<(), VideoError> {
        let mut refs = Vec::with_capacity(algorithm.reference_frames());
        for _ in 0..algorithm.reference_frames() {
            match self.graph.allocator().create_video_texture(
                ctx,
                self.geometry.video_size,
                self.plan.use_pbo,
            ) {
                Ok((tex, _)) => refs.push(tex),
                Err(e) => {
                    TextureAllocator::destroy_textures(ctx, &mut refs);
                    return Err(e);
                }
            }
        }
        self.refs.fill(refs);

        let geometry = self.graph.geometry();
        for scan in [ScanType::Interlaced, ScanType::SecondField] {
            let request = ProgramRequest {
                kind: FilterKind::YuvToRgb,
                deinterlacer: Some(name),
                scan,
                geometry,
            };
            let source = generate(&request)
                .ok_or_else(|| VideoError::other("conversion stage has no program"))?;
            let program = ctx.create_fragment_program(&source)?;
            match self.graph.stage_mut(FilterKind::YuvToRgb) {
                Some(stage) => stage.programs.push(program),
                None => {
                    ctx.delete_fragment_program(program);
                    return Err(VideoError::other("conversion stage disappeared"));
                }
            }
        }
        Ok(())
    }

    /// Drops the field programs and the reference textures.
    pub fn teardown_deinterlacer(&mut self) {
        let shared = Arc::clone(&self.ctx);
        let mut ctx = lock_context(&shared);
        self.teardown_deinterlacer_locked(&mut *ctx);
    }

    fn teardown_deinterlacer_locked(&mut self, ctx: &mut C) {
        if let Some(stage) = self.graph.stage_mut(FilterKind::YuvToRgb) {
            if stage.programs.len() > 1 {
                for program in stage.programs.drain(1..) {
                    ctx.delete_fragment_program(program);
                }
            }
        }
        self.refs.clear(ctx);
        self.hardware_deinterlacer.clear();
    }

    /// Applies new rectangles. A new video size rebuilds the input textures and every
    /// stage, then restores the shader deinterlacer.
    pub fn reconfigure(&mut self, geometry: VideoGeometry) -> Result<(), VideoError> {
        geometry.validate()?;
        let shared = Arc::clone(&self.ctx);
        let mut ctx = lock_context(&shared);

        let resized = geometry.video_size != self.geometry.video_size;
        self.geometry = geometry;
        self.apply_viewport(&mut *ctx, geometry.display_visible_rect.size());

        if resized {
            tracing::info!(
                width = geometry.video_size.width,
                height = geometry.video_size.height,
                "video size changed, rebuilding pipeline"
            );
            let deinterlacer = std::mem::take(&mut self.hardware_deinterlacer);
            self.release_all(&mut *ctx);
            self.plan = plan_inputs(
                self.features,
                &self.config.render_options(),
                self.config.hardware_decoded,
            );
            self.graph = new_graph(&self.plan, self.features, &self.geometry);
            self.build(&mut *ctx)?;
            if !deinterlacer.is_empty() && !self.add_deinterlacer_locked(&mut *ctx, &deinterlacer) {
                tracing::warn!(deinterlacer = %deinterlacer, "could not restore shader deinterlacer");
            }
        }

        let allow = self.software_allows_resize();
        let deinterlacing = self.hardware_deinterlacing;
        self.check_resize(&mut *ctx, deinterlacing, allow);
        Ok(())
    }

    // ---------------------------------------------------------------------------------
    // Per frame
    // ---------------------------------------------------------------------------------

    /// Uploads a decoded frame into the input texture. Frames that do not match the
    /// configured input are dropped and `false` is returned.
    pub fn update_input_frame(&mut self, frame: &VideoFrame<'_>, soft_bob: bool) -> bool {
        let shared = Arc::clone(&self.ctx);
        let mut ctx = lock_context(&shared);
        match self.upload(&mut *ctx, frame, soft_bob) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "frame dropped");
                false
            }
        }
    }

    fn upload(&mut self, ctx: &mut C, frame: &VideoFrame<'_>, soft_bob: bool) -> Result<(), VideoError> {
        let mode = self.graph.allocator().mode();
        upload::check_frame(frame, self.geometry.video_size, mode == InputTextureMode::Hardware)?;
        if self.inputs.is_empty() {
            return Err(VideoError::InputMismatch("no input texture".into()));
        }
        // The ring only rotates once the frame is in its new texture.
        let input = if self.hardware_deinterlacing {
            self.refs.upload_target(self.inputs[0])
        } else {
            self.inputs[0]
        };
        let shader_conversion = self.graph.contains(FilterKind::YuvToRgb);
        let width = self.input_texture_size.width.max(0) as usize;
        let buf = ctx
            .texture_buffer(input)
            .ok_or_else(|| VideoError::InputMismatch(format!("no staging buffer for {input:?}")))?;

        match frame.format {
            PixelFormat::Rgba32 => upload::copy_rgba(frame, buf, width * 4)?,
            PixelFormat::Yv12 if !shader_conversion => match mode {
                InputTextureMode::PackedYCbCr => upload::yv12_to_uyvy(frame, buf, width * 2)?,
                InputTextureMode::ShaderYuv | InputTextureMode::Hardware => {
                    upload::yv12_to_rgba(frame, buf, width * 4)?
                }
            },
            PixelFormat::Yv12 if frame.interlaced && !soft_bob => {
                upload::pack_yv12_interlaced(frame, buf, width * 4)?
            }
            PixelFormat::Yv12 => upload::pack_yv12_alpha(frame, buf, width * 4)?,
        }

        ctx.update_texture(input);
        if self.hardware_deinterlacing {
            self.refs.rotate(&mut self.inputs[0]);
        }
        self.input_updated = true;
        Ok(())
    }

    /// Draws the current input through every stage to the display.
    ///
    /// Does nothing without an input texture or stages, or while an intermediate
    /// stage has no buffer to draw into.
    pub fn prepare_frame(
        &mut self,
        top_field_first: bool,
        scan: ScanType,
        software_deinterlaced: bool,
        frame: i64,
        draw_border: bool,
    ) {
        if self.inputs.is_empty() || self.graph.is_empty() {
            return;
        }
        if self
            .graph
            .stages()
            .any(|s| s.output == OutputTarget::Intermediate && s.buffers.is_empty())
        {
            tracing::warn!(stages = ?self.graph.kinds(), "intermediate stage without buffers, skipping frame");
            return;
        }

        let shared = Arc::clone(&self.ctx);
        let mut guard = lock_context(&shared);
        let ctx = &mut *guard;

        let software_bob = software_deinterlaced && self.software_deinterlacer == SOFTWARE_BOB;
        let hardware_bob = self.hardware_deinterlacing && self.hardware_deinterlacer == HARDWARE_BOB;
        let geo = self.geometry;
        let working = geo.working_size();
        let fb_rect = geo.framebuffer_rect();
        let single_stage = self.graph.len() < 2;
        let matrix = self.colour_space.lock().matrix();

        let mut inputs = self.inputs.clone();
        for (index, stage) in self.graph.stages().enumerate() {
            let display = stage.output == OutputTarget::Display;

            // Source, in texels of the sampled texture.
            let field_bob = software_bob && display;
            let sample_height = if field_bob {
                geo.video_size.height as f32
            } else {
                working.height as f32
            };
            let mut source = if display {
                RectF::from(geo.video_rect)
            } else {
                RectF::new(0.0, 0.0, working.width as f32, sample_height)
            };
            if field_bob {
                source = render::field_sample_rect(
                    source,
                    sample_height,
                    working.height as f32,
                    scan,
                    top_field_first,
                    single_stage,
                );
            }

            // Destination.
            let (area, visible) = if display {
                (geo.display_video_rect, geo.display_visible_rect)
            } else {
                (fb_rect, fb_rect)
            };
            let bob = if display && hardware_bob {
                render::hardware_bob_offset(area.height, geo.video_rect.height, scan, top_field_first)
            } else {
                0.0
            };
            let dest = render::dest_rect(area, visible.height, index == 0, bob);

            let target = if display {
                ctx.bind_framebuffer(None);
                if self.config.viewport_control {
                    ctx.set_background(self.config.letterbox.clear_rgba());
                    ctx.clear_framebuffer();
                    ctx.set_viewport(geo.display_visible_rect.size());
                } else {
                    ctx.set_viewport(MASTER_VIEWPORT);
                }
                None
            } else {
                let fb = stage.target();
                ctx.bind_framebuffer(fb);
                ctx.set_viewport(fb_rect.size());
                fb
            };

            if draw_border && display {
                ctx.draw_rect(render::border_rect(dest), render::BORDER_COLOUR);
            }

            let mut textures = inputs.clone();
            if stage.kind == FilterKind::YuvToRgb && self.hardware_deinterlacing {
                textures.extend_from_slice(self.refs.textures());
            }
            if let Some(helper) = stage.helper {
                textures.push(helper);
            }

            let program = if stage.kind.uses_program() {
                let idx = match stage.kind {
                    FilterKind::YuvToRgb => render::select_program(
                        stage.programs.len(),
                        self.hardware_deinterlacing,
                        self.refs.refs_needed(),
                        scan,
                        top_field_first,
                    ),
                    FilterKind::Resize | FilterKind::Bicubic => 0,
                };
                stage.programs.get(idx).copied()
            } else {
                None
            };
            if let (FilterKind::YuvToRgb, Some(program)) = (stage.kind, program) {
                ctx.set_fragment_params(program, &matrix);
            }

            ctx.draw_bitmap(&DrawCall {
                textures: &textures,
                target,
                program,
                source,
                dest,
            });

            inputs = stage.buffer_textures();
        }

        self.current_frame = Some(frame);
        self.input_updated = false;
    }

    // ---------------------------------------------------------------------------------
    // Inspection
    // ---------------------------------------------------------------------------------

    pub fn features(&self) -> Features {
        self.features
    }

    pub fn input_plan(&self) -> InputPlan {
        self.plan
    }

    pub fn geometry(&self) -> VideoGeometry {
        self.geometry
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn graph(&self) -> &FilterGraph {
        &self.graph
    }

    pub fn input_textures(&self) -> &[TextureId] {
        &self.inputs
    }

    pub fn input_texture_size(&self) -> Size {
        self.input_texture_size
    }

    pub fn reference_ring(&self) -> &ReferenceRing {
        &self.refs
    }

    pub fn hardware_deinterlacing(&self) -> bool {
        self.hardware_deinterlacing
    }

    pub fn hardware_deinterlacer(&self) -> Option<&str> {
        Some(self.hardware_deinterlacer.as_str()).filter(|s| !s.is_empty())
    }

    pub fn software_deinterlacer(&self) -> &str {
        &self.software_deinterlacer
    }

    /// A frame was uploaded and not drawn yet.
    pub fn input_updated(&self) -> bool {
        self.input_updated
    }

    pub fn current_frame(&self) -> Option<i64> {
        self.current_frame
    }

    pub fn colour_space(&self) -> &SharedColourSpace {
        &self.colour_space
    }
}

impl<C: RenderContext> Drop for VideoCompositor<C> {
    fn drop(&mut self) {
        let shared = Arc::clone(&self.ctx);
        let mut ctx = lock_context(&shared);
        self.release_all(&mut *ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidcomp_core::testing::{GlCall, RecordingContext};
    use vidcomp_core::{shared_context, ColourSpace, PictureAttribute, Rect};

    fn geometry(video: Size, display: Size) -> VideoGeometry {
        VideoGeometry {
            video_size: video,
            display_visible_rect: Rect::from_size(display),
            display_video_rect: Rect::from_size(display),
            video_rect: Rect::from_size(video),
        }
    }

    fn compositor(
        hardware: Features,
        config: VideoOutputConfig,
        geo: VideoGeometry,
    ) -> (SharedContext<RecordingContext>, VideoCompositor<RecordingContext>) {
        let shared = shared_context(RecordingContext::new(hardware));
        let comp = VideoCompositor::new(
            Arc::clone(&shared),
            ColourSpace::new().shared(),
            CompositorSetup {
                geometry: geo,
                config,
            },
        )
        .expect("compositor");
        (shared, comp)
    }

    fn yv12(size: Size) -> Vec<u8> {
        let luma = size.area() as usize;
        let chroma = ((size.width + 1) / 2 * ((size.height + 1) / 2)) as usize;
        vec![128; luma + 2 * chroma]
    }

    fn frame(buf: &[u8], size: Size) -> VideoFrame<'_> {
        let luma = size.area() as usize;
        let cw = ((size.width + 1) / 2) as usize;
        let chroma = cw * ((size.height + 1) / 2) as usize;
        VideoFrame {
            buf,
            offsets: [0, luma, luma + chroma],
            pitches: [size.width as usize, cw, cw],
            width: size.width,
            height: size.height,
            format: PixelFormat::Yv12,
            interlaced: true,
        }
    }

    const SD: Size = Size::new(720, 480);

    #[test]
    fn same_size_output_is_one_conversion_stage() {
        let (_ctx, comp) = compositor(Features::all(), VideoOutputConfig::default(), geometry(SD, SD));
        assert_eq!(comp.graph().kinds(), vec![FilterKind::YuvToRgb]);
        assert_eq!(comp.input_textures().len(), 1);
        assert_eq!(comp.viewport(), SD);
    }

    #[test]
    fn viewport_control_pushes_features_and_viewport() {
        let (ctx, comp) = compositor(
            Features::all(),
            VideoOutputConfig {
                options: "opengloptions=nopbo".into(),
                ..Default::default()
            },
            geometry(SD, Size::new(640, 360)),
        );
        let ctx = ctx.lock();
        let negotiated = ctx.negotiated().expect("features pushed");
        assert!(!negotiated.contains(Features::PIXEL_BUFFER));
        assert!(ctx.calls().contains(&GlCall::SetFence));
        // Never smaller than the video.
        assert_eq!(comp.viewport(), SD);
        assert!(ctx.calls().contains(&GlCall::SetViewport(SD)));
    }

    #[test]
    fn without_viewport_control_the_context_is_left_alone() {
        let config = VideoOutputConfig {
            viewport_control: false,
            ..Default::default()
        };
        let (ctx, mut comp) = compositor(Features::all(), config, geometry(SD, SD));
        comp.set_viewport(Size::new(1280, 720));
        assert_eq!(comp.viewport(), Size::new(1280, 720));
        let ctx = ctx.lock();
        assert_eq!(ctx.negotiated(), None);
        assert!(!ctx.calls().iter().any(|c| matches!(c, GlCall::SetViewport(_))));
    }

    #[test]
    fn temporal_deinterlacer_waits_for_references() {
        let (ctx, mut comp) = compositor(Features::all(), VideoOutputConfig::default(), geometry(SD, SD));
        assert!(comp.add_deinterlacer("openglyadif"));
        assert_eq!(comp.reference_ring().len(), 2);
        assert_eq!(comp.graph().stage(FilterKind::YuvToRgb).map(|s| s.programs.len()), Some(3));
        comp.set_deinterlacing(true);

        let buf = yv12(SD);
        let programs = comp.graph().stage(FilterKind::YuvToRgb).expect("stage").programs.clone();
        for (n, expected) in [(1, programs[0]), (2, programs[1])] {
            assert!(comp.update_input_frame(&frame(&buf, SD), false));
            assert_eq!(comp.reference_ring().refs_needed(), 2 - n);
            ctx.lock().clear_calls();
            comp.prepare_frame(true, ScanType::Interlaced, false, n as i64, false);
            let ctx = ctx.lock();
            let draws = ctx.draws();
            assert_eq!(draws.len(), 1);
            assert_eq!(draws[0].program, Some(expected));
            assert_eq!(draws[0].textures.len(), 3);
        }
        assert_eq!(comp.current_frame(), Some(2));
        assert!(!comp.input_updated());
    }

    #[test]
    fn teardown_deinterlacer_frees_field_programs() {
        let (ctx, mut comp) = compositor(Features::all(), VideoOutputConfig::default(), geometry(SD, SD));
        let before = {
            let c = ctx.lock();
            (c.live_textures(), c.live_programs())
        };
        assert!(comp.add_deinterlacer("opengllinearblend"));
        comp.teardown_deinterlacer();
        let after = {
            let c = ctx.lock();
            (c.live_textures(), c.live_programs())
        };
        assert_eq!(after, before);
        assert_eq!(comp.hardware_deinterlacer(), None);
        assert!(!comp.add_deinterlacer("openglmystery"));
    }

    #[test]
    fn failed_deinterlacer_leaves_nothing_behind() {
        let (ctx, mut comp) = compositor(Features::all(), VideoOutputConfig::default(), geometry(SD, SD));
        let before = {
            let c = ctx.lock();
            (c.live_textures(), c.live_programs())
        };
        ctx.lock().fail_programs_containing("#define PREV2");
        assert!(!comp.add_deinterlacer("openglyadif"));
        let after = {
            let c = ctx.lock();
            (c.live_textures(), c.live_programs())
        };
        assert_eq!(after, before);
        assert_eq!(comp.reference_ring().refs_needed(), 0);
    }

    #[test]
    fn mismatched_frames_are_dropped() {
        let (ctx, mut comp) = compositor(Features::all(), VideoOutputConfig::default(), geometry(SD, SD));
        let small = Size::new(352, 240);
        let buf = yv12(small);
        assert!(!comp.update_input_frame(&frame(&buf, small), false));
        let input = comp.input_textures()[0];
        assert_eq!(ctx.lock().uploads(input), 0);
        assert!(!comp.input_updated());
    }

    #[test]
    fn rejected_frames_do_not_rotate_references() {
        let (ctx, mut comp) = compositor(Features::all(), VideoOutputConfig::default(), geometry(SD, SD));
        assert!(comp.add_deinterlacer("openglkerneldeint"));
        comp.set_deinterlacing(true);
        let inputs = comp.input_textures().to_vec();
        let refs = comp.reference_ring().clone();

        let small = Size::new(352, 240);
        let bad = yv12(small);
        assert!(!comp.update_input_frame(&frame(&bad, small), false));
        assert_eq!(comp.input_textures(), inputs.as_slice());
        assert_eq!(comp.reference_ring(), &refs);

        let buf = yv12(SD);
        assert!(comp.update_input_frame(&frame(&buf, SD), false));
        assert_eq!(comp.reference_ring().refs_needed(), refs.refs_needed() - 1);
        let input = comp.input_textures()[0];
        assert_ne!(input, inputs[0]);
        assert_eq!(ctx.lock().uploads(input), 1);
        assert_eq!(comp.reference_ring().textures()[0], inputs[0]);
    }

    #[test]
    fn software_fallback_drops_bicubic() {
        let shared = shared_context(RecordingContext::new(Features::all()));
        shared.lock().fail_programs_containing("u_yuv");
        let comp = VideoCompositor::new(
            Arc::clone(&shared),
            ColourSpace::new().shared(),
            CompositorSetup {
                geometry: geometry(SD, Size::new(1920, 1080)),
                config: VideoOutputConfig {
                    options: "openglbicubic".into(),
                    ..Default::default()
                },
            },
        )
        .expect("software pipeline");
        assert_eq!(comp.graph().kinds(), vec![FilterKind::Resize]);
        assert!(shared.lock().program_sources().is_empty());
    }

    #[test]
    fn software_bob_blocks_resizing() {
        let (_ctx, mut comp) = compositor(
            Features::all(),
            VideoOutputConfig::default(),
            geometry(SD, Size::new(1920, 1080)),
        );
        assert!(comp.graph().contains(FilterKind::Resize));
        comp.set_software_deinterlacer("bobdeint");
        assert_eq!(comp.graph().kinds(), vec![FilterKind::YuvToRgb]);
        comp.set_software_deinterlacer("linearblend");
        assert!(comp.graph().contains(FilterKind::Resize));
    }

    #[test]
    fn software_conversion_disables_picture_controls() {
        let (_ctx, comp) = compositor(
            Features::FRAMEBUFFER_OBJECT,
            VideoOutputConfig::default(),
            geometry(SD, SD),
        );
        assert_eq!(comp.graph().kinds(), vec![FilterKind::Resize]);
        let mut colour = comp.colour_space().lock();
        assert_eq!(colour.supported_attributes(), PictureAttributes::empty());
        assert_eq!(colour.set_attribute(PictureAttribute::Hue, 10), None);
    }

    #[test]
    fn fatal_when_no_texture_can_be_created() {
        let shared = shared_context(RecordingContext::new(Features::all()));
        shared.lock().fail_textures_after(0);
        let err = VideoCompositor::new(
            Arc::clone(&shared),
            ColourSpace::new().shared(),
            CompositorSetup {
                geometry: geometry(SD, SD),
                config: VideoOutputConfig::default(),
            },
        )
        .expect_err("no pipeline");
        assert!(err.is_fatal());
        let ctx = shared.try_lock().expect("context released");
        assert_eq!(ctx.live_programs(), 0);
    }

    #[test]
    fn drop_releases_everything() {
        let (ctx, mut comp) = compositor(
            Features::all(),
            VideoOutputConfig {
                options: "openglbicubic".into(),
                ..Default::default()
            },
            geometry(SD, Size::new(1920, 1080)),
        );
        assert!(comp.add_deinterlacer("openglkerneldeint"));
        drop(comp);
        let ctx = ctx.lock();
        assert_eq!(ctx.live_textures(), 0);
        assert_eq!(ctx.live_framebuffers(), 0);
        assert_eq!(ctx.live_programs(), 0);
        assert_eq!(ctx.invalid_deletes(), 0);
    }
}
