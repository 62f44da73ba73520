#![forbid(unsafe_code)]

//! The ordered chain of processing stages.
//!
//! A [`FilterGraph`] holds at most one stage per [`FilterKind`] and keeps the
//! intermediate buffers between them in step with the topology. It owns every
//! program, framebuffer and helper texture of its stages; the input textures belong
//! to the caller.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

mod resize;
mod stage;

pub use resize::{resize_decision, ResizeInputs, ResizePlan};
pub use stage::FilterStage;

use std::collections::BTreeMap;

use vidcomp_buffers::TextureAllocator;
use vidcomp_core::{
    Features, FilterKind, OutputTarget, RenderContext, ScanType, Size, TextureFilter, TextureId,
    VideoError,
};
use vidcomp_shaders::{bicubic_weights, generate, ProgramRequest, TextureGeometry, HELPER_WIDTH};

/// Texture filtering chosen for the current topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterModes {
    pub inputs: TextureFilter,
    pub buffers: BTreeMap<FilterKind, TextureFilter>,
}

#[derive(Debug)]
pub struct FilterGraph {
    stages: BTreeMap<FilterKind, FilterStage>,
    allocator: TextureAllocator,
    /// Working video size; every intermediate buffer holds one image of this size.
    video_size: Size,
    geometry: TextureGeometry,
}

impl FilterGraph {
    pub fn new(allocator: TextureAllocator, video_size: Size, geometry: TextureGeometry) -> Self {
        Self {
            stages: BTreeMap::new(),
            allocator,
            video_size,
            geometry,
        }
    }

    pub fn allocator(&self) -> &TextureAllocator {
        &self.allocator
    }

    pub fn geometry(&self) -> TextureGeometry {
        self.geometry
    }

    pub fn video_size(&self) -> Size {
        self.video_size
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn contains(&self, kind: FilterKind) -> bool {
        self.stages.contains_key(&kind)
    }

    pub fn stage(&self, kind: FilterKind) -> Option<&FilterStage> {
        self.stages.get(&kind)
    }

    pub fn stage_mut(&mut self, kind: FilterKind) -> Option<&mut FilterStage> {
        self.stages.get_mut(&kind)
    }

    /// Stages in pipeline order.
    pub fn stages(&self) -> impl DoubleEndedIterator<Item = &FilterStage> {
        self.stages.values()
    }

    pub fn kinds(&self) -> Vec<FilterKind> {
        self.stages.keys().copied().collect()
    }

    fn features(&self) -> Features {
        self.allocator.features()
    }

    fn check_prerequisites(&self, kind: FilterKind) -> Result<(), VideoError> {
        let features = self.features();
        let missing = match kind {
            FilterKind::Resize
                if !features.contains(Features::FRAMEBUFFER_OBJECT) && !self.is_empty() =>
            {
                Some("framebuffer objects")
            }
            FilterKind::Bicubic if !features.full_shader_pipeline() => {
                Some("fragment programs and framebuffer objects")
            }
            FilterKind::YuvToRgb if !features.contains(Features::FRAGMENT_PROGRAM) => {
                Some("fragment programs")
            }
            _ => None,
        };
        match missing {
            Some(feature) => {
                let purpose = match kind {
                    FilterKind::YuvToRgb => "colour conversion",
                    FilterKind::Resize => "scaling",
                    FilterKind::Bicubic => "bicubic upscaling",
                };
                tracing::warn!(feature, purpose, "stage unavailable");
                Err(VideoError::CapabilityUnavailable { feature, purpose })
            }
            None => Ok(()),
        }
    }

    fn create_resources<C: RenderContext + ?Sized>(
        &self,
        ctx: &mut C,
        stage: &mut FilterStage,
    ) -> Result<(), VideoError> {
        if stage.kind.uses_helper_texture() {
            stage.helper = Some(ctx.create_helper_texture(&bicubic_weights(HELPER_WIDTH))?);
        }
        if stage.kind.uses_program() {
            // A stage ahead of every other one samples the input texture directly.
            let first = self.stages.keys().all(|k| *k > stage.kind);
            let geometry = if first {
                self.geometry.sampling_input()
            } else {
                self.geometry
            };
            let request = ProgramRequest {
                kind: stage.kind,
                deinterlacer: None,
                scan: ScanType::Progressive,
                geometry,
            };
            if let Some(source) = generate(&request) {
                stage.programs.push(ctx.create_fragment_program(&source)?);
            }
        }
        Ok(())
    }

    /// Adds a stage of `kind` and reconciles buffers. Does nothing if it already exists.
    ///
    /// On any failure the stage's resources are released and the graph is left as it was.
    pub fn add_stage<C: RenderContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        kind: FilterKind,
    ) -> Result<(), VideoError> {
        if self.contains(kind) {
            return Ok(());
        }
        self.check_prerequisites(kind)?;

        tracing::info!(stage = kind.name(), "creating filter stage");
        let mut stage = FilterStage::new(kind);
        if let Err(e) = self.create_resources(ctx, &mut stage) {
            tracing::warn!(stage = kind.name(), error = %e, "stage resources failed");
            stage.release(ctx);
            return Err(e);
        }
        self.stages.insert(kind, stage);

        if let Err(e) = self.reconcile(ctx) {
            tracing::warn!(stage = kind.name(), error = %e, "buffer reconciliation failed, rolling back");
            if let Some(stage) = self.stages.remove(&kind) {
                stage.release(ctx);
            }
            if let Err(e) = self.reconcile(ctx) {
                tracing::warn!(stage = kind.name(), error = %e, "reconciliation after rollback failed");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Removes the stage of `kind`, if present, and reconciles the rest.
    pub fn remove_stage<C: RenderContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        kind: FilterKind,
    ) -> Result<(), VideoError> {
        if let Some(stage) = self.stages.remove(&kind) {
            tracing::info!(stage = kind.name(), "removing filter stage");
            stage.release(ctx);
        }
        self.reconcile(ctx)
    }

    /// Gives every stage the output target and buffer count its position requires.
    pub fn reconcile<C: RenderContext + ?Sized>(&mut self, ctx: &mut C) -> Result<(), VideoError> {
        let allocator = self.allocator;
        let size = self.video_size;
        let mut needed: Option<usize> = None;

        for stage in self.stages.values_mut().rev() {
            match needed {
                None => {
                    stage.output = OutputTarget::Display;
                    TextureAllocator::destroy_buffers(ctx, &mut stage.buffers);
                }
                Some(n) => {
                    stage.output = OutputTarget::Intermediate;
                    while stage.buffers.len() > n {
                        if let Some((fb, tex)) = stage.buffers.pop() {
                            ctx.delete_framebuffer(fb);
                            ctx.delete_texture(tex);
                        }
                    }
                    while stage.buffers.len() < n {
                        let pair = allocator.create_intermediate_buffer(ctx, size)?;
                        stage.buffers.push(pair);
                    }
                }
            }
            needed = Some(stage.num_inputs);
        }

        for (kind, filter) in self.filter_modes().buffers {
            if let Some(stage) = self.stages.get(&kind) {
                for (_, tex) in &stage.buffers {
                    ctx.set_texture_filter(*tex, filter);
                }
            }
        }
        Ok(())
    }

    /// Linear everywhere for a single stage. Otherwise the inputs and every buffer
    /// deeper than the one feeding the last stage are sampled nearest.
    pub fn filter_modes(&self) -> FilterModes {
        if self.stages.len() < 2 {
            return FilterModes {
                inputs: TextureFilter::Linear,
                buffers: self.stages.keys().map(|&k| (k, TextureFilter::Linear)).collect(),
            };
        }
        let buffers = self
            .stages
            .keys()
            .rev()
            .enumerate()
            .skip(1)
            .map(|(depth, &kind)| {
                let filter = if depth == 1 {
                    TextureFilter::Linear
                } else {
                    TextureFilter::Nearest
                };
                (kind, filter)
            })
            .collect();
        FilterModes {
            inputs: TextureFilter::Nearest,
            buffers,
        }
    }

    /// Applies the input part of [`FilterGraph::filter_modes`] to the caller's textures.
    pub fn apply_input_filter<C: RenderContext + ?Sized>(&self, ctx: &mut C, inputs: &[TextureId]) {
        let filter = self.filter_modes().inputs;
        for &tex in inputs {
            ctx.set_texture_filter(tex, filter);
        }
    }

    /// Brings the resize/bicubic stages in line with `plan`. Returns the plan that
    /// actually holds afterwards: a bicubic stage that cannot be built degrades to a
    /// plain resize.
    pub fn apply_resize_plan<C: RenderContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        plan: ResizePlan,
    ) -> ResizePlan {
        match plan {
            ResizePlan::Bicubic => {
                if let Err(e) = self.remove_stage(ctx, FilterKind::Resize) {
                    tracing::warn!(error = %e, "failed to drop resize stage");
                }
                match self.add_stage(ctx, FilterKind::Bicubic) {
                    Ok(()) => ResizePlan::Bicubic,
                    Err(e) => {
                        tracing::warn!(error = %e, "bicubic unavailable, using plain resize");
                        self.apply_resize_plan(ctx, ResizePlan::Resize)
                    }
                }
            }
            ResizePlan::Resize => {
                if let Err(e) = self.remove_stage(ctx, FilterKind::Bicubic) {
                    tracing::warn!(error = %e, "failed to drop bicubic stage");
                }
                match self.add_stage(ctx, FilterKind::Resize) {
                    Ok(()) => ResizePlan::Resize,
                    Err(e) => {
                        tracing::warn!(error = %e, "resize stage unavailable");
                        ResizePlan::Direct
                    }
                }
            }
            ResizePlan::Direct => {
                if let Err(e) = self.remove_stage(ctx, FilterKind::Bicubic) {
                    tracing::warn!(error = %e, "failed to drop bicubic stage");
                }
                // Bicubic may have stood in for the only stage; something must draw.
                if self.is_empty() {
                    if let Err(e) = self.add_stage(ctx, FilterKind::Resize) {
                        tracing::warn!(error = %e, "failed to restore resize stage");
                    }
                } else if self.len() > 1 {
                    if let Err(e) = self.remove_stage(ctx, FilterKind::Resize) {
                        tracing::warn!(error = %e, "failed to drop resize stage");
                    }
                }
                ResizePlan::Direct
            }
        }
    }

    /// Releases every stage.
    pub fn clear<C: RenderContext + ?Sized>(&mut self, ctx: &mut C) {
        for (_, stage) in std::mem::take(&mut self.stages) {
            stage.release(ctx);
        }
    }

    /// Checks that buffer counts and output targets match the topology.
    pub fn is_reconciled(&self) -> bool {
        let mut downstream: Option<&FilterStage> = None;
        for stage in self.stages.values().rev() {
            let ok = match downstream {
                None => stage.output == OutputTarget::Display && stage.buffers.is_empty(),
                Some(next) => {
                    stage.output == OutputTarget::Intermediate && stage.buffers.len() == next.num_inputs
                }
            };
            if !ok {
                return false;
            }
            downstream = Some(stage);
        }
        true
    }
}
