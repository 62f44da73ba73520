use vidcomp_core::{FilterKind, FramebufferId, OutputTarget, ProgramId, RenderContext, TextureId};

/// One processing step and every GPU object it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStage {
    pub kind: FilterKind,
    /// Base program first, then the per-field deinterlacer variants.
    pub programs: Vec<ProgramId>,
    /// Render targets consumed by the next stage.
    pub buffers: Vec<(FramebufferId, TextureId)>,
    pub output: OutputTarget,
    pub num_inputs: usize,
    /// Bicubic weight table.
    pub helper: Option<TextureId>,
}

impl FilterStage {
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            programs: Vec::new(),
            buffers: Vec::new(),
            output: OutputTarget::Display,
            num_inputs: kind.required_inputs(),
            helper: None,
        }
    }

    pub fn buffer_textures(&self) -> Vec<TextureId> {
        self.buffers.iter().map(|&(_, tex)| tex).collect()
    }

    /// First framebuffer, the one the stage draws into when its output is intermediate.
    pub fn target(&self) -> Option<FramebufferId> {
        self.buffers.first().map(|&(fb, _)| fb)
    }

    /// Deletes everything the stage owns.
    pub fn release<C: RenderContext + ?Sized>(self, ctx: &mut C) {
        for program in self.programs {
            ctx.delete_fragment_program(program);
        }
        for (fb, tex) in self.buffers {
            ctx.delete_framebuffer(fb);
            ctx.delete_texture(tex);
        }
        if let Some(helper) = self.helper {
            ctx.delete_texture(helper);
        }
    }
}
