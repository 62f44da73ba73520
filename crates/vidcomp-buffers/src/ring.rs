use vidcomp_core::{RenderContext, TextureId};

/// Textures holding the previous input frames, newest first.
///
/// Rotation hands the oldest texture back as the next upload target and moves the
/// current input to the front, so no pixel data is ever copied. Deinterlacers that
/// look at past frames may only run once `refs_needed` has counted down to zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceRing {
    slots: Vec<TextureId>,
    refs_needed: usize,
}

impl ReferenceRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `textures`. The ring is unusable until it has rotated once
    /// per slot.
    pub fn fill(&mut self, textures: Vec<TextureId>) {
        self.refs_needed = textures.len();
        self.slots = textures;
    }

    pub fn textures(&self) -> &[TextureId] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn refs_needed(&self) -> usize {
        self.refs_needed
    }

    /// Texture the next frame should be written to: the slot `rotate` will hand back
    /// as the input, or `current` when the ring does not rotate.
    pub fn upload_target(&self, current: TextureId) -> TextureId {
        match self.slots.last() {
            Some(&oldest) if self.slots.len() >= 2 => oldest,
            _ => current,
        }
    }

    /// Cycles `input` through the ring. Does nothing with fewer than two slots.
    pub fn rotate(&mut self, input: &mut TextureId) {
        let Some(&oldest) = self.slots.last() else {
            return;
        };
        if self.slots.len() < 2 {
            return;
        }
        self.refs_needed = self.refs_needed.saturating_sub(1);
        self.slots.rotate_right(1);
        self.slots[0] = std::mem::replace(input, oldest);
    }

    /// Deletes every slot and resets the countdown.
    pub fn clear<C: RenderContext + ?Sized>(&mut self, ctx: &mut C) {
        for tex in self.slots.drain(..) {
            ctx.delete_texture(tex);
        }
        self.refs_needed = 0;
    }
}
