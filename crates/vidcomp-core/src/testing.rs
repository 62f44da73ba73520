//! A [`RenderContext`] that records calls instead of drawing.
//!
//! Used by unit tests across the workspace and by `vidcomp-contract-tests`. It tracks
//! every live object so tests can assert that nothing leaks and nothing is freed twice.

use std::collections::BTreeMap;

use crate::colourspace::ColourMatrix;
use crate::context::{
    DrawCall, FramebufferId, ProgramId, RenderContext, TextureDesc, TextureFilter, TextureId,
};
use crate::{Features, Rect, RectF, Size, VideoError};

#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub textures: Vec<TextureId>,
    pub target: Option<FramebufferId>,
    pub program: Option<ProgramId>,
    pub source: RectF,
    pub dest: RectF,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    MakeCurrent,
    DoneCurrent,
    SetFeatures(Features),
    SetFence,
    CreateTexture(TextureId, TextureDesc),
    CreateHelperTexture(TextureId),
    DeleteTexture(TextureId),
    SetTextureFilter(TextureId, TextureFilter),
    CreateFramebuffer(FramebufferId, TextureId),
    DeleteFramebuffer(FramebufferId),
    CreateProgram(ProgramId),
    DeleteProgram(ProgramId),
    BindFramebuffer(Option<FramebufferId>),
    SetViewport(Size),
    SetBackground([u8; 4]),
    Clear,
    DrawRect(Rect, [u8; 4]),
    SetFragmentParams(ProgramId, ColourMatrix),
    Draw(DrawRecord),
    UpdateTexture(TextureId),
}

#[derive(Debug)]
struct TextureState {
    desc: TextureDesc,
    filter: TextureFilter,
    buffer: Vec<u8>,
    uploads: usize,
}

#[derive(Debug, Default)]
struct Failures {
    textures_after: Option<usize>,
    framebuffers: bool,
    programs_containing: Vec<String>,
}

#[derive(Debug)]
pub struct RecordingContext {
    hardware: Features,
    negotiated: Option<Features>,
    next_id: u32,
    textures: BTreeMap<TextureId, TextureState>,
    framebuffers: BTreeMap<FramebufferId, TextureId>,
    programs: BTreeMap<ProgramId, String>,
    calls: Vec<GlCall>,
    invalid_deletes: usize,
    failures: Failures,
}

impl RecordingContext {
    /// A context whose driver reports `hardware`.
    pub fn new(hardware: Features) -> Self {
        Self {
            hardware,
            negotiated: None,
            next_id: 1,
            textures: BTreeMap::new(),
            framebuffers: BTreeMap::new(),
            programs: BTreeMap::new(),
            calls: Vec::new(),
            invalid_deletes: 0,
            failures: Failures::default(),
        }
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ---- failure injection ----

    /// Lets `n` more textures be created, then fails every further request.
    pub fn fail_textures_after(&mut self, n: usize) {
        self.failures.textures_after = Some(n);
    }

    pub fn fail_framebuffers(&mut self, fail: bool) {
        self.failures.framebuffers = fail;
    }

    /// Fails to compile any program whose source contains `needle`.
    pub fn fail_programs_containing(&mut self, needle: impl Into<String>) {
        self.failures.programs_containing.push(needle.into());
    }

    pub fn clear_failures(&mut self) {
        self.failures = Failures::default();
    }

    // ---- inspection ----

    pub fn calls(&self) -> &[GlCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn draws(&self) -> Vec<&DrawRecord> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                GlCall::Draw(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    /// Features last pushed with `set_features`.
    pub fn negotiated(&self) -> Option<Features> {
        self.negotiated
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Deletes of ids that were never created or already deleted.
    pub fn invalid_deletes(&self) -> usize {
        self.invalid_deletes
    }

    pub fn is_texture_live(&self, tex: TextureId) -> bool {
        self.textures.contains_key(&tex)
    }

    pub fn texture_desc(&self, tex: TextureId) -> Option<TextureDesc> {
        self.textures.get(&tex).map(|t| t.desc)
    }

    pub fn texture_filter(&self, tex: TextureId) -> Option<TextureFilter> {
        self.textures.get(&tex).map(|t| t.filter)
    }

    pub fn texture_contents(&self, tex: TextureId) -> Option<&[u8]> {
        self.textures.get(&tex).map(|t| t.buffer.as_slice())
    }

    /// Number of `update_texture` calls for `tex`.
    pub fn uploads(&self, tex: TextureId) -> usize {
        self.textures.get(&tex).map_or(0, |t| t.uploads)
    }

    pub fn framebuffer_texture(&self, fb: FramebufferId) -> Option<TextureId> {
        self.framebuffers.get(&fb).copied()
    }

    pub fn program_source(&self, program: ProgramId) -> Option<&str> {
        self.programs.get(&program).map(String::as_str)
    }

    pub fn program_sources(&self) -> Vec<&str> {
        self.programs.values().map(String::as_str).collect()
    }
}

impl RenderContext for RecordingContext {
    fn features(&self) -> Features {
        self.hardware
    }

    fn make_current(&mut self) {
        self.calls.push(GlCall::MakeCurrent);
    }

    fn done_current(&mut self) {
        self.calls.push(GlCall::DoneCurrent);
    }

    fn set_features(&mut self, features: Features) {
        self.negotiated = Some(features);
        self.calls.push(GlCall::SetFeatures(features));
    }

    fn set_fence(&mut self) {
        self.calls.push(GlCall::SetFence);
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, VideoError> {
        if let Some(left) = self.failures.textures_after.as_mut() {
            if *left == 0 {
                return Err(VideoError::alloc("injected texture failure"));
            }
            *left -= 1;
        }
        if desc.size.is_empty() {
            return Err(VideoError::alloc(format!(
                "texture size {}x{}",
                desc.size.width, desc.size.height
            )));
        }
        let id = TextureId(self.next());
        let len = desc.size.area() as usize * desc.format.bytes_per_pixel();
        self.textures.insert(
            id,
            TextureState {
                desc: *desc,
                filter: desc.filter,
                buffer: vec![0; len],
                uploads: 0,
            },
        );
        self.calls.push(GlCall::CreateTexture(id, *desc));
        Ok(id)
    }

    fn delete_texture(&mut self, tex: TextureId) {
        if self.textures.remove(&tex).is_none() {
            self.invalid_deletes += 1;
        }
        self.calls.push(GlCall::DeleteTexture(tex));
    }

    fn set_texture_filter(&mut self, tex: TextureId, filter: TextureFilter) {
        if let Some(t) = self.textures.get_mut(&tex) {
            t.filter = filter;
        }
        self.calls.push(GlCall::SetTextureFilter(tex, filter));
    }

    fn create_helper_texture(&mut self, weights: &[[f32; 4]]) -> Result<TextureId, VideoError> {
        if weights.is_empty() {
            return Err(VideoError::alloc("empty helper table"));
        }
        let desc = TextureDesc {
            size: Size::new(weights.len() as i32, 1),
            target: Default::default(),
            format: Default::default(),
            filter: TextureFilter::Linear,
            pixel_buffer: false,
        };
        let id = TextureId(self.next());
        self.textures.insert(
            id,
            TextureState {
                desc,
                filter: TextureFilter::Linear,
                buffer: Vec::new(),
                uploads: 1,
            },
        );
        self.calls.push(GlCall::CreateHelperTexture(id));
        Ok(id)
    }

    fn create_framebuffer(&mut self, tex: TextureId) -> Result<FramebufferId, VideoError> {
        if self.failures.framebuffers {
            return Err(VideoError::alloc("injected framebuffer failure"));
        }
        if !self.textures.contains_key(&tex) {
            return Err(VideoError::alloc(format!("framebuffer on dead texture {tex:?}")));
        }
        let id = FramebufferId(self.next());
        self.framebuffers.insert(id, tex);
        self.calls.push(GlCall::CreateFramebuffer(id, tex));
        Ok(id)
    }

    fn delete_framebuffer(&mut self, fb: FramebufferId) {
        if self.framebuffers.remove(&fb).is_none() {
            self.invalid_deletes += 1;
        }
        self.calls.push(GlCall::DeleteFramebuffer(fb));
    }

    fn create_fragment_program(&mut self, source: &str) -> Result<ProgramId, VideoError> {
        if let Some(needle) = self
            .failures
            .programs_containing
            .iter()
            .find(|n| source.contains(n.as_str()))
        {
            return Err(VideoError::FragmentCompile(format!("injected failure on '{needle}'")));
        }
        let id = ProgramId(self.next());
        self.programs.insert(id, source.to_owned());
        self.calls.push(GlCall::CreateProgram(id));
        Ok(id)
    }

    fn delete_fragment_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_none() {
            self.invalid_deletes += 1;
        }
        self.calls.push(GlCall::DeleteProgram(program));
    }

    fn bind_framebuffer(&mut self, fb: Option<FramebufferId>) {
        self.calls.push(GlCall::BindFramebuffer(fb));
    }

    fn set_viewport(&mut self, size: Size) {
        self.calls.push(GlCall::SetViewport(size));
    }

    fn set_background(&mut self, rgba: [u8; 4]) {
        self.calls.push(GlCall::SetBackground(rgba));
    }

    fn clear_framebuffer(&mut self) {
        self.calls.push(GlCall::Clear);
    }

    fn draw_rect(&mut self, rect: Rect, colour: [u8; 4]) {
        self.calls.push(GlCall::DrawRect(rect, colour));
    }

    fn set_fragment_params(&mut self, program: ProgramId, matrix: &ColourMatrix) {
        self.calls.push(GlCall::SetFragmentParams(program, *matrix));
    }

    fn draw_bitmap(&mut self, call: &DrawCall<'_>) {
        self.calls.push(GlCall::Draw(DrawRecord {
            textures: call.textures.to_vec(),
            target: call.target,
            program: call.program,
            source: call.source,
            dest: call.dest,
        }));
    }

    fn texture_buffer(&mut self, tex: TextureId) -> Option<&mut [u8]> {
        self.textures.get_mut(&tex).map(|t| t.buffer.as_mut_slice())
    }

    fn update_texture(&mut self, tex: TextureId) {
        if let Some(t) = self.textures.get_mut(&tex) {
            t.uploads += 1;
        }
        self.calls.push(GlCall::UpdateTexture(tex));
    }
}
