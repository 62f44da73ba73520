#![forbid(unsafe_code)]

//! Texture ownership for the compositor: the input/framebuffer allocation policy and
//! the ring of reference frames used by temporal deinterlacers.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

mod allocator;
mod ring;

pub use allocator::{InputTextureMode, TextureAllocator};
pub use ring::ReferenceRing;
