use std::collections::HashSet;

use vidcomp_core::Features;

/// Features reported by a driver of the given version and extension list.
///
/// Core versions imply the corresponding ARB extensions; packed YCbCr only exists as
/// the Mesa extension.
pub fn detect_features(major: u32, minor: u32, embedded: bool, extensions: &HashSet<String>) -> Features {
    let at_least = |maj: u32, min: u32| !embedded && (major, minor) >= (maj, min);
    let has = |name: &str| extensions.contains(name);

    let mut features = Features::empty();
    if at_least(2, 0) || has("GL_ARB_fragment_program") || has("GL_ARB_fragment_shader") {
        features |= Features::FRAGMENT_PROGRAM;
    }
    if at_least(3, 0) || has("GL_ARB_framebuffer_object") || has("GL_EXT_framebuffer_object") {
        features |= Features::FRAMEBUFFER_OBJECT;
    }
    if at_least(2, 1) || has("GL_ARB_pixel_buffer_object") {
        features |= Features::PIXEL_BUFFER;
    }
    if at_least(3, 1) || has("GL_ARB_texture_rectangle") || has("GL_NV_texture_rectangle") {
        features |= Features::RECT_TEXTURE;
    }
    if has("GL_MESA_ycbcr_texture") {
        features |= Features::YCBCR_TEXTURE;
    }
    if at_least(3, 2) || has("GL_ARB_sync") {
        features |= Features::FENCE;
    }
    features
}
