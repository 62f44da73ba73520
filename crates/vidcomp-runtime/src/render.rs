//! Per-stage rectangle and program maths for the compositor.
//!
//! Source rectangles are in texels of the sampled texture; the backend normalises
//! them. Destination rectangles are in viewport units.

use vidcomp_core::{Rect, RectF, ScanType};

/// Debug border colour (RGBA).
pub const BORDER_COLOUR: [u8; 4] = [127, 0, 0, 255];
/// Border width on each side of the destination.
pub const BORDER_WIDTH: f32 = 10.0;

/// Restricts `rect` to one field for software bob.
///
/// `sample_height` is the full frame height being sampled and `working_height` the
/// display height. `flipped` is true when the stage drawing this rectangle is also
/// the first (vertically inverted) stage. Progressive scans are returned unchanged.
pub fn field_sample_rect(
    rect: RectF,
    sample_height: f32,
    working_height: f32,
    scan: ScanType,
    top_field_first: bool,
    flipped: bool,
) -> RectF {
    let top = (scan == ScanType::SecondField && top_field_first)
        || (scan == ScanType::Interlaced && !top_field_first);
    let bottom = (scan == ScanType::Interlaced && top_field_first)
        || (scan == ScanType::SecondField && !top_field_first);
    if working_height <= 0.0 {
        return rect;
    }
    let bob = sample_height / working_height / 4.0;

    let mut r = rect;
    if (top && !flipped) || (bottom && flipped) {
        r = RectF::new(r.left, r.top / 2.0, r.right, r.bottom / 2.0).shifted_y(bob);
    }
    if (bottom && !flipped) || (top && flipped) {
        let half = sample_height / 2.0;
        r = RectF::new(r.left, half + r.top / 2.0, r.right, half + r.bottom / 2.0).shifted_y(-bob);
    }
    r
}

/// Vertical shift of the display quad under hardware bob, so the two fields of a
/// frame land on alternate lines.
pub fn hardware_bob_offset(display_height: i32, crop_height: i32, scan: ScanType, top_field_first: bool) -> f32 {
    if crop_height <= 0 {
        return 0.0;
    }
    let bob = display_height as f32 / crop_height as f32 / 2.0;
    let field = if scan == ScanType::Interlaced { -1.0 } else { 1.0 };
    bob * if top_field_first { field } else { -field }
}

/// Destination quad for a stage. The first stage is drawn upside down within
/// `visible_height` to undo the texture/viewport orientation difference.
pub fn dest_rect(area: Rect, visible_height: i32, flip: bool, bob: f32) -> RectF {
    let mut r = RectF::from(area);
    if flip {
        r.top = (visible_height - area.top()) as f32;
        r.bottom = r.top - area.height as f32;
    }
    r.shifted_y(bob)
}

/// Index into a conversion stage's programs: 0 is progressive, 1 and 2 are the field
/// variants, usable once the reference ring is primed.
pub fn select_program(
    programs: usize,
    hardware_deinterlacing: bool,
    refs_needed: usize,
    scan: ScanType,
    top_field_first: bool,
) -> usize {
    if !hardware_deinterlacing || programs != 3 || refs_needed > 0 || !scan.is_interlaced() {
        return 0;
    }
    // The first field is the top one exactly when the frame is top field first.
    if (scan == ScanType::Interlaced) == top_field_first {
        1
    } else {
        2
    }
}

/// Rectangle of the debug border around `dest`.
pub fn border_rect(dest: RectF) -> Rect {
    dest.adjusted(-BORDER_WIDTH, -BORDER_WIDTH, BORDER_WIDTH, BORDER_WIDTH)
        .to_rect()
}
