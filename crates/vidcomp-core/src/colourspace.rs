//! YUV → RGB conversion matrix with user picture controls.
//!
//! The matrix is applied to `(Y, U, V, 1)` in normalised units, one row per output
//! channel, so the conversion shader only needs three dot products.

use std::f32::consts::PI;
use std::sync::Arc;

use bitflags::bitflags;
use glam::{Mat4, Vec4};
use parking_lot::Mutex;

/// Rows for R, G and B. Each row is dotted with `(Y, U, V, 1)`.
pub type ColourMatrix = [[f32; 4]; 3];

/// A colour space shared between the host (picture controls) and the compositor.
pub type SharedColourSpace = Arc<Mutex<ColourSpace>>;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PictureAttributes: u8 {
        const BRIGHTNESS = 1 << 0;
        const CONTRAST   = 1 << 1;
        const COLOUR     = 1 << 2;
        const HUE        = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PictureAttribute {
    Brightness,
    Contrast,
    Colour,
    Hue,
}

impl PictureAttribute {
    fn flag(self) -> PictureAttributes {
        match self {
            PictureAttribute::Brightness => PictureAttributes::BRIGHTNESS,
            PictureAttribute::Contrast => PictureAttributes::CONTRAST,
            PictureAttribute::Colour => PictureAttributes::COLOUR,
            PictureAttribute::Hue => PictureAttributes::HUE,
        }
    }
}

const NEUTRAL: i32 = 50;

// BT.601, limited ("studio") range.
const LUMA_OFFSET: f32 = 16.0 / 255.0;
const LUMA_SCALE: f32 = 255.0 / 219.0;
const CHROMA_SCALE: f32 = 255.0 / 224.0;
const KR: f32 = 0.299;
const KB: f32 = 0.114;

/// Picture controls (each 0–100, 50 is neutral) and the matrix derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct ColourSpace {
    brightness: i32,
    contrast: i32,
    colour: i32,
    hue: i32,
    supported: PictureAttributes,
}

impl Default for ColourSpace {
    fn default() -> Self {
        Self {
            brightness: NEUTRAL,
            contrast: NEUTRAL,
            colour: NEUTRAL,
            hue: NEUTRAL,
            supported: PictureAttributes::all(),
        }
    }
}

fn from_rows(rows: [[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols_array_2d(&rows).transpose()
}

impl ColourSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedColourSpace {
        Arc::new(Mutex::new(self))
    }

    pub fn supported_attributes(&self) -> PictureAttributes {
        self.supported
    }

    /// Restricts which controls the host may change. The compositor clears the set
    /// when conversion happens outside the shader pipeline.
    pub fn set_supported_attributes(&mut self, supported: PictureAttributes) {
        self.supported = supported;
    }

    pub fn attribute(&self, attr: PictureAttribute) -> i32 {
        match attr {
            PictureAttribute::Brightness => self.brightness,
            PictureAttribute::Contrast => self.contrast,
            PictureAttribute::Colour => self.colour,
            PictureAttribute::Hue => self.hue,
        }
    }

    /// Sets a control, clamped to 0–100. Returns the stored value, or `None` when
    /// the attribute is not currently supported.
    pub fn set_attribute(&mut self, attr: PictureAttribute, value: i32) -> Option<i32> {
        if !self.supported.contains(attr.flag()) {
            return None;
        }
        let value = value.clamp(0, 100);
        match attr {
            PictureAttribute::Brightness => self.brightness = value,
            PictureAttribute::Contrast => self.contrast = value,
            PictureAttribute::Colour => self.colour = value,
            PictureAttribute::Hue => self.hue = value,
        }
        Some(value)
    }

    fn transform(&self) -> Mat4 {
        let offset = from_rows([
            [1.0, 0.0, 0.0, -LUMA_OFFSET],
            [0.0, 1.0, 0.0, -0.5],
            [0.0, 0.0, 1.0, -0.5],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let scale = Mat4::from_diagonal(Vec4::new(LUMA_SCALE, CHROMA_SCALE, CHROMA_SCALE, 1.0));

        let saturation = self.colour as f32 / NEUTRAL as f32;
        let angle = (self.hue - NEUTRAL) as f32 / NEUTRAL as f32 * PI;
        let (sin, cos) = angle.sin_cos();
        let hue = from_rows([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, cos * saturation, -sin * saturation, 0.0],
            [0.0, sin * saturation, cos * saturation, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);

        let contrast = self.contrast as f32 / NEUTRAL as f32;
        let brightness = (self.brightness - NEUTRAL) as f32 / 100.0;
        let levels = from_rows([
            [contrast, 0.0, 0.0, brightness],
            [0.0, contrast, 0.0, 0.0],
            [0.0, 0.0, contrast, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);

        let kg = 1.0 - KR - KB;
        let conv = from_rows([
            [1.0, 0.0, 2.0 * (1.0 - KR), 0.0],
            [
                1.0,
                -2.0 * (1.0 - KB) * KB / kg,
                -2.0 * (1.0 - KR) * KR / kg,
                0.0,
            ],
            [1.0, 2.0 * (1.0 - KB), 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);

        conv * levels * hue * scale * offset
    }

    /// Current conversion matrix.
    pub fn matrix(&self) -> ColourMatrix {
        let m = self.transform();
        [
            m.row(0).to_array(),
            m.row(1).to_array(),
            m.row(2).to_array(),
        ]
    }
}
