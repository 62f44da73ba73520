use serde::{Deserialize, Serialize};

use crate::VideoError;

/// Decoders pad 1080-line video to 1088 lines; the padding is never shown.
const PADDED_HEIGHT: i32 = 1088;
const BROADCAST_HEIGHT: i32 = 1080;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn area(self) -> i64 {
        self.width as i64 * self.height as i64
    }

    pub fn is_empty(self) -> bool {
        self.width < 1 || self.height < 1
    }

    /// Component-wise maximum.
    pub fn max(self, other: Size) -> Size {
        Size::new(self.width.max(other.width), self.height.max(other.height))
    }
}

/// Integer rectangle: origin plus extent, `y` growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }
}

/// Floating point rectangle stored as edges. `top` may be greater than `bottom`
/// (vertically flipped rectangles are how the first stage corrects orientation).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectF {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RectF {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Moves each edge by the given delta.
    pub fn adjusted(&self, dl: f32, dt: f32, dr: f32, db: f32) -> RectF {
        RectF::new(
            self.left + dl,
            self.top + dt,
            self.right + dr,
            self.bottom + db,
        )
    }

    pub fn shifted_y(&self, dy: f32) -> RectF {
        self.adjusted(0.0, dy, 0.0, dy)
    }

    /// Truncates each edge, like an integer cast.
    pub fn to_rect(&self) -> Rect {
        Rect::new(
            self.left as i32,
            self.top as i32,
            self.width() as i32,
            self.height() as i32,
        )
    }
}

impl From<Rect> for RectF {
    fn from(r: Rect) -> Self {
        RectF::new(
            r.left() as f32,
            r.top() as f32,
            r.right() as f32,
            r.bottom() as f32,
        )
    }
}

/// Where the video comes from and where it goes on screen.
///
/// `video_size` is the decoded frame size as delivered upstream; all display maths use
/// [`VideoGeometry::working_size`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoGeometry {
    /// Decoded frame size.
    pub video_size: Size,
    /// Bounding rectangle of the output window.
    pub display_visible_rect: Rect,
    /// Area of the window the video is scaled into.
    pub display_video_rect: Rect,
    /// Part of the decoded frame that is shown (crop / overscan).
    pub video_rect: Rect,
}

impl VideoGeometry {
    /// Frame size used for display maths: 1088 lines are treated as 1080.
    pub fn working_size(&self) -> Size {
        let mut s = self.video_size;
        if s.height == PADDED_HEIGHT {
            s.height = BROADCAST_HEIGHT;
        }
        s
    }

    /// Full-frame rectangle of the intermediate framebuffers.
    pub fn framebuffer_rect(&self) -> Rect {
        Rect::from_size(self.working_size())
    }

    pub fn validate(&self) -> Result<(), VideoError> {
        if self.video_size.is_empty() {
            return Err(VideoError::other(format!(
                "video size must be positive, got {}x{}",
                self.video_size.width, self.video_size.height
            )));
        }
        if self.display_visible_rect.size().is_empty() {
            return Err(VideoError::other("display visible rect is empty"));
        }
        Ok(())
    }
}
