//! CPU side of the frame upload: validating decoded frames and laying them out in the
//! input texture's staging buffer.
//!
//! With a `YuvToRgb` stage the planes are only repacked and the shader does the colour
//! maths. Without one the conversion happens here.

use vidcomp_core::{Size, VideoError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Planar 4:2:0: Y, then U and V at half resolution.
    Yv12,
    /// Packed RGBA from a hardware decoder.
    Rgba32,
}

/// A decoded frame as delivered by the decoder. Planes are located by byte offset and
/// row pitch within `buf`.
#[derive(Debug, Clone, Copy)]
pub struct VideoFrame<'a> {
    pub buf: &'a [u8],
    /// Y, U, V for [`PixelFormat::Yv12`]; only the first is used for RGBA.
    pub offsets: [usize; 3],
    pub pitches: [usize; 3],
    pub width: i32,
    pub height: i32,
    pub format: PixelFormat,
    pub interlaced: bool,
}

impl VideoFrame<'_> {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    fn chroma_size(&self) -> (usize, usize) {
        (
            (self.width as usize + 1) / 2,
            (self.height as usize + 1) / 2,
        )
    }

    fn plane(&self, i: usize, row: usize) -> &[u8] {
        let start = self.offsets[i] + row * self.pitches[i];
        &self.buf[start..]
    }
}

fn mismatch(msg: impl Into<String>) -> VideoError {
    VideoError::InputMismatch(msg.into())
}

fn plane_fits(buf_len: usize, offset: usize, pitch: usize, row_bytes: usize, rows: usize) -> bool {
    if pitch < row_bytes {
        return false;
    }
    rows.checked_sub(1)
        .and_then(|last| pitch.checked_mul(last))
        .and_then(|n| n.checked_add(offset))
        .and_then(|n| n.checked_add(row_bytes))
        .is_some_and(|end| end <= buf_len)
}

/// Checks that `frame` matches the configured input and that every plane lies inside
/// its buffer.
pub fn check_frame(frame: &VideoFrame<'_>, expected: Size, rgba_allowed: bool) -> Result<(), VideoError> {
    if frame.size() != expected || frame.size().is_empty() {
        return Err(mismatch(format!(
            "frame is {}x{}, input is {}x{}",
            frame.width, frame.height, expected.width, expected.height
        )));
    }
    let (w, h) = (frame.width as usize, frame.height as usize);
    let len = frame.buf.len();
    let ok = match frame.format {
        PixelFormat::Yv12 => {
            let (cw, ch) = frame.chroma_size();
            plane_fits(len, frame.offsets[0], frame.pitches[0], w, h)
                && plane_fits(len, frame.offsets[1], frame.pitches[1], cw, ch)
                && plane_fits(len, frame.offsets[2], frame.pitches[2], cw, ch)
        }
        PixelFormat::Rgba32 if rgba_allowed => {
            plane_fits(len, frame.offsets[0], frame.pitches[0], w * 4, h)
        }
        PixelFormat::Rgba32 => return Err(mismatch("RGBA frames need a hardware-decoded input")),
    };
    if ok {
        Ok(())
    } else {
        Err(mismatch("plane layout exceeds the frame buffer"))
    }
}

fn check_dst(dst: &[u8], stride: usize, size: Size, bpp: usize) -> Result<(), VideoError> {
    let (w, h) = (size.width as usize, size.height as usize);
    if plane_fits(dst.len(), 0, stride, w * bpp, h) {
        Ok(())
    } else {
        Err(mismatch(format!(
            "staging buffer of {} bytes is too small for {}x{}",
            dst.len(),
            size.width,
            size.height
        )))
    }
}

/// Chroma row for luma row `y` of an interlaced frame: each field keeps its own chroma.
pub fn interlaced_chroma_row(y: usize, chroma_height: usize) -> usize {
    (((y >> 2) << 1) + (y & 1)).min(chroma_height.saturating_sub(1))
}

fn pack_yv12(
    frame: &VideoFrame<'_>,
    dst: &mut [u8],
    stride: usize,
    chroma_row: impl Fn(usize) -> usize,
) -> Result<(), VideoError> {
    check_dst(dst, stride, frame.size(), 4)?;
    let w = frame.width as usize;
    for y in 0..frame.height as usize {
        let cy = chroma_row(y);
        let (luma, u, v) = (frame.plane(0, y), frame.plane(1, cy), frame.plane(2, cy));
        let row = &mut dst[y * stride..y * stride + w * 4];
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            px.copy_from_slice(&[luma[x], u[x / 2], v[x / 2], 0xff]);
        }
    }
    Ok(())
}

/// Repacks planar YV12 into one `Y U V A` texel per pixel.
pub fn pack_yv12_alpha(frame: &VideoFrame<'_>, dst: &mut [u8], stride: usize) -> Result<(), VideoError> {
    pack_yv12(frame, dst, stride, |y| y / 2)
}

/// Like [`pack_yv12_alpha`], but never mixes chroma from the two fields.
pub fn pack_yv12_interlaced(frame: &VideoFrame<'_>, dst: &mut [u8], stride: usize) -> Result<(), VideoError> {
    let (_, ch) = frame.chroma_size();
    pack_yv12(frame, dst, stride, |y| interlaced_chroma_row(y, ch))
}

/// BT.601 limited range, 8.8 fixed point.
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = 298 * (i32::from(y) - 16);
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;
    let clamp = |n: i32| ((n + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(c + 409 * e),
        clamp(c - 100 * d - 208 * e),
        clamp(c + 516 * d),
    ]
}

/// Software conversion to RGBA for pipelines without a conversion program.
pub fn yv12_to_rgba(frame: &VideoFrame<'_>, dst: &mut [u8], stride: usize) -> Result<(), VideoError> {
    check_dst(dst, stride, frame.size(), 4)?;
    let w = frame.width as usize;
    for y in 0..frame.height as usize {
        let (luma, u, v) = (frame.plane(0, y), frame.plane(1, y / 2), frame.plane(2, y / 2));
        let row = &mut dst[y * stride..y * stride + w * 4];
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let [r, g, b] = yuv_to_rgb(luma[x], u[x / 2], v[x / 2]);
            px.copy_from_slice(&[r, g, b, 0xff]);
        }
    }
    Ok(())
}

/// Software repack to UYVY for packed-YCbCr textures. An odd last column repeats its
/// luma sample.
pub fn yv12_to_uyvy(frame: &VideoFrame<'_>, dst: &mut [u8], stride: usize) -> Result<(), VideoError> {
    check_dst(dst, stride, frame.size(), 2)?;
    let w = frame.width as usize;
    let pairs = (w + 1) / 2;
    if stride < pairs * 4 {
        return Err(mismatch("staging row too short for UYVY"));
    }
    for y in 0..frame.height as usize {
        let (luma, u, v) = (frame.plane(0, y), frame.plane(1, y / 2), frame.plane(2, y / 2));
        let row = &mut dst[y * stride..y * stride + pairs * 4];
        for (i, quad) in row.chunks_exact_mut(4).enumerate() {
            let y0 = luma[2 * i];
            let y1 = if 2 * i + 1 < w { luma[2 * i + 1] } else { y0 };
            quad.copy_from_slice(&[u[i], y0, v[i], y1]);
        }
    }
    Ok(())
}

/// Row copy for frames that are already RGBA.
pub fn copy_rgba(frame: &VideoFrame<'_>, dst: &mut [u8], stride: usize) -> Result<(), VideoError> {
    check_dst(dst, stride, frame.size(), 4)?;
    let row_bytes = frame.width as usize * 4;
    for y in 0..frame.height as usize {
        dst[y * stride..y * stride + row_bytes].copy_from_slice(&frame.plane(0, y)[..row_bytes]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 4x4 YV12 frame: luma counts up from 0, U rows are 100/101, V rows 200/201.
    fn yv12() -> Vec<u8> {
        let mut buf: Vec<u8> = (0..16).collect();
        buf.extend([100, 100, 101, 101]);
        buf.extend([200, 200, 201, 201]);
        buf
    }

    fn frame(buf: &[u8], interlaced: bool) -> VideoFrame<'_> {
        VideoFrame {
            buf,
            offsets: [0, 16, 20],
            pitches: [4, 2, 2],
            width: 4,
            height: 4,
            format: PixelFormat::Yv12,
            interlaced,
        }
    }

    #[test]
    fn frame_validation() {
        let buf = yv12();
        let f = frame(&buf, false);
        assert!(check_frame(&f, Size::new(4, 4), false).is_ok());
        assert!(check_frame(&f, Size::new(4, 2), false).is_err());

        let short = &buf[..23];
        assert!(check_frame(&frame(short, false), Size::new(4, 4), false).is_err());

        let rgba = VideoFrame {
            format: PixelFormat::Rgba32,
            ..f
        };
        assert!(matches!(
            check_frame(&rgba, Size::new(4, 4), false),
            Err(VideoError::InputMismatch(_))
        ));
    }

    #[test]
    fn progressive_pack_shares_chroma_between_row_pairs() {
        let buf = yv12();
        let mut dst = vec![0u8; 8 * 4 * 4];
        pack_yv12_alpha(&frame(&buf, false), &mut dst, 8 * 4).expect("pack");
        assert_eq!(&dst[0..8], &[0, 100, 200, 255, 1, 100, 200, 255]);
        let row1 = 8 * 4;
        assert_eq!(&dst[row1..row1 + 4], &[4, 100, 200, 255]);
        let row2 = 2 * 8 * 4;
        assert_eq!(&dst[row2..row2 + 4], &[8, 101, 201, 255]);
        // Padding past the frame width is left alone.
        assert_eq!(&dst[16..20], &[0, 0, 0, 0]);
    }

    #[test]
    fn interlaced_pack_keeps_fields_apart() {
        let rows: Vec<_> = (0..8).map(|y| interlaced_chroma_row(y, 4)).collect();
        assert_eq!(rows, vec![0, 1, 0, 1, 2, 3, 2, 3]);
        assert_eq!(interlaced_chroma_row(7, 3), 2);

        let buf = yv12();
        let mut dst = vec![0u8; 4 * 4 * 4];
        pack_yv12_interlaced(&frame(&buf, true), &mut dst, 16).expect("pack");
        // Line 1 is the bottom field and takes chroma row 1.
        assert_eq!(&dst[16..20], &[4, 101, 201, 255]);
        assert_eq!(&dst[32..36], &[8, 100, 200, 255]);
    }

    #[test]
    fn software_conversion_hits_reference_colours() {
        assert_eq!(yuv_to_rgb(16, 128, 128), [0, 0, 0]);
        assert_eq!(yuv_to_rgb(235, 128, 128), [255, 255, 255]);
        let [r, g, b] = yuv_to_rgb(81, 90, 240);
        assert!(r > 250 && g < 5 && b < 5, "{r} {g} {b}");
    }

    #[test]
    fn uyvy_packs_pairs() {
        let buf = yv12();
        let mut dst = vec![0u8; 4 * 2 * 4];
        yv12_to_uyvy(&frame(&buf, false), &mut dst, 8).expect("pack");
        assert_eq!(&dst[0..8], &[100, 0, 200, 1, 100, 2, 200, 3]);
    }

    #[test]
    fn small_staging_buffer_is_rejected() {
        let buf = yv12();
        let mut dst = vec![0u8; 10];
        assert!(pack_yv12_alpha(&frame(&buf, false), &mut dst, 16).is_err());
        assert!(yv12_to_rgba(&frame(&buf, false), &mut dst, 16).is_err());
    }

    #[test]
    fn rgba_rows_are_copied_at_stride() {
        let src: Vec<u8> = (0..32).collect();
        let f = VideoFrame {
            buf: &src,
            offsets: [0; 3],
            pitches: [16, 0, 0],
            width: 4,
            height: 2,
            format: PixelFormat::Rgba32,
            interlaced: false,
        };
        assert!(check_frame(&f, Size::new(4, 2), true).is_ok());
        let mut dst = vec![0u8; 2 * 32];
        copy_rgba(&f, &mut dst, 32).expect("copy");
        assert_eq!(&dst[32..48], &src[16..32]);
    }
}
