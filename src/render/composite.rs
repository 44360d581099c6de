use crate::{
    foundation::core::Canvas,
    foundation::error::{VoxreelError, VoxreelResult},
};

/// `(x * y + 127) / 255`, the rounding 8-bit multiply used by every blend here.
#[inline]
pub(crate) fn mul_div255(x: u16, y: u16) -> u16 {
    (x * y + 127) / 255
}

/// One frame of premultiplied RGBA8 pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    /// Row-major premultiplied RGBA8, `width * height * 4` bytes.
    pub data: Vec<u8>,
}

impl FrameRgba {
    /// An opaque black frame. Compositing opaque sources over an opaque base
    /// keeps every pixel opaque, so frames can stream to the encoder without
    /// a flatten pass.
    pub fn opaque_black(canvas: Canvas) -> Self {
        let mut data = vec![0u8; canvas.pixel_bytes()];
        for px in data.chunks_exact_mut(4) {
            px[3] = 255;
        }
        Self {
            width: canvas.width,
            height: canvas.height,
            data,
        }
    }
}

/// Source-over for premultiplied buffers of equal size:
/// `out = src + dst * (255 - src_a) / 255`.
pub fn over_premul(dst: &mut [u8], src: &[u8]) -> VoxreelResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(VoxreelError::render(
            "over_premul expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = s[3] as u16;
        if sa == 255 {
            d.copy_from_slice(s);
            continue;
        }
        if sa == 0 {
            continue;
        }
        let inv = 255 - sa;
        for c in 0..4 {
            d[c] = (s[c] as u16 + mul_div255(d[c] as u16, inv)).min(255) as u8;
        }
    }
    Ok(())
}

/// Source-over with the source uniformly attenuated by `alpha` first.
/// `alpha` is the crossfade ramp: 0 leaves `dst` untouched, 255 is a plain
/// over. Attenuating all four channels keeps the source premultiplied.
pub fn over_premul_faded(dst: &mut [u8], src: &[u8], alpha: u8) -> VoxreelResult<()> {
    if alpha == 255 {
        return over_premul(dst, src);
    }
    if alpha == 0 {
        return Ok(());
    }
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(VoxreelError::render(
            "over_premul_faded expects equal-length rgba8 buffers",
        ));
    }
    let fade = alpha as u16;
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = mul_div255(s[3] as u16, fade);
        if sa == 0 {
            continue;
        }
        let inv = 255 - sa;
        for c in 0..4 {
            let sc = mul_div255(s[c] as u16, fade);
            d[c] = (sc + mul_div255(d[c] as u16, inv)).min(255) as u8;
        }
    }
    Ok(())
}

/// Blend a premultiplied patch over the frame at `(px, py)`, clipping the
/// parts that fall outside the frame.
pub fn over_premul_patch(
    frame: &mut FrameRgba,
    patch: &[u8],
    patch_w: u32,
    patch_h: u32,
    px: i64,
    py: i64,
) -> VoxreelResult<()> {
    if patch.len() != patch_w as usize * patch_h as usize * 4 {
        return Err(VoxreelError::render(
            "over_premul_patch patch length mismatch",
        ));
    }
    let fw = frame.width as i64;
    let fh = frame.height as i64;

    for row in 0..patch_h as i64 {
        let fy = py + row;
        if fy < 0 || fy >= fh {
            continue;
        }
        for col in 0..patch_w as i64 {
            let fx = px + col;
            if fx < 0 || fx >= fw {
                continue;
            }
            let si = ((row * patch_w as i64 + col) * 4) as usize;
            let di = ((fy * fw + fx) * 4) as usize;
            let sa = patch[si + 3] as u16;
            if sa == 0 {
                continue;
            }
            let inv = 255 - sa;
            for c in 0..4 {
                frame.data[di + c] = (patch[si + c] as u16
                    + mul_div255(frame.data[di + c] as u16, inv))
                .min(255) as u8;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_black_is_fully_opaque() {
        let frame = FrameRgba::opaque_black(Canvas {
            width: 2,
            height: 2,
        });
        for px in frame.data.chunks_exact(4) {
            assert_eq!(px, [0, 0, 0, 255]);
        }
    }

    #[test]
    fn over_opaque_source_replaces_dst() {
        let mut dst = vec![10u8, 20, 30, 255];
        over_premul(&mut dst, &[1, 2, 3, 255]).unwrap();
        assert_eq!(dst, vec![1, 2, 3, 255]);
    }

    #[test]
    fn over_transparent_source_is_noop() {
        let mut dst = vec![10u8, 20, 30, 255];
        over_premul(&mut dst, &[0, 0, 0, 0]).unwrap();
        assert_eq!(dst, vec![10, 20, 30, 255]);
    }

    #[test]
    fn fade_zero_leaves_dst_and_fade_full_is_plain_over() {
        let mut a = vec![10u8, 20, 30, 255];
        over_premul_faded(&mut a, &[100, 100, 100, 255], 0).unwrap();
        assert_eq!(a, vec![10, 20, 30, 255]);

        let mut b = vec![10u8, 20, 30, 255];
        over_premul_faded(&mut b, &[100, 100, 100, 255], 255).unwrap();
        assert_eq!(b, vec![100, 100, 100, 255]);
    }

    #[test]
    fn half_fade_of_opaque_source_mixes_evenly() {
        // 50% of an opaque white over opaque black lands near mid-gray, and
        // an opaque dst stays opaque through a faded over.
        let mut dst = vec![0u8, 0, 0, 255];
        over_premul_faded(&mut dst, &[255, 255, 255, 255], 128).unwrap();
        assert!((125..=131).contains(&dst[0]), "got {}", dst[0]);
        assert_eq!(dst[3], 255);
    }

    #[test]
    fn patch_blend_clips_at_frame_edges() {
        let mut frame = FrameRgba::opaque_black(Canvas {
            width: 4,
            height: 4,
        });
        // 2x2 opaque white patch hanging off the top-left corner.
        let patch = vec![255u8; 2 * 2 * 4];
        over_premul_patch(&mut frame, &patch, 2, 2, -1, -1).unwrap();

        // Only pixel (0,0) receives the visible quarter of the patch.
        assert_eq!(&frame.data[0..4], &[255, 255, 255, 255]);
        assert_eq!(&frame.data[4..8], &[0, 0, 0, 255]);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut dst = vec![0u8; 8];
        assert!(over_premul(&mut dst, &[0u8; 4]).is_err());
        assert!(over_premul_faded(&mut dst, &[0u8; 4], 128).is_err());
    }
}
