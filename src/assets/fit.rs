use image::{DynamicImage, RgbaImage, imageops};

use crate::foundation::core::Canvas;

/// Fit an arbitrary-aspect image so it exactly fills `target` without
/// distortion: uniform scale on the limiting axis, then a center crop on the
/// other. The output is always `target.width x target.height`.
///
/// Degenerate sources (zero-sized) take a lossy non-uniform stretch fallback
/// instead of failing.
pub fn fit_to_fill(img: &DynamicImage, target: Canvas) -> RgbaImage {
    let (sw, sh) = (img.width(), img.height());
    if sw == 0 || sh == 0 {
        tracing::warn!(
            source_w = sw,
            source_h = sh,
            "degenerate image dimensions, stretching to target"
        );
        return stretch_to_target(img, target);
    }

    let source_ratio = f64::from(sw) / f64::from(sh);
    let target_ratio = f64::from(target.width) / f64::from(target.height);

    // Wider than the target: match heights and crop the sides. Taller or
    // equal: match widths and crop top/bottom. The `.max` guards round-down
    // on the scaled axis so the crop window always fits.
    let (scaled_w, scaled_h) = if source_ratio > target_ratio {
        let w = (f64::from(target.height) * source_ratio).round() as u32;
        (w.max(target.width), target.height)
    } else {
        let h = (f64::from(target.width) / source_ratio).round() as u32;
        (target.width, h.max(target.height))
    };

    let scaled = imageops::resize(
        &img.to_rgba8(),
        scaled_w,
        scaled_h,
        imageops::FilterType::CatmullRom,
    );
    let x0 = (scaled_w - target.width) / 2;
    let y0 = (scaled_h - target.height) / 2;
    imageops::crop_imm(&scaled, x0, y0, target.width, target.height).to_image()
}

fn stretch_to_target(img: &DynamicImage, target: Canvas) -> RgbaImage {
    if img.width() == 0 || img.height() == 0 {
        // Nothing to sample from; an opaque black slide keeps the timeline intact.
        return RgbaImage::from_pixel(target.width, target.height, image::Rgba([0, 0, 0, 255]));
    }
    imageops::resize(
        &img.to_rgba8(),
        target.width,
        target.height,
        imageops::FilterType::CatmullRom,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas(width: u32, height: u32) -> Canvas {
        Canvas { width, height }
    }

    fn gradient(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(w, h, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255])
        }))
    }

    #[test]
    fn output_always_matches_target() {
        for (w, h) in [(4000, 500), (500, 4000), (1920, 1080), (16, 9), (9, 16)] {
            let out = fit_to_fill(&gradient(w, h), canvas(1920, 1080));
            assert_eq!((out.width(), out.height()), (1920, 1080), "source {w}x{h}");
        }
    }

    #[test]
    fn wide_source_scales_by_height() {
        // 3840x1080 into 1920x1080: heights match, sides cropped. Uncropped
        // axis scale factor is target/source = 1.0, so rows are untouched.
        let src = gradient(3840, 1080);
        let out = fit_to_fill(&src, canvas(1920, 1080));
        assert_eq!(out.height(), 1080);
        // Center crop keeps the middle 1920 columns: column 0 of the output
        // maps to column 960 of the source.
        assert_eq!(out.get_pixel(0, 0)[0], src.to_rgba8().get_pixel(960, 0)[0]);
    }

    #[test]
    fn tall_source_scales_by_width() {
        // 1920x2160 into 1920x1080: widths match, top/bottom cropped.
        let src = gradient(1920, 2160);
        let out = fit_to_fill(&src, canvas(1920, 1080));
        assert_eq!(out.width(), 1920);
        assert_eq!(out.get_pixel(0, 0)[1], src.to_rgba8().get_pixel(0, 540)[1]);
    }

    #[test]
    fn equal_ratio_is_pure_scale() {
        let out = fit_to_fill(&gradient(960, 540), canvas(1920, 1080));
        assert_eq!((out.width(), out.height()), (1920, 1080));
    }

    #[test]
    fn square_into_landscape_crops_vertically() {
        let out = fit_to_fill(&gradient(1000, 1000), canvas(1920, 1080));
        assert_eq!((out.width(), out.height()), (1920, 1080));
    }
}
