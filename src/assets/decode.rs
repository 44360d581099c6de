use anyhow::Context;

use crate::foundation::error::VoxreelResult;

/// Decode encoded image bytes into a straight-alpha dynamic image.
pub fn decode_image(bytes: &[u8]) -> VoxreelResult<image::DynamicImage> {
    let img = image::load_from_memory(bytes).context("decode image from memory")?;
    Ok(img)
}

/// Convert straight-alpha RGBA8 pixels to premultiplied form, in place.
pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}
