// sobel.rs — CPU reference Sobel edge detection.
//
// Semantics mirror the GPU kernel in shaders/sobel.wgsl exactly: clamped
// neighbor sampling, BT.601 luma, the 3×3 Sobel pair, floor(sqrt) magnitude
// saturated to the channel maximum, grayscale-packed output. Keeping the
// two in lockstep is what makes the GPU agreement tests meaningful.
//
// Per output pixel (i, j), with L(x, y) the luma of the clamped sample:
//
//   Gx = (L(i+1,j-1) + 2*L(i+1,j) + L(i+1,j+1))
//      - (L(i-1,j-1) + 2*L(i-1,j) + L(i-1,j+1))
//   Gy = (L(i-1,j+1) + 2*L(i,j+1) + L(i+1,j+1))
//      - (L(i-1,j-1) + 2*L(i,j-1) + L(i+1,j-1))
//
// The center sample is never taken — the Sobel coefficients don't use it.

use crate::image::Image;
use crate::pixel::{luma_of, pack_gray, MAX_CHANNEL};

/// Sobel edge detection with the default channel maximum (255).
///
/// Returns a new image of identical dimensions and orientation; every
/// output word is a grayscale-packed gradient magnitude with alpha 0.
pub fn sobel(src: &Image) -> Image {
    sobel_clamped(src, MAX_CHANNEL)
}

/// Sobel edge detection with an explicit saturation bound.
pub fn sobel_clamped(src: &Image, max_value: u32) -> Image {
    let w = src.width();
    let h = src.height();

    // Clamp-to-edge sampling: out-of-range coordinates return the nearest
    // in-range pixel, matching the GPU texture addressing mode.
    let luma_at = |x: i64, y: i64| -> f32 {
        let cx = x.clamp(0, w as i64 - 1) as u32;
        let cy = y.clamp(0, h as i64 - 1) as u32;
        luma_of(src.get(cx, cy))
    };

    let mut out = vec![0u32; w as usize * h as usize];
    for j in 0..h as i64 {
        for i in 0..w as i64 {
            let tl = luma_at(i - 1, j - 1);
            let tm = luma_at(i, j - 1);
            let tr = luma_at(i + 1, j - 1);
            let ml = luma_at(i - 1, j);
            let mr = luma_at(i + 1, j);
            let bl = luma_at(i - 1, j + 1);
            let bm = luma_at(i, j + 1);
            let br = luma_at(i + 1, j + 1);

            let gx = (tr + 2.0 * mr + br) - (tl + 2.0 * ml + bl);
            let gy = (bl + 2.0 * bm + br) - (tl + 2.0 * tm + tr);

            // `as u32` truncates toward zero == floor for non-negative.
            let mag = ((gx * gx + gy * gy).sqrt() as u32).min(max_value);
            out[(j * w as i64 + i) as usize] = pack_gray(mag);
        }
    }

    Image::from_vec_oriented(w, h, src.is_transposed(), out)
}
