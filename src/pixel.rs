// pixel.rs — Packed-pixel channel accessors and luma conversion.
//
// A pixel is one 32-bit word with independent byte fields, low → high:
//
//   bits [0, 8)    red
//   bits [8, 16)   green
//   bits [16, 24)  blue
//   bits [24, 32)  alpha
//
// The accessors return u32 rather than u8 so they compose directly into
// the float arithmetic of the Sobel stage without a widening cast at every
// call site.

/// Largest representable channel value; also the kernel's saturation bound.
pub const MAX_CHANNEL: u32 = 255;

#[inline]
pub fn red_of(p: u32) -> u32 {
    p & 0xFF
}

#[inline]
pub fn green_of(p: u32) -> u32 {
    (p >> 8) & 0xFF
}

#[inline]
pub fn blue_of(p: u32) -> u32 {
    (p >> 16) & 0xFF
}

#[inline]
pub fn alpha_of(p: u32) -> u32 {
    (p >> 24) & 0xFF
}

/// ITU-R BT.601 luma of a packed pixel: 0.299*R + 0.587*G + 0.114*B.
/// Alpha is ignored.
#[inline]
pub fn luma_of(p: u32) -> f32 {
    0.299 * red_of(p) as f32 + 0.587 * green_of(p) as f32 + 0.114 * blue_of(p) as f32
}

/// Pack a gradient magnitude into a grayscale pixel: the value lands in the
/// red, green and blue fields, alpha is zero. The fields don't overlap, so
/// composing them is a plain bitwise OR.
#[inline]
pub fn pack_gray(mag: u32) -> u32 {
    debug_assert!(mag <= MAX_CHANNEL, "magnitude {mag} exceeds a channel byte");
    mag | (mag << 8) | (mag << 16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_extraction() {
        let p = 0x8040_2010u32; // A=0x80, B=0x40, G=0x20, R=0x10
        assert_eq!(red_of(p), 0x10);
        assert_eq!(green_of(p), 0x20);
        assert_eq!(blue_of(p), 0x40);
        assert_eq!(alpha_of(p), 0x80);
    }

    #[test]
    fn test_luma_weights() {
        // Pure channels carry exactly their weight.
        assert!((luma_of(0x0000_00FF) - 0.299 * 255.0).abs() < 1e-3);
        assert!((luma_of(0x0000_FF00) - 0.587 * 255.0).abs() < 1e-3);
        assert!((luma_of(0x00FF_0000) - 0.114 * 255.0).abs() < 1e-3);
        // White sums to ~255; alpha contributes nothing.
        assert!((luma_of(0x00FF_FFFF) - 255.0).abs() < 1e-3);
        assert_eq!(luma_of(0xFF00_0000), 0.0);
    }

    #[test]
    fn test_pack_gray() {
        assert_eq!(pack_gray(0), 0);
        assert_eq!(pack_gray(255), 0x00FF_FFFF);
        assert_eq!(pack_gray(0xAB), 0x00AB_ABAB);
        // Alpha field stays clear.
        assert_eq!(alpha_of(pack_gray(200)), 0);
    }
}
