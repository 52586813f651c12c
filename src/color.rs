//! Packed wire colors.
//!
//! The scripting side sends colors as 0xAARRGGBB integers; everything
//! past the decoder works in `palette::Srgba<u8>`.

use palette::Srgba;

pub fn unpack_argb(packed: u32) -> Srgba<u8> {
    Srgba::new(
        (packed >> 16) as u8,
        (packed >> 8) as u8,
        packed as u8,
        (packed >> 24) as u8,
    )
}

pub fn pack_argb(color: Srgba<u8>) -> u32 {
    ((color.alpha as u32) << 24)
        | ((color.red as u32) << 16)
        | ((color.green as u32) << 8)
        | (color.blue as u32)
}

/// Scales the alpha channel of `color` by `alpha` (clamped to 0..=1).
pub fn scale_alpha(mut color: Srgba<u8>, alpha: f32) -> Srgba<u8> {
    let alpha = alpha.clamp(0., 1.);
    color.alpha = (color.alpha as f32 * alpha).round() as u8;
    color
}
