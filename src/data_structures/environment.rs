//! Equirectangular environment maps.
//!
//! HDR texels are kept as 32-bit floats on the CPU and packed into the shared
//! exponent `Rgb9e5Ufloat` format for upload. That format is filterable on
//! every backend including WebGL2, which 32-bit float textures are not.

use image::{Rgb32FImage, imageops::FilterType};

/// Largest value representable in RGB9E5: `(2^9 - 1) / 2^9 * 2^(31 - 15)`.
pub const RGB9E5_MAX: f32 = 65408.0;
const MANTISSA_BITS: i32 = 9;
const EXP_BIAS: i32 = 15;

#[derive(Clone, Debug)]
pub struct EnvironmentMap {
    pub name: String,
    pub image: Rgb32FImage,
}

impl EnvironmentMap {
    pub fn new(name: &str, image: Rgb32FImage) -> Self {
        Self {
            name: name.to_string(),
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Downscale (keeping the 2:1 layout) until both sides fit `max_dimension`.
    pub fn fit_within(&self, max_dimension: u32) -> Option<Self> {
        let (width, height) = (self.width(), self.height());
        if width <= max_dimension && height <= max_dimension {
            return None;
        }
        let scale = max_dimension as f64 / width.max(height) as f64;
        let new_width = ((width as f64 * scale).floor() as u32).max(1);
        let new_height = ((height as f64 * scale).floor() as u32).max(1);
        log::info!(
            "Downscaling environment {} from {}x{} to {}x{}",
            self.name,
            width,
            height,
            new_width,
            new_height
        );
        let image = image::imageops::resize(&self.image, new_width, new_height, FilterType::Triangle);
        Some(Self::new(&self.name, image))
    }

    pub fn to_rgb9e5(&self) -> Vec<u32> {
        self.image
            .pixels()
            .map(|pixel| pack_rgb9e5(pixel.0))
            .collect()
    }
}

/// Pack a linear RGB triple into the RGB9E5 shared exponent layout.
///
/// Negative and NaN channels become zero, large ones saturate at [`RGB9E5_MAX`].
pub fn pack_rgb9e5([r, g, b]: [f32; 3]) -> u32 {
    let clamp = |c: f32| if c.is_nan() { 0.0 } else { c.clamp(0.0, RGB9E5_MAX) };
    let (r, g, b) = (clamp(r), clamp(g), clamp(b));
    let max_channel = r.max(g).max(b);

    let mut exp_shared = (max_channel.log2().floor() as i32).max(-EXP_BIAS - 1) + 1 + EXP_BIAS;
    let mut denom = 2.0_f32.powi(exp_shared - EXP_BIAS - MANTISSA_BITS);
    let max_mantissa = (max_channel / denom + 0.5).floor() as i32;
    if max_mantissa == 1 << MANTISSA_BITS {
        denom *= 2.0;
        exp_shared += 1;
    }

    let mantissa = |c: f32| ((c / denom + 0.5).floor() as u32).min((1 << MANTISSA_BITS) - 1);
    mantissa(r) | (mantissa(g) << 9) | (mantissa(b) << 18) | ((exp_shared as u32) << 27)
}

pub fn unpack_rgb9e5(packed: u32) -> [f32; 3] {
    let exponent = (packed >> 27) as i32 - EXP_BIAS - MANTISSA_BITS;
    let scale = 2.0_f32.powi(exponent);
    [
        (packed & 0x1ff) as f32 * scale,
        ((packed >> 9) & 0x1ff) as f32 * scale,
        ((packed >> 18) & 0x1ff) as f32 * scale,
    ]
}
