//! Image preprocessing: nearest-neighbour resize and per-channel
//! normalisation into a channel-interleaved `f32` tensor.
//!
//! The resize filter is part of the classification contract. Destination
//! pixel `(dx, dy)` samples the source pixel whose centre is closest to the
//! destination pixel centre:
//!
//! ```text
//! sx = min(((2 * dx + 1) * src_w) / (2 * side), src_w - 1)
//! ```
//!
//! computed in integer arithmetic, with the same rule for `sy`.

use super::config::{PipelineConfig, MAX_INPUT_SIDE};
use super::error::ClassifierError;
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb, Rgba};
use std::ops::Deref;

/// Read access to a decoded image as packed `0xAARRGGBB` words.
pub trait PixelSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Packed ARGB value of the pixel at `(x, y)`; callers stay in bounds.
    fn pixel(&self, x: u32, y: u32) -> u32;
}

#[inline]
fn pack_argb(a: u8, r: u8, g: u8, b: u8) -> u32 {
    (u32::from(a) << 24) | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

/// Owned bitmap stored as packed ARGB words in row-major order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl Bitmap {
    /// Wrap a row-major buffer of packed ARGB pixels.
    pub fn from_argb(width: u32, height: u32, pixels: Vec<u32>) -> Result<Self, ClassifierError> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(ClassifierError::InvalidImage(format!(
                "{}x{} bitmap needs {} pixels, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build an opaque bitmap from tightly packed RGB bytes.
    pub fn from_rgb_bytes(width: u32, height: u32, bytes: &[u8]) -> Result<Self, ClassifierError> {
        let pixels = bytes
            .chunks_exact(3)
            .map(|px| pack_argb(0xFF, px[0], px[1], px[2]))
            .collect();
        Self::checked_from_bytes(width, height, bytes.len(), 3, pixels)
    }

    /// Build a bitmap from tightly packed RGBA bytes.
    pub fn from_rgba_bytes(width: u32, height: u32, bytes: &[u8]) -> Result<Self, ClassifierError> {
        let pixels = bytes
            .chunks_exact(4)
            .map(|px| pack_argb(px[3], px[0], px[1], px[2]))
            .collect();
        Self::checked_from_bytes(width, height, bytes.len(), 4, pixels)
    }

    fn checked_from_bytes(
        width: u32,
        height: u32,
        byte_len: usize,
        stride: usize,
        pixels: Vec<u32>,
    ) -> Result<Self, ClassifierError> {
        if byte_len % stride != 0 {
            return Err(ClassifierError::InvalidImage(format!(
                "buffer of {} bytes is not a whole number of {}-byte pixels",
                byte_len, stride
            )));
        }
        Self::from_argb(width, height, pixels)
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }
}

impl PixelSource for Bitmap {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel(&self, x: u32, y: u32) -> u32 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }
}

impl PixelSource for DynamicImage {
    fn width(&self) -> u32 {
        GenericImageView::width(self)
    }

    fn height(&self) -> u32 {
        GenericImageView::height(self)
    }

    fn pixel(&self, x: u32, y: u32) -> u32 {
        let Rgba([r, g, b, a]) = self.get_pixel(x, y);
        pack_argb(a, r, g, b)
    }
}

impl<C> PixelSource for ImageBuffer<Rgb<u8>, C>
where
    C: Deref<Target = [u8]>,
{
    fn width(&self) -> u32 {
        ImageBuffer::width(self)
    }

    fn height(&self) -> u32 {
        ImageBuffer::height(self)
    }

    fn pixel(&self, x: u32, y: u32) -> u32 {
        let Rgb([r, g, b]) = *self.get_pixel(x, y);
        pack_argb(0xFF, r, g, b)
    }
}

impl<C> PixelSource for ImageBuffer<Rgba<u8>, C>
where
    C: Deref<Target = [u8]>,
{
    fn width(&self) -> u32 {
        ImageBuffer::width(self)
    }

    fn height(&self) -> u32 {
        ImageBuffer::height(self)
    }

    fn pixel(&self, x: u32, y: u32) -> u32 {
        let Rgba([r, g, b, a]) = *self.get_pixel(x, y);
        pack_argb(a, r, g, b)
    }
}

/// Flat model input: `side * side` pixels, each as R, G, B floats.
#[derive(Clone, Debug, PartialEq)]
pub struct InputTensor {
    side: u32,
    data: Vec<f32>,
}

impl InputTensor {
    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// NHWC shape with a batch dimension of one.
    pub fn shape(&self) -> [usize; 4] {
        let side = self.side as usize;
        [1, side, side, 3]
    }

    /// Raw buffer in native byte order, for engines that take bytes.
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        self.data.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }
}

/// Map destination coordinate `dst` on an axis of length `side` onto a
/// source axis of length `src`.
#[inline]
fn nearest_index(dst: u32, src: u32, side: u32) -> u32 {
    let scaled = (2 * u64::from(dst) + 1) * u64::from(src) / (2 * u64::from(side));
    (scaled as u32).min(src - 1)
}

/// Resize any pixel source to `side x side` with the nearest-neighbour rule
/// documented at module level.
pub fn resize_nearest<P: PixelSource + ?Sized>(image: &P, side: u32) -> Result<Bitmap, ClassifierError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(ClassifierError::InvalidImage(format!(
            "cannot resize a {}x{} image",
            width, height
        )));
    }
    if side == 0 || side > MAX_INPUT_SIDE {
        return Err(ClassifierError::InvalidConfig(format!(
            "input_side must be between 1 and {}, got {}",
            MAX_INPUT_SIDE, side
        )));
    }

    let columns: Vec<u32> = (0..side).map(|dx| nearest_index(dx, width, side)).collect();
    let mut pixels = Vec::with_capacity(side as usize * side as usize);
    for dy in 0..side {
        let sy = nearest_index(dy, height, side);
        pixels.extend(columns.iter().map(|&sx| image.pixel(sx, sy)));
    }

    Ok(Bitmap {
        width: side,
        height: side,
        pixels,
    })
}

/// Resize and normalise an image into a fresh [`InputTensor`].
///
/// Pixels are visited in row-major order and emitted as
/// `(channel - mean_offset) / std_scale` for R, G and B. Alpha is ignored.
pub fn preprocess<P: PixelSource + ?Sized>(
    image: &P,
    config: &PipelineConfig,
) -> Result<InputTensor, ClassifierError> {
    let resized = resize_nearest(image, config.input_side)?;
    let mean = config.mean_offset;
    let scale = config.std_scale;

    let mut data = Vec::with_capacity(config.tensor_len());
    for &argb in resized.pixels() {
        let r = ((argb >> 16) & 0xFF) as f32;
        let g = ((argb >> 8) & 0xFF) as f32;
        let b = (argb & 0xFF) as f32;
        data.push((r - mean) / scale);
        data.push((g - mean) / scale);
        data.push((b - mean) / scale);
    }

    Ok(InputTensor {
        side: config.input_side,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn gradient(width: u32, height: u32) -> Bitmap {
        let pixels = (0..height)
            .flat_map(|y| (0..width).map(move |x| pack_argb(0xFF, x as u8, y as u8, 7)))
            .collect();
        Bitmap::from_argb(width, height, pixels).unwrap()
    }

    #[test]
    fn identity_resize_keeps_pixels() {
        let image = gradient(4, 3);
        let resized = resize_nearest(&image, 4).unwrap();
        assert_eq!(resized.pixel(3, 0), image.pixel(3, 0));
        assert_eq!(resized.pixel(0, 2), image.pixel(0, 2));
        let square = gradient(5, 5);
        assert_eq!(resize_nearest(&square, 5).unwrap(), square);
    }

    #[test]
    fn downscale_samples_pixel_centres() {
        // 4 -> 2: destination 0 samples source 1, destination 1 samples source 3.
        let image = gradient(4, 4);
        let resized = resize_nearest(&image, 2).unwrap();
        assert_eq!(resized.pixel(0, 0), image.pixel(1, 1));
        assert_eq!(resized.pixel(1, 0), image.pixel(3, 1));
        assert_eq!(resized.pixel(1, 1), image.pixel(3, 3));
    }

    #[test]
    fn upscale_repeats_source_pixels() {
        let image = gradient(2, 1);
        let resized = resize_nearest(&image, 4).unwrap();
        let xs: Vec<u32> = (0..4).map(|x| (resized.pixel(x, 3) >> 16) & 0xFF).collect();
        assert_eq!(xs, vec![0, 0, 1, 1]);
    }

    #[test]
    fn normalizes_in_rgb_order_and_ignores_alpha() {
        let image = Bitmap::from_argb(1, 1, vec![0x10FF_8000]).unwrap();
        let tensor = preprocess(&image, &PipelineConfig::new(1)).unwrap();
        assert_eq!(tensor.as_slice(), &[1.0, 128.0 / 255.0, 0.0]);
    }

    #[test]
    fn applies_mean_and_scale() {
        let image = Bitmap::from_rgb_bytes(1, 1, &[255, 128, 0]).unwrap();
        let config = PipelineConfig::new(1).with_normalization(128.0, 128.0);
        let tensor = preprocess(&image, &config).unwrap();
        assert_eq!(tensor.as_slice(), &[0.9921875, 0.0, -1.0]);
    }

    #[test]
    fn oversized_side_is_rejected_before_allocating() {
        let image = gradient(2, 2);
        assert!(matches!(
            resize_nearest(&image, 100_000),
            Err(ClassifierError::InvalidConfig(_))
        ));
        assert!(matches!(
            preprocess(&image, &PipelineConfig::new(MAX_INPUT_SIDE + 1)),
            Err(ClassifierError::InvalidConfig(_))
        ));
    }

    #[test]
    fn tensor_length_and_shape_follow_input_side() {
        let image = gradient(13, 7);
        let tensor = preprocess(&image, &PipelineConfig::new(9)).unwrap();
        assert_eq!(tensor.len(), 3 * 9 * 9);
        assert_eq!(tensor.shape(), [1, 9, 9, 3]);
        assert_eq!(tensor.to_ne_bytes().len(), 4 * tensor.len());
    }

    #[test]
    fn image_crate_sources_match_bitmap() {
        let rgb = RgbImage::from_fn(3, 2, |x, y| Rgb([x as u8 * 40, y as u8 * 90, 5]));
        let bitmap = Bitmap::from_rgb_bytes(3, 2, rgb.as_raw()).unwrap();
        let dynamic = DynamicImage::ImageRgb8(rgb.clone());
        let config = PipelineConfig::new(4);
        let expected = preprocess(&bitmap, &config).unwrap();
        assert_eq!(preprocess(&rgb, &config).unwrap(), expected);
        assert_eq!(preprocess(&dynamic, &config).unwrap(), expected);
        assert_eq!(preprocess(&dynamic.to_rgba8(), &config).unwrap(), expected);
    }

    #[test]
    fn rejects_empty_images_and_bad_buffers() {
        let empty = Bitmap::from_argb(0, 5, Vec::new()).unwrap();
        assert!(matches!(
            preprocess(&empty, &PipelineConfig::new(4)),
            Err(ClassifierError::InvalidImage(_))
        ));
        assert!(Bitmap::from_argb(2, 2, vec![0; 3]).is_err());
        assert!(Bitmap::from_rgb_bytes(1, 1, &[1, 2]).is_err());
        assert!(Bitmap::from_rgba_bytes(1, 1, &[1, 2, 3, 4]).is_ok());
    }
}
