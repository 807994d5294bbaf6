//! Per-split image transforms
//!
//! The train split gets a random resized crop and independent horizontal and
//! vertical flips; valid/test get a deterministic shortest-side resize
//! followed by a center crop. Both produce square RGB images at the model
//! input size; normalization happens later (in the batcher, or inline in the
//! predictor).

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};
use rand::Rng;

/// Random augmentation applied to training images
///
/// A random area/aspect crop (scale 0.08-1.0, ratio 3/4-4/3) resized to the
/// target side, then a 50% horizontal flip and a 50% vertical flip.
#[derive(Debug, Clone)]
pub struct TrainTransform {
    size: u32,
}

impl TrainTransform {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    /// Output side length
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn apply<R: Rng>(&self, img: &DynamicImage, rng: &mut R) -> RgbImage {
        let mut out = random_resized_crop(img, self.size, rng);
        if rng.gen_bool(0.5) {
            out = out.fliph();
        }
        if rng.gen_bool(0.5) {
            out = out.flipv();
        }
        out.to_rgb8()
    }
}

/// Deterministic preprocessing applied to validation/test images
#[derive(Debug, Clone)]
pub struct EvalTransform {
    resize: u32,
    crop: u32,
}

impl EvalTransform {
    pub fn new(resize: u32, crop: u32) -> Self {
        Self { resize, crop }
    }

    /// Output side length
    pub fn size(&self) -> u32 {
        self.crop
    }

    pub fn apply(&self, img: &DynamicImage) -> RgbImage {
        let (w, h) = (img.width(), img.height());

        // Resize so that the shortest side equals `resize`
        let scale = self.resize as f32 / w.min(h) as f32;
        let nw = ((w as f32 * scale).round() as u32).max(self.resize);
        let nh = ((h as f32 * scale).round() as u32).max(self.resize);
        let resized = img.resize_exact(nw, nh, FilterType::Triangle);

        center_crop(&resized, self.crop).to_rgb8()
    }
}

/// Random area/aspect crop resized to a square, torchvision semantics
fn random_resized_crop<R: Rng>(img: &DynamicImage, size: u32, rng: &mut R) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    let area = (w as f32) * (h as f32);

    for _ in 0..10 {
        let target_area = area * rng.gen_range(0.08..1.0);
        let aspect = rng.gen_range((0.75f32).ln()..(4.0f32 / 3.0).ln()).exp();

        let cw = (target_area * aspect).sqrt().round() as u32;
        let ch = (target_area / aspect).sqrt().round() as u32;

        if cw > 0 && ch > 0 && cw <= w && ch <= h {
            let x = rng.gen_range(0..=w - cw);
            let y = rng.gen_range(0..=h - ch);
            return img
                .crop_imm(x, y, cw, ch)
                .resize_exact(size, size, FilterType::Triangle);
        }
    }

    // Fallback: central square crop of the shorter side
    let side = w.min(h);
    center_crop(img, side).resize_exact(size, size, FilterType::Triangle)
}

fn center_crop(img: &DynamicImage, side: u32) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    let x = w.saturating_sub(side) / 2;
    let y = h.saturating_sub(side) / 2;
    img.crop_imm(x, y, side.min(w), side.min(h))
}

/// Convert an RGB image to flattened CHW floats in [0, 1]
pub fn to_chw_floats(rgb: &RgbImage) -> Vec<f32> {
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    let mut data = vec![0.0f32; 3 * height * width];

    for y in 0..height {
        for x in 0..width {
            let pixel = rgb.get_pixel(x as u32, y as u32);
            data[y * width + x] = pixel[0] as f32 / 255.0;
            data[height * width + y * width + x] = pixel[1] as f32 / 255.0;
            data[2 * height * width + y * width + x] = pixel[2] as f32 / 255.0;
        }
    }

    data
}
