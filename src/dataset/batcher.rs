//! Burn batching for butterfly images
//!
//! Items carry preprocessed CHW floats in [0, 1]; the batcher stacks them
//! into a `[batch, 3, H, W]` tensor and applies ImageNet normalization on
//! device.

use std::path::Path;

use anyhow::{Context, Result};
use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;
use image::ImageReader;
use rand::Rng;

use super::transform::{to_chw_floats, EvalTransform, TrainTransform};
use super::{IMAGENET_MEAN, IMAGENET_STD};
use crate::IMAGE_SIZE;

/// A single preprocessed sample ready for batching
#[derive(Clone, Debug)]
pub struct SpeciesItem {
    /// Image data as flattened CHW float array [3 * H * W], values in [0, 1]
    pub image: Vec<f32>,
    /// Class label
    pub label: usize,
    /// Source path (for error reporting)
    pub path: String,
}

impl SpeciesItem {
    /// Create from an already-transformed RGB image
    pub fn from_rgb(rgb: &image::RgbImage, label: usize, path: &Path) -> Self {
        Self {
            image: to_chw_floats(rgb),
            label,
            path: path.to_string_lossy().to_string(),
        }
    }

    /// Load a training item: decode, augment, convert
    ///
    /// An unreadable or undecodable file is an error; the pipeline never
    /// silently skips samples.
    pub fn load_train<R: Rng>(
        path: &Path,
        label: usize,
        transform: &TrainTransform,
        rng: &mut R,
    ) -> Result<Self> {
        let img = ImageReader::open(path)
            .with_context(|| format!("failed to open image {:?}", path))?
            .decode()
            .with_context(|| format!("failed to decode image {:?}", path))?;

        Ok(Self::from_rgb(&transform.apply(&img, rng), label, path))
    }

    /// Load an evaluation item: decode, resize + center crop, convert
    pub fn load_eval(path: &Path, label: usize, transform: &EvalTransform) -> Result<Self> {
        let img = ImageReader::open(path)
            .with_context(|| format!("failed to open image {:?}", path))?
            .decode()
            .with_context(|| format!("failed to decode image {:?}", path))?;

        Ok(Self::from_rgb(&transform.apply(&img), label, path))
    }
}

/// A batch of butterfly images for training or evaluation
#[derive(Clone, Debug)]
pub struct SpeciesBatch<B: Backend> {
    /// Batch of images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Batch of labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher for creating butterfly image batches
#[derive(Clone, Debug)]
pub struct SpeciesBatcher {
    image_size: usize,
}

impl SpeciesBatcher {
    /// Create a new batcher with the default model input size
    pub fn new() -> Self {
        Self {
            image_size: IMAGE_SIZE,
        }
    }

    /// Create a batcher with a custom image size
    pub fn with_image_size(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl Default for SpeciesBatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Batcher<B, SpeciesItem, SpeciesBatch<B>> for SpeciesBatcher {
    fn batch(&self, items: Vec<SpeciesItem>, device: &B::Device) -> SpeciesBatch<B> {
        let batch_size = items.len();
        let channels = 3;
        let height = self.image_size;
        let width = self.image_size;

        // Flatten all images into a single vector
        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();

        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, channels, height, width]),
            device,
        );

        // Apply ImageNet normalization: (x - mean) / std
        let mean = Tensor::<B, 4>::from_floats(
            TensorData::new(IMAGENET_MEAN.to_vec(), [1, 3, 1, 1]),
            device,
        );
        let std = Tensor::<B, 4>::from_floats(
            TensorData::new(IMAGENET_STD.to_vec(), [1, 3, 1, 1]),
            device,
        );
        let images = (images - mean) / std;

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        SpeciesBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_item_from_rgb() {
        let rgb = image::RgbImage::from_pixel(8, 8, image::Rgb([255, 0, 0]));
        let item = SpeciesItem::from_rgb(&rgb, 3, Path::new("test.jpg"));

        assert_eq!(item.label, 3);
        assert_eq!(item.image.len(), 3 * 8 * 8);
        assert_eq!(item.path, "test.jpg");
    }

    #[test]
    fn test_batch_shapes() {
        let device = Default::default();
        let batcher = SpeciesBatcher::with_image_size(8);

        let items: Vec<SpeciesItem> = (0..4)
            .map(|i| SpeciesItem {
                image: vec![0.5f32; 3 * 8 * 8],
                label: i,
                path: format!("{i}.jpg"),
            })
            .collect();

        let batch: SpeciesBatch<TestBackend> = batcher.batch(items, &device);
        assert_eq!(batch.images.dims(), [4, 3, 8, 8]);
        assert_eq!(batch.targets.dims(), [4]);
    }

    #[test]
    fn test_batch_normalization() {
        let device = Default::default();
        let batcher = SpeciesBatcher::with_image_size(2);

        // All-0.5 pixels: normalized value = (0.5 - mean) / std per channel
        let items = vec![SpeciesItem {
            image: vec![0.5f32; 3 * 2 * 2],
            label: 0,
            path: "x.jpg".to_string(),
        }];

        let batch: SpeciesBatch<TestBackend> = batcher.batch(items, &device);
        let values: Vec<f32> = batch.images.into_data().convert::<f32>().to_vec().unwrap();

        let expected_r = (0.5 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        assert!((values[0] - expected_r).abs() < 1e-5);
        let expected_b = (0.5 - IMAGENET_MEAN[2]) / IMAGENET_STD[2];
        assert!((values[8] - expected_b).abs() < 1e-5);
    }
}
