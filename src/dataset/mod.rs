//! Dataset module for butterfly image data handling
//!
//! This module provides functionality for:
//! - Loading the class-per-directory dataset splits from disk
//! - Per-split image transforms (random augmentation for train, deterministic
//!   resize + center crop for valid/test)
//! - Batching items into Burn tensors with ImageNet normalization
//!
//! ## Directory layout
//!
//! The dataset root contains one directory per split, each with one
//! subdirectory per species:
//!
//! ```text
//! root/
//! ├── train/
//! │   ├── ADONIS/
//! │   └── ATLAS MOTH/
//! ├── valid/
//! └── test/
//! ```
//!
//! Class labels are derived by sorting the subdirectory names; the three
//! splits must carry identical class sets.

pub mod batcher;
pub mod loader;
pub mod transform;

pub use batcher::{SpeciesBatch, SpeciesBatcher, SpeciesItem};
pub use loader::{DatasetSplits, DatasetStats, ImageSample, Split, SplitDataset};
pub use transform::{EvalTransform, TrainTransform};

/// ImageNet normalization mean values (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet normalization std values (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// File extensions accepted as dataset images
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];
