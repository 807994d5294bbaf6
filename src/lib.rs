//! # Butterfly Species Fine-Tuning
//!
//! A Rust library for butterfly species classification using the Burn framework.
//! A pretrained ViT-tiny backbone is kept frozen while a small classification
//! head is trained on a class-per-directory image dataset.
//!
//! ## Features
//!
//! - **Transfer learning** with a frozen pretrained backbone and a trainable head
//! - **Burn framework** for portable, efficient neural network training and inference
//! - **Directory-tree datasets** with train/valid/test splits and sorted class mapping
//! - **Evaluation reports** with weighted precision/recall/F1 and SVG charts
//!
//! ## Modules
//!
//! - `dataset`: Split loading, image transforms, and batching
//! - `model`: ViT backbone, classifier head, and pretrained weight import
//! - `training`: Training loop, learning rate scheduling, and epoch history
//! - `inference`: Single-image prediction utilities
//! - `utils`: Logging, metrics, and chart generation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use butterfly_finetune::backend::TrainingBackend;
//! use butterfly_finetune::training::supervised::{run_training, RunOptions};
//! use butterfly_finetune::training::TrainingConfig;
//!
//! let options = RunOptions::new("data/butterflies", "output");
//! let config = TrainingConfig::default();
//! run_training::<TrainingBackend>(&options, &config)?;
//! ```

pub mod backend;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::batcher::{SpeciesBatch, SpeciesBatcher, SpeciesItem};
pub use dataset::loader::{DatasetSplits, DatasetStats, ImageSample, Split, SplitDataset};
pub use dataset::transform::{EvalTransform, TrainTransform};
pub use inference::predictor::{PredictionResult, Predictor};
pub use model::classifier::{SpeciesClassifier, SpeciesClassifierConfig};
pub use model::vit::{VisionTransformer, VisionTransformerConfig};
pub use training::history::{EpochRecord, EpochStats, TrainingHistory};
pub use training::scheduler::LrSchedule;
pub use training::TrainingConfig;
pub use utils::metrics::{ConfusionMatrix, Metrics};

/// Side length of the square model input after preprocessing
pub const IMAGE_SIZE: usize = 224;

/// Shortest-side target for the deterministic resize before center cropping
pub const EVAL_RESIZE: usize = 256;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
