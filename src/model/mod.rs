//! Model module
//!
//! - `vit`: Vision Transformer backbone built from Burn nn modules
//! - `classifier`: frozen backbone + trainable classification head
//! - `pretrained`: fetching and importing pretrained backbone weights

pub mod classifier;
pub mod pretrained;
pub mod vit;

pub use classifier::{ClassifierHead, SpeciesClassifier, SpeciesClassifierConfig};
pub use pretrained::{fetch_pretrained, load_backbone};
pub use vit::{VisionTransformer, VisionTransformerConfig};
