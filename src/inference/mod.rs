//! Inference module
//!
//! Single-image prediction against a trained classifier.

pub mod predictor;

pub use predictor::{PredictionResult, Predictor};
