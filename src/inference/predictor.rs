//! Inference Predictor Module
//!
//! Runs single-image inference with a trained classifier: deterministic
//! resize + center crop, ImageNet normalization, forward pass with softmax,
//! argmax to a class name.

use std::path::Path;

use anyhow::{Context, Result};
use burn::tensor::{backend::Backend, Tensor};
use image::{DynamicImage, ImageReader};

use crate::dataset::transform::{to_chw_floats, EvalTransform};
use crate::dataset::{IMAGENET_MEAN, IMAGENET_STD};
use crate::model::classifier::SpeciesClassifier;
use crate::{EVAL_RESIZE, IMAGE_SIZE};

/// Result of a single prediction
#[derive(Debug, Clone)]
pub struct PredictionResult {
    /// Predicted class index
    pub class_index: usize,

    /// Predicted class name
    pub class_name: String,

    /// Probability of the predicted class
    pub confidence: f32,

    /// Full probability distribution over all classes
    pub probabilities: Vec<f32>,

    /// Top-5 predictions with their probabilities
    pub top_k: Vec<(usize, String, f32)>,
}

impl PredictionResult {
    /// Build a result from a probability distribution
    pub fn new(probabilities: Vec<f32>, classes: &[String]) -> Self {
        let (class_index, &confidence) = probabilities
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or((0, &0.0));

        let class_name = classes
            .get(class_index)
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string());

        let mut indexed: Vec<(usize, f32)> = probabilities
            .iter()
            .enumerate()
            .map(|(i, &p)| (i, p))
            .collect();
        indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let top_k = indexed
            .iter()
            .take(5)
            .map(|&(idx, prob)| {
                let name = classes
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string());
                (idx, name, prob)
            })
            .collect();

        Self {
            class_index,
            class_name,
            confidence,
            probabilities,
            top_k,
        }
    }

    /// Margin between the top-1 and top-2 probabilities
    pub fn margin(&self) -> f32 {
        if self.top_k.len() >= 2 {
            self.top_k[0].2 - self.top_k[1].2
        } else {
            self.confidence
        }
    }
}

/// Predictor for running inference with a trained model
pub struct Predictor<B: Backend> {
    model: SpeciesClassifier<B>,
    classes: Vec<String>,
    transform: EvalTransform,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    /// Create a predictor around a trained (non-autodiff) model
    pub fn new(model: SpeciesClassifier<B>, classes: Vec<String>, device: B::Device) -> Self {
        Self {
            model,
            classes,
            transform: EvalTransform::new(EVAL_RESIZE as u32, IMAGE_SIZE as u32),
            device,
        }
    }

    /// Class names known to this predictor
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Preprocess an image into a normalized CHW tensor buffer
    pub fn preprocess(&self, image: &DynamicImage) -> Vec<f32> {
        let rgb = self.transform.apply(image);
        let mut data = to_chw_floats(&rgb);

        let plane = IMAGE_SIZE * IMAGE_SIZE;
        for c in 0..3 {
            for v in &mut data[c * plane..(c + 1) * plane] {
                *v = (*v - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            }
        }

        data
    }

    /// Run inference on a preprocessed tensor buffer
    pub fn predict_tensor(&self, data: Vec<f32>) -> PredictionResult {
        let tensor: Tensor<B, 1> = Tensor::from_floats(data.as_slice(), &self.device);
        let tensor = tensor.reshape([1, 3, IMAGE_SIZE, IMAGE_SIZE]);

        let probs = self.model.forward_softmax(tensor);
        let probabilities: Vec<f32> = probs
            .into_data()
            .convert::<f32>()
            .to_vec()
            .unwrap_or_default();

        PredictionResult::new(probabilities, &self.classes)
    }

    /// Load an image from disk and predict its species
    pub fn predict_image(&self, path: &Path) -> Result<PredictionResult> {
        let image = ImageReader::open(path)
            .with_context(|| format!("failed to open image {:?}", path))?
            .decode()
            .with_context(|| format!("failed to decode image {:?}", path))?;

        Ok(self.predict_tensor(self.preprocess(&image)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::classifier::SpeciesClassifierConfig;
    use crate::model::vit::VisionTransformerConfig;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn class_names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("SPECIES {i}")).collect()
    }

    fn tiny_predictor(num_classes: usize) -> Predictor<TestBackend> {
        let backbone = VisionTransformerConfig::new()
            .with_patch_size(32)
            .with_embed_dim(16)
            .with_depth(1)
            .with_num_heads(2);
        let head = SpeciesClassifierConfig::new(num_classes).with_hidden_size(8);
        let model = SpeciesClassifier::new(&backbone, &head, &Default::default());
        Predictor::new(model, class_names(num_classes), Default::default())
    }

    #[test]
    fn test_prediction_result_argmax() {
        let mut probs = vec![0.0f32; 6];
        probs[4] = 0.7;
        probs[1] = 0.2;
        probs[0] = 0.1;

        let result = PredictionResult::new(probs, &class_names(6));

        assert_eq!(result.class_index, 4);
        assert_eq!(result.class_name, "SPECIES 4");
        assert!((result.confidence - 0.7).abs() < 1e-6);
        assert_eq!(result.top_k[0].0, 4);
        assert!((result.margin() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_shape_and_normalization() {
        let predictor = tiny_predictor(3);
        let image = DynamicImage::new_rgb8(300, 200);

        let data = predictor.preprocess(&image);
        assert_eq!(data.len(), 3 * IMAGE_SIZE * IMAGE_SIZE);

        // Black input: normalized value is exactly -mean/std per channel
        let expected = -IMAGENET_MEAN[0] / IMAGENET_STD[0];
        assert!((data[0] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_repeated_prediction_is_identical() {
        let predictor = tiny_predictor(4);
        let image = DynamicImage::new_rgb8(256, 256);
        let data = predictor.preprocess(&image);

        let first = predictor.predict_tensor(data.clone());
        let second = predictor.predict_tensor(data);

        assert_eq!(first.class_index, second.class_index);
        assert_eq!(first.probabilities, second.probabilities);
    }
}
