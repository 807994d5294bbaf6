//! Species classifier: frozen backbone + trainable head
//!
//! The backbone is a pretrained Vision Transformer whose parameters are
//! marked non-trainable after loading; only the head is updated by the
//! optimizer. The head replaces the checkpoint's original output layer with
//! a wider projection, ReLU, dropout, and a final projection sized to the
//! dataset's class count.

use anyhow::Result;
use std::path::Path;

use burn::{
    config::Config,
    module::Module,
    nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig, Relu},
    tensor::{backend::Backend, Tensor},
};

use super::pretrained;
use super::vit::{VisionTransformer, VisionTransformerConfig};

/// Configuration for the classification head
#[derive(Config, Debug)]
pub struct SpeciesClassifierConfig {
    /// Number of output classes
    pub num_classes: usize,

    /// Hidden width of the head
    #[config(default = "1024")]
    pub hidden_size: usize,

    /// Dropout rate between the two head projections
    #[config(default = "0.2")]
    pub dropout_rate: f64,
}

/// Trainable classification head
///
/// Linear -> ReLU -> Dropout -> Linear, weights initialized with a
/// Xavier-normal scheme.
#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    fc1: Linear<B>,
    relu: Relu,
    dropout: Dropout,
    fc2: Linear<B>,
}

impl<B: Backend> ClassifierHead<B> {
    pub fn new(
        in_features: usize,
        config: &SpeciesClassifierConfig,
        device: &B::Device,
    ) -> Self {
        let xavier = Initializer::XavierNormal { gain: 1.0 };

        Self {
            fc1: LinearConfig::new(in_features, config.hidden_size)
                .with_initializer(xavier.clone())
                .init(device),
            relu: Relu::new(),
            dropout: DropoutConfig::new(config.dropout_rate).init(),
            fc2: LinearConfig::new(config.hidden_size, config.num_classes)
                .with_initializer(xavier)
                .init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.fc1.forward(x);
        let x = self.relu.forward(x);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }
}

/// Butterfly species classifier
#[derive(Module, Debug)]
pub struct SpeciesClassifier<B: Backend> {
    backbone: VisionTransformer<B>,
    head: ClassifierHead<B>,

    num_classes: usize,
}

impl<B: Backend> SpeciesClassifier<B> {
    /// Create a classifier with a randomly initialized backbone
    pub fn new(
        backbone_config: &VisionTransformerConfig,
        config: &SpeciesClassifierConfig,
        device: &B::Device,
    ) -> Self {
        let backbone = VisionTransformer::new(backbone_config, device);
        let head = ClassifierHead::new(backbone_config.embed_dim, config, device);

        Self {
            backbone,
            head,
            num_classes: config.num_classes,
        }
    }

    /// Replace the backbone weights with a pretrained checkpoint
    pub fn load_pretrained(self, checkpoint: &Path, device: &B::Device) -> Result<Self> {
        let Self {
            backbone,
            head,
            num_classes,
        } = self;

        let backbone = pretrained::load_backbone(backbone, checkpoint, device)?;

        Ok(Self {
            backbone,
            head,
            num_classes,
        })
    }

    /// Mark every backbone parameter as non-trainable
    ///
    /// Gradients no longer flow into the backbone; the optimizer will only
    /// ever see head parameters.
    pub fn freeze_backbone(self) -> Self {
        let Self {
            backbone,
            head,
            num_classes,
        } = self;

        Self {
            backbone: backbone.no_grad(),
            head,
            num_classes,
        }
    }

    /// Forward pass through backbone and head
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.backbone.forward(x);
        self.head.forward(features)
    }

    /// Forward pass with softmax for inference
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let logits = self.forward(x);
        burn::tensor::activation::softmax(logits, 1)
    }

    /// Number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Parameter count of the frozen backbone
    pub fn backbone_num_params(&self) -> usize {
        self.backbone.num_params()
    }

    /// Parameter count of the trainable head
    pub fn head_num_params(&self) -> usize {
        self.head.num_params()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny_backbone() -> VisionTransformerConfig {
        VisionTransformerConfig::new()
            .with_image_size(32)
            .with_patch_size(16)
            .with_embed_dim(16)
            .with_depth(1)
            .with_num_heads(2)
    }

    #[test]
    fn test_classifier_output_shape() {
        let device = Default::default();
        let config = SpeciesClassifierConfig::new(7).with_hidden_size(32);
        let model = SpeciesClassifier::<TestBackend>::new(&tiny_backbone(), &config, &device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 7]);
        assert_eq!(model.num_classes(), 7);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let device = Default::default();
        let config = SpeciesClassifierConfig::new(5).with_hidden_size(16);
        let model = SpeciesClassifier::<TestBackend>::new(&tiny_backbone(), &config, &device);

        let input = Tensor::<TestBackend, 4>::ones([3, 3, 32, 32], &device);
        let probs: Vec<f32> = model
            .forward_softmax(input)
            .into_data()
            .convert::<f32>()
            .to_vec()
            .unwrap();

        for row in probs.chunks(5) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_freeze_keeps_parameter_counts() {
        let device = Default::default();
        let config = SpeciesClassifierConfig::new(5).with_hidden_size(16);
        let model = SpeciesClassifier::<TestBackend>::new(&tiny_backbone(), &config, &device);

        let backbone_params = model.backbone_num_params();
        let head_params = model.head_num_params();

        let frozen = model.freeze_backbone();
        assert_eq!(frozen.backbone_num_params(), backbone_params);
        assert_eq!(frozen.head_num_params(), head_params);
    }
}
