//! Vision Transformer backbone
//!
//! A standard ViT encoder (patch embedding, CLS token, learned position
//! embeddings, pre-norm attention/MLP blocks) assembled from Burn's nn
//! modules. The default configuration matches ViT-tiny/16 at 224x224, the
//! architecture of the pretrained checkpoint imported in
//! [`crate::model::pretrained`]. The forward pass returns the final CLS
//! embedding; classification happens in the head attached by
//! [`crate::model::classifier`].

use burn::{
    config::Config,
    module::{Module, Param},
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        conv::{Conv2d, Conv2dConfig},
        Dropout, DropoutConfig, Gelu, LayerNorm, LayerNormConfig, Linear, LinearConfig,
    },
    tensor::{backend::Backend, Distribution, Tensor},
};

/// Configuration for the Vision Transformer backbone
#[derive(Config, Debug)]
pub struct VisionTransformerConfig {
    /// Input image side length (assumes square images)
    #[config(default = "224")]
    pub image_size: usize,

    /// Side length of one square patch
    #[config(default = "16")]
    pub patch_size: usize,

    /// Token embedding dimension
    #[config(default = "192")]
    pub embed_dim: usize,

    /// Number of encoder blocks
    #[config(default = "12")]
    pub depth: usize,

    /// Number of attention heads
    #[config(default = "3")]
    pub num_heads: usize,

    /// MLP hidden dimension as a multiple of the embedding dimension
    #[config(default = "4")]
    pub mlp_ratio: usize,

    /// Dropout rate inside the encoder
    #[config(default = "0.0")]
    pub dropout: f64,
}

impl VisionTransformerConfig {
    /// Number of patch tokens for the configured image/patch sizes
    pub fn num_patches(&self) -> usize {
        let per_side = self.image_size / self.patch_size;
        per_side * per_side
    }
}

/// Two-layer MLP with GELU, the feed-forward half of an encoder block
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    gelu: Gelu,
    dropout: Dropout,
}

impl<B: Backend> Mlp<B> {
    pub fn new(dim: usize, hidden_dim: usize, dropout: f64, device: &B::Device) -> Self {
        Self {
            fc1: LinearConfig::new(dim, hidden_dim).init(device),
            fc2: LinearConfig::new(hidden_dim, dim).init(device),
            gelu: Gelu::new(),
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.fc1.forward(x);
        let x = self.gelu.forward(x);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }
}

/// Pre-norm transformer encoder block
#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    norm1: LayerNorm<B>,
    attn: MultiHeadAttention<B>,
    norm2: LayerNorm<B>,
    mlp: Mlp<B>,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn new(dim: usize, num_heads: usize, mlp_ratio: usize, dropout: f64, device: &B::Device) -> Self {
        Self {
            norm1: LayerNormConfig::new(dim).with_epsilon(1e-6).init(device),
            attn: MultiHeadAttentionConfig::new(dim, num_heads)
                .with_dropout(dropout)
                .init(device),
            norm2: LayerNormConfig::new(dim).with_epsilon(1e-6).init(device),
            mlp: Mlp::new(dim, dim * mlp_ratio, dropout, device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let attended = self
            .attn
            .forward(MhaInput::self_attn(self.norm1.forward(x.clone())))
            .context;
        let x = x + attended;

        let fed_forward = self.mlp.forward(self.norm2.forward(x.clone()));
        x + fed_forward
    }
}

/// Vision Transformer feature extractor
///
/// Forward output is the CLS token embedding of shape
/// `[batch_size, embed_dim]`.
#[derive(Module, Debug)]
pub struct VisionTransformer<B: Backend> {
    // Public so pretrained weight import can rebuild the module record
    pub patch_embed: Conv2d<B>,
    pub cls_token: Param<Tensor<B, 3>>,
    pub pos_embed: Param<Tensor<B, 3>>,
    pub blocks: Vec<EncoderBlock<B>>,
    pub norm: LayerNorm<B>,
    dropout: Dropout,

    embed_dim: usize,
}

impl<B: Backend> VisionTransformer<B> {
    /// Create a new backbone from configuration with random weights
    pub fn new(config: &VisionTransformerConfig, device: &B::Device) -> Self {
        let dim = config.embed_dim;

        // Non-overlapping patch projection
        let patch_embed = Conv2dConfig::new([3, dim], [config.patch_size, config.patch_size])
            .with_stride([config.patch_size, config.patch_size])
            .init(device);

        let cls_token = Param::from_tensor(Tensor::random(
            [1, 1, dim],
            Distribution::Normal(0.0, 0.02),
            device,
        ));
        let pos_embed = Param::from_tensor(Tensor::random(
            [1, config.num_patches() + 1, dim],
            Distribution::Normal(0.0, 0.02),
            device,
        ));

        let blocks = (0..config.depth)
            .map(|_| EncoderBlock::new(dim, config.num_heads, config.mlp_ratio, config.dropout, device))
            .collect();

        Self {
            patch_embed,
            cls_token,
            pos_embed,
            blocks,
            norm: LayerNormConfig::new(dim).with_epsilon(1e-6).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
            embed_dim: dim,
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, height, width]
    ///
    /// # Returns
    /// * CLS embedding tensor of shape [batch_size, embed_dim]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = x.dims();

        // [B, 3, H, W] -> [B, D, H/p, W/p] -> [B, N, D]
        let x = self.patch_embed.forward(x);
        let x = x.flatten::<3>(2, 3).swap_dims(1, 2);

        // Prepend the CLS token and add position embeddings
        let cls = self.cls_token.val().repeat_dim(0, batch_size);
        let x = Tensor::cat(vec![cls, x], 1);
        let x = x + self.pos_embed.val();
        let mut x = self.dropout.forward(x);

        for block in &self.blocks {
            x = block.forward(x);
        }

        let x = self.norm.forward(x);

        // CLS token embedding: [B, 1, D] -> [B, D]
        let [b, _n, d] = x.dims();
        x.slice([0..b, 0..1]).reshape([b, d])
    }

    /// Token embedding dimension
    pub fn embed_dim(&self) -> usize {
        self.embed_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny_config() -> VisionTransformerConfig {
        VisionTransformerConfig::new()
            .with_image_size(32)
            .with_patch_size(16)
            .with_embed_dim(16)
            .with_depth(2)
            .with_num_heads(2)
    }

    #[test]
    fn test_num_patches() {
        let config = VisionTransformerConfig::new();
        assert_eq!(config.num_patches(), 196);
        assert_eq!(tiny_config().num_patches(), 4);
    }

    #[test]
    fn test_backbone_output_shape() {
        let device = Default::default();
        let config = tiny_config();
        let model = VisionTransformer::<TestBackend>::new(&config, &device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 16]);
    }

    #[test]
    fn test_backbone_batch_independence() {
        let device = Default::default();
        let config = tiny_config();
        let model = VisionTransformer::<TestBackend>::new(&config, &device);

        let single = Tensor::<TestBackend, 4>::ones([1, 3, 32, 32], &device);
        let pair = Tensor::<TestBackend, 4>::ones([2, 3, 32, 32], &device);

        let one: Vec<f32> = model
            .forward(single)
            .into_data()
            .convert::<f32>()
            .to_vec()
            .unwrap();
        let two: Vec<f32> = model
            .forward(pair)
            .into_data()
            .convert::<f32>()
            .to_vec()
            .unwrap();

        for (a, b) in one.iter().zip(two.iter().take(one.len())) {
            assert!((a - b).abs() < 1e-4);
        }
    }
}
