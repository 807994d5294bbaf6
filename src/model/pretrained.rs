//! Pretrained backbone weights
//!
//! The backbone checkpoint (ViT-tiny/16 at 224x224, ImageNet weights) is
//! fetched from the Hugging Face hub and imported into the Burn module
//! record. Checkpoint tensor names follow the transformers layout, so they
//! are remapped onto the local module tree before loading.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use burn::module::Module;
use burn::record::{FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use tracing::info;

use super::vit::{VisionTransformer, VisionTransformerRecord};

/// Hub repository holding the backbone checkpoint
pub const PRETRAINED_REPO: &str = "WinKawaks/vit-tiny-patch16-224";

/// Checkpoint file within the repository
pub const PRETRAINED_FILE: &str = "pytorch_model.bin";

/// Download the pretrained checkpoint from the Hugging Face hub
///
/// Returns the path of the cached local copy; the hub client reuses a prior
/// download when one exists.
pub fn fetch_pretrained() -> Result<PathBuf> {
    info!("Fetching pretrained backbone from hub: {}", PRETRAINED_REPO);

    let api = hf_hub::api::sync::Api::new().context("failed to initialize hub client")?;
    let path = api
        .model(PRETRAINED_REPO.to_string())
        .get(PRETRAINED_FILE)
        .with_context(|| format!("failed to fetch {PRETRAINED_FILE} from {PRETRAINED_REPO}"))?;

    info!("Pretrained checkpoint available at {:?}", path);
    Ok(path)
}

/// Load pretrained weights from a PyTorch checkpoint into the backbone
///
/// Every checkpoint key is remapped onto the corresponding module path;
/// linear weights are transposed and norm parameters renamed by the
/// recorder. The classifier head of the checkpoint is ignored.
pub fn load_backbone<B: Backend>(
    backbone: VisionTransformer<B>,
    checkpoint: &Path,
    device: &B::Device,
) -> Result<VisionTransformer<B>> {
    info!("Loading pretrained backbone weights from {:?}", checkpoint);

    let load_args = LoadArgs::new(checkpoint.to_path_buf())
        .with_key_remap(r"^vit\.embeddings\.cls_token$", "cls_token")
        .with_key_remap(r"^vit\.embeddings\.position_embeddings$", "pos_embed")
        .with_key_remap(
            r"^vit\.embeddings\.patch_embeddings\.projection\.(.+)$",
            "patch_embed.$1",
        )
        .with_key_remap(
            r"^vit\.encoder\.layer\.([0-9]+)\.attention\.attention\.(query|key|value)\.(.+)$",
            "blocks.$1.attn.$2.$3",
        )
        .with_key_remap(
            r"^vit\.encoder\.layer\.([0-9]+)\.attention\.output\.dense\.(.+)$",
            "blocks.$1.attn.output.$2",
        )
        .with_key_remap(
            r"^vit\.encoder\.layer\.([0-9]+)\.intermediate\.dense\.(.+)$",
            "blocks.$1.mlp.fc1.$2",
        )
        .with_key_remap(
            r"^vit\.encoder\.layer\.([0-9]+)\.output\.dense\.(.+)$",
            "blocks.$1.mlp.fc2.$2",
        )
        .with_key_remap(
            r"^vit\.encoder\.layer\.([0-9]+)\.layernorm_before\.(.+)$",
            "blocks.$1.norm1.$2",
        )
        .with_key_remap(
            r"^vit\.encoder\.layer\.([0-9]+)\.layernorm_after\.(.+)$",
            "blocks.$1.norm2.$2",
        )
        .with_key_remap(r"^vit\.layernorm\.(.+)$", "norm.$1");

    let record: VisionTransformerRecord<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(load_args, device)
        .map_err(|e| anyhow!("failed to import checkpoint {:?}: {:?}", checkpoint, e))?;

    Ok(backbone.load_record(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretrained_constants() {
        // The repo/file pair identifies the checkpoint; a rename would break
        // every cached download out there.
        assert_eq!(PRETRAINED_REPO, "WinKawaks/vit-tiny-patch16-224");
        assert_eq!(PRETRAINED_FILE, "pytorch_model.bin");
    }
}
