//! End-to-end pipeline tests over a tiny synthetic dataset
//!
//! Two classes with four images per split run through dataset loading,
//! one full training epoch, evaluation, and reporting on the NdArray
//! backend with a scaled-down backbone.

use std::path::PathBuf;

use burn::backend::{Autodiff, NdArray};
use burn::optim::AdamWConfig;
use image::RgbImage;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use butterfly_finetune::backend;
use butterfly_finetune::dataset::batcher::SpeciesBatcher;
use butterfly_finetune::dataset::loader::DatasetSplits;
use butterfly_finetune::dataset::transform::{EvalTransform, TrainTransform};
use butterfly_finetune::inference::predictor::Predictor;
use butterfly_finetune::model::classifier::{SpeciesClassifier, SpeciesClassifierConfig};
use butterfly_finetune::model::vit::VisionTransformerConfig;
use butterfly_finetune::training::supervised::{
    collect_predictions, run_training, train_epoch, RunOptions,
};
use butterfly_finetune::training::TrainingConfig;
use butterfly_finetune::utils::metrics::Metrics;
use butterfly_finetune::{EVAL_RESIZE, IMAGE_SIZE};

type TestAutodiffBackend = Autodiff<NdArray>;
type TestBackend = NdArray;

const CLASSES: [&str; 2] = ["ADONIS", "MONARCH"];

/// Write 2 classes x 4 images into each of the three splits
fn write_synthetic_dataset(root: &PathBuf) {
    for split in ["train", "valid", "test"] {
        for (c, class) in CLASSES.iter().enumerate() {
            let dir = root.join(split).join(class);
            std::fs::create_dir_all(&dir).unwrap();
            for i in 0..4 {
                let shade = (c * 180 + i * 15) as u8;
                let img = RgbImage::from_pixel(96, 96, image::Rgb([shade, 255 - shade, 80]));
                img.save(dir.join(format!("{}.jpg", i + 1))).unwrap();
            }
        }
    }
}

fn temp_root(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("butterfly_pipeline_{}", name));
    let _ = std::fs::remove_dir_all(&root);
    root
}

fn tiny_backbone() -> VisionTransformerConfig {
    VisionTransformerConfig::new()
        .with_patch_size(32)
        .with_embed_dim(16)
        .with_depth(1)
        .with_num_heads(2)
}

#[test]
fn full_run_produces_one_record_and_report() {
    let data_dir = temp_root("full_run");
    write_synthetic_dataset(&data_dir);
    let output_dir = temp_root("full_run_output");

    let mut options = RunOptions::new(&data_dir, &output_dir);
    options.no_pretrained = true;
    options.backbone = tiny_backbone();

    let config = TrainingConfig {
        epochs: 1,
        batch_size: 4,
        ..TrainingConfig::default()
    };

    let report = run_training::<TestAutodiffBackend>(&options, &config).unwrap();

    // Exactly one epoch record with finite, in-range values
    assert_eq!(report.history.len(), 1);
    let record = &report.history.records[0];
    assert!(record.train_loss.is_finite());
    assert!(record.val_loss.is_finite());
    assert!((0.0..=1.0).contains(&record.train_accuracy));
    assert!((0.0..=1.0).contains(&record.val_accuracy));

    // Weighted metrics stay within [0, 1]
    for value in [
        report.test_metrics.accuracy,
        report.test_metrics.weighted_precision,
        report.test_metrics.weighted_recall,
        report.test_metrics.weighted_f1,
    ] {
        assert!((0.0..=1.0).contains(&value));
    }

    assert_eq!(report.classes, CLASSES);

    // Charts, report, and one figure per sample class were written
    assert!(output_dir.join("loss_curves.svg").exists());
    assert!(output_dir.join("accuracy_curves.svg").exists());
    assert!(output_dir.join("metrics.json").exists());
    assert!(output_dir.join("prediction_1.svg").exists());
    assert!(output_dir.join("prediction_2.svg").exists());
}

#[test]
fn train_epoch_batch_count_is_ceil_of_split_size() {
    let data_dir = temp_root("batch_count");
    write_synthetic_dataset(&data_dir);

    let splits = DatasetSplits::load(&data_dir).unwrap();
    assert_eq!(splits.train.len(), 8);

    let device = backend::default_device();
    let head = SpeciesClassifierConfig::new(splits.num_classes()).with_hidden_size(8);
    let model =
        SpeciesClassifier::<TestAutodiffBackend>::new(&tiny_backbone(), &head, &device)
            .freeze_backbone();

    let mut optimizer = AdamWConfig::new().init();
    let transform = TrainTransform::new(IMAGE_SIZE as u32);
    let batcher = SpeciesBatcher::new();
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let batch_size = 3;
    let (_model, stats) = train_epoch(
        model,
        &mut optimizer,
        &splits.train,
        &transform,
        &batcher,
        batch_size,
        1e-3,
        0.1,
        &device,
        &mut rng,
    )
    .unwrap();

    // 8 samples with batches of 3 -> ceil(8 / 3) = 3 batches
    assert_eq!(stats.batches, (8 + batch_size - 1) / batch_size);
    assert_eq!(stats.samples, 8);
    assert!(stats.loss().is_finite());
    assert!((0.0..=1.0).contains(&stats.accuracy()));
}

#[test]
fn repeated_inference_yields_identical_prediction() {
    let data_dir = temp_root("deterministic");
    write_synthetic_dataset(&data_dir);

    let splits = DatasetSplits::load(&data_dir).unwrap();
    let device = Default::default();
    let head = SpeciesClassifierConfig::new(splits.num_classes()).with_hidden_size(8);
    let model = SpeciesClassifier::<TestBackend>::new(&tiny_backbone(), &head, &device);

    let predictor = Predictor::new(model, splits.classes().to_vec(), device);
    let sample = &splits.test.samples()[0];

    let image = image::open(&sample.path).unwrap();
    let data = predictor.preprocess(&image);

    let first = predictor.predict_tensor(data.clone());
    let second = predictor.predict_tensor(data);

    assert_eq!(first.class_index, second.class_index);
    assert_eq!(first.class_name, second.class_name);
}

#[test]
fn test_metrics_from_collected_predictions() {
    let data_dir = temp_root("collected");
    write_synthetic_dataset(&data_dir);

    let splits = DatasetSplits::load(&data_dir).unwrap();
    let device = Default::default();
    let head = SpeciesClassifierConfig::new(splits.num_classes()).with_hidden_size(8);
    let model = SpeciesClassifier::<TestBackend>::new(&tiny_backbone(), &head, &device);

    let transform = EvalTransform::new(EVAL_RESIZE as u32, IMAGE_SIZE as u32);
    let batcher = SpeciesBatcher::new();

    let (predictions, targets) =
        collect_predictions(&model, &splits.test, &transform, &batcher, 4, &device).unwrap();

    assert_eq!(predictions.len(), splits.test.len());
    assert_eq!(targets.len(), splits.test.len());

    let metrics = Metrics::from_predictions(&predictions, &targets, splits.num_classes());
    assert_eq!(metrics.total_samples, splits.test.len());
    assert!((0.0..=1.0).contains(&metrics.weighted_f1));
}
