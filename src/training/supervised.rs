//! Supervised fine-tuning run
//!
//! Implements the training pipeline with Burn's API directly, using a
//! simple custom loop rather than the high-level LearnerBuilder: load the
//! three splits, assemble the frozen backbone + trainable head, train for a
//! fixed number of epochs with cosine-annealed AdamW and label-smoothed
//! cross-entropy, then produce the test-set report, the curve charts, and
//! the sample prediction figures.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion,
    },
};
use colored::Colorize;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::batcher::{SpeciesBatch, SpeciesBatcher, SpeciesItem};
use crate::dataset::loader::{DatasetSplits, SplitDataset};
use crate::dataset::transform::{EvalTransform, TrainTransform};
use crate::inference::predictor::Predictor;
use crate::model::classifier::{SpeciesClassifier, SpeciesClassifierConfig};
use crate::model::pretrained;
use crate::model::vit::VisionTransformerConfig;
use crate::training::history::{EpochRecord, EpochStats, TrainingHistory};
use crate::training::scheduler::LrSchedule;
use crate::training::TrainingConfig;
use crate::utils::charts::{self, DataPoint, DataSeries};
use crate::utils::metrics::Metrics;
use crate::{EVAL_RESIZE, IMAGE_SIZE};

/// Everything a run needs besides the hyperparameters
#[derive(Debug)]
pub struct RunOptions {
    /// Dataset root containing train/, valid/ and test/
    pub data_dir: PathBuf,
    /// Directory for charts and the metrics report
    pub output_dir: PathBuf,
    /// Local checkpoint path; fetched from the hub when absent
    pub weights: Option<PathBuf>,
    /// Keep the randomly initialized backbone (offline runs, tests)
    pub no_pretrained: bool,
    /// Images for the sample-prediction figures; defaults to the first image
    /// of each of the first three test classes
    pub sample_images: Vec<PathBuf>,
    /// Backbone architecture (ViT-tiny by default)
    pub backbone: VisionTransformerConfig,
}

impl RunOptions {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(data_dir: P, output_dir: Q) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            weights: None,
            no_pretrained: false,
            sample_images: Vec::new(),
            backbone: VisionTransformerConfig::new(),
        }
    }
}

/// Outcome of a complete run, also serialized to `metrics.json`
#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub config: TrainingConfig,
    pub classes: Vec<String>,
    pub history: TrainingHistory,
    pub test_metrics: Metrics,
    pub training_seconds: f64,
}

/// Run the full fine-tuning pipeline
///
/// # Type Parameters
/// * `B` - The autodiff backend to train on (e.g. `Autodiff<NdArray>`)
pub fn run_training<B: AutodiffBackend>(
    options: &RunOptions,
    config: &TrainingConfig,
) -> Result<RunReport> {
    println!("{}", "Initializing Training...".green().bold());

    let device = B::Device::default();
    println!("  Device: {:?}", device);

    std::fs::create_dir_all(&options.output_dir)
        .with_context(|| format!("failed to create output directory {:?}", options.output_dir))?;

    // Load the three splits; class sets are verified to match
    println!("{}", "Loading Dataset...".cyan());
    let splits = DatasetSplits::load(&options.data_dir)?;

    println!("Number of training samples: {}", splits.train.len());
    println!("Number of validation samples: {}", splits.valid.len());
    println!("Number of testing samples: {}", splits.test.len());
    println!("Number of classes: {}", splits.num_classes());

    B::seed(config.seed);
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    // Model: pretrained backbone, frozen; fresh head sized to the class count
    println!();
    println!("{}", "Creating Model...".cyan());
    let head_config = SpeciesClassifierConfig::new(splits.num_classes());
    let mut model = SpeciesClassifier::<B>::new(&options.backbone, &head_config, &device);

    if options.no_pretrained {
        info!("Skipping pretrained weights; backbone stays randomly initialized");
    } else {
        let checkpoint = match &options.weights {
            Some(path) => path.clone(),
            None => pretrained::fetch_pretrained()?,
        };
        model = model.load_pretrained(&checkpoint, &device)?;
    }
    let mut model = model.freeze_backbone();

    println!("  Backbone parameters (frozen): {}", model.backbone_num_params());
    println!("  Head parameters (trainable):  {}", model.head_num_params());

    let mut optimizer = AdamWConfig::new()
        .with_weight_decay(config.weight_decay as f32)
        .init();
    let schedule = LrSchedule::cosine_annealing(config.learning_rate, 0.0, config.epochs);

    let train_transform = TrainTransform::new(IMAGE_SIZE as u32);
    let eval_transform = EvalTransform::new(EVAL_RESIZE as u32, IMAGE_SIZE as u32);
    let batcher = SpeciesBatcher::new();

    println!();
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  Epochs:          {}", config.epochs);
    println!("  Batch size:      {}", config.batch_size);
    println!("  Learning rate:   {}", config.learning_rate);
    println!("  Weight decay:    {}", config.weight_decay);
    println!("  Label smoothing: {}", config.label_smoothing);
    println!("  Schedule:        {}", schedule.description());
    println!();

    println!("{}", "Starting Training...".green().bold());

    let inner_device = <B::InnerBackend as Backend>::Device::default();
    let mut history = TrainingHistory::default();
    let start = Instant::now();

    for epoch in 0..config.epochs {
        let lr = schedule.get_lr(epoch);

        let (updated, train_stats) = train_epoch(
            model,
            &mut optimizer,
            &splits.train,
            &train_transform,
            &batcher,
            config.batch_size,
            lr,
            config.label_smoothing,
            &device,
            &mut rng,
        )?;
        model = updated;

        let val_stats = eval_epoch(
            &model.valid(),
            &splits.valid,
            &eval_transform,
            &batcher,
            config.batch_size,
            config.label_smoothing,
            &inner_device,
        )?;

        let record = EpochRecord::from_stats(epoch, &train_stats, &val_stats);
        println!(
            "Epoch {}/{}: Train Loss = {:.4}, Val Loss = {:.4}, Train Acc = {:.4}, Val Acc = {:.4}",
            epoch + 1,
            config.epochs,
            record.train_loss,
            record.val_loss,
            record.train_accuracy,
            record.val_accuracy,
        );
        history.push(record);
    }

    let training_seconds = start.elapsed().as_secs_f64();
    println!("Training time: {:.2}s", training_seconds);

    // Curve charts
    println!();
    println!("{}", "Generating Charts...".cyan());
    write_curve_charts(&history, &options.output_dir)?;

    // Final test-set evaluation
    println!();
    println!("{}", "Evaluating on Test Split...".cyan().bold());
    let valid_model = model.valid();
    let (predictions, targets) = collect_predictions(
        &valid_model,
        &splits.test,
        &eval_transform,
        &batcher,
        config.batch_size,
        &inner_device,
    )?;
    let test_metrics = Metrics::from_predictions(&predictions, &targets, splits.num_classes());

    println!("Accuracy score: {:.4}", test_metrics.accuracy);
    println!("Precision score: {:.4}", test_metrics.weighted_precision);
    println!("Recall score: {:.4}", test_metrics.weighted_recall);
    println!("F1 score: {:.4}", test_metrics.weighted_f1);

    // Sample predictions with one figure per image
    let sample_paths = if options.sample_images.is_empty() {
        splits.test.first_image_per_class(3)
    } else {
        options.sample_images.clone()
    };

    if !sample_paths.is_empty() {
        println!();
        println!("{}", "Sample Predictions...".cyan().bold());
        let predictor = Predictor::new(valid_model, splits.classes().to_vec(), inner_device.clone());

        for (idx, path) in sample_paths.iter().enumerate() {
            let prediction = predictor.predict_image(path)?;
            let title = format!("The predicted species is {}", prediction.class_name);
            println!("  {}: {}", path.display(), title);

            let figure_path = options.output_dir.join(format!("prediction_{}.svg", idx + 1));
            charts::generate_prediction_figure(path, &title, &figure_path)
                .with_context(|| format!("failed to write prediction figure {:?}", figure_path))?;
        }
    }

    let report = RunReport {
        config: config.clone(),
        classes: splits.classes().to_vec(),
        history,
        test_metrics,
        training_seconds,
    };

    let report_path = options.output_dir.join("metrics.json");
    let json = serde_json::to_string_pretty(&report).context("failed to serialize run report")?;
    std::fs::write(&report_path, json)
        .with_context(|| format!("failed to write {:?}", report_path))?;

    println!();
    println!("{}", "Training Complete!".green().bold());
    println!(
        "  Best validation accuracy: {:.2}%",
        report.history.best_val_accuracy() * 100.0
    );
    println!("  Report written to {:?}", report_path);

    Ok(report)
}

/// One full training pass over the train split
///
/// Returns the updated model together with the pass statistics; nothing is
/// accumulated outside the returned value.
#[allow(clippy::too_many_arguments)]
pub fn train_epoch<B: AutodiffBackend>(
    mut model: SpeciesClassifier<B>,
    optimizer: &mut impl Optimizer<SpeciesClassifier<B>, B>,
    dataset: &SplitDataset,
    transform: &TrainTransform,
    batcher: &SpeciesBatcher,
    batch_size: usize,
    learning_rate: f64,
    label_smoothing: f32,
    device: &B::Device,
    rng: &mut ChaCha8Rng,
) -> Result<(SpeciesClassifier<B>, EpochStats)> {
    let mut indices: Vec<usize> = (0..dataset.len()).collect();
    indices.shuffle(rng);

    let loss_fn = CrossEntropyLossConfig::new()
        .with_smoothing(Some(label_smoothing))
        .init(device);

    let mut stats = EpochStats::default();

    for chunk in indices.chunks(batch_size) {
        let mut items = Vec::with_capacity(chunk.len());
        for &index in chunk {
            let sample = &dataset.samples()[index];
            items.push(SpeciesItem::load_train(
                &sample.path,
                sample.label,
                transform,
                rng,
            )?);
        }

        let batch: SpeciesBatch<B> = batcher.batch(items, device);

        let output = model.forward(batch.images.clone());
        let loss = loss_fn.forward(output.clone(), batch.targets.clone());
        let loss_value: f64 = loss.clone().into_scalar().elem();

        let predictions = output.argmax(1).squeeze::<1>(1);
        let correct: i64 = predictions
            .equal(batch.targets.clone())
            .int()
            .sum()
            .into_scalar()
            .elem();

        stats.add_batch(loss_value, correct as usize, chunk.len());

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optimizer.step(learning_rate, model, grads);
    }

    Ok((model, stats))
}

/// One no-gradient pass over a held-out split
pub fn eval_epoch<B: Backend>(
    model: &SpeciesClassifier<B>,
    dataset: &SplitDataset,
    transform: &EvalTransform,
    batcher: &SpeciesBatcher,
    batch_size: usize,
    label_smoothing: f32,
    device: &B::Device,
) -> Result<EpochStats> {
    let loss_fn = CrossEntropyLossConfig::new()
        .with_smoothing(Some(label_smoothing))
        .init(device);

    let mut stats = EpochStats::default();
    let len = dataset.len();

    for start in (0..len).step_by(batch_size) {
        let end = (start + batch_size).min(len);
        let mut items = Vec::with_capacity(end - start);
        for index in start..end {
            let sample = &dataset.samples()[index];
            items.push(SpeciesItem::load_eval(&sample.path, sample.label, transform)?);
        }

        let batch: SpeciesBatch<B> = batcher.batch(items, device);
        let output = model.forward(batch.images);
        let loss_value: f64 = loss_fn
            .forward(output.clone(), batch.targets.clone())
            .into_scalar()
            .elem();

        let predictions = output.argmax(1).squeeze::<1>(1);
        let correct: i64 = predictions
            .equal(batch.targets)
            .int()
            .sum()
            .into_scalar()
            .elem();

        stats.add_batch(loss_value, correct as usize, end - start);
    }

    Ok(stats)
}

/// Collect (prediction, target) pairs for every sample of a split
pub fn collect_predictions<B: Backend>(
    model: &SpeciesClassifier<B>,
    dataset: &SplitDataset,
    transform: &EvalTransform,
    batcher: &SpeciesBatcher,
    batch_size: usize,
    device: &B::Device,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let len = dataset.len();
    let mut all_predictions = Vec::with_capacity(len);
    let mut all_targets = Vec::with_capacity(len);

    for start in (0..len).step_by(batch_size) {
        let end = (start + batch_size).min(len);
        let mut items = Vec::with_capacity(end - start);
        for index in start..end {
            let sample = &dataset.samples()[index];
            items.push(SpeciesItem::load_eval(&sample.path, sample.label, transform)?);
        }

        let batch: SpeciesBatch<B> = batcher.batch(items, device);
        let output = model.forward(batch.images);
        let predictions = output.argmax(1).squeeze::<1>(1);

        let pred_vec: Vec<i64> = predictions
            .into_data()
            .convert::<i64>()
            .to_vec()
            .map_err(|e| anyhow!("failed to read predictions: {:?}", e))?;
        let target_vec: Vec<i64> = batch
            .targets
            .into_data()
            .convert::<i64>()
            .to_vec()
            .map_err(|e| anyhow!("failed to read targets: {:?}", e))?;

        all_predictions.extend(pred_vec.iter().map(|&p| p as usize));
        all_targets.extend(target_vec.iter().map(|&t| t as usize));
    }

    Ok((all_predictions, all_targets))
}

fn write_curve_charts(history: &TrainingHistory, output_dir: &Path) -> Result<()> {
    let to_points = |values: Vec<(f64, f64)>| -> Vec<DataPoint> {
        values.into_iter().map(|(x, y)| DataPoint { x, y }).collect()
    };

    let loss_series = vec![
        DataSeries {
            name: "train loss".to_string(),
            points: to_points(history.points(|r| r.train_loss)),
            color: charts::COLOR_RED.to_string(),
        },
        DataSeries {
            name: "val loss".to_string(),
            points: to_points(history.points(|r| r.val_loss)),
            color: charts::COLOR_BLUE.to_string(),
        },
    ];
    charts::generate_line_chart(
        "Training and Validation Loss",
        "Epoch",
        "Loss",
        &loss_series,
        &output_dir.join("loss_curves.svg"),
    )
    .context("failed to write loss chart")?;

    let accuracy_series = vec![
        DataSeries {
            name: "train acc".to_string(),
            points: to_points(history.points(|r| r.train_accuracy)),
            color: charts::COLOR_RED.to_string(),
        },
        DataSeries {
            name: "val acc".to_string(),
            points: to_points(history.points(|r| r.val_accuracy)),
            color: charts::COLOR_BLUE.to_string(),
        },
    ];
    charts::generate_line_chart(
        "Training and Validation Accuracy",
        "Epoch",
        "Accuracy",
        &accuracy_series,
        &output_dir.join("accuracy_curves.svg"),
    )
    .context("failed to write accuracy chart")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::vit::VisionTransformerConfig;
    use burn::backend::NdArray;
    use image::RgbImage;
    use std::path::PathBuf;

    type TestBackend = NdArray;

    fn write_split(root: &PathBuf, split: &str, per_class: usize) {
        for (c, class) in ["ADONIS", "MONARCH"].iter().enumerate() {
            let dir = root.join(split).join(class);
            std::fs::create_dir_all(&dir).unwrap();
            for i in 0..per_class {
                let shade = (c * 150 + i * 20) as u8;
                let img = RgbImage::from_pixel(64, 64, image::Rgb([shade, 255 - shade, 100]));
                img.save(dir.join(format!("{}.jpg", i + 1))).unwrap();
            }
        }
    }

    fn tiny_model(num_classes: usize) -> SpeciesClassifier<TestBackend> {
        let backbone = VisionTransformerConfig::new()
            .with_patch_size(32)
            .with_embed_dim(16)
            .with_depth(1)
            .with_num_heads(2);
        let head = SpeciesClassifierConfig::new(num_classes).with_hidden_size(8);
        SpeciesClassifier::new(&backbone, &head, &Default::default())
    }

    #[test]
    fn test_eval_epoch_batch_count_and_ranges() {
        let root = std::env::temp_dir().join("butterfly_supervised_eval");
        let _ = std::fs::remove_dir_all(&root);
        write_split(&root, "valid", 3);

        let dataset = SplitDataset::load(&root, crate::dataset::loader::Split::Valid).unwrap();
        let model = tiny_model(dataset.num_classes());
        let transform = EvalTransform::new(EVAL_RESIZE as u32, IMAGE_SIZE as u32);
        let batcher = SpeciesBatcher::new();

        let stats =
            eval_epoch(&model, &dataset, &transform, &batcher, 4, 0.1, &Default::default())
                .unwrap();

        // 6 samples, batch size 4 -> ceil(6 / 4) = 2 batches
        assert_eq!(stats.samples, 6);
        assert_eq!(stats.batches, 2);
        assert!(stats.loss().is_finite());
        assert!((0.0..=1.0).contains(&stats.accuracy()));
    }
}
