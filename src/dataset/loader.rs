//! Butterfly Dataset Loader
//!
//! Loads one split of the butterfly dataset from disk. Each split directory
//! contains one subdirectory per species; the class-label mapping is derived
//! by sorting the subdirectory names. Loading fails fast on a missing or
//! empty split, and `DatasetSplits::load` rejects splits whose class sets do
//! not match the train split.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::IMAGE_EXTENSIONS;

/// One of the three dataset partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    /// Directory name of the split under the dataset root
    pub fn dir_name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A single image sample with its label and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class label index
    pub label: usize,
    /// Class name (e.g., "ATLAS MOTH")
    pub class_name: String,
}

/// A single split of the butterfly dataset
///
/// Images are loaded lazily; the loader only records paths and labels.
#[derive(Debug, Clone)]
pub struct SplitDataset {
    split: Split,
    root: PathBuf,
    samples: Vec<ImageSample>,
    classes: Vec<String>,
}

impl SplitDataset {
    /// Load a split from `root/<split>` by scanning its class directories
    pub fn load<P: AsRef<Path>>(root: P, split: Split) -> Result<Self> {
        let root = root.as_ref().join(split.dir_name());
        info!("Loading {} split from: {:?}", split, root);

        if !root.exists() {
            bail!("split directory does not exist: {:?}", root);
        }

        // Discover class directories and derive the label mapping by sorting
        let mut classes: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root)
            .with_context(|| format!("failed to read split directory {:?}", root))?
        {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    classes.push(name.to_string());
                }
            }
        }
        classes.sort();

        if classes.is_empty() {
            bail!("split directory {:?} contains no class directories", root);
        }

        let mut samples = Vec::new();
        for (label, class_name) in classes.iter().enumerate() {
            let class_dir = root.join(class_name);

            let mut paths: Vec<PathBuf> = WalkDir::new(&class_dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.path().to_path_buf())
                .filter(|p| {
                    p.extension()
                        .and_then(|e| e.to_str())
                        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                        .unwrap_or(false)
                })
                .collect();
            paths.sort();

            debug!(
                "{}: class '{}' (label {}) has {} images",
                split,
                class_name,
                label,
                paths.len()
            );

            for path in paths {
                samples.push(ImageSample {
                    path,
                    label,
                    class_name: class_name.clone(),
                });
            }
        }

        if samples.is_empty() {
            bail!("split directory {:?} contains no images", root);
        }

        info!("{}: loaded {} samples, {} classes", split, samples.len(), classes.len());

        Ok(Self {
            split,
            root,
            samples,
            classes,
        })
    }

    /// Which split this dataset holds
    pub fn split(&self) -> Split {
        self.split
    }

    /// Split root directory on disk
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of samples in the split
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the split is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of classes
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Sorted class names; a class's label is its position in this list
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// All samples, ordered by class then path
    pub fn samples(&self) -> &[ImageSample] {
        &self.samples
    }

    /// Sample at `index`
    pub fn get(&self, index: usize) -> Option<&ImageSample> {
        self.samples.get(index)
    }

    /// First image (by path order) of each of the first `n` classes
    ///
    /// Used as the default hand-picked list for sample-prediction figures.
    pub fn first_image_per_class(&self, n: usize) -> Vec<PathBuf> {
        self.classes
            .iter()
            .take(n)
            .enumerate()
            .filter_map(|(label, _)| {
                self.samples
                    .iter()
                    .find(|s| s.label == label)
                    .map(|s| s.path.clone())
            })
            .collect()
    }

    /// Statistics about the split
    pub fn stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            class_counts[sample.label] += 1;
        }

        DatasetStats {
            split: self.split,
            total_samples: self.samples.len(),
            num_classes: self.num_classes(),
            class_counts,
            class_names: self.classes.clone(),
        }
    }
}

/// The three dataset splits with a shared class mapping
#[derive(Debug, Clone)]
pub struct DatasetSplits {
    pub train: SplitDataset,
    pub valid: SplitDataset,
    pub test: SplitDataset,
}

impl DatasetSplits {
    /// Load train/valid/test from a dataset root and verify that all three
    /// splits carry the exact same class set.
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let train = SplitDataset::load(root, Split::Train)?;
        let valid = SplitDataset::load(root, Split::Valid)?;
        let test = SplitDataset::load(root, Split::Test)?;

        for split in [&valid, &test] {
            if split.classes() != train.classes() {
                bail!(
                    "class directories in the {} split do not match the train split \
                     ({} vs {} classes); labels would silently misalign",
                    split.split(),
                    split.num_classes(),
                    train.num_classes()
                );
            }
        }

        Ok(Self { train, valid, test })
    }

    /// Number of classes shared by all splits
    pub fn num_classes(&self) -> usize {
        self.train.num_classes()
    }

    /// Sorted class names shared by all splits
    pub fn classes(&self) -> &[String] {
        self.train.classes()
    }
}

/// Statistics about one split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub split: Split,
    pub total_samples: usize,
    pub num_classes: usize,
    pub class_counts: Vec<usize>,
    pub class_names: Vec<String>,
}

impl DatasetStats {
    /// Print statistics to console
    pub fn print(&self) {
        println!("\nDataset statistics ({}):", self.split);
        println!("  Total samples: {}", self.total_samples);
        println!("  Number of classes: {}", self.num_classes);
        println!("\n  Samples per class:");

        for (idx, name) in self.class_names.iter().enumerate() {
            let count = self.class_counts[idx];
            let bar_len = (count as f32 / self.total_samples as f32 * 40.0) as usize;
            let bar: String = "█".repeat(bar_len);
            println!("    {:3}. {:32} {:5} {}", idx, name, count, bar);
        }
    }
}
