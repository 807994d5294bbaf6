//! Training module
//!
//! - `supervised`: the full fine-tuning run (data -> frozen backbone + head
//!   -> epoch loop -> report)
//! - `scheduler`: learning rate schedules
//! - `history`: per-epoch statistics and the training history record

pub mod history;
pub mod scheduler;
pub mod supervised;

pub use history::{EpochRecord, EpochStats, TrainingHistory};
pub use scheduler::LrSchedule;
pub use supervised::{run_training, RunOptions, RunReport};

use serde::{Deserialize, Serialize};

/// Training hyperparameters
///
/// Defaults reproduce the reference fine-tuning setup: 30 epochs, batches of
/// 32, AdamW at 1e-3 with decoupled weight decay 1e-6, label smoothing 0.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,

    /// Batch size for training and evaluation
    pub batch_size: usize,

    /// Initial learning rate (cosine-annealed to 0 over `epochs`)
    pub learning_rate: f64,

    /// Decoupled weight decay
    pub weight_decay: f64,

    /// Label smoothing factor for the cross-entropy loss
    pub label_smoothing: f32,

    /// Random seed for shuffling and augmentation
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 30,
            batch_size: 32,
            learning_rate: 1e-3,
            weight_decay: 1e-6,
            label_smoothing: 0.1,
            seed: 42,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_config_default() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 30);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.learning_rate, 1e-3);
    }
}
