//! Learning Rate Scheduler Module
//!
//! Epoch-level learning rate schedules. The fine-tuning run uses cosine
//! annealing with a period equal to the total epoch count, stepped after
//! each training pass.

use serde::{Deserialize, Serialize};

/// Learning rate schedule evaluated per epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LrSchedule {
    /// Constant learning rate (no scheduling)
    Constant { lr: f64 },

    /// Cosine annealing: smooth decay following a cosine curve
    CosineAnnealing {
        initial_lr: f64,
        min_lr: f64,
        total_epochs: usize,
    },
}

impl LrSchedule {
    /// Create a constant learning rate schedule
    pub fn constant(lr: f64) -> Self {
        Self::Constant { lr }
    }

    /// Create a cosine annealing schedule
    pub fn cosine_annealing(initial_lr: f64, min_lr: f64, total_epochs: usize) -> Self {
        Self::CosineAnnealing {
            initial_lr,
            min_lr,
            total_epochs,
        }
    }

    /// Get the learning rate for a given epoch (0-indexed)
    pub fn get_lr(&self, epoch: usize) -> f64 {
        match self {
            Self::Constant { lr } => *lr,

            Self::CosineAnnealing {
                initial_lr,
                min_lr,
                total_epochs,
            } => {
                let progress = epoch as f64 / (*total_epochs).max(1) as f64;
                let cosine_factor = (1.0 + (std::f64::consts::PI * progress).cos()) / 2.0;
                min_lr + (initial_lr - min_lr) * cosine_factor
            }
        }
    }

    /// Get a description of the schedule
    pub fn description(&self) -> String {
        match self {
            Self::Constant { lr } => format!("Constant LR: {:.6}", lr),
            Self::CosineAnnealing {
                initial_lr,
                min_lr,
                total_epochs,
            } => format!(
                "Cosine Annealing: initial={:.6}, min={:.6}, epochs={}",
                initial_lr, min_lr, total_epochs
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_schedule() {
        let schedule = LrSchedule::constant(0.001);
        assert_eq!(schedule.get_lr(0), 0.001);
        assert_eq!(schedule.get_lr(50), 0.001);
    }

    #[test]
    fn test_cosine_starts_at_initial_lr() {
        let schedule = LrSchedule::cosine_annealing(0.001, 0.0, 30);
        assert!((schedule.get_lr(0) - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_is_monotonically_decreasing() {
        let schedule = LrSchedule::cosine_annealing(0.001, 0.0, 30);

        let mut previous = f64::INFINITY;
        for epoch in 0..30 {
            let lr = schedule.get_lr(epoch);
            assert!(lr <= previous);
            assert!(lr >= 0.0);
            previous = lr;
        }
    }

    #[test]
    fn test_cosine_reaches_min_at_period() {
        let schedule = LrSchedule::cosine_annealing(0.1, 0.001, 100);

        // Midpoint sits halfway between initial and min
        let expected_mid = (0.1 + 0.001) / 2.0;
        assert!((schedule.get_lr(50) - expected_mid).abs() < 1e-9);

        assert!((schedule.get_lr(100) - 0.001).abs() < 1e-9);
    }
}
