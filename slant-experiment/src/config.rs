use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sequencer::TrialDesign;

/// Timing and design constants of one experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub name: String,
    pub fixation_ms: u64,
    /// Time between breaks
    pub break_interval_ms: u64,
    pub break_duration_ms: u64,
    pub total_sessions: u32,
    pub practice_trials: usize,
    pub repetitions: usize,
    /// Slant angles in degrees
    pub slants: Vec<f64>,
    pub height_ratios: Vec<f64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            name: "3D_SLANT_RELIEF".to_string(),
            fixation_ms: 500,
            break_interval_ms: 300_000,
            break_duration_ms: 10_000,
            total_sessions: 2,
            practice_trials: 10,
            repetitions: 1,
            slants: vec![60.0],
            height_ratios: vec![0.06, 0.08],
        }
    }
}

impl ExperimentConfig {
    pub fn fixation(&self) -> Duration {
        Duration::from_millis(self.fixation_ms)
    }

    pub fn break_interval(&self) -> Duration {
        Duration::from_millis(self.break_interval_ms)
    }

    pub fn break_duration(&self) -> Duration {
        Duration::from_millis(self.break_duration_ms)
    }

    pub fn design(&self) -> TrialDesign {
        TrialDesign {
            height_ratios: self.height_ratios.clone(),
            slant_angles: self.slants.clone(),
            repetitions: self.repetitions,
            practice_trials: self.practice_trials,
        }
    }
}
