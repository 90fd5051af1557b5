use serde::{Deserialize, Serialize};

/// One stimulus presentation. Immutable once generated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub stimulus_id: usize,
    pub height_ratio: f64,
    pub slant_angle: f64,
}

impl Trial {
    pub fn new(stimulus_id: usize, height_ratio: f64, slant_angle: f64) -> Self {
        Self {
            stimulus_id,
            height_ratio,
            slant_angle,
        }
    }
}

/// Recorded result per completed trial
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial: Trial,
    /// Seconds from stimulus onset to response, never negative
    pub reaction_time: f64,
    /// Sensor reading at response time (degrees)
    pub response_angle: f64,
}

impl TrialResult {
    pub fn new(trial: Trial, reaction_time: f64, response_angle: f64) -> Self {
        Self {
            trial,
            reaction_time: reaction_time.max(0.0),
            response_angle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaction_time_is_clamped_to_zero() {
        let r = TrialResult::new(Trial::new(0, 0.06, 60.0), -0.002, 61.5);
        assert_eq!(r.reaction_time, 0.0);
        assert_eq!(r.response_angle, 61.5);
    }
}
