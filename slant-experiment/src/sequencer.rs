use std::collections::VecDeque;

use rand::Rng;
use rand::seq::SliceRandom;
use slant_core::{BlockKind, ConfigurationError, StimulusAssets, Trial};

/// Factor levels crossed with the stimulus set.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialDesign {
    pub height_ratios: Vec<f64>,
    pub slant_angles: Vec<f64>,
    pub repetitions: usize,
    pub practice_trials: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    PreparePractice,
    RunBlock(BlockKind),
    PrepareExperimental,
    Done,
}

/// Result of asking the sequencer for the next trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Draw {
    Trial(Trial),
    Exhausted,
}

/// Serves practice trials (if any), then the experimental block, each trial
/// exactly once.
pub struct TrialSequencer<R: Rng> {
    rng: R,
    assets: StimulusAssets,
    conditions: Vec<Trial>,
    design: TrialDesign,
    state: SequencerState,
    block: VecDeque<Trial>,
    transition: Option<BlockKind>,
    practice: bool,
}

impl<R: Rng> TrialSequencer<R> {
    pub fn setup(
        practice_enabled: bool,
        assets: StimulusAssets,
        design: TrialDesign,
        rng: R,
    ) -> Result<Self, ConfigurationError> {
        let stimulus_count = assets.validate()?;
        if assets.is_empty() {
            return Err(ConfigurationError::EmptyDesign("no stimuli found".into()));
        }
        if design.height_ratios.is_empty() {
            return Err(ConfigurationError::EmptyDesign("no height ratios".into()));
        }
        if design.slant_angles.is_empty() {
            return Err(ConfigurationError::EmptyDesign("no slant angles".into()));
        }
        if design.repetitions == 0 {
            return Err(ConfigurationError::EmptyDesign("zero repetitions".into()));
        }

        let practice = practice_enabled && design.practice_trials > 0;
        if practice_enabled && !practice {
            log::warn!("practice requested with zero practice trials, skipping practice");
        }

        let conditions = cartesian(stimulus_count, &design);
        let mut sequencer = Self {
            rng,
            assets,
            conditions,
            design,
            state: SequencerState::Idle,
            block: VecDeque::new(),
            transition: None,
            practice,
        };

        if practice {
            sequencer.prepare_practice();
        } else {
            sequencer.prepare_experimental();
        }
        // the first block is not a change of block
        sequencer.transition = None;
        Ok(sequencer)
    }

    /// Next trial of the running block. Popping the last practice trial
    /// starts the experimental block and leaves a note for
    /// `take_transition`.
    pub fn advance(&mut self) -> Draw {
        let SequencerState::RunBlock(kind) = self.state else {
            return Draw::Exhausted;
        };

        match self.block.pop_front() {
            Some(trial) => {
                if self.block.is_empty() {
                    self.finish_block(kind);
                }
                Draw::Trial(trial)
            }
            None => {
                self.finish_block(kind);
                self.advance()
            }
        }
    }

    /// Block entered since the last call, if the practice block ran out.
    pub fn take_transition(&mut self) -> Option<BlockKind> {
        self.transition.take()
    }

    pub fn remaining_in_block(&self) -> usize {
        self.block.len()
    }

    pub fn block_kind(&self) -> Option<BlockKind> {
        match self.state {
            SequencerState::RunBlock(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn has_practice(&self) -> bool {
        self.practice
    }

    pub fn assets(&self) -> &StimulusAssets {
        &self.assets
    }

    fn finish_block(&mut self, kind: BlockKind) {
        match kind {
            BlockKind::Practice => self.prepare_experimental(),
            BlockKind::Experimental => {
                self.state = SequencerState::Done;
                log::debug!("experimental block exhausted");
            }
        }
    }

    fn prepare_practice(&mut self) {
        self.state = SequencerState::PreparePractice;
        let n = self.conditions.len();
        self.block = (0..self.design.practice_trials)
            .map(|_| self.conditions[self.rng.random_range(0..n)])
            .collect();
        log::info!("practice block ready: {} trials", self.block.len());
        self.state = SequencerState::RunBlock(BlockKind::Practice);
    }

    fn prepare_experimental(&mut self) {
        self.state = SequencerState::PrepareExperimental;
        let mut order: Vec<Trial> = Vec::with_capacity(self.conditions.len() * self.design.repetitions);
        for _ in 0..self.design.repetitions {
            order.extend_from_slice(&self.conditions);
        }
        order.shuffle(&mut self.rng);
        self.block = order.into();
        log::info!("experimental block ready: {} trials", self.block.len());
        self.state = SequencerState::RunBlock(BlockKind::Experimental);
        self.transition = Some(BlockKind::Experimental);
    }
}

fn cartesian(stimulus_count: usize, design: &TrialDesign) -> Vec<Trial> {
    let mut conditions = Vec::with_capacity(
        stimulus_count * design.height_ratios.len() * design.slant_angles.len(),
    );
    for stimulus_id in 0..stimulus_count {
        for &height_ratio in &design.height_ratios {
            for &slant_angle in &design.slant_angles {
                conditions.push(Trial::new(stimulus_id, height_ratio, slant_angle));
            }
        }
    }
    conditions
}
