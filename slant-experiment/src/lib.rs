pub mod config;
pub mod controller;
pub mod error;
pub mod participant;
pub mod recorder;
pub mod sequencer;

pub use config::ExperimentConfig;
pub use controller::{
    PresentationController, PresentationEvent, Session, SessionState, SessionStatus, TimerId,
};
pub use error::{RecorderError, SessionError};
pub use participant::{Intake, Manifest, Participant, next_id};
pub use recorder::{DataRecorder, ResultRecord, load_records};
pub use sequencer::{Draw, SequencerState, TrialDesign, TrialSequencer};
