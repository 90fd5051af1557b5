use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use slant_core::StimulusAssets;
use slant_experiment::{DataRecorder, Participant, Session, TrialSequencer};
use slant_rig::app::{App, Setup};
use slant_rig::cli::Cli;
use slant_rig::config::RigConfig;
use slant_sensor::Inclinometer;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = RigConfig::load_from(&cli.config_dir)?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.debug.log_level.as_str()),
    )
    .init();

    let started = Instant::now();
    log::info!(
        "{} on {}/{}",
        config.experiment.name,
        std::env::consts::OS,
        std::env::consts::ARCH
    );

    let participant = Participant::resolve(
        &config.data.dir,
        &cli.intake(),
        config.experiment.total_sessions,
    )?;
    if participant.is_new {
        log::info!("new participant {} in {}", participant.manifest.id, participant.dir.display());
    }

    let assets = StimulusAssets::discover(&config.assets.stimuli_dir)?;
    let sequencer = TrialSequencer::setup(
        cli.practice,
        assets,
        config.experiment.design(),
        rand::rng(),
    )?;
    let recorder = DataRecorder::new(participant.dir.clone());
    let sensor = Inclinometer::spawn(&config.sensor)?;

    let session = Session {
        id: participant.session,
        frustum: config.display.frustum(),
        eyes: config
            .display
            .eyes(participant.manifest.pupil_size, cli.stereo),
    };

    App::new(Setup {
        config,
        session,
        sequencer,
        recorder,
        sensor,
        started,
    })
    .run()
}
