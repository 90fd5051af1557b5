use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use slant_core::{
    DisplayConfig, Mat4, MessageKind, PresentationState, RenderError, Renderer, Screen,
    StimulusAssets, TrialTextures,
};
use slant_experiment::{
    DataRecorder, ExperimentConfig, PresentationController, PresentationEvent, Session,
    SessionStatus, TimerId, TrialSequencer, load_records,
};
use slant_sensor::StubSensor;
use slant_timing::ManualTimer;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Screen(Screen),
    Stimulus(PathBuf, f64),
    Draw { is_stimulus: bool, rotation_x: f64, eyes: usize },
    Disable,
    Unbind,
}

#[derive(Debug, Default)]
struct RecordingRenderer {
    calls: Vec<Call>,
}

impl RecordingRenderer {
    fn screens(&self) -> Vec<Screen> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Screen(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    fn stimulus_binds(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Stimulus(..)))
            .count()
    }
}

impl Renderer for RecordingRenderer {
    fn bind_screen(&mut self, screen: Screen) -> Result<(), RenderError> {
        self.calls.push(Call::Screen(screen));
        Ok(())
    }

    fn bind_stimulus(&mut self, textures: &TrialTextures, height_ratio: f64) -> Result<(), RenderError> {
        self.calls
            .push(Call::Stimulus(textures.colormap.clone(), height_ratio));
        Ok(())
    }

    fn draw(&mut self, is_stimulus: bool, rotation_x: f64, projections: &[Mat4]) -> Result<(), RenderError> {
        self.calls.push(Call::Draw {
            is_stimulus,
            rotation_x,
            eyes: projections.len(),
        });
        Ok(())
    }

    fn disable_state(&mut self) {
        self.calls.push(Call::Disable);
    }

    fn unbind_all(&mut self) {
        self.calls.push(Call::Unbind);
    }
}

type Controller = PresentationController<ManualTimer, StubSensor, RecordingRenderer, StdRng>;

const FIXATION: Duration = Duration::from_millis(500);
const RESPONSE: Duration = Duration::from_millis(250);

fn assets(n: usize) -> StimulusAssets {
    let files = |dir: &str| -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("{dir}/{i}.png"))).collect()
    };
    StimulusAssets::new(files("colormaps"), files("heightmaps"), files("normalmaps"))
}

fn config(practice_trials: usize, break_interval_ms: u64) -> ExperimentConfig {
    ExperimentConfig {
        fixation_ms: 500,
        break_interval_ms,
        break_duration_ms: 10_000,
        practice_trials,
        repetitions: 1,
        slants: vec![60.0],
        height_ratios: vec![0.06, 0.08],
        ..ExperimentConfig::default()
    }
}

fn build(
    config: ExperimentConfig,
    practice: bool,
    stimuli: usize,
    stereo: bool,
    sensor: StubSensor,
    dir: &Path,
) -> (Controller, ManualTimer) {
    let display = DisplayConfig::default();
    let sequencer = TrialSequencer::setup(
        practice,
        assets(stimuli),
        config.design(),
        StdRng::seed_from_u64(42),
    )
    .unwrap();
    let session = Session {
        id: 1,
        frustum: display.frustum(),
        eyes: display.eyes(6.0, stereo),
    };
    let timer = ManualTimer::new();
    let mut controller = PresentationController::new(
        config,
        session,
        sequencer,
        DataRecorder::new(dir),
        sensor,
        RecordingRenderer::default(),
        timer.clone(),
    )
    .unwrap();
    controller.start();
    (controller, timer)
}

fn pump(c: &mut Controller) {
    for event in c.update() {
        c.handle_event(event);
    }
}

/// Drive the session like a cooperative subject until it stops running.
fn drive(c: &mut Controller, timer: &ManualTimer) {
    for _ in 0..10_000 {
        if !c.is_running() {
            return;
        }
        match c.current_state() {
            Some(PresentationState::DisplayFixation) => {
                c.render_frame();
                timer.advance(FIXATION);
                pump(c);
            }
            Some(PresentationState::DisplayStimulus) => {
                c.render_frame();
                timer.advance(RESPONSE);
                pump(c);
                c.handle_event(PresentationEvent::Confirm);
            }
            Some(PresentationState::BreakMessage) => {
                timer.advance(Duration::from_millis(10_000));
                pump(c);
            }
            _ => {
                c.render_frame();
                c.handle_event(PresentationEvent::Confirm);
            }
        }
    }
    panic!("session did not finish");
}

fn assert_fixation_precedes_every_stimulus(history: &[PresentationState]) {
    for (i, state) in history.iter().enumerate() {
        if *state == PresentationState::DisplayStimulus {
            assert!(i > 0, "stimulus shown first");
            assert_eq!(
                history[i - 1],
                PresentationState::DisplayFixation,
                "stimulus at {i} not preceded by fixation: {history:?}"
            );
        }
    }
}

#[test]
fn two_trials_then_end_message() {
    let tmp = tempfile::tempdir().unwrap();
    let sensor = StubSensor::with_readings([61.0, 58.5]);
    let (mut c, timer) = build(config(10, 300_000), false, 1, false, sensor, tmp.path());

    assert_eq!(c.current_state(), Some(PresentationState::DisplayMessage));
    assert!(c.handle_event(PresentationEvent::Confirm));

    for _ in 0..2 {
        assert_eq!(c.current_state(), Some(PresentationState::DisplayFixation));
        assert!(!c.handle_event(PresentationEvent::Confirm));
        timer.advance(FIXATION);
        pump(&mut c);

        assert_eq!(c.current_state(), Some(PresentationState::DisplayStimulus));
        c.render_frame();
        timer.advance(RESPONSE);
        assert!(c.handle_event(PresentationEvent::Confirm));
    }

    assert_eq!(c.current_state(), Some(PresentationState::EndMessage));
    assert!(c.session_state().ended);
    assert!(c.sensor().is_closed());

    let records = load_records(&tmp.path().join("session_1.json")).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.values().all(|r| r.rt >= 0.0));
    assert!((records[&0].rt - 0.25).abs() < 1e-9);
    assert_eq!(records[&0].answer, 61.0);
    assert_eq!(records[&1].answer, 58.5);
    let mut ratios: Vec<f64> = records.values().map(|r| r.height_ratio).collect();
    ratios.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(ratios, vec![0.06, 0.08]);

    assert!(c.handle_event(PresentationEvent::Confirm));
    assert_eq!(c.status(), &SessionStatus::Finished);
    assert_eq!(c.renderer().stimulus_binds(), 2);
    assert_eq!(c.sensor().zero_offsets, 1);
    assert_eq!(c.sensor().reads, 2);
}

#[test]
fn confirm_is_ignored_during_fixation_and_breaks() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut c, timer) = build(config(0, 300), false, 2, false, StubSensor::new(60.0), tmp.path());

    c.handle_event(PresentationEvent::Confirm);
    assert_eq!(c.current_state(), Some(PresentationState::DisplayFixation));
    let seen = c.history().len();
    for _ in 0..3 {
        assert!(!c.handle_event(PresentationEvent::Confirm));
    }
    assert_eq!(c.history().len(), seen);
    assert!(c.is_armed(TimerId::Fixation));

    timer.advance(Duration::from_millis(300));
    pump(&mut c);
    timer.advance(Duration::from_millis(200));
    pump(&mut c);
    c.handle_event(PresentationEvent::Confirm);
    assert_eq!(c.current_state(), Some(PresentationState::BreakMessage));

    assert!(!c.handle_event(PresentationEvent::Confirm));
    assert_eq!(c.current_state(), Some(PresentationState::BreakMessage));
    assert_eq!(c.sensor().reads, 1);
    assert_eq!(c.recorder().pending().len(), 1);
}

#[test]
fn break_fired_during_stimulus_lands_before_next_fixation() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut c, timer) = build(config(0, 600), false, 2, false, StubSensor::new(60.0), tmp.path());

    c.handle_event(PresentationEvent::Confirm);
    timer.advance(FIXATION);
    pump(&mut c);
    assert_eq!(c.current_state(), Some(PresentationState::DisplayStimulus));

    timer.advance(Duration::from_millis(100));
    pump(&mut c);
    assert_eq!(c.current_state(), Some(PresentationState::DisplayStimulus));
    assert!(c.session_state().break_pending);

    c.handle_event(PresentationEvent::Confirm);
    assert_eq!(c.current_state(), Some(PresentationState::BreakMessage));
    assert!(c.session_state().on_break);
    assert_eq!(c.recorder().pending().len(), 1);
    assert!(!c.handle_event(PresentationEvent::Confirm));

    timer.advance(Duration::from_millis(10_000));
    pump(&mut c);
    assert_eq!(c.current_state(), Some(PresentationState::DisplayMessage));
    assert_eq!(
        c.renderer().screens().last(),
        Some(&Screen::Message(MessageKind::Resume))
    );
    assert!(!c.session_state().on_break);

    c.handle_event(PresentationEvent::Confirm);
    assert_eq!(c.current_state(), Some(PresentationState::DisplayFixation));

    let history = c.history();
    let at = history
        .iter()
        .position(|s| *s == PresentationState::BreakMessage)
        .unwrap();
    assert_eq!(history[at - 1], PresentationState::DisplayStimulus);
}

#[test]
fn break_fired_during_fixation_waits_for_the_stimulus() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut c, timer) = build(config(0, 300), false, 2, false, StubSensor::new(60.0), tmp.path());

    c.handle_event(PresentationEvent::Confirm);
    timer.advance(Duration::from_millis(300));
    pump(&mut c);
    assert_eq!(c.current_state(), Some(PresentationState::DisplayFixation));
    assert!(c.session_state().break_pending);

    timer.advance(Duration::from_millis(200));
    pump(&mut c);
    assert_eq!(c.current_state(), Some(PresentationState::DisplayStimulus));

    c.handle_event(PresentationEvent::Confirm);
    assert_eq!(c.current_state(), Some(PresentationState::BreakMessage));
    assert_eq!(
        c.history().to_vec(),
        vec![
            PresentationState::DisplayMessage,
            PresentationState::ReadyBlock,
            PresentationState::DisplayFixation,
            PresentationState::DisplayStimulus,
            PresentationState::BreakMessage,
        ]
    );
}

#[test]
fn frequent_breaks_never_split_a_trial() {
    let tmp = tempfile::tempdir().unwrap();
    for interval in [200, 450, 700, 1_100] {
        let dir = tmp.path().join(interval.to_string());
        let (mut c, timer) = build(config(3, interval), true, 4, false, StubSensor::new(60.0), &dir);
        drive(&mut c, &timer);

        assert_eq!(c.status(), &SessionStatus::Finished);
        let history = c.history();
        assert!(history.contains(&PresentationState::BreakMessage));
        assert_fixation_precedes_every_stimulus(history);
        let stimuli = history
            .iter()
            .filter(|s| **s == PresentationState::DisplayStimulus)
            .count();
        assert_eq!(stimuli, 3 + 8);
        assert_eq!(c.renderer().stimulus_binds(), stimuli);
        assert_eq!(history.last(), Some(&PresentationState::EndMessage));
    }
}

#[test]
fn practice_block_flushes_then_experimental_follows() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut c, timer) = build(config(2, 300_000), true, 1, false, StubSensor::new(75.0), tmp.path());
    drive(&mut c, &timer);

    assert_eq!(c.status(), &SessionStatus::Finished);
    assert_eq!(load_records(&tmp.path().join("practice_1.json")).unwrap().len(), 2);
    assert_eq!(load_records(&tmp.path().join("session_1.json")).unwrap().len(), 2);

    let messages: Vec<Screen> = c
        .renderer()
        .screens()
        .into_iter()
        .filter(|s| *s != Screen::Fixation)
        .collect();
    assert_eq!(
        messages,
        vec![
            Screen::Message(MessageKind::BeginPractice),
            Screen::Message(MessageKind::BeginExperiment),
            Screen::Message(MessageKind::ThankYou),
        ]
    );
    assert_eq!(c.sensor().zero_offsets, 1);
    assert_eq!(c.sensor().reads, 4);
}

#[test]
fn abort_flushes_only_completed_trials() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut c, timer) = build(config(0, 300_000), false, 2, false, StubSensor::new(60.0), tmp.path());

    c.handle_event(PresentationEvent::Confirm);
    timer.advance(FIXATION);
    pump(&mut c);
    c.handle_event(PresentationEvent::Confirm);
    timer.advance(FIXATION);
    pump(&mut c);
    assert_eq!(c.current_state(), Some(PresentationState::DisplayStimulus));

    assert!(c.handle_event(PresentationEvent::Abort));
    assert_eq!(c.status(), &SessionStatus::Aborted);
    assert!(c.sensor().is_closed());
    assert!(c.renderer().calls.contains(&Call::Disable));
    assert!(c.renderer().calls.contains(&Call::Unbind));

    let records = load_records(&tmp.path().join("session_1.json")).unwrap();
    assert_eq!(records.len(), 1);

    // teardown is idempotent and later events are no-ops
    assert!(!c.handle_event(PresentationEvent::Abort));
    assert!(!c.handle_event(PresentationEvent::Confirm));
    timer.advance(Duration::from_secs(600));
    assert!(c.update().is_empty());
    assert_eq!(c.sensor().closes, 1);
    assert_eq!(c.recorder().written().len(), 1);
}

#[test]
fn sensor_failure_tears_down_and_keeps_earlier_results() {
    let tmp = tempfile::tempdir().unwrap();
    let sensor = StubSensor::new(60.0).failing_on(2);
    let (mut c, timer) = build(config(0, 300_000), false, 2, false, sensor, tmp.path());
    drive(&mut c, &timer);

    assert!(matches!(c.status(), SessionStatus::Failed(_)));
    let records = load_records(&tmp.path().join("session_1.json")).unwrap();
    assert_eq!(records.len(), 1);
    assert!(c.sensor().is_closed());
}

#[test]
fn stereo_sessions_draw_both_eyes() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut c, timer) = build(config(0, 300_000), false, 1, true, StubSensor::new(60.0), tmp.path());
    c.handle_event(PresentationEvent::Confirm);
    timer.advance(FIXATION);
    pump(&mut c);
    c.render_frame();

    assert_eq!(
        c.renderer().calls.last(),
        Some(&Call::Draw {
            is_stimulus: true,
            rotation_x: 60.0,
            eyes: 2
        })
    );
}

#[test]
fn reaction_time_counts_from_first_stimulus_frame() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut c, timer) = build(config(0, 300_000), false, 1, false, StubSensor::new(60.0), tmp.path());
    c.handle_event(PresentationEvent::Confirm);
    timer.advance(FIXATION);
    pump(&mut c);

    timer.advance(Duration::from_millis(40));
    c.render_frame();
    timer.advance(Duration::from_millis(16));
    c.render_frame();
    timer.advance(Duration::from_millis(500));
    c.handle_event(PresentationEvent::Confirm);

    let rt = c.recorder().pending()[0].reaction_time;
    assert!((rt - 0.516).abs() < 1e-9, "rt = {rt}");
}

#[test]
fn second_run_of_same_session_does_not_overwrite() {
    let tmp = tempfile::tempdir().unwrap();
    for _ in 0..2 {
        let (mut c, timer) =
            build(config(0, 300_000), false, 1, false, StubSensor::new(60.0), tmp.path());
        drive(&mut c, &timer);
    }
    assert!(tmp.path().join("session_1.json").is_file());
    assert!(tmp.path().join("session_1A.json").is_file());
}
