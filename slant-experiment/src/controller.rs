use std::collections::VecDeque;

use rand::Rng;
use slant_core::{
    compute_projection, BlockKind, ConfigurationError, EyePosition, Frustum, Mat4, MessageKind,
    PresentationState, Renderer, Screen, Trial,
};
use slant_sensor::TiltSensor;
use slant_timing::{Timer, TimerWheel, Timestamp};

use crate::config::ExperimentConfig;
use crate::error::SessionError;
use crate::recorder::DataRecorder;
use crate::sequencer::{Draw, TrialSequencer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerId {
    Fixation,
    BreakInterval,
    BreakDuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationEvent {
    Confirm,
    Abort,
    TimerFired(TimerId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Finished,
    Aborted,
    Failed(String),
}

/// Per-session geometry and identity.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: u32,
    pub frustum: Frustum,
    /// One eye for mono sessions, left then right for stereo
    pub eyes: Vec<EyePosition>,
}

/// Mutable session state. Owned by the controller alone.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub block_kind: BlockKind,
    pub on_break: bool,
    pub ended: bool,
    /// A break has been spliced into the queue but not shown yet
    pub break_pending: bool,
    /// The next message is the post-break resume prompt
    pub resuming: bool,
    pub pending: VecDeque<PresentationState>,
}

pub struct PresentationController<T, S, D, R>
where
    T: Timer,
    S: TiltSensor,
    D: Renderer,
    R: Rng,
{
    pub config: ExperimentConfig,
    pub session: Session,
    pub timer: T,
    sequencer: TrialSequencer<R>,
    recorder: DataRecorder,
    sensor: S,
    renderer: D,
    timers: TimerWheel<TimerId>,
    state: SessionState,
    current: Option<PresentationState>,
    current_trial: Option<Trial>,
    entered_at: Timestamp,
    onset: Option<Timestamp>,
    started_at: Timestamp,
    history: Vec<PresentationState>,
    torn_down: bool,
    status: SessionStatus,
}

impl<T, S, D, R> PresentationController<T, S, D, R>
where
    T: Timer,
    S: TiltSensor,
    D: Renderer,
    R: Rng,
{
    /// Build the session and zero the sensor. Nothing is shown until
    /// `start`.
    pub fn new(
        config: ExperimentConfig,
        session: Session,
        sequencer: TrialSequencer<R>,
        recorder: DataRecorder,
        mut sensor: S,
        renderer: D,
        timer: T,
    ) -> Result<Self, SessionError> {
        if session.eyes.is_empty() {
            return Err(ConfigurationError::invalid("session has no eye positions").into());
        }
        sensor.zero_offset()?;

        let block_kind = sequencer.block_kind().unwrap_or(BlockKind::Experimental);
        let mut pending = VecDeque::new();
        if sequencer.has_practice() {
            pending.extend([PresentationState::DisplayMessage, PresentationState::ReadyBlock]);
        }
        pending.extend([
            PresentationState::DisplayMessage,
            PresentationState::ReadyBlock,
            PresentationState::EndMessage,
        ]);

        let now = timer.now();
        Ok(Self {
            config,
            session,
            timer,
            sequencer,
            recorder,
            sensor,
            renderer,
            timers: TimerWheel::new(),
            state: SessionState {
                block_kind,
                on_break: false,
                ended: false,
                break_pending: false,
                resuming: false,
                pending,
            },
            current: None,
            current_trial: None,
            entered_at: now,
            onset: None,
            started_at: now,
            history: Vec::new(),
            torn_down: false,
            status: SessionStatus::Running,
        })
    }

    /// Enter the first queued state.
    pub fn start(&mut self) {
        if self.current.is_none() {
            self.started_at = self.timer.now();
            self.advance();
        }
    }

    /// Poll the timer wheel. Feed the returned events to `handle_event`.
    pub fn update(&mut self) -> Vec<PresentationEvent> {
        if self.torn_down {
            return Vec::new();
        }
        self.timers
            .poll(self.timer.now())
            .into_iter()
            .map(PresentationEvent::TimerFired)
            .collect()
    }

    /// Apply one event. Returns false when the event does not apply to the
    /// current state.
    pub fn handle_event(&mut self, event: PresentationEvent) -> bool {
        if self.torn_down {
            log::debug!("{event:?} after teardown ignored");
            return false;
        }

        match (self.current, event) {
            (_, PresentationEvent::Abort) => {
                log::warn!("session aborted by operator");
                self.teardown(SessionStatus::Aborted);
                true
            }
            (state, PresentationEvent::Confirm)
                if !state.is_some_and(|s| s.accepts_confirm()) =>
            {
                log::debug!("confirm ignored in {state:?}");
                false
            }
            (Some(PresentationState::DisplayMessage), PresentationEvent::Confirm) => {
                self.advance();
                true
            }
            (Some(PresentationState::DisplayStimulus), PresentationEvent::Confirm) => {
                self.record_response()
            }
            (Some(PresentationState::EndMessage), PresentationEvent::Confirm) => {
                self.teardown(SessionStatus::Finished);
                true
            }
            (
                Some(PresentationState::DisplayFixation),
                PresentationEvent::TimerFired(TimerId::Fixation),
            ) => {
                self.advance();
                true
            }
            (_, PresentationEvent::TimerFired(TimerId::BreakInterval)) => self.request_break(),
            (
                Some(PresentationState::BreakMessage),
                PresentationEvent::TimerFired(TimerId::BreakDuration),
            ) => {
                self.end_break();
                true
            }
            (state, event) => {
                log::debug!("{event:?} ignored in {state:?}");
                false
            }
        }
    }

    /// Draw the current state once per eye. The first stimulus frame marks
    /// stimulus onset.
    pub fn render_frame(&mut self) {
        if self.torn_down {
            return;
        }
        let Some(state) = self.current else {
            return;
        };

        let projections: Vec<Mat4> = self
            .session
            .eyes
            .iter()
            .map(|eye| compute_projection(&self.session.frustum, eye))
            .collect();

        let (is_stimulus, rotation_x) = match (state, &self.current_trial) {
            (PresentationState::DisplayStimulus, Some(trial)) => (true, trial.slant_angle),
            _ => (false, 0.0),
        };

        if let Err(e) = self.renderer.draw(is_stimulus, rotation_x, &projections) {
            self.fail(e.into());
            return;
        }

        if is_stimulus && self.onset.is_none() {
            let now = self.timer.now();
            self.onset = Some(now);
            log::debug!("stimulus onset at {now} ns");
        }
    }

    fn advance(&mut self) {
        match self.state.pending.pop_front() {
            Some(next) => self.enter(next),
            None => self.teardown(SessionStatus::Finished),
        }
    }

    /// Single entry point for every state transition.
    fn enter(&mut self, state: PresentationState) {
        if self.torn_down {
            return;
        }
        self.current = Some(state);
        self.history.push(state);
        self.entered_at = self.timer.now();
        self.onset = None;

        let result = match state {
            PresentationState::DisplayMessage => self.enter_message(),
            PresentationState::ReadyBlock => {
                self.enter_ready_block();
                Ok(())
            }
            PresentationState::DisplayFixation => self.enter_fixation(),
            PresentationState::DisplayStimulus => self.enter_stimulus(),
            PresentationState::BreakMessage => self.enter_break(),
            PresentationState::EndMessage => self.enter_end(),
        };
        if let Err(e) = result {
            self.fail(e);
        }
    }

    fn enter_message(&mut self) -> Result<(), SessionError> {
        let kind = if std::mem::take(&mut self.state.resuming) {
            MessageKind::Resume
        } else {
            match self.state.block_kind {
                BlockKind::Practice => MessageKind::BeginPractice,
                BlockKind::Experimental => MessageKind::BeginExperiment,
            }
        };
        self.renderer.bind_screen(Screen::Message(kind))?;
        Ok(())
    }

    fn enter_ready_block(&mut self) {
        let remaining = self.sequencer.remaining_in_block();
        log::info!(
            "{} block: {remaining} trials",
            self.state.block_kind.label()
        );
        for _ in 0..remaining {
            self.state.pending.push_front(PresentationState::DisplayStimulus);
            self.state.pending.push_front(PresentationState::DisplayFixation);
        }
        let now = self.timer.now();
        self.timers
            .arm_repeating(TimerId::BreakInterval, now, self.config.break_interval());
        self.advance();
    }

    fn enter_fixation(&mut self) -> Result<(), SessionError> {
        self.renderer.bind_screen(Screen::Fixation)?;
        let now = self.timer.now();
        self.timers
            .arm_once(TimerId::Fixation, now, self.config.fixation());
        Ok(())
    }

    fn enter_stimulus(&mut self) -> Result<(), SessionError> {
        let trial = match self.sequencer.advance() {
            Draw::Trial(trial) => trial,
            Draw::Exhausted => {
                log::warn!("stimulus state with no trial left, skipping");
                self.advance();
                return Ok(());
            }
        };
        let textures = self.sequencer.assets().textures(trial.stimulus_id).ok_or_else(|| {
            ConfigurationError::invalid(format!("no textures for stimulus {}", trial.stimulus_id))
        })?;
        self.renderer.bind_stimulus(&textures, trial.height_ratio)?;
        log::debug!(
            "trial: stimulus {} height ratio {} slant {}",
            trial.stimulus_id,
            trial.height_ratio,
            trial.slant_angle
        );
        self.current_trial = Some(trial);
        Ok(())
    }

    fn enter_break(&mut self) -> Result<(), SessionError> {
        self.state.break_pending = false;
        self.state.on_break = true;
        self.timers.cancel(TimerId::BreakInterval);
        self.renderer.bind_screen(Screen::Message(MessageKind::Break))?;
        let now = self.timer.now();
        self.timers
            .arm_once(TimerId::BreakDuration, now, self.config.break_duration());
        log::info!("break started");
        Ok(())
    }

    fn enter_end(&mut self) -> Result<(), SessionError> {
        self.state.ended = true;
        self.timers.cancel_all();
        self.renderer
            .bind_screen(Screen::Message(MessageKind::ThankYou))?;
        if let Err(e) = self.sensor.close() {
            log::warn!("sensor close failed: {e}");
        }
        self.recorder
            .flush(BlockKind::Experimental.label(), self.session.id)?;
        let secs = self.timer.elapsed(self.started_at).as_secs_f64();
        log::info!("experiment ran for {secs:.1} seconds");
        Ok(())
    }

    fn record_response(&mut self) -> bool {
        let now = self.timer.now();
        let Some(trial) = self.current_trial.take() else {
            return false;
        };

        let onset = self.onset.unwrap_or(self.entered_at);
        let reaction_time = now.saturating_sub(onset) as f64 / 1e9;
        let angle = match self.sensor.read_angle() {
            Ok(angle) => angle,
            Err(e) => {
                self.fail(e.into());
                return true;
            }
        };
        log::debug!("response {angle:.2} deg after {:.3} ms", reaction_time * 1e3);
        self.recorder.accumulate(trial, reaction_time, angle);

        if let Some(next) = self.sequencer.take_transition() {
            if let Err(e) = self
                .recorder
                .flush(BlockKind::Practice.label(), self.session.id)
            {
                self.fail(e.into());
                return true;
            }
            log::info!("practice finished, moving to {} block", next.label());
            self.state.block_kind = next;
        }

        self.advance();
        true
    }

    fn request_break(&mut self) -> bool {
        if self.state.on_break || self.state.ended || self.state.break_pending {
            return false;
        }
        let head = self.state.pending.front().copied();
        if !head.is_some_and(|h| h.is_trial_phase()) {
            log::debug!("break interval at {head:?} dropped");
            return false;
        }
        if head == Some(PresentationState::DisplayStimulus) {
            // never split fixation from its stimulus
            self.state.pending.pop_front();
            self.state.pending.push_front(PresentationState::BreakMessage);
            self.state
                .pending
                .push_front(PresentationState::DisplayStimulus);
        } else {
            self.state
                .pending
                .push_front(PresentationState::BreakMessage);
        }
        self.state.break_pending = true;
        log::debug!("break scheduled");
        true
    }

    fn end_break(&mut self) {
        self.state.on_break = false;
        self.state.resuming = true;
        let now = self.timer.now();
        self.timers
            .arm_repeating(TimerId::BreakInterval, now, self.config.break_interval());
        log::info!("break ended");
        self.enter(PresentationState::DisplayMessage);
    }

    fn fail(&mut self, err: SessionError) {
        if self.torn_down {
            return;
        }
        log::error!("session failed: {err}");
        self.teardown(SessionStatus::Failed(err.to_string()));
    }

    /// Idempotent shutdown shared by abort, failure and normal completion.
    fn teardown(&mut self, status: SessionStatus) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.timers.cancel_all();
        self.renderer.disable_state();
        self.renderer.unbind_all();
        if let Err(e) = self.sensor.close() {
            log::warn!("sensor close failed: {e}");
        }
        if let Err(e) = self
            .recorder
            .flush(self.state.block_kind.label(), self.session.id)
        {
            log::error!("results could not be saved: {e}");
        }

        let stats = self.timer.frame_stats();
        log::info!(
            "frames: {:.3} ms avg, {:.3} ms jitter, {:.1} fps",
            stats.average_frame_time_ns / 1e6,
            stats.jitter_ns / 1e6,
            stats.effective_fps
        );
        self.status = status;
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn current_state(&self) -> Option<PresentationState> {
        self.current
    }

    pub fn current_trial(&self) -> Option<&Trial> {
        self.current_trial.as_ref()
    }

    pub fn session_state(&self) -> &SessionState {
        &self.state
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[PresentationState] {
        &self.history
    }

    pub fn recorder(&self) -> &DataRecorder {
        &self.recorder
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn renderer(&self) -> &D {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut D {
        &mut self.renderer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.timers.is_armed(id)
    }
}
