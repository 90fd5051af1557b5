/// Presentation states. Queued states are popped one at a time by the
/// controller; each variant has exactly one entry routine.
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum PresentationState {
    DisplayMessage,
    ReadyBlock,
    DisplayFixation,
    DisplayStimulus,
    BreakMessage,
    EndMessage,
}

impl PresentationState {
    /// States in which a confirm input does something.
    pub fn accepts_confirm(&self) -> bool {
        matches!(
            self,
            Self::DisplayMessage | Self::DisplayStimulus | Self::EndMessage
        )
    }

    /// Queue heads a break may be spliced in front of.
    pub fn is_trial_phase(&self) -> bool {
        matches!(self, Self::DisplayFixation | Self::DisplayStimulus)
    }
}

#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Practice,
    Experimental,
}

impl BlockKind {
    /// Label used for the block's result files.
    pub fn label(&self) -> &'static str {
        match self {
            BlockKind::Practice => "practice",
            BlockKind::Experimental => "session",
        }
    }
}

#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    BeginPractice,
    BeginExperiment,
    Break,
    Resume,
    ThankYou,
}

impl MessageKind {
    pub fn text(&self) -> &'static str {
        match self {
            MessageKind::BeginPractice => "Please press [SPACE] to begin the practice block",
            MessageKind::BeginExperiment => "Please press [SPACE] to begin the formal experiment",
            MessageKind::Break => "Take a break, please",
            MessageKind::Resume => "Please press [SPACE] to resume the experiment",
            MessageKind::ThankYou => "Thank you for your participation in the experiment!",
        }
    }

    pub const ALL: [MessageKind; 5] = [
        MessageKind::BeginPractice,
        MessageKind::BeginExperiment,
        MessageKind::Break,
        MessageKind::Resume,
        MessageKind::ThankYou,
    ];
}

/// Non-stimulus content bound to the display.
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Fixation,
    Message(MessageKind),
}
