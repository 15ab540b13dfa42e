//! Menu navigation state machine.
//!
//! Configuring the peer means walking a fixed three-level inline menu and
//! then planting a system prompt. Each transition is a pure function of
//! (state, observation) returning (next state, effect); the driver performs
//! effects against the session and feeds the next observation back in. A
//! missing menu button is a soft failure: the machine logs it and proceeds,
//! assuming the remote menu may already be in the target state.

use std::time::Duration;

use tracing::{debug, info, warn};

use {parley_config::Timing, parley_transport::SessionGuard};

use crate::error::Result;

/// Command that collapses the peer's menu back to its root.
pub const RESET_COMMAND: &str = "/reset";

/// Default system prompt planted after menu selection. Callers may override
/// it per cycle via the payload's `prompt` field.
pub const DEFAULT_SYSTEM_PROMPT: &str = "From now on, answer every message with a single JSON \
object and nothing else. The object must always contain an \"action\" field (\"PUBLISH\" or \
\"NONE\") and a \"next_scan_minutes\" integer. When action is \"PUBLISH\", include \
\"final_text\", \"source_id\", and \"reply_to_source_id\".";

/// Predicate over an inline choice label.
#[derive(Debug, Clone)]
pub enum LabelMatcher {
    /// Case-insensitive: any listed fragment appears in the label.
    Any(Vec<String>),
    /// Case-insensitive: every listed fragment appears in the label.
    All(Vec<String>),
}

impl LabelMatcher {
    pub fn any<I: IntoIterator<Item = S>, S: Into<String>>(fragments: I) -> Self {
        Self::Any(fragments.into_iter().map(Into::into).collect())
    }

    pub fn all<I: IntoIterator<Item = S>, S: Into<String>>(fragments: I) -> Self {
        Self::All(fragments.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn matches(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        match self {
            Self::Any(fragments) => fragments.iter().any(|f| label.contains(&f.to_lowercase())),
            Self::All(fragments) => fragments.iter().all(|f| label.contains(&f.to_lowercase())),
        }
    }
}

/// One menu selection level.
#[derive(Debug, Clone)]
pub struct MenuStep {
    pub name: &'static str,
    pub matcher: LabelMatcher,
    pub settle: Duration,
}

/// The fixed navigation plan: reset, three selections, system prompt.
#[derive(Debug, Clone)]
pub struct NavigationPlan {
    pub reset_command: String,
    pub steps: [MenuStep; 3],
    pub prompt: String,
}

impl NavigationPlan {
    /// The standard plan. Settle delays come from [`Timing`] so tests can
    /// shrink them; the prompt may be overridden per cycle.
    #[must_use]
    pub fn standard(timing: &Timing, prompt_override: Option<&str>) -> Self {
        Self {
            reset_command: RESET_COMMAND.to_string(),
            steps: [
                MenuStep {
                    name: "assistant",
                    matcher: LabelMatcher::any(["assistant", "agent"]),
                    settle: timing.settle,
                },
                MenuStep {
                    name: "structured output",
                    matcher: LabelMatcher::all(["structured", "output"]),
                    settle: timing.settle,
                },
                MenuStep {
                    name: "json format",
                    matcher: LabelMatcher::any(["json"]),
                    settle: timing.settle,
                },
            ],
            prompt: prompt_override.unwrap_or(DEFAULT_SYSTEM_PROMPT).to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Idle,
    ResetSent,
    L1Selected,
    L2Selected,
    L3Selected,
    PromptSent,
    Ready,
}

impl NavState {
    /// Which plan step's button this state is hunting for, if any.
    #[must_use]
    pub fn step_index(self) -> Option<usize> {
        match self {
            Self::ResetSent => Some(0),
            Self::L1Selected => Some(1),
            Self::L2Selected => Some(2),
            _ => None,
        }
    }
}

/// What the driver observed since the last transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Begin,
    ChoiceFound { message_id: i64, label: String },
    ChoiceMissing,
    Settled,
}

/// Side effect the driver must perform to enter the returned state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEffect {
    SendReset,
    Click { message_id: i64, label: String },
    /// Soft-failure path: no button to click, move on.
    Proceed,
    SendPrompt,
    Buffer,
    Done,
}

/// The transition function. Pure: no I/O, no clocks.
#[must_use]
pub fn transition(state: NavState, observation: &Observation) -> (NavState, NavEffect) {
    use NavState::*;
    match (state, observation) {
        (Idle, _) => (ResetSent, NavEffect::SendReset),
        (ResetSent | L1Selected | L2Selected, Observation::ChoiceFound { message_id, label }) => (
            state.advanced(),
            NavEffect::Click {
                message_id: *message_id,
                label: label.clone(),
            },
        ),
        (ResetSent | L1Selected | L2Selected, _) => (state.advanced(), NavEffect::Proceed),
        (L3Selected, _) => (PromptSent, NavEffect::SendPrompt),
        (PromptSent, _) => (Ready, NavEffect::Buffer),
        (Ready, _) => (Ready, NavEffect::Done),
    }
}

impl NavState {
    fn advanced(self) -> Self {
        match self {
            Self::ResetSent => Self::L1Selected,
            Self::L1Selected => Self::L2Selected,
            Self::L2Selected => Self::L3Selected,
            other => other,
        }
    }
}

/// Navigation result: how many steps fell back to the soft-failure path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationOutcome {
    pub soft_failures: u32,
}

/// Drive the machine to `Ready` against a live session.
pub async fn run(
    session: &SessionGuard,
    plan: &NavigationPlan,
    timing: &Timing,
) -> Result<NavigationOutcome> {
    let mut state = NavState::Idle;
    let mut observation = Observation::Begin;
    let mut outcome = NavigationOutcome::default();

    loop {
        let (next, effect) = transition(state, &observation);
        debug!(?state, ?next, ?effect, "navigation transition");

        match effect {
            NavEffect::SendReset => {
                session.send_text(&plan.reset_command).await?;
                tokio::time::sleep(timing.settle).await;
            },
            NavEffect::Click { message_id, label } => {
                let settle = state
                    .step_index()
                    .map_or(timing.settle, |i| plan.steps[i].settle);
                if let Err(e) = session.click_choice(message_id, &label).await {
                    // The button may have gone stale between scan and click.
                    warn!(label, error = %e, "menu click failed, proceeding");
                    outcome.soft_failures += 1;
                }
                tokio::time::sleep(settle).await;
            },
            NavEffect::Proceed => {
                let step = state.step_index().map(|i| plan.steps[i].name);
                warn!(?step, "menu choice not found, assuming already selected");
                outcome.soft_failures += 1;
            },
            NavEffect::SendPrompt => {
                session.send_text(&plan.prompt).await?;
            },
            NavEffect::Buffer => {
                tokio::time::sleep(timing.prompt_buffer).await;
            },
            NavEffect::Done => break,
        }

        state = next;
        observation = observe(session, plan, state, timing).await;
    }

    info!(soft_failures = outcome.soft_failures, "navigation complete");
    Ok(outcome)
}

/// Produce the observation the next transition needs: scan the recent
/// window for the pending step's button, re-scanning up to the retry bound.
async fn observe(
    session: &SessionGuard,
    plan: &NavigationPlan,
    state: NavState,
    timing: &Timing,
) -> Observation {
    let Some(index) = state.step_index() else {
        return Observation::Settled;
    };
    let step = &plan.steps[index];

    for attempt in 0..=timing.nav_retries {
        match session.recent_messages(timing.recent_window).await {
            Ok(messages) => {
                for message in &messages {
                    if message.outgoing {
                        continue;
                    }
                    if let Some(label) = message
                        .choices
                        .iter()
                        .find(|c| step.matcher.matches(c.as_str()))
                    {
                        return Observation::ChoiceFound {
                            message_id: message.id,
                            label: label.clone(),
                        };
                    }
                }
            },
            Err(e) => {
                warn!(step = step.name, attempt, error = %e, "menu scan failed");
            },
        }
        if attempt < timing.nav_retries {
            tokio::time::sleep(timing.nav_retry_wait).await;
        }
    }
    Observation::ChoiceMissing
}
