use crate::action::is_completion;
use crate::{AgentStatusEvent, CommandKind, CommandResult};
use std::time::Duration;

/// How long a completion status lingers on screen before the run returns
/// to idle. The delay is cancellable; any later event or user command
/// invalidates it.
pub const IDLE_LINGER: Duration = Duration::from_secs(2);

/// Canonical belief about the agent run, exactly one at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl RunPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Running => "running",
            RunPhase::Paused => "paused",
            RunPhase::Stopped => "stopped",
        }
    }
}

/// Inputs to the run-state machine. Push events and user commands both
/// arrive here through one queue; nothing mutates state any other way.
#[derive(Debug, Clone)]
pub enum RunInput {
    SubmitPrompt(String),
    StatusEvent(AgentStatusEvent),
    Pause,
    Resume,
    Stop,
    /// The delayed-Idle timer elapsed. Applied only when `generation`
    /// still matches; a stale timer is discarded.
    IdleTimerFired { generation: u64 },
    /// A forwarded command came back. Applied only when `epoch` still
    /// matches; a settlement superseded by a later command is discarded.
    CommandSettled { epoch: u64, result: CommandResult },
}

/// Side effects the caller must execute after a transition. The reducer
/// itself performs no I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEffect {
    ForwardPrompt { epoch: u64, text: String },
    ForwardPause { epoch: u64 },
    ForwardResume { epoch: u64 },
    ForwardStop { epoch: u64 },
    ScheduleIdle { generation: u64, delay: Duration },
}

#[derive(Debug, Clone)]
pub struct RunState {
    phase: RunPhase,
    current: Option<AgentStatusEvent>,
    history: Vec<AgentStatusEvent>,
    idle_generation: u64,
    command_epoch: u64,
    notice: Option<String>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            phase: RunPhase::Idle,
            current: None,
            history: Vec::new(),
            idle_generation: 0,
            command_epoch: 0,
            notice: None,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// True iff the agent is mid-run from the user's point of view.
    pub fn is_agent_running(&self) -> bool {
        matches!(self.phase, RunPhase::Running | RunPhase::Paused)
    }

    pub fn current_status(&self) -> Option<&AgentStatusEvent> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &[AgentStatusEvent] {
        &self.history
    }

    /// One-shot user-visible failure line. Taking it clears it.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Apply one input and return the effects the caller must run.
    ///
    /// Transitions run to completion; the caller must not interleave two
    /// `apply` calls for one state instance.
    pub fn apply(&mut self, input: RunInput) -> Vec<RunEffect> {
        match input {
            RunInput::SubmitPrompt(text) => self.on_submit(text),
            RunInput::StatusEvent(event) => self.on_status(event),
            RunInput::Pause => self.on_pause(),
            RunInput::Resume => self.on_resume(),
            RunInput::Stop => self.on_stop(),
            RunInput::IdleTimerFired { generation } => self.on_idle_timer(generation),
            RunInput::CommandSettled { epoch, result } => self.on_settled(epoch, result),
        }
    }

    fn on_submit(&mut self, text: String) -> Vec<RunEffect> {
        let prompt = text.trim();
        if prompt.is_empty() {
            // EmptyInput: rejected before any network call.
            self.notice = Some("Prompt is empty".to_string());
            return Vec::new();
        }
        if self.is_agent_running() {
            self.notice = Some("Agent is already running; stop it first".to_string());
            return Vec::new();
        }

        self.invalidate_timers();
        self.command_epoch += 1;
        self.history.clear();
        self.history.push(AgentStatusEvent::user(prompt));
        self.phase = RunPhase::Running;
        self.current = None;
        vec![RunEffect::ForwardPrompt {
            epoch: self.command_epoch,
            text: prompt.to_string(),
        }]
    }

    fn on_status(&mut self, event: AgentStatusEvent) -> Vec<RunEffect> {
        // Append before any transition logic runs.
        self.history.push(event.clone());

        if !self.is_agent_running() {
            // No transition is enumerated for pushes outside a run.
            return Vec::new();
        }

        // A push while paused is live evidence the agent is acting.
        self.phase = RunPhase::Running;
        let completion = is_completion(&event.display_message);
        self.current = Some(event);

        if completion {
            self.idle_generation += 1;
            vec![RunEffect::ScheduleIdle {
                generation: self.idle_generation,
                delay: IDLE_LINGER,
            }]
        } else {
            Vec::new()
        }
    }

    fn on_pause(&mut self) -> Vec<RunEffect> {
        // Local intent always wins over a stale push-derived timer.
        self.invalidate_timers();
        match self.phase {
            RunPhase::Running => {
                self.command_epoch += 1;
                self.phase = RunPhase::Paused;
                // `current` is populated only while Running.
                self.current = None;
                vec![RunEffect::ForwardPause {
                    epoch: self.command_epoch,
                }]
            }
            // Second pause without an intervening resume is a no-op.
            RunPhase::Paused => Vec::new(),
            RunPhase::Idle | RunPhase::Stopped => Vec::new(),
        }
    }

    fn on_resume(&mut self) -> Vec<RunEffect> {
        self.invalidate_timers();
        match self.phase {
            RunPhase::Paused => {
                self.command_epoch += 1;
                self.phase = RunPhase::Running;
                vec![RunEffect::ForwardResume {
                    epoch: self.command_epoch,
                }]
            }
            _ => Vec::new(),
        }
    }

    fn on_stop(&mut self) -> Vec<RunEffect> {
        self.invalidate_timers();
        match self.phase {
            RunPhase::Running | RunPhase::Paused => {
                self.command_epoch += 1;
                self.phase = RunPhase::Stopped;
                self.current = None;
                self.history.push(AgentStatusEvent::system("Agent stopped"));
                vec![RunEffect::ForwardStop {
                    epoch: self.command_epoch,
                }]
            }
            RunPhase::Idle | RunPhase::Stopped => Vec::new(),
        }
    }

    fn on_idle_timer(&mut self, generation: u64) -> Vec<RunEffect> {
        if generation != self.idle_generation {
            // Stale timer, already invalidated by a later event or command.
            return Vec::new();
        }
        if self.phase == RunPhase::Running {
            self.phase = RunPhase::Idle;
            self.current = None;
        }
        Vec::new()
    }

    fn on_settled(&mut self, epoch: u64, result: CommandResult) -> Vec<RunEffect> {
        if epoch != self.command_epoch {
            // Superseded by a later command; a late response must not apply.
            return Vec::new();
        }
        if result.is_success() {
            if result.kind == CommandKind::Stop {
                self.phase = RunPhase::Idle;
                self.current = None;
            }
            return Vec::new();
        }

        let message = result
            .failure_message()
            .unwrap_or("command failed")
            .to_string();
        match result.kind {
            CommandKind::Chat => {
                self.history
                    .push(AgentStatusEvent::system(format!("Prompt failed: {message}")));
                self.phase = RunPhase::Idle;
                self.current = None;
            }
            CommandKind::Pause => {
                // Net effect of a failed pause is no state change.
                if self.phase == RunPhase::Paused {
                    self.phase = RunPhase::Running;
                }
                self.history
                    .push(AgentStatusEvent::system(format!("Pause failed: {message}")));
            }
            CommandKind::Resume => {
                if self.phase == RunPhase::Running {
                    self.phase = RunPhase::Paused;
                    self.current = None;
                }
                self.history
                    .push(AgentStatusEvent::system(format!("Resume failed: {message}")));
            }
            CommandKind::Stop => {
                // Stop is the escape hatch; locally we are stopped either way.
                self.history
                    .push(AgentStatusEvent::system(format!("Stop failed: {message}")));
                self.phase = RunPhase::Idle;
                self.current = None;
            }
        }
        self.notice = Some(message);
        Vec::new()
    }

    fn invalidate_timers(&mut self) {
        self.idle_generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CommandOutcome, EventOrigin};
    use serde_json::json;

    fn running_state() -> RunState {
        let mut state = RunState::new();
        let effects = state.apply(RunInput::SubmitPrompt("open safari".into()));
        assert_eq!(effects.len(), 1);
        state
    }

    fn settle_ok(state: &mut RunState, epoch: u64, kind: CommandKind) {
        state.apply(RunInput::CommandSettled {
            epoch,
            result: CommandResult::success(kind, json!({"success": true})),
        });
    }

    #[test]
    fn submit_clears_history_and_echoes_prompt_first() {
        let mut state = RunState::new();
        state.apply(RunInput::StatusEvent(AgentStatusEvent::agent("old", "old")));

        let effects = state.apply(RunInput::SubmitPrompt("  open safari  ".into()));
        assert_eq!(state.phase(), RunPhase::Running);
        assert_eq!(state.history().len(), 1);
        assert_eq!(state.history()[0].display_message, "open safari");
        assert_eq!(state.history()[0].origin, EventOrigin::User);
        assert_eq!(
            effects,
            vec![RunEffect::ForwardPrompt {
                epoch: 1,
                text: "open safari".into(),
            }]
        );
    }

    #[test]
    fn blank_prompt_is_rejected_without_effects() {
        let mut state = RunState::new();
        let effects = state.apply(RunInput::SubmitPrompt("   ".into()));
        assert!(effects.is_empty());
        assert_eq!(state.phase(), RunPhase::Idle);
        assert!(state.history().is_empty());
        assert!(state.take_notice().is_some());
        assert!(state.take_notice().is_none());
    }

    #[test]
    fn submit_failure_returns_to_idle_with_error_entry() {
        let mut state = running_state();
        state.apply(RunInput::CommandSettled {
            epoch: 1,
            result: CommandResult::transport_failure(CommandKind::Chat, "connection refused"),
        });
        assert_eq!(state.phase(), RunPhase::Idle);
        let last = state.history().last().unwrap();
        assert_eq!(last.origin, EventOrigin::System);
        assert!(last.display_message.contains("connection refused"));
    }

    #[test]
    fn status_events_append_in_order_and_update_current() {
        let mut state = running_state();
        state.apply(RunInput::StatusEvent(AgentStatusEvent::agent("a", "a")));
        state.apply(RunInput::StatusEvent(AgentStatusEvent::agent("b", "b")));
        assert_eq!(state.phase(), RunPhase::Running);
        assert_eq!(state.current_status().unwrap().display_message, "b");
        let displays: Vec<_> = state
            .history()
            .iter()
            .map(|event| event.display_message.as_str())
            .collect();
        assert_eq!(displays, vec!["open safari", "a", "b"]);
    }

    #[test]
    fn completion_event_schedules_cancellable_idle() {
        let mut state = running_state();
        let effects = state.apply(RunInput::StatusEvent(AgentStatusEvent::agent(
            "Task completed successfully",
            "Task completed successfully",
        )));
        let generation = match effects.as_slice() {
            [RunEffect::ScheduleIdle { generation, delay }] => {
                assert_eq!(*delay, IDLE_LINGER);
                *generation
            }
            other => panic!("expected ScheduleIdle, got {other:?}"),
        };

        // Uncancelled timer fires: exactly one idle entry.
        state.apply(RunInput::IdleTimerFired { generation });
        assert_eq!(state.phase(), RunPhase::Idle);
        assert!(state.current_status().is_none());

        // Firing again with the same stale generation is a no-op.
        let before = state.history().len();
        state.apply(RunInput::IdleTimerFired { generation });
        assert_eq!(state.phase(), RunPhase::Idle);
        assert_eq!(state.history().len(), before);
    }

    #[test]
    fn stop_cancels_pending_idle_timer() {
        let mut state = running_state();
        let effects = state.apply(RunInput::StatusEvent(AgentStatusEvent::agent(
            "done", "done",
        )));
        let generation = match effects.as_slice() {
            [RunEffect::ScheduleIdle { generation, .. }] => *generation,
            other => panic!("expected ScheduleIdle, got {other:?}"),
        };

        let effects = state.apply(RunInput::Stop);
        assert_eq!(state.phase(), RunPhase::Stopped);
        assert!(matches!(
            effects.as_slice(),
            [RunEffect::ForwardStop { epoch: 2 }]
        ));

        // The superseded timer fires late and must not re-enter Idle on
        // its own terms (no duplicate idle-entry side effects).
        state.apply(RunInput::IdleTimerFired { generation });
        assert_eq!(state.phase(), RunPhase::Stopped);

        settle_ok(&mut state, 2, CommandKind::Stop);
        assert_eq!(state.phase(), RunPhase::Idle);
    }

    #[test]
    fn pause_clears_the_current_status_line() {
        let mut state = running_state();
        state.apply(RunInput::StatusEvent(AgentStatusEvent::agent(
            "typing", "typing",
        )));
        assert!(state.current_status().is_some());

        state.apply(RunInput::Pause);
        assert_eq!(state.phase(), RunPhase::Paused);
        assert!(state.current_status().is_none());

        // Re-entering Running through a fresh push repopulates it.
        state.apply(RunInput::StatusEvent(AgentStatusEvent::agent(
            "clicking", "clicking",
        )));
        assert_eq!(state.current_status().unwrap().display_message, "clicking");
    }

    #[test]
    fn pause_twice_is_single_transition() {
        let mut state = running_state();
        let first = state.apply(RunInput::Pause);
        assert_eq!(state.phase(), RunPhase::Paused);
        assert_eq!(first.len(), 1);

        let second = state.apply(RunInput::Pause);
        assert!(second.is_empty());
        assert_eq!(state.phase(), RunPhase::Paused);
    }

    #[test]
    fn pause_resume_round_trip() {
        let mut state = running_state();
        state.apply(RunInput::Pause);
        settle_ok(&mut state, 2, CommandKind::Pause);
        assert_eq!(state.phase(), RunPhase::Paused);
        assert!(state.is_agent_running());

        let effects = state.apply(RunInput::Resume);
        assert!(matches!(
            effects.as_slice(),
            [RunEffect::ForwardResume { epoch: 3 }]
        ));
        assert_eq!(state.phase(), RunPhase::Running);
    }

    #[test]
    fn failed_pause_reverts_to_running() {
        let mut state = running_state();
        state.apply(RunInput::Pause);
        state.apply(RunInput::CommandSettled {
            epoch: 2,
            result: CommandResult::transport_failure(CommandKind::Pause, "timeout"),
        });
        assert_eq!(state.phase(), RunPhase::Running);
        assert_eq!(state.take_notice().as_deref(), Some("timeout"));
    }

    #[test]
    fn stale_pause_settlement_is_discarded() {
        let mut state = running_state();
        state.apply(RunInput::Pause);
        // Stop supersedes the in-flight pause before it settles.
        state.apply(RunInput::Stop);
        assert_eq!(state.phase(), RunPhase::Stopped);

        state.apply(RunInput::CommandSettled {
            epoch: 2,
            result: CommandResult::transport_failure(CommandKind::Pause, "late failure"),
        });
        assert_eq!(state.phase(), RunPhase::Stopped);
        assert!(state.take_notice().is_none());
    }

    #[test]
    fn status_event_while_paused_reenters_running() {
        let mut state = running_state();
        state.apply(RunInput::Pause);
        state.apply(RunInput::StatusEvent(AgentStatusEvent::agent(
            "typing", "typing",
        )));
        assert_eq!(state.phase(), RunPhase::Running);
    }

    #[test]
    fn status_event_while_idle_appends_without_transition() {
        let mut state = RunState::new();
        state.apply(RunInput::StatusEvent(AgentStatusEvent::agent(
            "stray", "stray",
        )));
        assert_eq!(state.phase(), RunPhase::Idle);
        assert_eq!(state.history().len(), 1);
        assert!(state.current_status().is_none());
    }

    #[test]
    fn new_event_before_linger_elapses_discards_pending_idle() {
        let mut state = running_state();
        let effects = state.apply(RunInput::StatusEvent(AgentStatusEvent::agent(
            "done", "done",
        )));
        let generation = match effects.as_slice() {
            [RunEffect::ScheduleIdle { generation, .. }] => *generation,
            other => panic!("expected ScheduleIdle, got {other:?}"),
        };

        // A non-completion event arrives within the window. The old timer
        // must not apply; the run keeps going.
        state.apply(RunInput::StatusEvent(AgentStatusEvent::agent(
            "thinking", "thinking",
        )));
        state.apply(RunInput::IdleTimerFired { generation });
        assert_eq!(state.phase(), RunPhase::Running);
    }

    #[test]
    fn prompt_can_be_resubmitted_from_stopped() {
        let mut state = running_state();
        state.apply(RunInput::Stop);
        assert_eq!(state.phase(), RunPhase::Stopped);

        let effects = state.apply(RunInput::SubmitPrompt("next task".into()));
        assert_eq!(state.phase(), RunPhase::Running);
        assert_eq!(state.history().len(), 1);
        assert!(matches!(
            effects.as_slice(),
            [RunEffect::ForwardPrompt { epoch: 3, .. }]
        ));
    }

    #[test]
    fn phase_is_always_exactly_one_of_the_four() {
        // Arbitrary interleaving never leaves the state undefined.
        let mut state = RunState::new();
        let inputs = vec![
            RunInput::Pause,
            RunInput::SubmitPrompt("task".into()),
            RunInput::StatusEvent(AgentStatusEvent::agent("working", "working")),
            RunInput::Pause,
            RunInput::Pause,
            RunInput::StatusEvent(AgentStatusEvent::agent("done", "done")),
            RunInput::Resume,
            RunInput::Stop,
            RunInput::IdleTimerFired { generation: 99 },
            RunInput::SubmitPrompt("again".into()),
        ];
        for input in inputs {
            state.apply(input);
            assert!(matches!(
                state.phase(),
                RunPhase::Idle | RunPhase::Running | RunPhase::Paused | RunPhase::Stopped
            ));
        }
    }

    #[test]
    fn remote_rejected_settlement_surfaces_once() {
        let mut state = running_state();
        state.apply(RunInput::CommandSettled {
            epoch: 1,
            result: CommandResult {
                kind: CommandKind::Chat,
                outcome: CommandOutcome::RemoteRejected("agent busy".into()),
            },
        });
        assert_eq!(state.phase(), RunPhase::Idle);
        assert_eq!(state.take_notice().as_deref(), Some("agent busy"));
    }
}
