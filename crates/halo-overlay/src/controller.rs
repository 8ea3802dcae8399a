use halo_core::run::{RunEffect, RunInput, RunState};
use halo_relay::AgentClient;
use tokio::sync::mpsc;
use tracing::debug;

/// Single owner of the run state. Relay pushes and user commands feed the
/// same queue; the consumer calls [`handle`] sequentially, so transitions
/// never interleave.
///
/// Effects returned by the reducer are executed here: forwards run as
/// spawned tasks that settle back into the queue tagged with their epoch,
/// and the delayed-Idle timer settles back tagged with its generation.
/// The reducer discards whatever arrives stale.
///
/// [`handle`]: Controller::handle
pub struct Controller {
    state: RunState,
    client: AgentClient,
    queue: mpsc::Sender<RunInput>,
}

impl Controller {
    pub fn new(client: AgentClient, queue: mpsc::Sender<RunInput>) -> Self {
        Self {
            state: RunState::new(),
            client,
            queue,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn take_notice(&mut self) -> Option<String> {
        self.state.take_notice()
    }

    /// Apply one input and execute the resulting effects.
    pub fn handle(&mut self, input: RunInput) {
        for effect in self.state.apply(input) {
            self.run_effect(effect);
        }
    }

    fn run_effect(&self, effect: RunEffect) {
        debug!(event = "run_effect", effect = ?effect);
        match effect {
            RunEffect::ForwardPrompt { epoch, text } => {
                let client = self.client.clone();
                let queue = self.queue.clone();
                tokio::spawn(async move {
                    let result = client.submit_prompt(&text).await;
                    let _ = queue.send(RunInput::CommandSettled { epoch, result }).await;
                });
            }
            RunEffect::ForwardPause { epoch } => {
                let client = self.client.clone();
                let queue = self.queue.clone();
                tokio::spawn(async move {
                    let result = client.pause().await;
                    let _ = queue.send(RunInput::CommandSettled { epoch, result }).await;
                });
            }
            RunEffect::ForwardResume { epoch } => {
                let client = self.client.clone();
                let queue = self.queue.clone();
                tokio::spawn(async move {
                    let result = client.resume().await;
                    let _ = queue.send(RunInput::CommandSettled { epoch, result }).await;
                });
            }
            RunEffect::ForwardStop { epoch } => {
                let client = self.client.clone();
                let queue = self.queue.clone();
                tokio::spawn(async move {
                    let result = client.stop().await;
                    let _ = queue.send(RunInput::CommandSettled { epoch, result }).await;
                });
            }
            RunEffect::ScheduleIdle { generation, delay } => {
                let queue = self.queue.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    // The reducer checks the generation; a timer invalidated
                    // in the meantime lands here and gets discarded there.
                    let _ = queue.send(RunInput::IdleTimerFired { generation }).await;
                });
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn run_effect_for_test(&self, effect: RunEffect) {
        self.run_effect(effect);
    }
}
