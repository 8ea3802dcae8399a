use crate::controller::Controller;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use halo_core::run::RunInput;
use tracing::debug;

/// Sizing collaborator for the hosting window. The overlay reports its
/// desired content box whenever rendered content changes size; what the
/// host does with it is its own business.
pub trait WindowSizer {
    fn content_resized(&mut self, width: u16, height: u16);
}

/// Default sizer: records the last reported box and logs transitions.
#[derive(Debug, Default)]
pub struct LoggingSizer {
    last: Option<(u16, u16)>,
}

impl WindowSizer for LoggingSizer {
    fn content_resized(&mut self, width: u16, height: u16) {
        if self.last == Some((width, height)) {
            return;
        }
        self.last = Some((width, height));
        debug!(event = "content_resize", width, height);
    }
}

/// View-side state: the command bar buffer, log scroll, and the one-shot
/// status note. All run-state reads go through the controller projection;
/// the shell never mutates run state directly.
pub struct App {
    pub controller: Controller,
    pub input: String,
    pub scroll: u16,
    pub status_note: Option<String>,
    sizer: Box<dyn WindowSizer + Send>,
    quit: bool,
}

impl App {
    pub fn new(controller: Controller) -> Self {
        Self {
            controller,
            input: String::new(),
            scroll: 0,
            status_note: None,
            sizer: Box::<LoggingSizer>::default(),
            quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') | KeyCode::Char('q') => self.quit = true,
                KeyCode::Char('p') => self.controller.handle(RunInput::Pause),
                KeyCode::Char('r') => self.controller.handle(RunInput::Resume),
                KeyCode::Char('x') => self.controller.handle(RunInput::Stop),
                _ => {}
            }
        } else {
            match key.code {
                KeyCode::Enter => self.submit(),
                KeyCode::Backspace => {
                    self.input.pop();
                }
                KeyCode::Up => self.scroll = self.scroll.saturating_add(1),
                KeyCode::Down => self.scroll = self.scroll.saturating_sub(1),
                KeyCode::Esc => self.quit = true,
                KeyCode::Char(ch) => self.input.push(ch),
                _ => {}
            }
        }
        self.refresh_note();
    }

    fn submit(&mut self) {
        let prompt = std::mem::take(&mut self.input);
        self.scroll = 0;
        self.controller.handle(RunInput::SubmitPrompt(prompt));
    }

    /// Fold a queued input into the run state and pick up any notice.
    pub fn apply_input(&mut self, input: RunInput) {
        self.controller.handle(input);
        self.refresh_note();
    }

    fn refresh_note(&mut self) {
        if let Some(notice) = self.controller.take_notice() {
            self.status_note = Some(notice);
        }
    }

    /// Called after each draw with the measured content box.
    pub fn report_content_box(&mut self, width: u16, height: u16) {
        self.sizer.content_resized(width, height);
    }
}
