// Submodules
mod message;
mod keyboard_handlers;

// Re-exports
pub use message::Message;

use std::path::PathBuf;
use once_cell::sync::Lazy;

#[allow(unused_imports)]
use log::{Level, debug, info, warn, error};

use iced_custom as iced;
use iced::event::{self, Event};
use iced::keyboard::{self, key::Named, Key};
use iced::widget::{image, text_input};
use iced::{window, Size, Subscription, Task};

use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::overlay::{self, ImageSlot};
use crate::problem_log::ProblemLog;
use crate::review::{Operation, Outcome, ReviewSession};
use crate::store::{AnnotationStore, JsonFileStore};

static CATEGORY_INPUT_ID: Lazy<text_input::Id> = Lazy::new(|| text_input::Id::new("category-input"));

pub(crate) fn category_input_id() -> text_input::Id {
    CATEGORY_INPUT_ID.clone()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Reviewing,
    EditingCategory { input: String },
}

pub struct ReviewApp {
    pub session: ReviewSession,
    pub config: ReviewConfig,
    pub store: JsonFileStore,
    pub problem_log: ProblemLog,
    image_slot: ImageSlot,
    /// Current image with boxes drawn, ready for the image widget
    pub frame: Option<image::Handle>,
    pub frame_error: Option<String>,
    pub mode: Mode,
    /// Set while the last save attempt failed; the session is still active
    pub save_error: Option<String>,
    pub status: String,
}

/// Open the review window and block until the session is saved
pub fn run(config: ReviewConfig, session: ReviewSession, store: JsonFileStore) -> Result<(), ReviewError> {
    let window_size = Size::new(config.window_width as f32, config.window_height as f32);
    let app = ReviewApp::new(config, session, store);

    iced::application(ReviewApp::title, ReviewApp::update, ReviewApp::view)
        .subscription(ReviewApp::subscription)
        .window_size(window_size)
        .exit_on_close_request(false)
        .run_with(move || (app, Task::none()))?;
    Ok(())
}

impl ReviewApp {
    pub fn new(config: ReviewConfig, session: ReviewSession, store: JsonFileStore) -> Self {
        let problem_log = ProblemLog::new(config.problem_log.clone());
        let status = if session.is_empty() {
            "No annotations to review. Press q to write the output and exit".to_string()
        } else {
            format!("{} annotations to review", session.len())
        };

        let mut app = Self {
            session,
            config,
            store,
            problem_log,
            image_slot: ImageSlot::new(),
            frame: None,
            frame_error: None,
            mode: Mode::Reviewing,
            save_error: None,
            status,
        };
        app.refresh_frame();
        app
    }

    pub fn title(&self) -> String {
        let dirty = if self.session.is_dirty() { " *" } else { "" };
        match self.session.cursor() {
            Some(idx) => format!("fp-reviewer - {}/{}{}", idx + 1, self.session.len(), dirty),
            None => format!("fp-reviewer{}", dirty),
        }
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::KeyPressed(key, modifiers) => self.handle_key_pressed_event(&key, modifiers),
            Message::CategoryInputChanged(value) => {
                if let Mode::EditingCategory { input } = &mut self.mode {
                    *input = value;
                }
                Task::none()
            }
            Message::CategorySubmitted => {
                let Mode::EditingCategory { input } = &self.mode else {
                    return Task::none();
                };
                let label = input.clone();
                // A rejected label keeps the prompt open for another try
                match self.session.edit_category(&label) {
                    Ok(outcome) => {
                        self.mode = Mode::Reviewing;
                        self.report(outcome);
                        self.refresh_frame();
                    }
                    Err(e) => {
                        warn!("{}", e);
                        self.status = e.to_string();
                    }
                }
                Task::none()
            }
            Message::CategoryCancelled => {
                self.mode = Mode::Reviewing;
                self.status = "Edit cancelled".to_string();
                Task::none()
            }
            Message::CloseRequested(id) => {
                debug!("Close requested for window {:?}", id);
                self.quit()
            }
            Message::RetrySave => self.quit(),
            Message::SaveAs => {
                let file_name = self
                    .store
                    .output_path()
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_default();
                Task::perform(
                    async move {
                        rfd::AsyncFileDialog::new()
                            .set_title("Save reviewed annotations")
                            .add_filter("JSON", &["json"])
                            .set_file_name(file_name)
                            .save_file()
                            .await
                            .map(|handle| handle.path().to_path_buf())
                    },
                    Message::SaveAsChosen,
                )
            }
            Message::SaveAsChosen(Some(path)) => {
                info!("Saving to {} instead", path.display());
                self.store = self.store.redirect(path);
                self.quit()
            }
            Message::SaveAsChosen(None) => Task::none(),
            Message::SaveRecovery => {
                let recovery = self.store.recovery();
                warn!("Writing recovery copy to {}", recovery.describe());
                self.quit_to(&recovery)
            }
        }
    }

    pub fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            event::listen_with(|event, status, _window| match event {
                Event::Keyboard(keyboard::Event::KeyPressed { key, modifiers, .. }) => {
                    // Escape still reaches the app while the category prompt holds focus
                    let escape = matches!(key.as_ref(), Key::Named(Named::Escape));
                    if status == event::Status::Ignored || escape {
                        Some(Message::KeyPressed(key, modifiers))
                    } else {
                        None
                    }
                }
                _ => None,
            }),
            window::close_requests().map(Message::CloseRequested),
        ])
    }

    pub(crate) fn apply(&mut self, op: Operation) -> Task<Message> {
        match self.session.apply(op) {
            Ok(outcome) => {
                self.report(outcome);
                self.refresh_frame();
            }
            Err(e) => {
                warn!("{}", e);
                self.status = e.to_string();
            }
        }
        Task::none()
    }

    fn report(&mut self, outcome: Outcome) {
        self.status = match outcome {
            Outcome::Recorded { index, decision, advanced } => {
                let mut status = format!("Annotation {} {}", index + 1, decision);
                if !advanced {
                    status.push_str(". Last annotation reached, press q to save and exit");
                }
                status
            }
            Outcome::Moved { to, .. } => format!("Annotation {} of {}", to + 1, self.session.len()),
            Outcome::CategoryChanged { index, to, .. } => format!(
                "Annotation {} category set to {}",
                index + 1,
                self.session.categories().display_name(to)
            ),
            Outcome::Terminated { annotations } => format!("Saved {} annotations", annotations),
            Outcome::Unchanged if self.session.is_last() => {
                "Last annotation reached, press q to save and exit".to_string()
            }
            Outcome::Unchanged => return,
        };
    }

    pub(crate) fn quit(&mut self) -> Task<Message> {
        let store = self.store.clone();
        self.quit_to(&store)
    }

    fn quit_to(&mut self, store: &dyn AnnotationStore) -> Task<Message> {
        match self.session.quit(store) {
            Ok(outcome) => {
                self.report(outcome);
                self.save_error = None;
                self.image_slot.release();
                self.frame = None;
                iced::exit()
            }
            Err(e) => {
                error!("Save failed, session kept open: {}", e);
                self.save_error = Some(e.to_string());
                self.status = "Save failed. Retry, save elsewhere or write a recovery copy".to_string();
                Task::none()
            }
        }
    }

    pub(crate) fn log_problem(&mut self) {
        let Some(file_name) = self.current_file_name() else {
            return;
        };
        self.status = match self.problem_log.record(&file_name) {
            Ok(true) => format!("Logged {} to {}", file_name, self.problem_log.path().display()),
            Ok(false) => format!("{} is already logged", file_name),
            Err(e) => {
                error!("{}", e);
                e.to_string()
            }
        };
    }

    pub fn current_file_name(&self) -> Option<String> {
        let current = self.session.current()?;
        self.session.image_file(current.image_id).map(str::to_string)
    }

    /// Decode the current image (only when it changed) and redraw the boxes
    fn refresh_frame(&mut self) {
        let Some(current) = self.session.current().cloned() else {
            self.image_slot.release();
            self.frame = None;
            self.frame_error = None;
            return;
        };

        let path: PathBuf = match self.session.image_file(current.image_id) {
            Some(file_name) => self.config.image_path(file_name),
            None => {
                self.frame = None;
                self.frame_error = Some(format!("Image {} is not listed in the document", current.image_id));
                return;
            }
        };

        let context = if self.config.show_accepted_context {
            self.session.accepted_context()
        } else {
            Vec::new()
        };

        match self.image_slot.load(current.image_id, &path) {
            Ok(base) => {
                let frame = overlay::compose(
                    base,
                    &current,
                    &context,
                    &self.config.colors,
                    self.config.box_thickness,
                );
                let (width, height) = frame.dimensions();
                self.frame = Some(image::Handle::from_rgba(width, height, frame.into_raw()));
                self.frame_error = None;
            }
            Err(e) => {
                // Not fatal: the annotation can still be decided on
                warn!("{}", e);
                self.frame = None;
                self.frame_error = Some(e.to_string());
            }
        }
    }
}
