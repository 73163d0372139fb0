use log::debug;

use iced_custom as iced;
use iced::keyboard::{self, Key, key::Named};
use iced::widget::text_input;
use iced::Task;

use crate::app::{category_input_id, Message, Mode, ReviewApp};
use crate::keymap::KeyCommand;
use crate::review::Operation;

/// Review commands are single keys; chords with Ctrl, Alt or the logo key
/// belong to the window system. Shift is allowed for capitals.
pub(crate) fn is_command_chord(modifiers: keyboard::Modifiers) -> bool {
    modifiers.control() || modifiers.alt() || modifiers.logo()
}

/// Key identifier handed to the keymap: the character for printable keys,
/// the key name (e.g. "ArrowLeft") otherwise
pub(crate) fn key_text(key: &Key) -> Option<String> {
    match key.as_ref() {
        Key::Character(c) => Some(c.to_string()),
        Key::Named(named) => Some(format!("{:?}", named)),
        Key::Unidentified => None,
    }
}

impl ReviewApp {
    pub(crate) fn handle_key_pressed_event(&mut self, key: &Key, modifiers: keyboard::Modifiers) -> Task<Message> {
        // The prompt owns the keyboard while it is open
        if let Mode::EditingCategory { .. } = self.mode {
            if let Key::Named(Named::Escape) = key.as_ref() {
                self.mode = Mode::Reviewing;
                self.status = "Edit cancelled".to_string();
            }
            return Task::none();
        }

        if is_command_chord(modifiers) {
            return Task::none();
        }

        let Some(text) = key_text(key) else {
            return Task::none();
        };

        match self.config.keymap.dispatch(&text) {
            Some(command) => {
                debug!("{} pressed: {:?}", text, command);
                self.run_command(command)
            }
            None => Task::none(),
        }
    }

    fn run_command(&mut self, command: KeyCommand) -> Task<Message> {
        match command {
            KeyCommand::Accept => self.apply(Operation::Accept),
            KeyCommand::Reject => self.apply(Operation::Reject),
            KeyCommand::Skip => self.apply(Operation::Skip),
            KeyCommand::Previous => self.apply(Operation::Previous),
            KeyCommand::EditCategory => {
                if self.session.current().is_none() {
                    return Task::none();
                }
                self.mode = Mode::EditingCategory { input: String::new() };
                text_input::focus(category_input_id())
            }
            KeyCommand::LogProblem => {
                self.log_problem();
                Task::none()
            }
            KeyCommand::Quit => self.quit(),
        }
    }
}
