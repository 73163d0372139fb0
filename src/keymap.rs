/// Key dispatch for the review loop
///
/// Maps a key identifier to one review command. Kept free of any window
/// toolkit types; the app converts its key events to strings first.
use crate::error::ReviewError;
use crate::settings::KeyBindings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Accept,
    Reject,
    Skip,
    Previous,
    EditCategory,
    LogProblem,
    Quit,
}

impl KeyCommand {
    pub fn label(&self) -> &'static str {
        match self {
            KeyCommand::Accept => "accept",
            KeyCommand::Reject => "reject",
            KeyCommand::Skip => "next",
            KeyCommand::Previous => "previous",
            KeyCommand::EditCategory => "edit category",
            KeyCommand::LogProblem => "log image",
            KeyCommand::Quit => "save & quit",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Keymap {
    // Kept in binding order for the help line
    bindings: Vec<(String, KeyCommand)>,
}

impl Keymap {
    pub fn from_bindings(keys: &KeyBindings) -> Result<Self, ReviewError> {
        let pairs = [
            (&keys.accept, KeyCommand::Accept),
            (&keys.reject, KeyCommand::Reject),
            (&keys.skip, KeyCommand::Skip),
            (&keys.previous, KeyCommand::Previous),
            (&keys.edit_category, KeyCommand::EditCategory),
            (&keys.log_problem, KeyCommand::LogProblem),
            (&keys.quit, KeyCommand::Quit),
        ];

        let mut bindings: Vec<(String, KeyCommand)> = Vec::with_capacity(pairs.len());
        for (key, command) in pairs {
            let key = normalize(key);
            if key.is_empty() {
                return Err(ReviewError::KeyBinding(format!(
                    "no key bound to '{}'",
                    command.label()
                )));
            }
            if let Some((_, other)) = bindings.iter().find(|(bound, _)| *bound == key) {
                return Err(ReviewError::KeyBinding(format!(
                    "'{}' is bound to both '{}' and '{}'",
                    key,
                    other.label(),
                    command.label()
                )));
            }
            bindings.push((key, command));
        }

        Ok(Self { bindings })
    }

    pub fn dispatch(&self, key: &str) -> Option<KeyCommand> {
        let key = normalize(key);
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == key)
            .map(|(_, command)| *command)
    }

    pub fn key_for(&self, command: KeyCommand) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(_, bound)| *bound == command)
            .map(|(key, _)| key.as_str())
    }

    /// e.g. "a accept | r reject | n next | ..."
    pub fn help_line(&self) -> String {
        self.bindings
            .iter()
            .map(|(key, command)| format!("{} {}", key, command.label()))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl Default for Keymap {
    fn default() -> Self {
        // The default bindings are distinct and non-empty
        Self::from_bindings(&KeyBindings::default())
            .unwrap_or_else(|_| Self { bindings: Vec::new() })
    }
}

fn normalize(key: &str) -> String {
    let key = key.trim();
    if key.chars().count() == 1 {
        key.to_lowercase()
    } else {
        key.to_string()
    }
}
