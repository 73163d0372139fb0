use std::path::PathBuf;

use iced_custom as iced;
use iced::keyboard::{Key, Modifiers};
use iced::window;

#[derive(Debug, Clone)]
pub enum Message {
    KeyPressed(Key, Modifiers),
    CategoryInputChanged(String),
    CategorySubmitted,
    CategoryCancelled,
    CloseRequested(window::Id),
    RetrySave,
    SaveAs,
    SaveAsChosen(Option<PathBuf>),
    SaveRecovery,
}
