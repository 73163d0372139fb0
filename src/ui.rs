use iced_custom as iced;

#[allow(unused_imports)]
use log::{Level, debug, info, warn, error};

use iced::widget::{button, column, container, horizontal_space, image, row, text, text_input};
use iced::{padding, Alignment, Border, Color, ContentFit, Element, Length, Theme};

use crate::app::{category_input_id, Message, Mode, ReviewApp};
use crate::review::Decision;

const HEADER_TEXT_SIZE: u16 = 16;
const STATUS_TEXT_SIZE: u16 = 14;

impl ReviewApp {
    pub fn view(&self) -> Element<'_, Message> {
        build_ui(self)
    }
}

/// Creates a badge widget showing the annotation's decision
pub fn decision_badge(decision: Decision) -> Element<'static, Message> {
    let (label, background) = match decision {
        Decision::Accepted => ("ACCEPTED", Color::from([0.2, 0.8, 0.2])),
        Decision::Rejected => ("REJECTED", Color::from([0.9, 0.2, 0.2])),
        Decision::Unreviewed => ("UNREVIEWED", Color::from([0.2, 0.3, 0.9])),
    };

    container(text(label).size(12).color(Color::WHITE))
        .padding(padding::all(4))
        .style(move |_theme: &Theme| container::Style {
            background: Some(background.into()),
            border: Border {
                radius: 4.0.into(),
                width: 0.0,
                color: Color::TRANSPARENT,
            },
            ..container::Style::default()
        })
        .into()
}

fn header(app: &ReviewApp) -> Element<'_, Message> {
    let progress = app.session.progress();
    let counts = text(format!(
        "accepted {}  rejected {}  unreviewed {}",
        progress.accepted, progress.rejected, progress.unreviewed
    ))
    .size(STATUS_TEXT_SIZE);

    let Some(current) = app.session.current() else {
        return row![text("No annotations").size(HEADER_TEXT_SIZE), horizontal_space(), counts]
            .align_y(Alignment::Center)
            .into();
    };

    let file_name = app.current_file_name().unwrap_or_else(|| format!("<image {}>", current.image_id));
    let position = app.session.cursor().map_or(0, |idx| idx + 1);

    row![
        text(format!("Image: {} | Box ID: {}", file_name, current.id)).size(HEADER_TEXT_SIZE),
        text(app.session.categories().display_name(current.category_id)).size(HEADER_TEXT_SIZE),
        decision_badge(current.decision),
        horizontal_space(),
        text(format!("{}/{}", position, app.session.len())).size(HEADER_TEXT_SIZE),
        counts,
    ]
    .spacing(12)
    .align_y(Alignment::Center)
    .into()
}

fn image_area(app: &ReviewApp) -> Element<'_, Message> {
    let content: Element<'_, Message> = match (&app.frame, &app.frame_error) {
        (Some(handle), _) => image(handle.clone())
            .content_fit(ContentFit::Contain)
            .width(Length::Fill)
            .height(Length::Fill)
            .into(),
        (None, Some(err)) => text(format!("Cannot display image: {}", err))
            .color(Color::from([0.9, 0.4, 0.4]))
            .into(),
        (None, None) => text("Nothing to display").into(),
    };

    container(content)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .style(|_theme: &Theme| container::Style {
            background: Some(Color::from([0.1, 0.1, 0.1]).into()),
            ..container::Style::default()
        })
        .into()
}

fn save_error_banner(err: &str) -> Element<'_, Message> {
    let actions = row![
        button(text("Retry")).on_press(Message::RetrySave),
        button(text("Save As...")).on_press(Message::SaveAs),
        button(text("Write recovery copy")).on_press(Message::SaveRecovery),
    ]
    .spacing(8);

    container(
        column![text(format!("Save failed: {}", err)).color(Color::WHITE), actions].spacing(6),
    )
    .padding(padding::all(8))
    .width(Length::Fill)
    .style(|_theme: &Theme| container::Style {
        background: Some(Color::from([0.6, 0.1, 0.1]).into()),
        border: Border {
            radius: 4.0.into(),
            width: 0.0,
            color: Color::TRANSPARENT,
        },
        ..container::Style::default()
    })
    .into()
}

fn category_prompt<'a>(app: &'a ReviewApp, input: &'a str) -> Element<'a, Message> {
    let choices = app
        .session
        .categories()
        .entries()
        .iter()
        .map(|cat| format!("{}: {}", cat.id, cat.name))
        .collect::<Vec<_>>()
        .join(", ");

    let field = text_input("Category name or id", input)
        .id(category_input_id())
        .on_input(Message::CategoryInputChanged)
        .on_submit(Message::CategorySubmitted)
        .width(Length::Fixed(260.0));

    column![
        row![
            text("New category:"),
            field,
            button(text("Apply")).on_press(Message::CategorySubmitted),
            button(text("Cancel")).on_press(Message::CategoryCancelled),
        ]
        .spacing(8)
        .align_y(Alignment::Center),
        text(choices).size(12),
    ]
    .spacing(4)
    .into()
}

pub fn build_ui(app: &ReviewApp) -> Element<'_, Message> {
    let mut layout = column![header(app), image_area(app)].spacing(8).padding(10);

    if let Some(err) = &app.save_error {
        layout = layout.push(save_error_banner(err));
    }
    if let Mode::EditingCategory { input } = &app.mode {
        layout = layout.push(category_prompt(app, input));
    }

    layout
        .push(text(app.status.as_str()).size(STATUS_TEXT_SIZE))
        .push(text(app.config.keymap.help_line()).size(12).color(Color::from([0.6, 0.6, 0.6])))
        .into()
}
