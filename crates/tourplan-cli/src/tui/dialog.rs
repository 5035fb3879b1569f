use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

const DIM: Style = Style::new().fg(Color::DarkGray);

/// Blocking popup drawn over the dashboard. Input goes to the popup until it
/// is dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    ConfirmClear,
    Alert(String),
}

pub fn render(frame: &mut Frame, modal: Option<&Modal>, area: Rect) {
    let Some(modal) = modal else {
        return;
    };

    let (title, body, hint, color) = match modal {
        Modal::ConfirmClear => (
            " Clear Chat ",
            "Are you sure you want to clear all messages?".to_string(),
            "y to clear, n or Esc to cancel",
            Color::Yellow,
        ),
        Modal::Alert(message) => (" Map ", message.clone(), "Enter to dismiss", Color::Red),
    };

    let dialog_width = area.width.saturating_sub(8).clamp(20, 64);
    let inner_width = dialog_width.saturating_sub(2).max(1) as usize;
    let body_rows = body.chars().count().div_ceil(inner_width).max(1) as u16;
    let popup_area = centered_rect(dialog_width, body_rows + 4, area);

    let lines = vec![
        Line::raw(body),
        Line::raw(""),
        Line::from(Span::styled(hint, DIM)),
    ];

    frame.render_widget(Clear, popup_area);
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color)),
            ),
        popup_area,
    );
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let popup_width = width.min(area.width);
    let popup_height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let y = area.y + (area.height.saturating_sub(popup_height)) / 2;
    Rect::new(x, y, popup_width, popup_height)
}
