use chrono::Local;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tourplan_core::{ChatTurn, Focus, MAX_ZOOM, MIN_ZOOM};

use crate::tui::app::{App, HitAreas, SUGGESTIONS};
use crate::tui::dialog;

const USER_COLOR: Color = Color::Cyan;
const ASSISTANT_COLOR: Color = Color::Green;
const FOCUS_COLOR: Color = Color::Yellow;
const DIM: Style = Style::new().fg(Color::DarkGray);
const BOLD: Style = Style::new().add_modifier(Modifier::BOLD);
const HINTS: &str =
    "Enter send · Shift+Enter newline · Tab map · Ctrl+L clear · Ctrl+O sign out · Ctrl+C quit";

pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let [chat_area, map_area] =
        Layout::horizontal([Constraint::Min(30), Constraint::Percentage(36)]).areas(area);

    let input_height = calculate_input_height(app, chat_area.width);
    let [messages_area, separator_area, input_area, hints_area] = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(1), // separator
        Constraint::Length(input_height),
        Constraint::Length(1),
    ])
    .areas(chat_area);

    render_messages(frame, app, messages_area);
    render_separator(frame, separator_area);
    render_input(frame, app, input_area);
    frame.render_widget(Paragraph::new(Span::styled(HINTS, DIM)), hints_area);
    render_map(frame, app, map_area);
    dialog::render(frame, app.modal.as_ref(), area);
}

/// Manually wrap a styled line to fit within `width` columns.
/// Returns one or more Lines that each fit within the width.
fn wrap_line(line: &Line, width: usize) -> Vec<Line<'static>> {
    if width == 0 {
        return vec![Line::raw("")];
    }

    let mut chars: Vec<(char, Style)> = Vec::new();
    for span in &line.spans {
        let style = line.style.patch(span.style);
        for ch in span.content.chars() {
            chars.push((ch, style));
        }
    }

    if chars.is_empty() {
        return vec![Line::raw("")];
    }

    let mut result: Vec<Line<'static>> = Vec::new();
    let mut col = 0;
    let mut current_spans: Vec<Span<'static>> = Vec::new();
    let mut current_text = String::new();
    let mut current_style = chars[0].1;

    for (ch, style) in &chars {
        if *style != current_style {
            if !current_text.is_empty() {
                current_spans.push(Span::styled(
                    std::mem::take(&mut current_text),
                    current_style,
                ));
            }
            current_style = *style;
        }

        if col >= width {
            if !current_text.is_empty() {
                current_spans.push(Span::styled(
                    std::mem::take(&mut current_text),
                    current_style,
                ));
            }
            result.push(Line::from(std::mem::take(&mut current_spans)));
            col = 0;
        }

        current_text.push(*ch);
        col += 1;
    }

    if !current_text.is_empty() {
        current_spans.push(Span::styled(current_text, current_style));
    }
    if !current_spans.is_empty() {
        result.push(Line::from(current_spans));
    }

    if result.is_empty() {
        result.push(Line::raw(""));
    }

    result
}

fn turn_header(turn: &ChatTurn) -> Line<'static> {
    let (label, color) = if turn.is_user() {
        ("You", USER_COLOR)
    } else {
        ("Assistant", ASSISTANT_COLOR)
    };
    let time = turn.timestamp.with_timezone(&Local).format("%H:%M");
    Line::from(vec![
        Span::styled(label.to_string(), BOLD.fg(color)),
        Span::styled(format!("  {time}"), DIM),
    ])
}

fn greeting_lines(name: &str) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(format!("Hi {name}!"), BOLD)),
        Line::raw("How can I help you plan your trip today?"),
        Line::raw(""),
    ];
    for (index, (title, prompt)) in SUGGESTIONS.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!("Alt+{}  ", index + 1), DIM),
            Span::styled(title.to_string(), BOLD),
            Span::styled(format!(": {prompt}"), DIM),
        ]));
    }
    lines
}

/// Build the logical lines for the messages area, then wrap them.
fn build_message_lines(app: &App, width: usize) -> Vec<Line<'static>> {
    let mut logical_lines: Vec<Line> = Vec::new();

    for turn in app.dashboard.turns() {
        if !logical_lines.is_empty() {
            logical_lines.push(Line::raw(""));
        }
        logical_lines.push(turn_header(turn));
        for text_line in turn.content.lines() {
            logical_lines.push(Line::raw(text_line.to_string()));
        }
        if let Some(map) = &turn.map {
            logical_lines.push(Line::from(Span::styled(
                format!(
                    "[map: {} → {}]",
                    map.journey.origin, map.journey.destination
                ),
                DIM,
            )));
        }
    }

    if app.dashboard.is_loading() {
        if !logical_lines.is_empty() {
            logical_lines.push(Line::raw(""));
        }
        logical_lines.push(Line::from(Span::styled(
            "Assistant".to_string(),
            BOLD.fg(ASSISTANT_COLOR),
        )));
        let dots = if app.spinner_on { "..." } else { ".  " };
        logical_lines.push(Line::from(Span::styled(format!("Thinking{dots}"), DIM)));
    }

    if logical_lines.is_empty() {
        logical_lines = greeting_lines(app.dashboard.display_name());
    }

    // Pre-wrap all lines so rendered height == lines.len()
    logical_lines
        .iter()
        .flat_map(|line| wrap_line(line, width))
        .collect()
}

fn render_messages(frame: &mut Frame, app: &mut App, area: Rect) {
    let width = area.width as usize;
    let visible = area.height as usize;
    let mut lines = build_message_lines(app, width);
    let content_height = lines.len();

    // Anchor to bottom: pad top if content is shorter than viewport.
    if content_height < visible {
        let padding = visible - content_height;
        let mut padded = vec![Line::raw(""); padding];
        padded.append(&mut lines);
        lines = padded;
    }

    let total = lines.len();
    let max_scroll = total.saturating_sub(visible);
    let prev_max = app.max_scroll;
    app.max_scroll = max_scroll as u16;

    // If scrolled up and content grew, bump offset to keep viewport stable.
    if app.scroll_offset > 0 && max_scroll > prev_max as usize {
        app.scroll_offset += (max_scroll - prev_max as usize) as u16;
    }
    app.scroll_offset = app.scroll_offset.min(max_scroll as u16);

    let scroll = max_scroll - app.scroll_offset as usize;
    let visible_lines = &lines[scroll..scroll + visible.min(total)];

    frame.render_widget(Paragraph::new(Text::from(visible_lines.to_vec())), area);
}

fn render_separator(frame: &mut Frame, area: Rect) {
    let line = Line::from(Span::styled("─".repeat(area.width as usize), DIM));
    frame.render_widget(Paragraph::new(line), area);
}

fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let prefix_style = if app.focus == Focus::TextEntry {
        Style::default().fg(FOCUS_COLOR)
    } else {
        DIM
    };

    let input_text = if app.input.is_empty() {
        Text::from(vec![Line::from(vec![
            Span::styled("> ", prefix_style),
            Span::styled("Ask about destinations, routes, hotels...", DIM),
        ])])
    } else {
        let mut lines: Vec<Line> = Vec::new();
        for (i, text_line) in app.input.split('\n').enumerate() {
            let prefix = if i == 0 { "> " } else { "  " };
            lines.push(Line::from(vec![
                Span::styled(prefix, prefix_style),
                Span::raw(text_line.to_string()),
            ]));
        }
        Text::from(lines)
    };

    frame.render_widget(Paragraph::new(input_text).wrap(Wrap { trim: false }), area);

    if app.focus == Focus::TextEntry && app.modal.is_none() {
        let inner_width = area.width.saturating_sub(2) as usize;
        let (cursor_row, cursor_col) = cursor_position(&app.input, app.cursor_pos, inner_width);
        frame.set_cursor_position((area.x + 2 + cursor_col as u16, area.y + cursor_row as u16));
    }
}

fn render_map(frame: &mut Frame, app: &mut App, area: Rect) {
    let border = if app.focus == Focus::Elsewhere {
        Style::default().fg(FOCUS_COLOR)
    } else {
        DIM
    };
    let block = Block::default()
        .title(" Map ")
        .borders(Borders::ALL)
        .border_style(border);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let viewport = app.dashboard.viewport();
    let Some(route) = viewport.route() else {
        app.hit_areas = HitAreas {
            map: area,
            ..HitAreas::default()
        };
        frame.render_widget(
            Paragraph::new(Span::styled(
                "Ask for a trip and its route will show up here.",
                DIM,
            ))
            .wrap(Wrap { trim: true }),
            inner,
        );
        return;
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled(route.origin.clone(), BOLD),
            Span::raw(" → "),
            Span::styled(route.destination.clone(), BOLD),
        ]),
        Line::from(vec![
            Span::styled("Zoom ", DIM),
            Span::raw(viewport.zoom().to_string()),
            Span::styled(format!("  ({MIN_ZOOM}-{MAX_ZOOM})"), DIM),
        ]),
        Line::raw(""),
        Line::from(Span::styled("Image", DIM)),
        Line::raw(viewport.image_reference().unwrap_or_default().to_string()),
        Line::raw(""),
    ];
    if viewport.is_loading() {
        let dots = if app.spinner_on { "..." } else { ".  " };
        lines.push(Line::from(Span::styled(
            format!("Updating map{dots}"),
            Style::default().fg(FOCUS_COLOR),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "+/- zoom, 0 reset, or scroll here",
            DIM,
        )));
    }

    let [details_area, buttons_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(inner);
    frame.render_widget(
        Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false }),
        details_area,
    );

    let button_style = if viewport.is_loading() { DIM } else { BOLD };
    let [zoom_in, _, zoom_out, _, reset, _] = Layout::horizontal([
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(buttons_area);
    for (label, rect) in [("[+]", zoom_in), ("[-]", zoom_out), ("[0]", reset)] {
        frame.render_widget(Paragraph::new(Span::styled(label, button_style)), rect);
    }

    app.hit_areas = HitAreas {
        map: area,
        zoom_in,
        zoom_out,
        reset,
    };
}

fn calculate_input_height(app: &App, width: u16) -> u16 {
    let inner_width = width.saturating_sub(2).max(1) as usize;
    let line_count = if app.input.is_empty() {
        1
    } else {
        app.input
            .split('\n')
            .map(|line| {
                let len = line.chars().count().max(1);
                len.div_ceil(inner_width) as u16
            })
            .sum::<u16>()
            .max(1)
    };
    line_count.clamp(2, 8)
}

fn cursor_position(input: &str, byte_pos: usize, width: usize) -> (usize, usize) {
    let width = width.max(1);
    let before_cursor = &input[..byte_pos.min(input.len())];
    let mut row = 0;
    let mut col = 0;

    for ch in before_cursor.chars() {
        if ch == '\n' {
            row += 1;
            col = 0;
        } else {
            col += 1;
            if col >= width {
                row += 1;
                col = 0;
            }
        }
    }

    (row, col)
}
