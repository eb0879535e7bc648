use anyhow::Result;
use ratatui::backend::Backend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};
use tui_input::Input;

use crate::candidate::Candidate;
use crate::selection::Cursor;

const INPUT_LABEL: &str = "ZONE: ";
const HELP: &str = "Type a city, offset or abbreviation  Up/Down: move  Enter: pick  Esc: cancel";

/// Everything the picker shows in one frame.
pub struct PickerView<'a> {
    pub input: &'a Input,
    pub candidates: &'a [Candidate],
    pub cursor: Cursor,
    pub resolving: Option<usize>,
    pub status: Option<&'a str>,
}

pub fn render<B: Backend>(terminal: &mut Terminal<B>, view: &PickerView<'_>) -> Result<()> {
    terminal.draw(|frame| draw_frame(frame, view))?;
    Ok(())
}

fn draw_frame(frame: &mut Frame<'_>, view: &PickerView<'_>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" tzpick ");
    let inner = block.inner(frame.area());
    frame.render_widget(block, frame.area());

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(inner);

    draw_input(frame, layout[0], view);
    draw_candidates(frame, layout[2], view);
    draw_status(frame, layout[3], view);
}

fn draw_input(frame: &mut Frame<'_>, area: Rect, view: &PickerView<'_>) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    let line = Line::from(vec![
        Span::styled(INPUT_LABEL, label_style()),
        Span::raw(view.input.value().to_string()),
    ]);
    frame.render_widget(Paragraph::new(line), area);

    if view.cursor == Cursor::Input {
        let column = Span::raw(INPUT_LABEL).width() + view.input.visual_cursor();
        let x = area.x.saturating_add(column as u16);
        frame.set_cursor_position((x, area.y));
    }
}

fn draw_candidates(frame: &mut Frame<'_>, area: Rect, view: &PickerView<'_>) {
    let items: Vec<ListItem> = if view.candidates.is_empty() {
        let hint = if view.input.value().trim().is_empty() {
            ""
        } else {
            "No matches"
        };
        vec![ListItem::new(Line::from(Span::styled(hint, dim_style())))]
    } else {
        view.candidates
            .iter()
            .enumerate()
            .map(|(row, candidate)| candidate_item(candidate, view.resolving == Some(row)))
            .collect()
    };

    let mut state = ListState::default();
    state.select(view.cursor.row());

    let list = List::new(items)
        .highlight_style(selection_style())
        .highlight_symbol(" ")
        .repeat_highlight_symbol(false);

    frame.render_stateful_widget(list, area, &mut state);
}

fn candidate_item(candidate: &Candidate, resolving: bool) -> ListItem<'static> {
    let mut spans = vec![Span::raw(candidate.title().to_string())];
    let subtitle = candidate.subtitle();
    if !subtitle.is_empty() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(subtitle.to_string(), dim_style()));
    }
    if resolving {
        spans.push(Span::styled("  resolving...", dim_style()));
    }
    ListItem::new(Line::from(spans))
}

fn draw_status(frame: &mut Frame<'_>, area: Rect, view: &PickerView<'_>) {
    let line = match view.status {
        Some(message) => Line::from(Span::styled(message.to_string(), error_style())),
        None => Line::from(Span::styled(HELP, dim_style())),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn selection_style() -> Style {
    Style::default().add_modifier(Modifier::REVERSED)
}

fn label_style() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_style() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn error_style() -> Style {
    Style::default().fg(Color::Red)
}
