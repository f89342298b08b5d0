use crate::commands::Command;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

const MAX_SUGGESTIONS: usize = 6;

/// Command (":") or place search ("/") input box, with suggestions for commands.
pub fn draw_input_overlay(
  frame: &mut Frame,
  area: Rect,
  prefix: &str,
  input: &str,
  suggestions: &[&Command],
  selected_suggestion: usize,
) {
  let shown = suggestions.len().min(MAX_SUGGESTIONS) as u16;
  let width = (area.width * 6 / 10).clamp(30, 60).min(area.width);
  let height = (3 + shown).min(area.height);
  let overlay_area = Rect::new(area.x + 1, area.y + 1, width, height).intersection(area);

  frame.render_widget(Clear, overlay_area);

  let title = if prefix == ":" {
    " Command "
  } else {
    " Place or lat,lon "
  };
  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Yellow))
    .title(title);
  let inner = block.inner(overlay_area);
  frame.render_widget(block, overlay_area);

  if inner.height == 0 {
    return;
  }

  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Length(1), Constraint::Min(0)])
    .split(inner);

  let input_line = Line::from(vec![
    Span::styled(prefix.to_string(), Style::default().fg(Color::Yellow)),
    Span::raw(input.to_string()),
    Span::styled("_", Style::default().fg(Color::Yellow)),
  ]);
  frame.render_widget(Paragraph::new(input_line), chunks[0]);

  if suggestions.is_empty() || chunks[1].height == 0 {
    return;
  }

  let items: Vec<ListItem> = suggestions
    .iter()
    .take(MAX_SUGGESTIONS)
    .map(|cmd| {
      ListItem::new(Line::from(vec![
        Span::styled(format!("{:<10}", cmd.name), Style::default().fg(Color::Cyan)),
        Span::styled(cmd.description, Style::default().fg(Color::DarkGray)),
      ]))
    })
    .collect();

  let list = List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));
  let mut state = ListState::default();
  state.select(Some(selected_suggestion));

  frame.render_stateful_widget(list, chunks[1], &mut state);
}
