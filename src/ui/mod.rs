mod overlay;
pub mod text;

use crate::app::{App, Mode};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let alerts = app.snapshot().and_then(|s| text::alerts_line(&s.weather));

  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1),                                // Header
      Constraint::Length(if alerts.is_some() { 1 } else { 0 }), // Alerts
      Constraint::Min(1),                                   // Panels
      Constraint::Length(1),                                // Status bar
    ])
    .split(frame.area());

  draw_header(frame, chunks[0], app);
  if let Some(alerts) = alerts {
    let line = Paragraph::new(format!(" ⚠ {}", alerts))
      .style(Style::default().fg(Color::Black).bg(Color::Yellow));
    frame.render_widget(line, chunks[1]);
  }
  draw_panels(frame, chunks[2], app);
  draw_status_bar(frame, chunks[3], app);

  match app.mode() {
    Mode::Command => overlay::draw_input_overlay(
      frame,
      chunks[2],
      ":",
      app.command_input(),
      &app.autocomplete_suggestions(),
      app.selected_suggestion(),
    ),
    Mode::Search => {
      overlay::draw_input_overlay(frame, chunks[2], "/", app.search_input(), &[], 0)
    }
    Mode::Normal => {}
  }
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
  let status = app.status();

  let mut spans = vec![
    Span::styled(" quicklook ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", app.location()),
      Style::default().fg(Color::Yellow).bold(),
    ),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" Last updated: {} ", status.last_updated),
      Style::default().fg(Color::White),
    ),
  ];
  if status.offline {
    spans.push(Span::styled(
      " OFFLINE ",
      Style::default().fg(Color::White).bg(Color::Red).bold(),
    ));
  }
  if app.is_loading() {
    spans.push(Span::styled(" loading…", Style::default().fg(Color::DarkGray)));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

fn draw_panels(frame: &mut Frame, area: Rect, app: &App) {
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Length(6), Constraint::Min(3)])
    .split(area);
  let top = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
    .split(rows[0]);
  let bottom = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
    .split(rows[1]);

  let placeholder = |loading: bool| {
    vec![if loading { "Loading…" } else { "-" }.to_string()]
  };

  let (weather, air, forecast, holidays) = match app.snapshot() {
    Some(s) => (
      text::weather_lines(&s.weather),
      text::air_quality_lines(&s.air_quality),
      text::forecast_lines(&s.weather),
      text::holiday_lines(&s.holidays),
    ),
    None => (
      placeholder(app.is_loading()),
      placeholder(app.is_loading()),
      placeholder(app.is_loading()),
      placeholder(app.is_loading()),
    ),
  };

  draw_panel(frame, top[0], " Weather ", weather);
  draw_panel(frame, top[1], " Air quality ", air);
  draw_panel(frame, bottom[0], " 7-day forecast ", forecast);
  draw_panel(frame, bottom[1], " Holidays ", holidays);
}

fn draw_panel(frame: &mut Frame, area: Rect, title: &str, lines: Vec<String>) {
  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray))
    .title(Span::styled(title.to_string(), Style::default().fg(Color::Cyan)));

  let text: Vec<Line> = lines.into_iter().map(Line::from).collect();
  let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: false });
  frame.render_widget(paragraph, area);
}

fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
  let (content, style) = match (app.mode(), app.message()) {
    (Mode::Normal, Some(message)) => (format!(" {}", message), Style::default().fg(Color::White)),
    (Mode::Normal, None) => {
      let hint = " r:refresh  /:search  :command  Esc:clear  q:quit";
      (hint.to_string(), Style::default().fg(Color::DarkGray))
    }
    (Mode::Command, _) => (
      format!(":{}", app.command_input()),
      Style::default().fg(Color::Yellow),
    ),
    (Mode::Search, _) => (
      format!("/{}", app.search_input()),
      Style::default().fg(Color::Cyan),
    ),
  };

  let paragraph = Paragraph::new(content).style(style);
  frame.render_widget(paragraph, area);
}
