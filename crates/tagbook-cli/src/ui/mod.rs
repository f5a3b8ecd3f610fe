//! TUI rendering for the report chart view.

pub mod bars;
pub mod lines;

use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, Paragraph},
};

use crate::app::{App, View};

/// Series colours, cycled by tag column.
pub const PALETTE: [Color; 6] =
  [Color::Cyan, Color::Yellow, Color::Magenta, Color::Green, Color::Red, Color::Blue];

pub fn series_color(idx: usize) -> Color { PALETTE[idx % PALETTE.len()] }

// ─── Root draw ───────────────────────────────────────────────────────────────

/// Main draw function called each frame.
pub fn draw(f: &mut Frame, app: &App) {
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // header
      Constraint::Min(0),    // body
      Constraint::Length(1), // status bar
    ])
    .split(f.area());

  draw_header(f, rows[0], app);
  draw_body(f, rows[1], app);
  draw_status(f, rows[2], app);
}

// ─── Header ──────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
  let line = Line::from(vec![
    Span::styled(
      " tagbook report ",
      Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    ),
    Span::styled(app.title.clone(), Style::default().fg(Color::Gray)),
  ]);
  f.render_widget(Paragraph::new(line).style(Style::default().bg(Color::DarkGray)), area);
}

// ─── Body ────────────────────────────────────────────────────────────────────

fn draw_body(f: &mut Frame, area: Rect, app: &App) {
  let cols = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(75), Constraint::Percentage(25)])
    .split(area);

  if app.report.pivot.is_empty() {
    draw_empty(f, cols[0], app);
  } else {
    match app.view {
      View::Bars => bars::draw(f, cols[0], app),
      View::Lines => lines::draw(f, cols[0], app),
    }
  }
  draw_summary(f, cols[1], app);
}

fn draw_empty(f: &mut Frame, area: Rect, app: &App) {
  let block = Block::default()
    .title(format!(" {} ", app.view.title()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let message = app
    .report
    .warnings
    .first()
    .map(ToString::to_string)
    .unwrap_or_else(|| "No data.".into());
  f.render_widget(
    Paragraph::new(Span::styled(message, Style::default().fg(Color::DarkGray))).block(block),
    area,
  );
}

/// Means, then the dates at which each tag hit its max and min.
fn draw_summary(f: &mut Frame, area: Rect, app: &App) {
  let heading = |s: &'static str| {
    ListItem::new(Span::styled(s, Style::default().add_modifier(Modifier::BOLD)))
  };

  let mut items = vec![heading("mean")];
  items.extend(
    app
      .report
      .mean
      .iter()
      .map(|(tag, mean)| ListItem::new(format!("  {tag}: {mean:.2}"))),
  );
  for (label, occurrences) in [("max", &app.report.max), ("min", &app.report.min)] {
    items.push(heading(label));
    items.extend(
      occurrences
        .iter()
        .map(|o| ListItem::new(format!("  {} {}: {}", o.timestamp, o.tag_name, o.value))),
    );
  }

  let block = Block::default()
    .title(" Summary ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  f.render_widget(List::new(items).block(block), area);
}

// ─── Status bar ──────────────────────────────────────────────────────────────

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
  let mode = match app.view {
    View::Bars => "BARS",
    View::Lines => "LINES",
  };
  let line = Line::from(vec![
    Span::styled(
      format!(" {mode} "),
      Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD),
    ),
    Span::styled(
      "  Tab switch view  ←→/hl scroll dates  q quit",
      Style::default().fg(Color::DarkGray),
    ),
  ]);
  f.render_widget(Paragraph::new(line).style(Style::default().bg(Color::Black)), area);
}
