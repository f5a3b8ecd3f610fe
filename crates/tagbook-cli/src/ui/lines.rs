//! Multi-series line chart: one line per tag across the report dates.

use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Style},
  symbols,
  widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
};

use super::series_color;
use crate::app::{App, line_series, y_bounds};

pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let pivot = &app.report.pivot;
  let series = line_series(pivot);
  let [y_lo, y_hi] = y_bounds(&series);

  let datasets: Vec<Dataset> = series
    .iter()
    .enumerate()
    .map(|(idx, (tag, points))| {
      Dataset::default()
        .name(tag.as_str())
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(series_color(idx)))
        .data(points)
    })
    .collect();

  // First, middle and last date as x labels.
  let rows = pivot.rows();
  let last = rows.len().saturating_sub(1);
  let mut x_labels: Vec<String> = [0, last / 2, last]
    .iter()
    .filter_map(|&i| rows.get(i))
    .map(|r| r.timestamp.format("%m-%d").to_string())
    .collect();
  x_labels.dedup();

  let y_labels = vec![
    format!("{y_lo:.0}"),
    format!("{:.0}", (y_lo + y_hi) / 2.0),
    format!("{y_hi:.0}"),
  ];

  let chart = Chart::new(datasets)
    .block(
      Block::default()
        .title(format!(" {} ", app.view.title()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray)),
    )
    .x_axis(
      Axis::default()
        .title("date")
        .style(Style::default().fg(Color::Gray))
        .bounds([0.0, last.max(1) as f64])
        .labels(x_labels),
    )
    .y_axis(
      Axis::default()
        .style(Style::default().fg(Color::Gray))
        .bounds([y_lo, y_hi])
        .labels(y_labels),
    );

  f.render_widget(chart, area);
}
