//! Grouped bar chart: one group per date, one bar per tag.

use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Style},
  text::Line,
  widgets::{Bar, BarChart, BarGroup, Block, Borders},
};

use super::series_color;
use crate::app::{App, bar_groups};

const BAR_WIDTH: u16 = 3;
const BAR_GAP: u16 = 1;
const GROUP_GAP: u16 = 3;

pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let groups = bar_groups(&app.report.pivot);

  let block = Block::default()
    .title(format!(" {} ", app.view.title()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let mut chart = BarChart::default()
    .block(block)
    .bar_width(BAR_WIDTH)
    .bar_gap(BAR_GAP)
    .group_gap(GROUP_GAP);

  for (label, bars) in groups.iter().skip(app.scroll) {
    let bars: Vec<Bar> = bars
      .iter()
      .enumerate()
      .map(|(idx, (tag, value))| {
        Bar::default()
          .value(*value)
          .label(Line::from(tag.as_str()))
          .style(Style::default().fg(series_color(idx)))
      })
      .collect();
    chart = chart.data(BarGroup::default().label(Line::from(label.as_str())).bars(&bars));
  }

  f.render_widget(chart, area);
}
