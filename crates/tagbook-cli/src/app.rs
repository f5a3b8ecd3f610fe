//! State and key handling for the `report --chart` terminal view.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tagbook_core::{pivot::PivotTable, report::Report};

// ─── View ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
  /// One group of bars per date, one bar per tag.
  Bars,
  /// One line per tag across the dates.
  Lines,
}

impl View {
  pub fn title(self) -> &'static str {
    match self {
      Self::Bars => "Grouped bars",
      Self::Lines => "Lines",
    }
  }

  fn toggle(self) -> Self {
    match self {
      Self::Bars => Self::Lines,
      Self::Lines => Self::Bars,
    }
  }
}

// ─── App ─────────────────────────────────────────────────────────────────────

/// A loaded report plus what the user is looking at.
pub struct App {
  pub report: Report,
  pub view:   View,
  /// Shown in the header, e.g. the selected tags and dates.
  pub title:  String,
  /// Index of the first date group shown in the bar view.
  pub scroll: usize,
}

impl App {
  pub fn new(report: Report, title: String) -> Self {
    Self { report, view: View::Bars, title, scroll: 0 }
  }

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub fn handle_key(&mut self, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return false;
    }
    match key.code {
      KeyCode::Char('q') | KeyCode::Esc => return false,
      KeyCode::Tab | KeyCode::Char('v') => self.view = self.view.toggle(),
      KeyCode::Right | KeyCode::Char('l') => {
        if self.scroll + 1 < self.report.pivot.rows().len() {
          self.scroll += 1;
        }
      }
      KeyCode::Left | KeyCode::Char('h') => self.scroll = self.scroll.saturating_sub(1),
      _ => {}
    }
    true
  }
}

// ─── Chart data ──────────────────────────────────────────────────────────────

/// One bar group: the date label and a `(tag, value)` bar per tag column.
/// Bar charts cannot show negative heights, so values are clamped at zero;
/// empty cells become zero-height bars.
pub fn bar_groups(pivot: &PivotTable) -> Vec<(String, Vec<(String, u64)>)> {
  pivot
    .rows()
    .iter()
    .map(|row| {
      let bars = pivot
        .tags()
        .iter()
        .zip(&row.cells)
        .map(|(tag, cell)| (tag.clone(), cell.map_or(0, |v| v.max(0) as u64)))
        .collect();
      (row.timestamp.format("%m-%d").to_string(), bars)
    })
    .collect()
}

/// One series per tag. `x` is the row index (dates are sorted), empty cells
/// are left out of the series.
pub fn line_series(pivot: &PivotTable) -> Vec<(String, Vec<(f64, f64)>)> {
  pivot
    .tags()
    .iter()
    .filter_map(|tag| {
      let points: Vec<(f64, f64)> = pivot
        .column(tag)?
        .enumerate()
        .filter_map(|(x, (_, cell))| cell.map(|v| (x as f64, v as f64)))
        .collect();
      Some((tag.clone(), points))
    })
    .collect()
}

/// `[min, max]` of every plotted value, padded so flat series stay visible.
pub fn y_bounds(series: &[(String, Vec<(f64, f64)>)]) -> [f64; 2] {
  let ys = series.iter().flat_map(|(_, pts)| pts.iter().map(|(_, y)| *y));
  let (lo, hi) = ys.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| {
    (lo.min(y), hi.max(y))
  });
  if !lo.is_finite() {
    return [0.0, 1.0];
  }
  let pad = ((hi - lo) * 0.1).max(1.0);
  [lo - pad, hi + pad]
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use tagbook_core::fact::{Reading, start_of_day};

  use super::*;

  fn pivot() -> PivotTable {
    let d = |day| start_of_day(NaiveDate::from_ymd_opt(2024, 3, day).unwrap());
    PivotTable::from_readings(&[
      Reading::new(d(1), "E1", 4),
      Reading::new(d(1), "E2", -2),
      Reading::new(d(2), "E1", 6),
    ])
  }

  #[test]
  fn bars_group_by_date_and_clamp_negatives() {
    let groups = bar_groups(&pivot());
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].0, "03-01");
    assert_eq!(groups[0].1, vec![("E1".to_owned(), 4), ("E2".to_owned(), 0)]);
    assert_eq!(groups[1].1[1], ("E2".to_owned(), 0));
  }

  #[test]
  fn lines_skip_empty_cells() {
    let series = line_series(&pivot());
    assert_eq!(series[0], ("E1".to_owned(), vec![(0.0, 4.0), (1.0, 6.0)]));
    assert_eq!(series[1], ("E2".to_owned(), vec![(0.0, -2.0)]));
    assert_eq!(y_bounds(&series), [-3.0, 7.0]);
  }

  #[test]
  fn keys_toggle_view_and_quit() {
    let mut app = App::new(Report::default(), String::new());
    assert!(app.handle_key(KeyEvent::from(KeyCode::Tab)));
    assert_eq!(app.view, View::Lines);
    assert!(!app.handle_key(KeyEvent::from(KeyCode::Char('q'))));
  }
}
