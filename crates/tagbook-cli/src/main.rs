//! `tagbook`: operator CLI for the tagbook fact store.
//!
//! # Usage
//!
//! ```
//! tagbook --url http://localhost:8080 submit --file forms.toml
//! tagbook report --tags E1,E2 --start 2024-03-01 --end 2024-03-07 --chart
//! tagbook edit --id 42 --set num_value=12 --set str_value=recalibrated
//! ```

mod app;
mod client;
mod commands;
mod ui;

use std::{io, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use app::App;
use chrono::{DateTime, Days, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use crossterm::{
  event::{self, Event},
  execute,
  terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Deserialize;
use serde_json::Value;
use tagbook_core::fact::FactId;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tagbook", about = "Operator CLI for the tagbook fact store")]
struct Args {
  /// Path to a TOML config file (url).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the tagbook server (default: http://localhost:8080).
  #[arg(long, env = "TAGBOOK_URL")]
  url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Validate the E and P forms in a TOML file and insert them.
  Submit {
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
    /// Date to file the values under (default: now).
    #[arg(long)]
    date: Option<NaiveDate>,
  },
  /// List every stored fact, most recent first.
  Facts,
  /// List tag names.
  Tags {
    /// Fuzzy filter, best match first.
    #[arg(short, long)]
    filter: Option<String>,
  },
  /// Pivot, extremes and means for tags over a date range.
  Report {
    /// Comma-separated tag names.
    #[arg(long, value_delimiter = ',', required = true)]
    tags:  Vec<String>,
    /// First date (default: six days before `end`).
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last date, inclusive (default: today).
    #[arg(long)]
    end:   Option<NaiveDate>,
    /// Open the interactive chart view instead of printing tables.
    #[arg(long)]
    chart: bool,
  },
  /// Change columns of one fact.
  Edit {
    #[arg(long)]
    id:  FactId,
    /// `FIELD=VALUE`; repeatable. `NaN` or `null` clears the column.
    #[arg(long = "set", value_name = "FIELD=VALUE", required = true, value_parser = commands::parse_assignment)]
    set: Vec<(String, Value)>,
  },
  /// Delete facts by id.
  Delete {
    #[arg(long = "id", required = true)]
    ids: Vec<FactId>,
  },
  /// Day-over-day differences of the reconciliation tags.
  Calc {
    /// End of the recent window (default: now).
    #[arg(long)]
    at: Option<DateTime<Utc>>,
  },
}

// ─── Config file ─────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url: String,
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  // The chart view owns the terminal; log lines would corrupt it.
  if !matches!(args.command, Command::Report { chart: true, .. }) {
    tracing_subscriber::fmt()
      .with_writer(io::stderr)
      .with_env_filter(
        EnvFilter::builder()
          .with_default_directive(LevelFilter::WARN.into())
          .from_env_lossy(),
      )
      .init();
  }

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
  };
  let client = ApiClient::new(api_config)?;

  match args.command {
    Command::Submit { file, date } => commands::submit(&client, &file, date).await,
    Command::Facts => commands::facts(&client).await,
    Command::Tags { filter } => commands::tags(&client, filter.as_deref()).await,
    Command::Report { tags, start, end, chart } => {
      let end = end.unwrap_or_else(|| Utc::now().date_naive());
      let start = start.unwrap_or_else(|| end.checked_sub_days(Days::new(6)).unwrap_or(end));
      let report = client.report(&tags, start, end).await?;
      if chart {
        let title = format!("{}  {start} → {end}", tags.join(", "));
        run_chart(App::new(report, title)).await
      } else {
        commands::print_report(&report);
        Ok(())
      }
    }
    Command::Edit { id, set } => commands::edit(&client, id, set).await,
    Command::Delete { ids } => commands::delete(&client, ids).await,
    Command::Calc { at } => commands::calc(&client, at).await,
  }
}

// ─── Chart view ──────────────────────────────────────────────────────────────

async fn run_chart(mut app: App) -> Result<()> {
  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  let run_result = run_event_loop(&mut terminal, &mut app).await;

  // Restore terminal regardless of result.
  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  run_result
}

async fn run_event_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App,
) -> Result<()> {
  loop {
    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(Event::Key(key)) = maybe_event
      && !app.handle_key(key)
    {
      break;
    }
  }

  Ok(())
}
