//! One function per subcommand. Everything except `report --chart` prints
//! plain tables to stdout.

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use serde_json::Value;
use tagbook_core::{
  Warning,
  edit::{CommitOutcome, EditSession},
  fact::{Fact, FactId},
  form::FormContext,
  reconcile::Reconciliation,
  report::Report,
};

use crate::client::ApiClient;

/// Columns an `edit --set` may touch.
const EDITABLE: [&str; 4] = ["tag_name", "num_value", "str_value", "timestamp"];

// ─── Submit ──────────────────────────────────────────────────────────────────

/// Read both forms from a TOML file (`[e]` and `[p]` tables), validate them
/// locally, then insert.
pub async fn submit(client: &ApiClient, file: &Path, date: Option<NaiveDate>) -> Result<()> {
  let raw = std::fs::read_to_string(file)
    .with_context(|| format!("reading form file {}", file.display()))?;
  let parsed: FormContext = toml::from_str(&raw).context("parsing form file")?;

  let (Some(e), Some(p)) = (parsed.e, parsed.p) else {
    bail!(tagbook_core::Error::IncompleteForms);
  };
  let ctx = FormContext::from_forms(e, p)?;
  for (tag, value) in &ctx.calculated {
    println!("{tag} = {value}");
  }

  let outcome = client.submit_forms(&ctx, date).await?;
  println!("{} facts written", outcome.facts.len());
  print_warnings(&outcome.warnings);
  Ok(())
}

// ─── Listings ────────────────────────────────────────────────────────────────

pub async fn facts(client: &ApiClient) -> Result<()> {
  let facts = client.list_facts().await?;
  print_table(&["id", "timestamp", "tag_name", "num_value", "str_value"], facts_rows(&facts));
  Ok(())
}

fn facts_rows(facts: &[Fact]) -> Vec<Vec<String>> {
  facts
    .iter()
    .map(|f| {
      vec![
        f.id.to_string(),
        f.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        f.tag_name.clone(),
        f.num_value.map(|v| v.to_string()).unwrap_or_default(),
        f.str_value.clone().unwrap_or_default(),
      ]
    })
    .collect()
}

pub async fn tags(client: &ApiClient, filter: Option<&str>) -> Result<()> {
  let tags = client.list_tags().await?;
  let tags = match filter {
    Some(q) => fuzzy_filter(tags, q),
    None => tags,
  };
  for tag in tags {
    println!("{tag}");
  }
  Ok(())
}

/// Tags matching `query`, best match first.
pub fn fuzzy_filter(tags: Vec<String>, query: &str) -> Vec<String> {
  if query.is_empty() {
    return tags;
  }
  let matcher = SkimMatcherV2::default();
  let mut scored: Vec<(i64, String)> = tags
    .into_iter()
    .filter_map(|t| matcher.fuzzy_match(&t, query).map(|score| (score, t)))
    .collect();
  scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
  scored.into_iter().map(|(_, t)| t).collect()
}

// ─── Report ──────────────────────────────────────────────────────────────────

pub fn print_report(report: &Report) {
  let columns = report.pivot.columns();
  let headers: Vec<&str> = columns.iter().map(String::as_str).collect();
  let rows = report
    .pivot
    .rows()
    .iter()
    .map(|row| {
      std::iter::once(row.timestamp.to_string())
        .chain(row.cells.iter().map(|c| c.map(|v| v.to_string()).unwrap_or_default()))
        .collect()
    })
    .collect();
  print_table(&headers, rows);

  for (label, occurrences) in [("max", &report.max), ("min", &report.min)] {
    if occurrences.is_empty() {
      continue;
    }
    println!("\n{label}");
    print_table(
      &["timestamp", "tag_name", "value"],
      occurrences
        .iter()
        .map(|o| vec![o.timestamp.to_string(), o.tag_name.clone(), o.value.to_string()])
        .collect(),
    );
  }

  if !report.mean.is_empty() {
    println!("\nmean");
    print_table(
      &["tag_name", "mean"],
      report
        .mean
        .iter()
        .map(|(tag, mean)| vec![tag.clone(), format!("{mean:.2}")])
        .collect(),
    );
  }
  print_warnings(&report.warnings);
}

// ─── Edit / delete ───────────────────────────────────────────────────────────

/// Parse a `field=value` argument. The value is read as JSON when it parses
/// (`12`, `null`, `true`), otherwise taken as text.
pub fn parse_assignment(arg: &str) -> Result<(String, Value), String> {
  let (field, value) = arg
    .split_once('=')
    .ok_or_else(|| format!("expected FIELD=VALUE, got {arg:?}"))?;
  let field = field.trim();
  if !EDITABLE.contains(&field) {
    return Err(format!("{field:?} is not editable; use one of {}", EDITABLE.join(", ")));
  }
  let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
  Ok((field.to_owned(), value))
}

/// Load the listing, select `id`, apply `sets`, and commit the edit.
pub async fn edit(client: &ApiClient, id: FactId, sets: Vec<(String, Value)>) -> Result<()> {
  let mut session = EditSession::new(client.list_facts().await?);
  if !session.select([id]).is_empty() {
    bail!("no fact with id {id}");
  }
  session.begin_edit();
  for (column, value) in sets {
    session.set_cell(id, &column, value);
  }

  let plan = session.plan_update();
  tracing::debug!(stage = ?session.stage(), patches = plan.patches.len(), "edit planned");
  if plan.patches.is_empty() {
    print_warnings(&plan.warnings);
    println!("nothing to update");
    session.mark_committed(&CommitOutcome::Noop { warnings: plan.warnings });
    return Ok(());
  }

  let committed = client.update_rows(session.edits_mut()).await?;
  println!("{}: {} row(s)", committed.outcome, committed.rows);
  print_warnings(&committed.warnings);
  session.mark_committed(&CommitOutcome::Updated {
    rows:     committed.rows,
    patches:  plan.patches,
    warnings: committed.warnings,
  });
  Ok(())
}

/// Load the listing, select `ids`, and delete the selection.
pub async fn delete(client: &ApiClient, ids: Vec<FactId>) -> Result<()> {
  let mut session = EditSession::new(client.list_facts().await?);
  for unknown in session.select(ids) {
    eprintln!("warning: no fact with id {unknown}; skipped");
  }

  let Some(selected) = session.plan_delete() else {
    print_warnings(&[Warning::EmptySelection { what: "row selection".into() }]);
    return Ok(());
  };

  let committed = client.delete_ids(&selected).await?;
  println!("{}: {} row(s)", committed.outcome, committed.rows);
  session.mark_committed(&CommitOutcome::Deleted { ids: selected, rows: committed.rows });
  Ok(())
}

// ─── Calc ────────────────────────────────────────────────────────────────────

pub async fn calc(client: &ApiClient, at: Option<DateTime<Utc>>) -> Result<()> {
  let rec = client.reconcile(at).await?;
  print_reconciliation(&rec);
  Ok(())
}

fn print_reconciliation(rec: &Reconciliation) {
  for (label, readings) in [("recent", &rec.recent), ("prior", &rec.prior)] {
    println!("{label}");
    print_table(
      &["timestamp", "tag_name", "num_value"],
      readings
        .iter()
        .map(|r| {
          vec![
            r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            r.tag_name.clone(),
            r.num_value.to_string(),
          ]
        })
        .collect(),
    );
    println!();
  }

  print_table(
    &["tag_name", "difference", "scaled"],
    rec
      .differences
      .iter()
      .map(|d| {
        let scaled = rec
          .scaled
          .iter()
          .find(|s| s.tag_name == d.tag_name)
          .map(|s| format!("{:.3}", s.difference))
          .unwrap_or_default();
        vec![d.tag_name.clone(), d.difference.to_string(), scaled]
      })
      .collect(),
  );
}

// ─── Output helpers ──────────────────────────────────────────────────────────

fn print_warnings(warnings: &[Warning]) {
  for w in warnings {
    eprintln!("warning: {w}");
  }
}

/// Left-aligned columns padded to the widest cell.
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
  let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
  for row in rows {
    for (w, cell) in widths.iter_mut().zip(row) {
      *w = (*w).max(cell.chars().count());
    }
  }

  let mut out = pad_line(headers.iter().copied(), &widths);
  for row in rows {
    out.push('\n');
    out.push_str(&pad_line(row.iter().map(String::as_str), &widths));
  }
  out
}

fn pad_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
  cells
    .zip(widths)
    .map(|(c, &w)| format!("{c:<w$}"))
    .collect::<Vec<_>>()
    .join("  ")
    .trim_end()
    .to_owned()
}

fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
  println!("{}", format_table(headers, &rows));
}
