//! Operator input forms and the context that carries them to persistence.
//!
//! A [`FormContext`] is passed explicitly from the form stage to the insert
//! stage. It holds the validated E and P forms plus any values calculated
//! from them, and flattens everything into `tag_name → value` entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  fact::{FieldValue, FormEntry},
};

// ─── Stop categories ─────────────────────────────────────────────────────────

/// Why the plant stopped; each category has a fixed set of reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopCategory {
  Category1,
  Category2,
  Category3,
  Category4,
}

impl StopCategory {
  pub const ALL: [Self; 4] =
    [Self::Category1, Self::Category2, Self::Category3, Self::Category4];

  pub fn name(self) -> &'static str {
    match self {
      Self::Category1 => "Category1",
      Self::Category2 => "Category2",
      Self::Category3 => "Category3",
      Self::Category4 => "Category4",
    }
  }

  pub fn reasons(self) -> &'static [&'static str] {
    match self {
      Self::Category1 => &["Reason11", "Reason12"],
      Self::Category2 => &["Reason21", "Reason22"],
      Self::Category3 => &["Reason31", "Reason32"],
      Self::Category4 => &["Reason41", "Reason42"],
    }
  }
}

// ─── E form ──────────────────────────────────────────────────────────────────

fn no_comment() -> String { "no comment".into() }

/// Process readings E1–E4.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EForm {
  #[serde(rename = "E1")]
  pub e1:        i64,
  #[serde(rename = "E2")]
  pub e2:        i64,
  /// `0 <= E3 < 30`, even.
  #[serde(rename = "E3", default)]
  pub e3:        i64,
  /// `0 <= E4 < 30`, even.
  #[serde(rename = "E4", default)]
  pub e4:        i64,
  #[serde(rename = "E4_state", default)]
  pub e4_state:  bool,
  #[serde(rename = "E_comment", default = "no_comment")]
  pub e_comment: String,
}

impl EForm {
  pub fn new(e1: i64, e2: i64) -> Self {
    Self { e1, e2, e3: 0, e4: 0, e4_state: false, e_comment: no_comment() }
  }

  pub fn validate(&self) -> Result<()> {
    check_even_below_30("E3", self.e3)?;
    check_even_below_30("E4", self.e4)
  }

  /// The derived `E_sum` value.
  pub fn sum(&self) -> i64 {
    [self.e1, self.e2, self.e3, self.e4]
      .into_iter()
      .fold(0i64, i64::saturating_add)
  }

  fn entries(&self) -> Vec<FormEntry> {
    vec![
      FormEntry::new("E1", FieldValue::Int(self.e1)),
      FormEntry::new("E2", FieldValue::Int(self.e2)),
      FormEntry::new("E3", FieldValue::Int(self.e3)),
      FormEntry::new("E4", FieldValue::Int(self.e4)),
      FormEntry::new("E4_state", FieldValue::Bool(self.e4_state)),
      FormEntry::new("E_comment", FieldValue::Text(self.e_comment.clone())),
    ]
  }
}

fn check_even_below_30(field: &'static str, value: i64) -> Result<()> {
  if !(0..30).contains(&value) {
    return Err(Error::InvalidField { field, reason: format!("{value} is outside 0..30") });
  }
  if value % 2 != 0 {
    return Err(Error::InvalidField { field, reason: format!("{value} is not a multiple of 2") });
  }
  Ok(())
}

// ─── P form ──────────────────────────────────────────────────────────────────

fn default_fiq() -> i64 { 100 }

/// Steam pump readings, a comment, and an optional stop classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PForm {
  /// Steam temperature, 100..=300 in steps of 10.
  #[serde(rename = "FIQ", default = "default_fiq")]
  pub fiq:               i64,
  /// 0..=200.
  #[serde(rename = "FIQ_running_hours", default)]
  pub fiq_running_hours: i64,
  #[serde(rename = "P_comment", default = "no_comment")]
  pub p_comment:         String,
  #[serde(rename = "P_stop_category", default)]
  pub p_stop_category:   Option<StopCategory>,
  #[serde(rename = "P_stop_reason", default)]
  pub p_stop_reason:     Vec<String>,
}

impl Default for PForm {
  fn default() -> Self {
    Self {
      fiq:               default_fiq(),
      fiq_running_hours: 0,
      p_comment:         no_comment(),
      p_stop_category:   None,
      p_stop_reason:     Vec::new(),
    }
  }
}

impl PForm {
  pub fn validate(&self) -> Result<()> {
    if !(100..=300).contains(&self.fiq) || self.fiq % 10 != 0 {
      return Err(Error::InvalidField {
        field:  "FIQ",
        reason: format!("{} is not a multiple of 10 within 100..=300", self.fiq),
      });
    }
    if !(0..=200).contains(&self.fiq_running_hours) {
      return Err(Error::InvalidField {
        field:  "FIQ_running_hours",
        reason: format!("{} is outside 0..=200", self.fiq_running_hours),
      });
    }
    match self.p_stop_category {
      None if !self.p_stop_reason.is_empty() => Err(Error::InvalidField {
        field:  "P_stop_reason",
        reason: "reasons require a stop category".into(),
      }),
      None => Ok(()),
      Some(category) => {
        match self.p_stop_reason.iter().find(|r| !category.reasons().contains(&r.as_str())) {
          Some(bad) => Err(Error::InvalidField {
            field:  "P_stop_reason",
            reason: format!("{bad:?} is not a reason of {}", category.name()),
          }),
          None => Ok(()),
        }
      }
    }
  }

  // The category and reason list have no scalar storage form; they are
  // classified as unsupported and dropped at insertion.
  fn entries(&self) -> Vec<FormEntry> {
    let category = match self.p_stop_category {
      Some(c) => FieldValue::Text(c.name().into()),
      None => FieldValue::Unsupported("null".into()),
    };
    vec![
      FormEntry::new("FIQ", FieldValue::Int(self.fiq)),
      FormEntry::new("FIQ_running_hours", FieldValue::Int(self.fiq_running_hours)),
      FormEntry::new("P_comment", FieldValue::Text(self.p_comment.clone())),
      FormEntry::new("P_stop_category", category),
      FormEntry::new("P_stop_reason", FieldValue::Unsupported("list".into())),
    ]
  }
}

// ─── Context ─────────────────────────────────────────────────────────────────

/// The in-progress input of one operator, threaded from the forms to the
/// insert call. Re-submitting the same context after a failed insert writes
/// the same entries again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormContext {
  pub e:          Option<EForm>,
  pub p:          Option<PForm>,
  /// Values derived from the forms, e.g. `E_sum`.
  #[serde(default)]
  pub calculated: BTreeMap<String, i64>,
}

impl FormContext {
  /// Build a context from both forms, validating each.
  pub fn from_forms(e: EForm, p: PForm) -> Result<Self> {
    let mut ctx = Self::default();
    ctx.submit_e(e)?;
    ctx.submit_p(p)?;
    Ok(ctx)
  }

  /// Validate and store the E form, recomputing `E_sum`.
  pub fn submit_e(&mut self, form: EForm) -> Result<()> {
    form.validate()?;
    self.calculated.insert("E_sum".into(), form.sum());
    self.e = Some(form);
    Ok(())
  }

  pub fn submit_p(&mut self, form: PForm) -> Result<()> {
    form.validate()?;
    self.p = Some(form);
    Ok(())
  }

  /// All entries to insert: E form, then P form, then calculated values.
  pub fn entries(&self) -> Result<Vec<FormEntry>> {
    let (Some(e), Some(p)) = (&self.e, &self.p) else {
      return Err(Error::IncompleteForms);
    };
    let mut entries = e.entries();
    entries.extend(p.entries());
    entries.extend(
      self
        .calculated
        .iter()
        .map(|(tag, v)| FormEntry::new(tag.clone(), FieldValue::Int(*v))),
    );
    Ok(entries)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn e_form_rules() {
    assert!(EForm::new(1, 2).validate().is_ok());

    let mut odd = EForm::new(1, 2);
    odd.e3 = 3;
    assert!(matches!(odd.validate(), Err(Error::InvalidField { field: "E3", .. })));

    let mut high = EForm::new(1, 2);
    high.e4 = 30;
    assert!(matches!(high.validate(), Err(Error::InvalidField { field: "E4", .. })));
  }

  #[test]
  fn p_form_rules() {
    assert!(PForm::default().validate().is_ok());

    let fiq = PForm { fiq: 155, ..PForm::default() };
    assert!(matches!(fiq.validate(), Err(Error::InvalidField { field: "FIQ", .. })));

    let wrong_reason = PForm {
      p_stop_category: Some(StopCategory::Category1),
      p_stop_reason: vec!["Reason21".into()],
      ..PForm::default()
    };
    assert!(wrong_reason.validate().is_err());

    let orphan_reason = PForm { p_stop_reason: vec!["Reason11".into()], ..PForm::default() };
    assert!(orphan_reason.validate().is_err());
  }

  #[test]
  fn submitting_e_form_computes_sum() {
    let mut ctx = FormContext::default();
    let mut form = EForm::new(5, 7);
    form.e3 = 2;
    form.e4 = 4;
    ctx.submit_e(form).unwrap();
    assert_eq!(ctx.calculated["E_sum"], 18);
  }

  #[test]
  fn entries_require_both_forms() {
    let mut ctx = FormContext::default();
    ctx.submit_e(EForm::new(1, 1)).unwrap();
    assert!(matches!(ctx.entries(), Err(Error::IncompleteForms)));
  }

  #[test]
  fn entries_merge_forms_and_calculated_values() {
    let ctx = FormContext::from_forms(EForm::new(10, 5), PForm::default()).unwrap();
    let entries = ctx.entries().unwrap();

    let tags: Vec<&str> = entries.iter().map(|e| e.tag_name.as_str()).collect();
    assert_eq!(tags, [
      "E1", "E2", "E3", "E4", "E4_state", "E_comment", "FIQ", "FIQ_running_hours",
      "P_comment", "P_stop_category", "P_stop_reason", "E_sum",
    ]);
    assert_eq!(entries.last().unwrap().value, FieldValue::Int(15));
    assert_eq!(entries[10].value.kind(), "list");
  }

  #[test]
  fn forms_deserialise_with_defaults() {
    let e: EForm = serde_json::from_value(serde_json::json!({ "E1": 3, "E2": 4 })).unwrap();
    assert_eq!(e, EForm::new(3, 4));

    let p: PForm = serde_json::from_value(serde_json::json!({
      "FIQ": 200,
      "P_stop_category": "Category2",
      "P_stop_reason": ["Reason22"],
    }))
    .unwrap();
    assert_eq!(p.p_stop_category, Some(StopCategory::Category2));
    assert!(p.validate().is_ok());
  }
}
