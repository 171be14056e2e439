//! Progress information: the statistic object every report is built from.
//!
//! The field names of [`ProgressInfo`] (`total`, `count`, `slug`, `label`,
//! `ratio`, `percentage`, `is_complete`) are consumed verbatim by
//! presentation layers and must not change.

use serde::{Deserialize, Serialize};
use strum::AsRefStr;

/// The completion state of a statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ProgressSlug {
  NoQuestion,
  NotStarted,
  InProgress,
  Complete,
}

impl ProgressSlug {
  /// Derive the slug from an already-clamped `count`.
  pub fn from_counts(count: u32, total: u32) -> Self {
    if total == 0 {
      Self::NoQuestion
    } else if count == 0 {
      Self::NotStarted
    } else if count < total {
      Self::InProgress
    } else {
      Self::Complete
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::NoQuestion => "No questions for this tier",
      Self::NotStarted => "Not yet started",
      Self::InProgress => "In progress",
      Self::Complete => "Complete",
    }
  }

  pub fn is_complete(self) -> bool { matches!(self, Self::NoQuestion | Self::Complete) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressInfo {
  pub total:       u32,
  /// Clamped to `total`.
  pub count:       u32,
  pub slug:        ProgressSlug,
  pub label:       String,
  /// `count / total`, or `0` when there are no questions.
  pub ratio:       f64,
  pub percentage:  u32,
  pub is_complete: bool,
}

impl ProgressInfo {
  /// Replace the slug label, e.g. with a tier name.
  pub fn with_label(mut self, label: impl Into<String>) -> Self {
    self.label = label.into();
    self
  }
}

/// Build a [`ProgressInfo`] from raw counts.
///
/// An over-count (more answers than in-scope questions) is clamped to `total`
/// before the slug is derived, so `(11, 10)` is `complete` at 100%. A zero
/// total is `no-question`, which counts as complete.
pub fn get_progress_info(count: u32, total: u32) -> ProgressInfo {
  let count = count.min(total);
  let slug = ProgressSlug::from_counts(count, total);
  let ratio = if total == 0 { 0.0 } else { f64::from(count) / f64::from(total) };
  ProgressInfo {
    total,
    count,
    slug,
    label: slug.label().to_owned(),
    ratio,
    percentage: percentage(ratio),
    is_complete: slug.is_complete(),
  }
}

/// `ratio * 100` rounded half-to-even.
fn percentage(ratio: f64) -> u32 { (ratio * 100.0).round_ties_even() as u32 }
