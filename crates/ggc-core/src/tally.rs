//! Conditional-count requests.
//!
//! The aggregator never loops over sections issuing one query each. Instead it
//! describes every count it needs as a [`TallyColumn`] and hands the whole list
//! to the store, which computes them in a single round trip. The SQLite store
//! groups rows by section, tier and value and folds the groups into each
//! column, so the query shape does not grow with the number of sections.

use std::collections::HashMap;

use uuid::Uuid;

use crate::{Level, response::AnswerValue};

/// Identifies one count inside a [`Tally`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountKey {
  Total,
  /// Yes-valued answers only.
  Compliance,
  Section(Uuid),
  Level(Level),
  LevelSection(Level, Uuid),
  Value(AnswerValue),
}

/// Row predicate for a single count. Every `Some` field must hold.
///
/// `value` applies to answer rows only and is ignored when counting questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountFilter {
  pub section:   Option<Uuid>,
  pub max_level: Option<Level>,
  pub value:     Option<AnswerValue>,
}

impl CountFilter {
  pub fn all() -> Self { Self::default() }

  pub fn at_or_below(level: Level) -> Self { Self { max_level: Some(level), ..Self::default() } }

  pub fn section(mut self, section_id: Uuid) -> Self {
    self.section = Some(section_id);
    self
  }

  pub fn value(mut self, value: AnswerValue) -> Self {
    self.value = Some(value);
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyColumn {
  pub key:    CountKey,
  pub filter: CountFilter,
}

impl TallyColumn {
  pub fn new(key: CountKey, filter: CountFilter) -> Self { Self { key, filter } }
}

/// The result of one conditional-count round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
  counts: HashMap<CountKey, u32>,
}

impl Tally {
  pub fn new() -> Self { Self::default() }

  pub fn insert(&mut self, key: CountKey, count: u32) { self.counts.insert(key, count); }

  /// The count for `key`; a missing or NULL aggregate reads as zero.
  pub fn get(&self, key: CountKey) -> u32 { self.counts.get(&key).copied().unwrap_or(0) }

  pub fn len(&self) -> usize { self.counts.len() }

  pub fn is_empty(&self) -> bool { self.counts.is_empty() }
}

impl FromIterator<(CountKey, u32)> for Tally {
  fn from_iter<I: IntoIterator<Item = (CountKey, u32)>>(iter: I) -> Self {
    Self { counts: iter.into_iter().collect() }
  }
}
