//! Compliance tiers.
//!
//! Tiers are cumulative: satisfying tier N requires every question at tiers
//! 1..=N. Everything that filters questions by tier therefore uses
//! `question.level <= tier`.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

use crate::Error;

/// One of the four ordered compliance tiers. Serialised as its integer value.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Default,
  EnumIter,
  Serialize,
  Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum Level {
  #[default]
  Bronze   = 1,
  Silver   = 2,
  Gold     = 3,
  Platinum = 4,
}

impl Level {
  /// Every tier in ascending order.
  pub fn all() -> impl Iterator<Item = Level> { Level::iter() }

  pub fn value(self) -> u8 { self as u8 }

  /// The display name of the tier, e.g. `"Bronze"`.
  pub fn label(self) -> &'static str {
    match self {
      Self::Bronze => "Bronze",
      Self::Silver => "Silver",
      Self::Gold => "Gold",
      Self::Platinum => "Platinum",
    }
  }
}

impl From<Level> for u8 {
  fn from(level: Level) -> Self { level.value() }
}

impl TryFrom<u8> for Level {
  type Error = Error;

  fn try_from(value: u8) -> Result<Self, Self::Error> {
    Self::try_from(i64::from(value))
  }
}

impl TryFrom<i64> for Level {
  type Error = Error;

  fn try_from(value: i64) -> Result<Self, Self::Error> {
    match value {
      1 => Ok(Self::Bronze),
      2 => Ok(Self::Silver),
      3 => Ok(Self::Gold),
      4 => Ok(Self::Platinum),
      other => Err(Error::InvalidLevel(other)),
    }
  }
}

impl fmt::Display for Level {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

/// Turn a tier's integer value into its display name.
pub fn get_level_name(level: i64) -> crate::Result<&'static str> {
  Ok(Level::try_from(level)?.label())
}
