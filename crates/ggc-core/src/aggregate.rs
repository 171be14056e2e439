//! Progress and compliance aggregation.
//!
//! Each report is computed in exactly three store round trips regardless of
//! how many sections the survey has: the section list, one conditional-count
//! pass over the survey's questions, and one over the response's answers.
//! Every per-section and per-tier figure is a column of those two passes.
//!
//! Progress counts any answer; compliance counts `Yes` answers only.

use std::collections::BTreeMap;

use serde::Serialize;
use strum::IntoEnumIterator;
use uuid::Uuid;

use crate::{
  Level,
  catalog::Section,
  progress::{ProgressInfo, get_progress_info},
  response::{AnswerResults, AnswerValue, SurveyResponse},
  store::SurveyStore,
  tally::{CountFilter, CountKey, Tally, TallyColumn},
};

// ─── Result types ────────────────────────────────────────────────────────────

/// Progress information tagged with the section it describes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionProgress {
  pub section: Section,
  #[serde(flatten)]
  pub info:    ProgressInfo,
}

/// Output of [`get_progress`].
///
/// The outer fields are survey-wide progress at the response's tier;
/// `compliance` is the survey-wide `Yes`-only figure over the same
/// denominator. There is no per-section compliance here; see
/// [`get_level_compliance`] for that.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
  pub sections:   Vec<SectionProgress>,
  #[serde(flatten)]
  pub info:       ProgressInfo,
  pub compliance: ProgressInfo,
}

/// Progress information for one tier. `info.label` is the tier's display
/// name rather than the slug label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelProgress {
  pub level: Level,
  #[serde(flatten)]
  pub info:  ProgressInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionLevels {
  pub section: Section,
  /// One entry per tier, Bronze first.
  pub levels:  Vec<LevelProgress>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceMatrix {
  pub levels:   BTreeMap<Level, LevelProgress>,
  pub sections: Vec<SectionLevels>,
}

/// Output of [`get_compliance`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compliance {
  pub progress:   ProgressInfo,
  pub compliance: ComplianceMatrix,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionCompliance {
  #[serde(flatten)]
  pub info:     ProgressInfo,
  pub sections: Vec<SectionProgress>,
}

/// Output of [`get_level_compliance`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelCompliance {
  pub progress:   ProgressInfo,
  pub compliance: SectionCompliance,
}

// ─── Column builders ─────────────────────────────────────────────────────────

/// `Total` plus one `Section` column per section, all at or below `level`.
fn section_question_columns(sections: &[Section], level: Level) -> Vec<TallyColumn> {
  let at_level = CountFilter::at_or_below(level);
  std::iter::once(TallyColumn::new(CountKey::Total, at_level))
    .chain(sections.iter().map(|s| {
      TallyColumn::new(CountKey::Section(s.section_id), at_level.section(s.section_id))
    }))
    .collect()
}

/// Any-answer total, `Yes` total, and one column per section counting answers
/// that satisfy `section_value` (any value when `None`).
fn section_answer_columns(
  sections: &[Section],
  level: Level,
  section_value: Option<AnswerValue>,
) -> Vec<TallyColumn> {
  let at_level = CountFilter::at_or_below(level);
  let per_section = CountFilter { value: section_value, ..at_level };
  [
    TallyColumn::new(CountKey::Total, at_level),
    TallyColumn::new(CountKey::Compliance, at_level.value(AnswerValue::Yes)),
  ]
  .into_iter()
  .chain(sections.iter().map(|s| {
    TallyColumn::new(CountKey::Section(s.section_id), per_section.section(s.section_id))
  }))
  .collect()
}

/// Per-tier and per-(tier, section) columns, plus a `Total` at the response's
/// own tier. `value` restricts answer rows; it is ignored for questions.
fn level_columns(
  sections: &[Section],
  response_level: Level,
  value: Option<AnswerValue>,
) -> Vec<TallyColumn> {
  let mut columns = vec![TallyColumn::new(CountKey::Total, CountFilter::at_or_below(response_level))];
  for level in Level::iter() {
    let filter = CountFilter { value, ..CountFilter::at_or_below(level) };
    columns.push(TallyColumn::new(CountKey::Level(level), filter));
    for section in sections {
      columns.push(TallyColumn::new(
        CountKey::LevelSection(level, section.section_id),
        filter.section(section.section_id),
      ));
    }
  }
  columns
}

fn section_steps(sections: Vec<Section>, questions: &Tally, answered: &Tally) -> Vec<SectionProgress> {
  sections
    .into_iter()
    .map(|section| {
      let key = CountKey::Section(section.section_id);
      let info = get_progress_info(answered.get(key), questions.get(key));
      SectionProgress { section, info }
    })
    .collect()
}

fn level_stats(
  questions: &Tally,
  answered: &Tally,
  key: impl Fn(Level) -> CountKey,
) -> BTreeMap<Level, LevelProgress> {
  Level::iter()
    .map(|level| {
      let info = get_progress_info(answered.get(key(level)), questions.get(key(level)))
        .with_label(level.label());
      (level, LevelProgress { level, info })
    })
    .collect()
}

fn section_key(section_id: Uuid) -> impl Fn(Level) -> CountKey {
  move |level| CountKey::LevelSection(level, section_id)
}

// ─── Reports ─────────────────────────────────────────────────────────────────

/// Overall and per-section progress at the response's current tier, with a
/// survey-wide compliance figure.
pub async fn get_progress<S: SurveyStore>(
  store: &S,
  response: &SurveyResponse,
) -> Result<Progress, S::Error> {
  let level = response.level;
  let sections = store.sections_for_survey(response.survey_id).await?;

  let questions = store
    .tally_questions(response.survey_id, &section_question_columns(&sections, level))
    .await?;
  let answered = store
    .tally_answers(response.response_id, &section_answer_columns(&sections, level, None))
    .await?;

  let total = questions.get(CountKey::Total);
  Ok(Progress {
    sections:   section_steps(sections, &questions, &answered),
    info:       get_progress_info(answered.get(CountKey::Total), total),
    compliance: get_progress_info(answered.get(CountKey::Compliance), total),
  })
}

/// Compliance for every tier, overall and per section, independent of the
/// response's target tier, plus ordinary progress at the target tier.
pub async fn get_compliance<S: SurveyStore>(
  store: &S,
  response: &SurveyResponse,
) -> Result<Compliance, S::Error> {
  let sections = store.sections_for_survey(response.survey_id).await?;

  let questions = store
    .tally_questions(response.survey_id, &level_columns(&sections, response.level, None))
    .await?;
  let answered = store
    .tally_answers(
      response.response_id,
      &level_columns(&sections, response.level, Some(AnswerValue::Yes)),
    )
    .await?;

  // The answer-side `Total` column carries the response-tier filter only, so
  // it counts any answer value.
  let answered_total = answered.get(CountKey::Total);

  let steps = sections
    .into_iter()
    .map(|section| {
      let levels = level_stats(&questions, &answered, section_key(section.section_id))
        .into_values()
        .collect();
      SectionLevels { section, levels }
    })
    .collect();

  Ok(Compliance {
    progress:   get_progress_info(answered_total, questions.get(CountKey::Total)),
    compliance: ComplianceMatrix {
      levels:   level_stats(&questions, &answered, CountKey::Level),
      sections: steps,
    },
  })
}

/// Progress and per-section `Yes`-only compliance at the response's current
/// tier.
pub async fn get_level_compliance<S: SurveyStore>(
  store: &S,
  response: &SurveyResponse,
) -> Result<LevelCompliance, S::Error> {
  let level = response.level;
  let sections = store.sections_for_survey(response.survey_id).await?;

  let questions = store
    .tally_questions(response.survey_id, &section_question_columns(&sections, level))
    .await?;
  let answered = store
    .tally_answers(
      response.response_id,
      &section_answer_columns(&sections, level, Some(AnswerValue::Yes)),
    )
    .await?;

  let total = questions.get(CountKey::Total);
  Ok(LevelCompliance {
    progress:   get_progress_info(answered.get(CountKey::Total), total),
    compliance: SectionCompliance {
      info:     get_progress_info(answered.get(CountKey::Compliance), total),
      sections: section_steps(sections, &questions, &answered),
    },
  })
}

/// Tally a response's answers by value in one round trip.
pub async fn answer_results<S: SurveyStore>(
  store: &S,
  response_id: Uuid,
) -> Result<AnswerResults, S::Error> {
  let columns: Vec<TallyColumn> = std::iter::once(TallyColumn::new(CountKey::Total, CountFilter::all()))
    .chain(
      AnswerValue::iter()
        .map(|value| TallyColumn::new(CountKey::Value(value), CountFilter::all().value(value))),
    )
    .collect();
  let tally = store.tally_answers(response_id, &columns).await?;

  Ok(AnswerResults {
    total:          tally.get(CountKey::Total),
    yes:            tally.get(CountKey::Value(AnswerValue::Yes)),
    in_progress:    tally.get(CountKey::Value(AnswerValue::InProgress)),
    no:             tally.get(CountKey::Value(AnswerValue::No)),
    not_applicable: tally.get(CountKey::Value(AnswerValue::NotApplicable)),
  })
}
