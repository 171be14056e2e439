//! Report shapes handed to presentation layers.
//!
//! Nothing here recomputes a statistic: the adapter only picks entries out of
//! aggregator output, joins catalog rows onto it by section id, and wraps
//! entities in explicit projection types instead of decorating them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Level,
  aggregate::{
    Compliance, ComplianceMatrix, LevelCompliance, LevelProgress, SectionProgress,
    get_compliance, get_level_compliance,
  },
  catalog::{Question, Survey},
  progress::{ProgressInfo, get_progress_info},
  response::{Answer, SurveyResponse},
  store::{ResponseTotals, SurveyStore},
};

// ─── Compliance report ───────────────────────────────────────────────────────

/// The compliance report: the full tier matrix plus the entry for the
/// response's own target tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceReport {
  pub target_level_progress: LevelProgress,
  pub progress:              ProgressInfo,
  pub compliance:            ComplianceMatrix,
}

impl ComplianceReport {
  pub fn from_compliance(stats: Compliance, target: Level) -> Self {
    let target_level_progress = stats
      .compliance
      .levels
      .get(&target)
      .cloned()
      .unwrap_or_else(|| LevelProgress {
        level: target,
        info:  get_progress_info(0, 0).with_label(target.label()),
      });
    Self { target_level_progress, progress: stats.progress, compliance: stats.compliance }
  }
}

pub async fn compliance_report<S: SurveyStore>(
  store: &S,
  response: &SurveyResponse,
) -> Result<ComplianceReport, S::Error> {
  let stats = get_compliance(store, response).await?;
  Ok(ComplianceReport::from_compliance(stats, response.level))
}

// ─── Full report ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportQuestion {
  pub code:     String,
  pub question: Question,
  pub answer:   Option<Answer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
  #[serde(flatten)]
  pub step:      SectionProgress,
  pub questions: Vec<ReportQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportCompliance {
  #[serde(flatten)]
  pub info:     ProgressInfo,
  pub sections: Vec<ReportSection>,
}

/// Level compliance with every in-scope question and its answer merged onto
/// the section it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullReport {
  pub progress:   ProgressInfo,
  pub compliance: ReportCompliance,
}

impl FullReport {
  /// Merge `questions` onto the per-section steps of `stats`, joining on
  /// section id. Section order follows `stats`; question order follows
  /// `questions`.
  pub fn build(stats: LevelCompliance, questions: Vec<Question>, answers: Vec<Answer>) -> Self {
    let mut answers = answers_by_question(answers);
    let mut sections: Vec<ReportSection> = stats
      .compliance
      .sections
      .into_iter()
      .map(|step| ReportSection { step, questions: Vec::new() })
      .collect();
    let index: HashMap<Uuid, usize> = sections
      .iter()
      .enumerate()
      .map(|(i, s)| (s.step.section.section_id, i))
      .collect();

    for question in questions {
      if let Some(&i) = index.get(&question.section.section_id) {
        let answer = answers.remove(&question.question_id);
        sections[i].questions.push(ReportQuestion { code: question.code(), question, answer });
      }
    }

    Self {
      progress:   stats.progress,
      compliance: ReportCompliance { info: stats.compliance.info, sections },
    }
  }
}

pub async fn full_report<S: SurveyStore>(
  store: &S,
  response: &SurveyResponse,
) -> Result<FullReport, S::Error> {
  let stats = get_level_compliance(store, response).await?;
  let questions = store.questions_for_level(response.survey_id, response.level).await?;
  let answers = store
    .answers_for_response(response.response_id, Some(response.level))
    .await?;
  Ok(FullReport::build(stats, questions, answers))
}

/// Index answers by the question they answer.
pub fn answers_by_question(answers: Vec<Answer>) -> HashMap<Uuid, Answer> {
  answers.into_iter().map(|a| (a.question_id, a)).collect()
}

// ─── Surveys with latest response progress ───────────────────────────────────

/// An invitation from a grantor organisation to complete a survey. Invitations
/// are owned by the caller; this crate only groups them per survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
  pub invitation_id: Uuid,
  pub grantor_id:    Uuid,
  pub grantee_id:    Option<Uuid>,
  pub survey_id:     Uuid,
  pub level:         Level,
  pub accepted:      bool,
}

/// Which report a response summary links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
  Progress,
  Compliance,
}

impl ReportKind {
  /// Completed responses summarise as compliance, everything else as progress.
  pub fn for_progress(progress: &ProgressInfo) -> Self {
    if progress.is_complete { Self::Compliance } else { Self::Progress }
  }

  pub fn path(self, response_id: Uuid) -> String {
    match self {
      Self::Progress => format!("/responses/{response_id}/progress"),
      Self::Compliance => format!("/responses/{response_id}/compliance"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseWithProgress {
  pub response:        SurveyResponse,
  pub questions_total: u32,
  pub answers_total:   u32,
  pub progress:        ProgressInfo,
  pub summary:         ReportKind,
  pub summary_url:     String,
}

impl From<ResponseTotals> for ResponseWithProgress {
  fn from(totals: ResponseTotals) -> Self {
    let progress = get_progress_info(totals.answers_total, totals.questions_total);
    let summary = ReportKind::for_progress(&progress);
    let summary_url = summary.path(totals.response.response_id);
    Self {
      response: totals.response,
      questions_total: totals.questions_total,
      answers_total: totals.answers_total,
      progress,
      summary,
      summary_url,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveyWithProgress {
  pub survey:          Survey,
  pub latest_response: Option<ResponseWithProgress>,
  pub invites:         Vec<Invitation>,
}

/// Join surveys with the organisation's latest response (by `modified_at`)
/// for each, and group `invitations` by survey.
///
/// `totals` must be in ascending `modified_at` order; the last entry for a
/// survey wins.
pub fn join_latest_progress(
  surveys: Vec<Survey>,
  totals: Vec<ResponseTotals>,
  invitations: Vec<Invitation>,
) -> Vec<SurveyWithProgress> {
  let mut latest: HashMap<Uuid, ResponseTotals> = HashMap::new();
  for entry in totals {
    latest.insert(entry.response.survey_id, entry);
  }
  let mut invites: HashMap<Uuid, Vec<Invitation>> = HashMap::new();
  for invite in invitations {
    invites.entry(invite.survey_id).or_default().push(invite);
  }

  surveys
    .into_iter()
    .map(|survey| SurveyWithProgress {
      latest_response: latest.remove(&survey.survey_id).map(ResponseWithProgress::from),
      invites: invites.remove(&survey.survey_id).unwrap_or_default(),
      survey,
    })
    .collect()
}

/// Available surveys annotated with the organisation's latest response
/// progress. Two store round trips.
pub async fn surveys_with_latest_progress<S: SurveyStore>(
  store: &S,
  organisation_id: Uuid,
  invitations: Vec<Invitation>,
) -> Result<Vec<SurveyWithProgress>, S::Error> {
  let surveys = store.available_surveys().await?;
  let totals = store.response_totals(organisation_id).await?;
  Ok(join_latest_progress(surveys, totals, invitations))
}
