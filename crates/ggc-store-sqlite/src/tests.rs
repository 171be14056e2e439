//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use ggc_core::{
  DomainError, Entity, Error as CoreError, IntegrityViolation, Level, ProgressSlug,
  aggregate::{answer_results, get_compliance, get_level_compliance, get_progress},
  catalog::{Area, NewArea, NewQuestion, NewQuestionOption, NewSection, NewSurvey, Question, Section, Survey, UploadType},
  report::{Invitation, ReportKind, full_report, surveys_with_latest_progress},
  response::{AnswerValue, NewAnswer, NewDocument, SurveyResponse},
  store::SurveyStore,
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn domain(err: &Error) -> &CoreError { err.domain().expect("domain error") }

async fn area(s: &SqliteStore, number: i64) -> Area {
  s.add_area(NewArea { name: format!("Area {number}"), number }).await.unwrap()
}

async fn section(s: &SqliteStore, area: &Area, number: i64) -> Section {
  s.add_section(NewSection {
    area_id: area.area_id,
    name: format!("Section {}.{number}", area.number),
    number,
  })
  .await
  .unwrap()
}

async fn survey(s: &SqliteStore, name: &str) -> Survey {
  s.add_survey(NewSurvey { name: name.into(), is_active: true }).await.unwrap()
}

async fn question(
  s: &SqliteStore,
  survey: &Survey,
  section: &Section,
  level: Level,
  number: i64,
) -> Question {
  s.add_question(NewQuestion {
    survey_id:       survey.survey_id,
    section_id:      section.section_id,
    name:            format!("Question {}.{}.{number}", section.code(), level.value()),
    notes:           String::new(),
    level,
    question_number: number,
    upload_type:     None,
    reference:       None,
  })
  .await
  .unwrap()
}

async fn answer(s: &SqliteStore, response: &SurveyResponse, question: &Question, value: AnswerValue) {
  s.upsert_answer(response.response_id, question.question_id, NewAnswer::new(value))
    .await
    .unwrap();
}

// ─── Fixture ─────────────────────────────────────────────────────────────────

/// Area 4 with sections 4.1, 4.2 and 4.3, a response targeting Silver.
///
/// | section | Bronze | Silver | Gold |
/// |---------|--------|--------|------|
/// | 4.1     | 1 yes  |        |      |
/// | 4.2     |        | 3 (no, -, no) |  |
/// | 4.3     |        | 1      | 1 yes |
struct Fixture {
  store:    SqliteStore,
  survey:   Survey,
  sections: Vec<Section>,
  response: SurveyResponse,
}

async fn fixture() -> Fixture {
  let s = store().await;
  let survey = survey(&s, "Safeguarding").await;
  let area = area(&s, 4).await;
  let sections = vec![section(&s, &area, 1).await, section(&s, &area, 2).await, section(&s, &area, 3).await];

  let q1 = question(&s, &survey, &sections[0], Level::Bronze, 1).await;
  let q2 = question(&s, &survey, &sections[1], Level::Silver, 1).await;
  let q3 = question(&s, &survey, &sections[2], Level::Gold, 1).await;
  question(&s, &survey, &sections[1], Level::Silver, 2).await;
  question(&s, &survey, &sections[2], Level::Silver, 2).await;
  let q23 = question(&s, &survey, &sections[1], Level::Silver, 3).await;

  let org = s.add_organisation("Grantee".into()).await.unwrap();
  let response = s.start_response(org.organisation_id, survey.survey_id).await.unwrap();
  let response = s.set_level(response.response_id, Level::Silver).await.unwrap();

  answer(&s, &response, &q1, AnswerValue::Yes).await;
  answer(&s, &response, &q2, AnswerValue::No).await;
  answer(&s, &response, &q23, AnswerValue::No).await;
  answer(&s, &response, &q3, AnswerValue::Yes).await;

  Fixture { store: s, survey, sections, response }
}

// ─── Aggregator ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn progress_of_fixture() {
  let f = fixture().await;

  let before = f.store.round_trips();
  let progress = get_progress(&f.store, &f.response).await.unwrap();
  assert_eq!(f.store.round_trips() - before, 3);

  assert_eq!((progress.info.total, progress.info.count), (5, 3));
  assert_eq!(progress.info.percentage, 60);
  assert_eq!(progress.info.slug, ProgressSlug::InProgress);

  let steps: Vec<(u32, u32, u32, ProgressSlug)> = progress
    .sections
    .iter()
    .map(|s| (s.info.total, s.info.count, s.info.percentage, s.info.slug))
    .collect();
  assert_eq!(steps, vec![
    (1, 1, 100, ProgressSlug::Complete),
    (3, 2, 67, ProgressSlug::InProgress),
    (1, 0, 0, ProgressSlug::NotStarted),
  ]);
  assert_eq!(progress.sections[0].section, f.sections[0]);

  assert_eq!((progress.compliance.total, progress.compliance.count), (5, 1));
  assert_eq!(progress.compliance.percentage, 20);
  assert_eq!(progress.compliance.slug, ProgressSlug::InProgress);
}

#[tokio::test]
async fn compliance_matrix_of_fixture() {
  let f = fixture().await;

  let before = f.store.round_trips();
  let stats = get_compliance(&f.store, &f.response).await.unwrap();
  assert_eq!(f.store.round_trips() - before, 3);

  assert_eq!((stats.progress.total, stats.progress.count), (5, 3));
  assert_eq!(stats.progress.percentage, 60);

  let levels: Vec<(u32, u32, u32, &str)> = stats
    .compliance
    .levels
    .values()
    .map(|l| (l.info.total, l.info.count, l.info.percentage, l.info.label.as_str()))
    .collect();
  assert_eq!(levels, vec![
    (1, 1, 100, "Bronze"),
    (5, 1, 20, "Silver"),
    (6, 2, 33, "Gold"),
    (6, 2, 33, "Platinum"),
  ]);

  let [first, second, third] = &stats.compliance.sections[..] else {
    panic!("expected three sections");
  };
  assert!(first.levels.iter().all(|l| l.info.slug == ProgressSlug::Complete));

  assert_eq!(second.levels[0].info.total, 0);
  assert_eq!(second.levels[0].info.slug, ProgressSlug::NoQuestion);
  assert!(second.levels[0].info.is_complete);
  for level in &second.levels[1..] {
    assert_eq!((level.info.total, level.info.count), (3, 0));
    assert_eq!(level.info.slug, ProgressSlug::NotStarted);
  }

  assert_eq!(third.levels[0].info.slug, ProgressSlug::NoQuestion);
  assert_eq!((third.levels[1].info.total, third.levels[1].info.count), (1, 0));
  for level in &third.levels[2..] {
    assert_eq!((level.info.total, level.info.count, level.info.percentage), (2, 1, 50));
    assert_eq!(level.info.slug, ProgressSlug::InProgress);
  }
}

#[tokio::test]
async fn level_compliance_of_fixture() {
  let f = fixture().await;

  let before = f.store.round_trips();
  let stats = get_level_compliance(&f.store, &f.response).await.unwrap();
  assert_eq!(f.store.round_trips() - before, 3);

  assert_eq!((stats.progress.total, stats.progress.count, stats.progress.percentage), (5, 3, 60));
  assert_eq!(
    (stats.compliance.info.total, stats.compliance.info.count, stats.compliance.info.percentage),
    (5, 1, 20)
  );
  let steps: Vec<(u32, u32, ProgressSlug)> = stats
    .compliance
    .sections
    .iter()
    .map(|s| (s.info.total, s.info.count, s.info.slug))
    .collect();
  assert_eq!(steps, vec![
    (1, 1, ProgressSlug::Complete),
    (3, 0, ProgressSlug::NotStarted),
    (1, 0, ProgressSlug::NotStarted),
  ]);
}

#[tokio::test]
async fn single_question_scenario() {
  let s = store().await;
  let survey = survey(&s, "Finance").await;
  let area = area(&s, 4).await;
  let section = section(&s, &area, 1).await;
  let q = question(&s, &survey, &section, Level::Bronze, 1).await;
  let org = s.add_organisation("Grantee".into()).await.unwrap();
  let response = s.start_response(org.organisation_id, survey.survey_id).await.unwrap();
  assert_eq!(response.level, Level::Bronze);

  let progress = get_progress(&s, &response).await.unwrap();
  assert_eq!((progress.info.total, progress.info.count), (1, 0));
  assert_eq!(progress.info.slug, ProgressSlug::NotStarted);
  assert!(!progress.info.is_complete);
  assert_eq!(progress.compliance.slug, ProgressSlug::NotStarted);

  answer(&s, &response, &q, AnswerValue::Yes).await;
  let progress = get_progress(&s, &response).await.unwrap();
  assert_eq!((progress.info.total, progress.info.count, progress.info.percentage), (1, 1, 100));
  assert!(progress.info.is_complete);
  assert_eq!(progress.compliance.slug, ProgressSlug::Complete);
  assert_eq!(progress.compliance.percentage, 100);
}

#[tokio::test]
async fn empty_survey_is_complete() {
  let s = store().await;
  let survey = survey(&s, "Empty").await;
  let org = s.add_organisation("Grantee".into()).await.unwrap();
  let response = s.start_response(org.organisation_id, survey.survey_id).await.unwrap();

  let progress = get_progress(&s, &response).await.unwrap();
  assert!(progress.sections.is_empty());
  assert_eq!(progress.info.slug, ProgressSlug::NoQuestion);
  assert!(progress.info.is_complete);
}

#[tokio::test]
async fn progress_is_idempotent() {
  let f = fixture().await;
  let first = get_progress(&f.store, &f.response).await.unwrap();
  let second = get_progress(&f.store, &f.response).await.unwrap();
  assert_eq!(first, second);
}

#[tokio::test]
async fn tier_totals_are_monotonic() {
  let f = fixture().await;
  let stats = get_compliance(&f.store, &f.response).await.unwrap();
  let totals: Vec<u32> = stats.compliance.levels.values().map(|l| l.info.total).collect();
  assert!(totals.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn section_counts_sum_to_total() {
  let f = fixture().await;
  for level in Level::all() {
    let response = f.store.set_level(f.response.response_id, level).await.unwrap();
    let progress = get_progress(&f.store, &response).await.unwrap();
    let sum: u32 = progress.sections.iter().map(|s| s.info.count).sum();
    assert_eq!(sum, progress.info.count, "tier {level}");
  }
}

#[tokio::test]
async fn answer_results_in_one_round_trip() {
  let f = fixture().await;
  let before = f.store.round_trips();
  let results = answer_results(&f.store, f.response.response_id).await.unwrap();
  assert_eq!(f.store.round_trips() - before, 1);
  assert_eq!(results.total, 4);
  assert_eq!(results.yes, 2);
  assert_eq!(results.no, 2);
  assert_eq!(results.in_progress, 0);
  assert_eq!(results.not_applicable, 0);
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sections_are_ordered_and_filtered() {
  let s = store().await;
  let governance = survey(&s, "Governance").await;
  let other = survey(&s, "Other").await;
  let (a5, a4) = (area(&s, 5).await, area(&s, 4).await);
  let s51 = section(&s, &a5, 1).await;
  let s42 = section(&s, &a4, 2).await;
  let s41 = section(&s, &a4, 1).await;
  let s43 = section(&s, &a4, 3).await;

  question(&s, &governance, &s51, Level::Bronze, 1).await;
  question(&s, &governance, &s42, Level::Gold, 1).await;
  question(&s, &governance, &s42, Level::Bronze, 1).await;
  question(&s, &governance, &s41, Level::Platinum, 1).await;
  question(&s, &other, &s43, Level::Bronze, 1).await;

  let sections = s.sections_for_survey(governance.survey_id).await.unwrap();
  let codes: Vec<String> = sections.iter().map(Section::code).collect();
  assert_eq!(codes, vec!["4.1", "4.2", "5.1"]);

  assert_eq!(s.next_section(governance.survey_id, None).await.unwrap(), Some(s41.section_id));
  assert_eq!(s.next_section(governance.survey_id, Some(&s41)).await.unwrap(), Some(s42.section_id));
  // 4.3 has no question in this survey.
  assert_eq!(s.next_section(governance.survey_id, Some(&s42)).await.unwrap(), Some(s51.section_id));
  assert_eq!(s.next_section(governance.survey_id, Some(&s43)).await.unwrap(), Some(s51.section_id));
  assert_eq!(s.next_section(governance.survey_id, Some(&s51)).await.unwrap(), None);

  assert_eq!(s.previous_section(governance.survey_id, &s51).await.unwrap(), Some(s42.section_id));
  assert_eq!(s.previous_section(governance.survey_id, &s41).await.unwrap(), None);
}

#[tokio::test]
async fn questions_for_level_are_cumulative() {
  let f = fixture().await;
  let counts: Vec<usize> = {
    let mut counts = Vec::new();
    for level in Level::all() {
      counts.push(f.store.questions_for_level(f.survey.survey_id, level).await.unwrap().len());
    }
    counts
  };
  assert_eq!(counts, vec![1, 5, 6, 6]);

  let questions = f
    .store
    .questions_for_section(f.survey.survey_id, f.sections[2].section_id)
    .await
    .unwrap();
  let codes: Vec<String> = questions.iter().map(Question::code).collect();
  assert_eq!(codes, vec!["4.3.2.2", "4.3.3.1"]);
}

#[tokio::test]
async fn duplicate_catalog_entries_are_rejected() {
  let s = store().await;
  let a = area(&s, 1).await;
  let err = s.add_area(NewArea { name: "Again".into(), number: 1 }).await.unwrap_err();
  assert!(matches!(
    domain(&err),
    CoreError::Integrity(IntegrityViolation::Duplicate { entity: Entity::Area, .. })
  ));

  let sec = section(&s, &a, 1).await;
  let err = s
    .add_section(NewSection { area_id: a.area_id, name: "Again".into(), number: 1 })
    .await
    .unwrap_err();
  assert!(matches!(domain(&err), CoreError::Integrity(IntegrityViolation::Duplicate { .. })));

  let err = s
    .add_section(NewSection { area_id: Uuid::new_v4(), name: "Orphan".into(), number: 1 })
    .await
    .unwrap_err();
  assert!(matches!(domain(&err), CoreError::NotFound { entity: Entity::Area, .. }));

  let sv = survey(&s, "Finance").await;
  question(&s, &sv, &sec, Level::Bronze, 1).await;
  let err = s
    .add_question(NewQuestion {
      survey_id:       sv.survey_id,
      section_id:      sec.section_id,
      name:            "Duplicate".into(),
      notes:           String::new(),
      level:           Level::Bronze,
      question_number: 1,
      upload_type:     None,
      reference:       None,
    })
    .await
    .unwrap_err();
  assert!(matches!(
    domain(&err),
    CoreError::Integrity(IntegrityViolation::Duplicate { entity: Entity::Question, .. })
  ));
}

#[tokio::test]
async fn options_are_ordered() {
  let f = fixture().await;
  let questions = f.store.questions_for_level(f.survey.survey_id, Level::Bronze).await.unwrap();
  let q = &questions[0];

  let third = f
    .store
    .add_option(q.question_id, NewQuestionOption { name: "Annual".into(), sort_order: Some(30) })
    .await
    .unwrap();
  let first = f
    .store
    .add_option(q.question_id, NewQuestionOption { name: "Monthly".into(), sort_order: Some(10) })
    .await
    .unwrap();
  let appended = f
    .store
    .add_option(q.question_id, NewQuestionOption { name: "Never".into(), sort_order: None })
    .await
    .unwrap();
  assert_eq!(appended.sort_order, 31);

  let loaded = f.store.get_question(q.question_id).await.unwrap().unwrap();
  let ids: Vec<Uuid> = loaded.options.iter().map(|o| o.option_id).collect();
  assert_eq!(ids, vec![first.option_id, third.option_id, appended.option_id]);

  let err = f
    .store
    .add_option(q.question_id, NewQuestionOption { name: "Annual".into(), sort_order: None })
    .await
    .unwrap_err();
  assert!(matches!(domain(&err), CoreError::Integrity(IntegrityViolation::Duplicate { .. })));
}

#[tokio::test]
async fn available_surveys_need_questions_and_active_flag() {
  let f = fixture().await;
  survey(&f.store, "Empty").await;
  let inactive = f
    .store
    .add_survey(NewSurvey { name: "Retired".into(), is_active: false })
    .await
    .unwrap();
  question(&f.store, &inactive, &f.sections[0], Level::Bronze, 1).await;

  let available = f.store.available_surveys().await.unwrap();
  assert_eq!(available, vec![f.survey.clone()]);
}

// ─── Responses ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn start_response_reuses_existing() {
  let f = fixture().await;
  let again = f
    .store
    .start_response(f.response.organisation_id, f.survey.survey_id)
    .await
    .unwrap();
  assert_eq!(again.response_id, f.response.response_id);
  assert_eq!(again.level, Level::Silver);

  let listed = f
    .store
    .responses_for_organisation(f.response.organisation_id)
    .await
    .unwrap();
  assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn start_response_requires_active_survey() {
  let s = store().await;
  let org = s.add_organisation("Grantee".into()).await.unwrap();
  let retired = s
    .add_survey(NewSurvey { name: "Retired".into(), is_active: false })
    .await
    .unwrap();
  let err = s.start_response(org.organisation_id, retired.survey_id).await.unwrap_err();
  assert!(matches!(domain(&err), CoreError::NotFound { entity: Entity::Survey, .. }));

  let err = s.start_response(org.organisation_id, Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(domain(&err), CoreError::NotFound { entity: Entity::Survey, .. }));
}

#[tokio::test]
async fn submitted_response_is_immutable() {
  let f = fixture().await;
  let questions = f.store.questions_for_level(f.survey.survey_id, Level::Silver).await.unwrap();
  let existing = f
    .store
    .get_answer(f.response.response_id, questions[0].question_id)
    .await
    .unwrap()
    .unwrap();

  let submitted = f.store.submit_response(f.response.response_id).await.unwrap();
  assert!(submitted.is_submitted());

  let id = f.response.response_id;
  let err = f.store.submit_response(id).await.unwrap_err();
  assert!(matches!(domain(&err), CoreError::AlreadySubmitted(r) if *r == id));

  let err = f.store.set_level(id, Level::Gold).await.unwrap_err();
  assert!(matches!(domain(&err), CoreError::AlreadySubmitted(_)));

  let err = f
    .store
    .upsert_answer(id, questions[1].question_id, NewAnswer::new(AnswerValue::Yes))
    .await
    .unwrap_err();
  assert!(matches!(domain(&err), CoreError::AlreadySubmitted(_)));

  let err = f.store.delete_answer(existing.answer_id).await.unwrap_err();
  assert!(matches!(domain(&err), CoreError::AlreadySubmitted(_)));

  let reloaded = f.store.get_response(id).await.unwrap().unwrap();
  assert_eq!(reloaded.level, Level::Silver);
  assert_eq!(reloaded.submitted_at, submitted.submitted_at);
}

#[tokio::test]
async fn missing_response_is_not_found() {
  let s = store().await;
  let id = Uuid::new_v4();
  assert!(s.get_response(id).await.unwrap().is_none());
  let err = s.set_level(id, Level::Gold).await.unwrap_err();
  assert!(matches!(domain(&err), CoreError::NotFound { entity: Entity::Response, .. }));
}

// ─── Answers ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_keeps_one_answer_per_question() {
  let f = fixture().await;
  let questions = f.store.questions_for_level(f.survey.survey_id, Level::Bronze).await.unwrap();
  let q = &questions[0];
  let option = f
    .store
    .add_option(q.question_id, NewQuestionOption { name: "Board".into(), sort_order: None })
    .await
    .unwrap();

  let before = f.store.get_answer(f.response.response_id, q.question_id).await.unwrap().unwrap();
  let mut input = NewAnswer::new(AnswerValue::InProgress);
  input.explanation = "Drafting".into();
  input.due_date = NaiveDate::from_ymd_opt(2030, 1, 1);
  input.option_ids = vec![option.option_id];
  let after = f
    .store
    .upsert_answer(f.response.response_id, q.question_id, input)
    .await
    .unwrap();

  assert_eq!(after.answer_id, before.answer_id);
  assert_eq!(after.value, AnswerValue::InProgress);
  assert_eq!(after.explanation, "Drafting");
  assert_eq!(after.option_ids, vec![option.option_id]);

  let cleared = f
    .store
    .upsert_answer(f.response.response_id, q.question_id, NewAnswer::new(AnswerValue::Yes))
    .await
    .unwrap();
  assert!(cleared.option_ids.is_empty());
  assert_eq!(cleared.due_date, None);

  let all = f.store.answers_for_response(f.response.response_id, None).await.unwrap();
  assert_eq!(all.len(), 4);
  let in_scope = f
    .store
    .answers_for_response(f.response.response_id, Some(Level::Silver))
    .await
    .unwrap();
  assert_eq!(in_scope.len(), 3);
}

#[tokio::test]
async fn answers_must_stay_inside_the_survey() {
  let f = fixture().await;
  let other = survey(&f.store, "Other").await;
  let foreign = question(&f.store, &other, &f.sections[0], Level::Bronze, 1).await;
  let err = f
    .store
    .upsert_answer(f.response.response_id, foreign.question_id, NewAnswer::new(AnswerValue::Yes))
    .await
    .unwrap_err();
  assert!(matches!(
    domain(&err),
    CoreError::Integrity(IntegrityViolation::ForeignQuestion { .. })
  ));

  let option = f
    .store
    .add_option(foreign.question_id, NewQuestionOption { name: "Elsewhere".into(), sort_order: None })
    .await
    .unwrap();
  let questions = f.store.questions_for_level(f.survey.survey_id, Level::Bronze).await.unwrap();
  let mut input = NewAnswer::new(AnswerValue::Yes);
  input.option_ids = vec![option.option_id];
  let err = f
    .store
    .upsert_answer(f.response.response_id, questions[0].question_id, input)
    .await
    .unwrap_err();
  assert!(matches!(
    domain(&err),
    CoreError::Integrity(IntegrityViolation::ForeignOption { .. })
  ));

  // The rejected write left the stored answer alone.
  let stored = f
    .store
    .get_answer(f.response.response_id, questions[0].question_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored.value, AnswerValue::Yes);
  assert!(stored.option_ids.is_empty());
}

#[tokio::test]
async fn documents_belong_to_the_response_organisation() {
  let f = fixture().await;
  let questions = f.store.questions_for_level(f.survey.survey_id, Level::Bronze).await.unwrap();
  let answer = f
    .store
    .get_answer(f.response.response_id, questions[0].question_id)
    .await
    .unwrap()
    .unwrap();

  let own = f
    .store
    .add_document(f.response.organisation_id, NewDocument {
      name:   "Safeguarding policy".into(),
      expiry: NaiveDate::from_ymd_opt(2031, 6, 30),
    })
    .await
    .unwrap();
  let stranger = f.store.add_organisation("Stranger".into()).await.unwrap();
  let theirs = f
    .store
    .add_document(stranger.organisation_id, NewDocument { name: "Their policy".into(), expiry: None })
    .await
    .unwrap();

  let err = f
    .store
    .attach_document(answer.answer_id, theirs.document_id, String::new())
    .await
    .unwrap_err();
  assert!(matches!(
    domain(&err),
    CoreError::Integrity(IntegrityViolation::DocumentOrganisationMismatch { .. })
  ));

  let attached = f
    .store
    .attach_document(answer.answer_id, own.document_id, "Section 2".into())
    .await
    .unwrap();
  assert_eq!(attached.document.document_id, own.document_id);
  assert_eq!(attached.document.expiry, own.expiry);

  let reloaded = f.store.get_answer_by_id(answer.answer_id).await.unwrap().unwrap();
  assert_eq!(reloaded.documents.len(), 1);
  assert_eq!(reloaded.documents[0].explanation, "Section 2");

  f.store.detach_document(attached.answer_document_id).await.unwrap();
  let reloaded = f.store.get_answer_by_id(answer.answer_id).await.unwrap().unwrap();
  assert!(reloaded.documents.is_empty());

  let err = f.store.detach_document(attached.answer_document_id).await.unwrap_err();
  assert!(matches!(domain(&err), CoreError::NotFound { entity: Entity::AnswerDocument, .. }));
}

#[tokio::test]
async fn delete_answer_keeps_documents() {
  let f = fixture().await;
  let questions = f.store.questions_for_level(f.survey.survey_id, Level::Silver).await.unwrap();
  let (first, second) = (&questions[0], &questions[1]);
  let answer = f
    .store
    .get_answer(f.response.response_id, first.question_id)
    .await
    .unwrap()
    .unwrap();
  let document = f
    .store
    .add_document(f.response.organisation_id, NewDocument { name: "Policy".into(), expiry: None })
    .await
    .unwrap();
  f.store.attach_document(answer.answer_id, document.document_id, String::new()).await.unwrap();

  f.store.delete_answer(answer.answer_id).await.unwrap();
  assert!(f.store.get_answer_by_id(answer.answer_id).await.unwrap().is_none());
  let err = f.store.delete_answer(answer.answer_id).await.unwrap_err();
  assert!(matches!(domain(&err), CoreError::NotFound { entity: Entity::Answer, .. }));

  // The document survives and can be cited again.
  let other = f
    .store
    .get_answer(f.response.response_id, second.question_id)
    .await
    .unwrap()
    .unwrap();
  f.store.attach_document(other.answer_id, document.document_id, String::new()).await.unwrap();

  let progress = get_progress(&f.store, &f.response).await.unwrap();
  assert_eq!(progress.info.count, 2);
}

// ─── Reports ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_report_merges_answers_onto_sections() {
  let f = fixture().await;
  let report = full_report(&f.store, &f.response).await.unwrap();

  let sections = &report.compliance.sections;
  assert_eq!(sections.len(), 3);
  let counts: Vec<usize> = sections.iter().map(|s| s.questions.len()).collect();
  assert_eq!(counts, vec![1, 3, 1]);
  assert_eq!(sections[0].questions[0].answer.as_ref().map(|a| a.value), Some(AnswerValue::Yes));
  assert!(sections[2].questions[0].answer.is_none());
  assert_eq!(report.compliance.info.count, 1);
}

#[tokio::test]
async fn surveys_with_latest_progress_in_two_round_trips() {
  let f = fixture().await;
  let other = survey(&f.store, "Finance").await;
  question(&f.store, &other, &f.sections[0], Level::Bronze, 1).await;

  let invite = Invitation {
    invitation_id: Uuid::new_v4(),
    grantor_id:    Uuid::new_v4(),
    grantee_id:    Some(f.response.organisation_id),
    survey_id:     f.survey.survey_id,
    level:         Level::Silver,
    accepted:      false,
  };

  let before = f.store.round_trips();
  let listed = surveys_with_latest_progress(&f.store, f.response.organisation_id, vec![invite])
    .await
    .unwrap();
  assert_eq!(f.store.round_trips() - before, 2);

  let names: Vec<&str> = listed.iter().map(|s| s.survey.name.as_str()).collect();
  assert_eq!(names, vec!["Finance", "Safeguarding"]);
  assert!(listed[0].latest_response.is_none());

  let latest = listed[1].latest_response.as_ref().unwrap();
  assert_eq!((latest.questions_total, latest.answers_total), (5, 3));
  assert_eq!(latest.progress.percentage, 60);
  assert_eq!(latest.summary, ReportKind::Progress);
  assert_eq!(listed[1].invites.len(), 1);
}

#[tokio::test]
async fn large_surveys_keep_three_round_trips() {
  let s = store().await;
  let survey = survey(&s, "Network").await;
  let area = area(&s, 1).await;
  let org = s.add_organisation("Grantee".into()).await.unwrap();

  let mut questions = Vec::new();
  for number in 1..=600 {
    let section = section(&s, &area, number).await;
    questions.push(question(&s, &survey, &section, Level::Bronze, 1).await);
  }
  let response = s.start_response(org.organisation_id, survey.survey_id).await.unwrap();
  for q in questions.iter().step_by(2) {
    answer(&s, &response, q, AnswerValue::Yes).await;
  }

  let before = s.round_trips();
  let compliance = get_compliance(&s, &response).await.unwrap();
  assert_eq!(s.round_trips() - before, 3);
  let bronze = &compliance.compliance.levels[&Level::Bronze].info;
  assert_eq!((bronze.total, bronze.count), (600, 300));
  assert_eq!(compliance.compliance.sections.len(), 600);
  let first = &compliance.compliance.sections[0].levels;
  assert_eq!((first[0].info.count, first[3].info.total), (1, 1));

  let before = s.round_trips();
  let level = get_level_compliance(&s, &response).await.unwrap();
  assert_eq!(s.round_trips() - before, 3);
  assert_eq!(level.compliance.sections.len(), 600);
  assert_eq!(level.compliance.info.percentage, 50);

  let before = s.round_trips();
  let progress = get_progress(&s, &response).await.unwrap();
  assert_eq!(s.round_trips() - before, 3);
  assert_eq!((progress.info.total, progress.info.count), (600, 300));
}

// ─── Latest response ─────────────────────────────────────────────────────────

/// Insert a second draft response for the fixture's organisation and survey,
/// last modified at `modified_at`.
async fn seed_response(f: &Fixture, modified_at: &str) -> Uuid {
  let id = Uuid::new_v4();
  f.store
    .execute_batch(format!(
      "INSERT INTO responses (response_id, organisation_id, survey_id, level, created_at, modified_at)
       VALUES ('{id}', '{org}', '{survey}', 2, '{modified_at}', '{modified_at}')",
      org = f.response.organisation_id,
      survey = f.survey.survey_id,
    ))
    .await
    .unwrap();
  id
}

async fn latest_listed(f: &Fixture) -> ggc_core::report::ResponseWithProgress {
  let listed = surveys_with_latest_progress(&f.store, f.response.organisation_id, Vec::new())
    .await
    .unwrap();
  listed
    .into_iter()
    .find(|s| s.survey.survey_id == f.survey.survey_id)
    .and_then(|s| s.latest_response)
    .unwrap()
}

#[tokio::test]
async fn most_recently_modified_response_wins() {
  let f = fixture().await;
  let original = f.response.response_id;
  let start = || f.store.start_response(f.response.organisation_id, f.survey.survey_id);

  // An older sibling does not displace the fixture response.
  let older = seed_response(&f, "2001-01-01T00:00:00.000000Z").await;
  assert_eq!(start().await.unwrap().response_id, original);
  assert_eq!(latest_listed(&f).await.response.response_id, original);

  // Age the fixture response below a newer sibling.
  f.store
    .execute_batch(format!(
      "UPDATE responses SET modified_at = '2010-01-01T00:00:00.000000Z' WHERE response_id = '{original}'"
    ))
    .await
    .unwrap();
  let newer = seed_response(&f, "2020-01-01T00:00:00.000000Z").await;
  assert_eq!(start().await.unwrap().response_id, newer);
  let latest = latest_listed(&f).await;
  assert_eq!(latest.response.response_id, newer);
  assert_eq!((latest.questions_total, latest.answers_total), (5, 0));

  // Writing an answer to the older response makes it the latest again.
  let bronze = &f.store.questions_for_level(f.survey.survey_id, Level::Bronze).await.unwrap()[0];
  answer(&f.store, &f.response, bronze, AnswerValue::No).await;
  assert_eq!(start().await.unwrap().response_id, original);
  let latest = latest_listed(&f).await;
  assert_eq!(latest.response.response_id, original);
  assert_eq!(latest.answers_total, 3);

  let all = f.store.responses_for_organisation(f.response.organisation_id).await.unwrap();
  assert_eq!(all.len(), 3);
  assert!(all.iter().any(|r| r.response_id == older));
}

#[tokio::test]
async fn corrupt_stored_ids_are_reported() {
  let f = fixture().await;
  let answer_id = Uuid::new_v4();
  let q1 = &f.store.questions_for_level(f.survey.survey_id, Level::Bronze).await.unwrap()[0];
  f.store
    .execute_batch(format!(
      "INSERT INTO responses (response_id, organisation_id, survey_id, level, created_at, modified_at, submitted_at)
       VALUES ('not-a-uuid', '{org}', '{survey}', 1,
               '2020-01-01T00:00:00.000000Z', '2020-01-01T00:00:00.000000Z', '2020-01-02T00:00:00.000000Z');
       INSERT INTO answers (answer_id, response_id, question_id, value)
       VALUES ('{answer_id}', 'not-a-uuid', '{question}', 'yes');",
      org = f.response.organisation_id,
      survey = f.survey.survey_id,
      question = q1.question_id,
    ))
    .await
    .unwrap();

  let err = f.store.delete_answer(answer_id).await.unwrap_err();
  assert!(err.domain().is_none(), "{err}");
  assert!(matches!(err, Error::Database(_)));
}

#[tokio::test]
async fn upload_type_round_trips() {
  let f = fixture().await;
  let q = f
    .store
    .add_question(NewQuestion {
      survey_id:       f.survey.survey_id,
      section_id:      f.sections[0].section_id,
      name:            "Upload the policy".into(),
      notes:           "PDF preferred".into(),
      level:           Level::Platinum,
      question_number: 1,
      upload_type:     Some(UploadType::Policy),
      reference:       Some("https://example.org/guide".into()),
    })
    .await
    .unwrap();
  let loaded = f.store.get_question(q.question_id).await.unwrap().unwrap();
  assert_eq!(loaded, q);
  assert!(loaded.requires_upload());
  assert_eq!(loaded.code(), "4.1.4.1");
}
