//! [`SqliteStore`]: the SQLite implementation of [`SurveyStore`].

use std::{
  collections::HashMap,
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
};

use chrono::Utc;
use ggc_core::{
  Entity, Error as CoreError, IntegrityViolation, Level,
  catalog::{
    Area, NewArea, NewQuestion, NewQuestionOption, NewSection, NewSurvey, Question,
    QuestionOption, Section, Survey,
  },
  response::{
    Answer, AnswerDocument, AnswerValue, Document, NewAnswer, NewDocument, Organisation,
    SurveyResponse,
  },
  store::{ResponseTotals, SurveyStore},
  tally::{CountFilter, Tally, TallyColumn},
};
use rusqlite::{
  Connection, OptionalExtension as _, params, params_from_iter,
  types::{Type, Value},
};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    DOCUMENT_COLUMNS, QUESTION_COLUMNS, QUESTION_FROM, RESPONSE_COLUMNS, RawAnswer,
    RawAnswerDocument, RawArea, RawDocument, RawOption, RawOrganisation, RawQuestion,
    RawResponse, RawSection, RawSurvey, SECTION_COLUMNS, SECTION_FROM, decode_level, decode_uuid,
    decode_value, encode_date, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

/// Outcome of a check made on the database thread: the outer `Result` is the
/// database call, the inner one the domain rule.
type Checked<T> = std::result::Result<T, CoreError>;

const ANSWER_FROM: &str = "answers an \
                           JOIN questions q ON q.question_id = an.question_id \
                           JOIN sections s ON s.section_id = q.section_id \
                           JOIN areas a ON a.area_id = s.area_id";

/// Sections with at least one question in survey `?1`.
const HAS_QUESTION: &str =
  "EXISTS (SELECT 1 FROM questions q WHERE q.section_id = s.section_id AND q.survey_id = ?1)";

// ─── Store ───────────────────────────────────────────────────────────────────

/// An assessment store backed by a single SQLite file.
///
/// Cloning is cheap; clones share the connection and the round-trip counter.
#[derive(Clone)]
pub struct SqliteStore {
  conn:        tokio_rusqlite::Connection,
  round_trips: Arc<AtomicU64>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self::from_connection(conn).await?;
    debug!(path = %path.display(), "opened sqlite store");
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::from_connection(conn).await
  }

  async fn from_connection(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, round_trips: Arc::new(AtomicU64::new(0)) })
  }

  /// Number of database round trips made since the store was opened.
  /// Schema initialisation is not counted.
  pub fn round_trips(&self) -> u64 { self.round_trips.load(Ordering::SeqCst) }

  /// Execute raw SQL outside the round-trip count.
  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: impl Into<String>) -> Result<()> {
    let sql = sql.into();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `function` on the database thread, counting one round trip.
  async fn call<F, R>(&self, function: F) -> Result<R>
  where
    F: FnOnce(&mut Connection) -> tokio_rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let n = self.round_trips.fetch_add(1, Ordering::SeqCst) + 1;
    trace!(round_trip = n, "sqlite call");
    Ok(self.conn.call(function).await?)
  }

  async fn select_questions(&self, filter: &'static str, params: Vec<Value>) -> Result<Vec<Question>> {
    let raws = self
      .call(move |conn| Ok(select_questions(conn, filter, &params)?))
      .await?;
    raws.into_iter().map(RawQuestion::into_question).collect()
  }

  async fn select_answers(&self, filter: &'static str, params: Vec<Value>) -> Result<Vec<Answer>> {
    let raws = self
      .call(move |conn| Ok(select_answers(conn, filter, &params)?))
      .await?;
    raws.into_iter().map(RawAnswer::into_answer).collect()
  }

  async fn adjacent_section(
    &self,
    survey_id: Uuid,
    after: Option<(i64, i64)>,
    before: Option<(i64, i64)>,
  ) -> Result<Option<Uuid>> {
    let (condition, order, key) = match (after, before) {
      (_, Some(key)) => ("(a.number < ?2 OR (a.number = ?2 AND s.number < ?3))", "DESC", Some(key)),
      (Some(key), None) => ("(a.number > ?2 OR (a.number = ?2 AND s.number > ?3))", "ASC", Some(key)),
      (None, None) => ("1", "ASC", None),
    };
    let sql = format!(
      "SELECT s.section_id FROM {SECTION_FROM}
       WHERE {HAS_QUESTION} AND {condition}
       ORDER BY a.number {order}, s.number {order}
       LIMIT 1"
    );
    let mut params = vec![Value::Text(encode_uuid(survey_id))];
    if let Some((area, section)) = key {
      params.extend([Value::Integer(area), Value::Integer(section)]);
    }

    let found: Option<String> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, params_from_iter(&params), |row| row.get(0))
            .optional()?,
        )
      })
      .await?;
    found.as_deref().map(decode_uuid).transpose()
  }

  async fn tally(&self, source: TallySource, owner_id: Uuid, columns: &[TallyColumn]) -> Result<Tally> {
    if columns.is_empty() {
      return Ok(Tally::new());
    }
    let owner = encode_uuid(owner_id);
    let rows: Vec<(String, i64, Option<String>, u32)> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(source.query())?;
        let rows = stmt
          .query_map([&owner], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let groups = rows
      .into_iter()
      .map(|(section, level, value, count)| {
        Ok(TallyGroup {
          section: decode_uuid(&section)?,
          level: decode_level(level)?,
          value: value.as_deref().map(decode_value).transpose()?,
          count,
        })
      })
      .collect::<Result<Vec<_>>>()?;
    Ok(fold_tally(&groups, columns))
  }
}

// ─── Database-thread helpers ─────────────────────────────────────────────────

fn is_unique_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

/// Run an INSERT, turning a uniqueness failure into `violation`.
fn insert_unique(
  conn: &Connection,
  sql: &str,
  params: impl rusqlite::Params,
  violation: impl FnOnce() -> IntegrityViolation,
) -> rusqlite::Result<Checked<()>> {
  match conn.execute(sql, params) {
    Ok(_) => Ok(Ok(())),
    Err(e) if is_unique_violation(&e) => Ok(Err(violation().into())),
    Err(e) => Err(e),
  }
}

/// Parse an id read from `column` on the database thread; a corrupt value is a
/// conversion failure, like any other undecodable column.
fn stored_uuid(s: &str, column: usize) -> rusqlite::Result<Uuid> {
  Uuid::parse_str(s)
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn exists(conn: &Connection, sql: &str, id: &str) -> rusqlite::Result<bool> {
  Ok(conn.query_row(sql, [id], |_| Ok(())).optional()?.is_some())
}

fn touch_response(conn: &Connection, response_id: &str, now: &str) -> rusqlite::Result<()> {
  conn.execute(
    "UPDATE responses SET modified_at = ?1 WHERE response_id = ?2",
    params![now, response_id],
  )?;
  Ok(())
}

fn select_response(conn: &Connection, response_id: &str) -> rusqlite::Result<Option<RawResponse>> {
  conn
    .query_row(
      &format!("SELECT {RESPONSE_COLUMNS} FROM responses r WHERE r.response_id = ?1"),
      [response_id],
      RawResponse::read,
    )
    .optional()
}

/// Load a response that may still be changed.
fn draft_response(conn: &Connection, response_id: Uuid) -> rusqlite::Result<Checked<RawResponse>> {
  Ok(match select_response(conn, &encode_uuid(response_id))? {
    None => Err(CoreError::not_found(Entity::Response, response_id)),
    Some(raw) if raw.submitted_at.is_some() => Err(CoreError::AlreadySubmitted(response_id)),
    Some(raw) => Ok(raw),
  })
}

/// Questions matching `filter` (over `q`), ordered by question code, with
/// their options attached.
fn select_questions(conn: &Connection, filter: &str, params: &[Value]) -> rusqlite::Result<Vec<RawQuestion>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {QUESTION_COLUMNS} FROM {QUESTION_FROM}
     WHERE {filter}
     ORDER BY a.number, s.number, q.level, q.question_number"
  ))?;
  let mut questions = stmt
    .query_map(params_from_iter(params), RawQuestion::read)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM question_options o
     JOIN questions q ON q.question_id = o.question_id
     WHERE {filter}
     ORDER BY o.sort_order, o.name",
    RawOption::COLUMNS
  ))?;
  let options = stmt
    .query_map(params_from_iter(params), RawOption::read)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let index: HashMap<String, usize> = questions
    .iter()
    .enumerate()
    .map(|(i, q)| (q.question_id.clone(), i))
    .collect();
  for option in options {
    if let Some(&i) = index.get(&option.question_id) {
      questions[i].options.push(option);
    }
  }
  Ok(questions)
}

/// Answers matching `filter` (over `an` and `q`), ordered by question code,
/// with selected options and cited documents attached.
fn select_answers(conn: &Connection, filter: &str, params: &[Value]) -> rusqlite::Result<Vec<RawAnswer>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM {ANSWER_FROM}
     WHERE {filter}
     ORDER BY a.number, s.number, q.level, q.question_number",
    RawAnswer::COLUMNS
  ))?;
  let mut answers = stmt
    .query_map(params_from_iter(params), RawAnswer::read)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  let index: HashMap<String, usize> = answers
    .iter()
    .enumerate()
    .map(|(i, a)| (a.answer_id.clone(), i))
    .collect();

  let mut stmt = conn.prepare(&format!(
    "SELECT ao.answer_id, ao.option_id FROM answer_options ao
     JOIN question_options o ON o.option_id = ao.option_id
     JOIN answers an ON an.answer_id = ao.answer_id
     JOIN questions q ON q.question_id = an.question_id
     WHERE {filter}
     ORDER BY o.sort_order, o.name"
  ))?;
  let selected = stmt
    .query_map(params_from_iter(params), |row| {
      Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  for (answer_id, option_id) in selected {
    if let Some(&i) = index.get(&answer_id) {
      answers[i].option_ids.push(option_id);
    }
  }

  let mut stmt = conn.prepare(&format!(
    "SELECT ad.answer_document_id, ad.answer_id, ad.explanation, ad.created_at, {DOCUMENT_COLUMNS}
     FROM answer_documents ad
     JOIN documents d ON d.document_id = ad.document_id
     JOIN answers an ON an.answer_id = ad.answer_id
     JOIN questions q ON q.question_id = an.question_id
     WHERE {filter}
     ORDER BY ad.created_at, ad.rowid"
  ))?;
  let documents = stmt
    .query_map(params_from_iter(params), RawAnswerDocument::read)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  for document in documents {
    if let Some(&i) = index.get(&document.answer_id) {
      answers[i].documents.push(document);
    }
  }

  Ok(answers)
}

// ─── Conditional counts ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TallySource {
  Questions,
  Answers,
}

impl TallySource {
  /// Grouped counts for one survey (`?1`) or one response (`?1`). The row
  /// count is bounded by sections × tiers × values, never by the number of
  /// requested columns.
  fn query(self) -> &'static str {
    match self {
      Self::Questions => {
        "SELECT q.section_id, q.level, NULL, COUNT(*)
           FROM questions q
          WHERE q.survey_id = ?1
          GROUP BY q.section_id, q.level"
      }
      Self::Answers => {
        "SELECT q.section_id, q.level, an.value, COUNT(*)
           FROM answers an JOIN questions q ON q.question_id = an.question_id
          WHERE an.response_id = ?1
          GROUP BY q.section_id, q.level, an.value"
      }
    }
  }
}

/// Questions or answers sharing a section, a tier and (answers only) a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TallyGroup {
  section: Uuid,
  level:   Level,
  value:   Option<AnswerValue>,
  count:   u32,
}

impl TallyGroup {
  /// A value filter never excludes question groups, which carry no value.
  fn matches(&self, filter: &CountFilter) -> bool {
    filter.section.is_none_or(|section| section == self.section)
      && filter.max_level.is_none_or(|level| self.level <= level)
      && match (filter.value, self.value) {
        (Some(wanted), Some(value)) => wanted == value,
        _ => true,
      }
  }
}

/// Sum the groups matching each column's filter.
fn fold_tally(groups: &[TallyGroup], columns: &[TallyColumn]) -> Tally {
  columns
    .iter()
    .map(|column| {
      let count = groups
        .iter()
        .filter(|group| group.matches(&column.filter))
        .map(|group| group.count)
        .sum();
      (column.key, count)
    })
    .collect()
}

// ─── SurveyStore impl ────────────────────────────────────────────────────────

impl SurveyStore for SqliteStore {
  type Error = Error;

  // ── Catalog administration ────────────────────────────────────────────────

  async fn add_area(&self, input: NewArea) -> Result<Area> {
    let area = Area { area_id: Uuid::new_v4(), name: input.name, number: input.number };

    let id_str = encode_uuid(area.area_id);
    let name = area.name.clone();
    let number = area.number;

    self
      .call(move |conn| {
        Ok(insert_unique(
          conn,
          "INSERT INTO areas (area_id, name, number) VALUES (?1, ?2, ?3)",
          params![id_str, name, number],
          || IntegrityViolation::Duplicate { entity: Entity::Area, key: format!("number {number}") },
        )?)
      })
      .await??;

    Ok(area)
  }

  async fn add_section(&self, input: NewSection) -> Result<Section> {
    let section_id = Uuid::new_v4();
    let id_str = encode_uuid(section_id);
    let area_id = input.area_id;
    let area_str = encode_uuid(area_id);
    let name = input.name.clone();
    let number = input.number;

    let area: RawArea = self
      .call(move |conn| {
        let area = conn
          .query_row(
            "SELECT area_id, name, number FROM areas WHERE area_id = ?1",
            [&area_str],
            |row| RawArea::read(row, 0),
          )
          .optional()?;
        let Some(area) = area else {
          return Ok(Err(CoreError::not_found(Entity::Area, area_id)));
        };
        if let Err(e) = insert_unique(
          conn,
          "INSERT INTO sections (section_id, area_id, name, number) VALUES (?1, ?2, ?3, ?4)",
          params![id_str, area_str, name, number],
          || IntegrityViolation::Duplicate {
            entity: Entity::Section,
            key:    format!("number {number} in area {}", area.number),
          },
        )? {
          return Ok(Err(e));
        }
        Ok(Ok(area))
      })
      .await??;

    Ok(Section { section_id, area: area.into_area()?, name: input.name, number: input.number })
  }

  async fn get_section(&self, id: Uuid) -> Result<Option<Section>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawSection> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SECTION_COLUMNS} FROM {SECTION_FROM} WHERE s.section_id = ?1"),
              [&id_str],
              |row| RawSection::read(row, 0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSection::into_section).transpose()
  }

  async fn add_survey(&self, input: NewSurvey) -> Result<Survey> {
    let survey = Survey { survey_id: Uuid::new_v4(), name: input.name, is_active: input.is_active };

    let id_str = encode_uuid(survey.survey_id);
    let name = survey.name.clone();
    let is_active = survey.is_active;

    self
      .call(move |conn| {
        let key = name.clone();
        Ok(insert_unique(
          conn,
          "INSERT INTO surveys (survey_id, name, is_active) VALUES (?1, ?2, ?3)",
          params![id_str, name, is_active],
          || IntegrityViolation::Duplicate { entity: Entity::Survey, key },
        )?)
      })
      .await??;

    Ok(survey)
  }

  async fn get_survey(&self, id: Uuid) -> Result<Option<Survey>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawSurvey> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {} FROM surveys v WHERE v.survey_id = ?1", RawSurvey::COLUMNS),
              [&id_str],
              RawSurvey::read,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSurvey::into_survey).transpose()
  }

  async fn available_surveys(&self) -> Result<Vec<Survey>> {
    let raws: Vec<RawSurvey> = self
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM surveys v
           WHERE v.is_active = 1
             AND EXISTS (SELECT 1 FROM questions q WHERE q.survey_id = v.survey_id)
           ORDER BY v.name",
          RawSurvey::COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawSurvey::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSurvey::into_survey).collect()
  }

  async fn add_question(&self, input: NewQuestion) -> Result<Question> {
    let question_id = Uuid::new_v4();
    let id_str = encode_uuid(question_id);
    let survey_id = input.survey_id;
    let section_id = input.section_id;
    let survey_str = encode_uuid(survey_id);
    let section_str = encode_uuid(section_id);
    let level = i64::from(input.level.value());
    let number = input.question_number;
    let upload_type = input.upload_type.map(|u| u.as_ref().to_owned());

    let raw: RawQuestion = self
      .call(move |conn| {
        if !exists(conn, "SELECT 1 FROM surveys WHERE survey_id = ?1", &survey_str)? {
          return Ok(Err(CoreError::not_found(Entity::Survey, survey_id)));
        }
        if !exists(conn, "SELECT 1 FROM sections WHERE section_id = ?1", &section_str)? {
          return Ok(Err(CoreError::not_found(Entity::Section, section_id)));
        }
        if let Err(e) = insert_unique(
          conn,
          "INSERT INTO questions (
             question_id, survey_id, section_id, name, notes,
             level, question_number, upload_type, reference
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          params![
            id_str,
            survey_str,
            section_str,
            input.name,
            input.notes,
            level,
            number,
            upload_type,
            input.reference,
          ],
          || IntegrityViolation::Duplicate {
            entity: Entity::Question,
            key:    format!("number {number} at level {level}"),
          },
        )? {
          return Ok(Err(e));
        }
        let inserted = select_questions(conn, "q.question_id = ?1", &[Value::Text(id_str)])?;
        Ok(inserted.into_iter().next().ok_or_else(|| CoreError::not_found(Entity::Question, question_id)))
      })
      .await??;

    raw.into_question()
  }

  async fn add_option(&self, question_id: Uuid, input: NewQuestionOption) -> Result<QuestionOption> {
    let option_id = Uuid::new_v4();
    let id_str = encode_uuid(option_id);
    let question_str = encode_uuid(question_id);
    let name = input.name.clone();

    let sort_order: i64 = self
      .call(move |conn| {
        if !exists(conn, "SELECT 1 FROM questions WHERE question_id = ?1", &question_str)? {
          return Ok(Err(CoreError::not_found(Entity::Question, question_id)));
        }
        let sort_order = match input.sort_order {
          Some(n) => n,
          None => conn.query_row(
            "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM question_options WHERE question_id = ?1",
            [&question_str],
            |row| row.get(0),
          )?,
        };
        let key = format!("option {name:?}");
        if let Err(e) = insert_unique(
          conn,
          "INSERT INTO question_options (option_id, question_id, name, sort_order)
           VALUES (?1, ?2, ?3, ?4)",
          params![id_str, question_str, name, sort_order],
          || IntegrityViolation::Duplicate { entity: Entity::QuestionOption, key },
        )? {
          return Ok(Err(e));
        }
        Ok(Ok(sort_order))
      })
      .await??;

    Ok(QuestionOption { option_id, question_id, name: input.name, sort_order })
  }

  async fn get_question(&self, id: Uuid) -> Result<Option<Question>> {
    let questions = self
      .select_questions("q.question_id = ?1", vec![Value::Text(encode_uuid(id))])
      .await?;
    Ok(questions.into_iter().next())
  }

  // ── Catalog queries ───────────────────────────────────────────────────────

  async fn sections_for_survey(&self, survey_id: Uuid) -> Result<Vec<Section>> {
    let survey_str = encode_uuid(survey_id);

    let raws: Vec<RawSection> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SECTION_COLUMNS} FROM {SECTION_FROM}
           WHERE {HAS_QUESTION}
           ORDER BY a.number, s.number"
        ))?;
        let rows = stmt
          .query_map([&survey_str], |row| RawSection::read(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSection::into_section).collect()
  }

  async fn questions_for_level(&self, survey_id: Uuid, level: Level) -> Result<Vec<Question>> {
    self
      .select_questions("q.survey_id = ?1 AND q.level <= ?2", vec![
        Value::Text(encode_uuid(survey_id)),
        Value::Integer(i64::from(level.value())),
      ])
      .await
  }

  async fn questions_for_section(&self, survey_id: Uuid, section_id: Uuid) -> Result<Vec<Question>> {
    self
      .select_questions("q.survey_id = ?1 AND q.section_id = ?2", vec![
        Value::Text(encode_uuid(survey_id)),
        Value::Text(encode_uuid(section_id)),
      ])
      .await
  }

  async fn next_section<'a>(
    &'a self,
    survey_id: Uuid,
    current: Option<&'a Section>,
  ) -> Result<Option<Uuid>> {
    self.adjacent_section(survey_id, current.map(Section::sort_key), None).await
  }

  async fn previous_section<'a>(
    &'a self,
    survey_id: Uuid,
    current: &'a Section,
  ) -> Result<Option<Uuid>> {
    self.adjacent_section(survey_id, None, Some(current.sort_key())).await
  }

  // ── Organisations and documents ───────────────────────────────────────────

  async fn add_organisation(&self, name: String) -> Result<Organisation> {
    let organisation =
      Organisation { organisation_id: Uuid::new_v4(), name, created_at: Utc::now() };

    let id_str = encode_uuid(organisation.organisation_id);
    let name = organisation.name.clone();
    let at_str = encode_dt(organisation.created_at);

    self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO organisations (organisation_id, name, created_at) VALUES (?1, ?2, ?3)",
          params![id_str, name, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(organisation)
  }

  async fn get_organisation(&self, id: Uuid) -> Result<Option<Organisation>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawOrganisation> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT organisation_id, name, created_at FROM organisations WHERE organisation_id = ?1",
              [&id_str],
              |row| {
                Ok(RawOrganisation {
                  organisation_id: row.get(0)?,
                  name:            row.get(1)?,
                  created_at:      row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawOrganisation::into_organisation).transpose()
  }

  async fn add_document(&self, organisation_id: Uuid, input: NewDocument) -> Result<Document> {
    let document = Document {
      document_id: Uuid::new_v4(),
      organisation_id,
      name: input.name,
      expiry: input.expiry,
      created_at: Utc::now(),
    };

    let id_str = encode_uuid(document.document_id);
    let org_str = encode_uuid(organisation_id);
    let name = document.name.clone();
    let expiry = document.expiry.map(encode_date);
    let at_str = encode_dt(document.created_at);

    self
      .call(move |conn| {
        if !exists(conn, "SELECT 1 FROM organisations WHERE organisation_id = ?1", &org_str)? {
          return Ok(Err(CoreError::not_found(Entity::Organisation, organisation_id)));
        }
        conn.execute(
          "INSERT INTO documents (document_id, organisation_id, name, expiry, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![id_str, org_str, name, expiry, at_str],
        )?;
        Ok(Ok(()))
      })
      .await??;

    Ok(document)
  }

  // ── Responses ─────────────────────────────────────────────────────────────

  async fn start_response(&self, organisation_id: Uuid, survey_id: Uuid) -> Result<SurveyResponse> {
    let org_str = encode_uuid(organisation_id);
    let survey_str = encode_uuid(survey_id);
    let new_id = encode_uuid(Uuid::new_v4());
    let now = encode_dt(Utc::now());

    let raw: RawResponse = self
      .call(move |conn| {
        let active: Option<bool> = conn
          .query_row("SELECT is_active FROM surveys WHERE survey_id = ?1", [&survey_str], |row| {
            row.get(0)
          })
          .optional()?;
        if active != Some(true) {
          return Ok(Err(CoreError::not_found(Entity::Survey, survey_id)));
        }
        if !exists(conn, "SELECT 1 FROM organisations WHERE organisation_id = ?1", &org_str)? {
          return Ok(Err(CoreError::not_found(Entity::Organisation, organisation_id)));
        }

        let latest = conn
          .query_row(
            &format!(
              "SELECT {RESPONSE_COLUMNS} FROM responses r
               WHERE r.organisation_id = ?1 AND r.survey_id = ?2
               ORDER BY r.modified_at DESC, r.rowid DESC
               LIMIT 1"
            ),
            [&org_str, &survey_str],
            RawResponse::read,
          )
          .optional()?;
        if let Some(raw) = latest {
          return Ok(Ok(raw));
        }

        let level = i64::from(Level::default().value());
        conn.execute(
          "INSERT INTO responses (response_id, organisation_id, survey_id, level, created_at, modified_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          params![new_id, org_str, survey_str, level, now],
        )?;
        Ok(Ok(RawResponse {
          response_id: new_id,
          organisation_id: org_str,
          survey_id: survey_str,
          level,
          created_at: now.clone(),
          modified_at: now,
          submitted_at: None,
        }))
      })
      .await??;

    raw.into_response()
  }

  async fn get_response(&self, id: Uuid) -> Result<Option<SurveyResponse>> {
    let id_str = encode_uuid(id);
    let raw = self
      .call(move |conn| Ok(select_response(conn, &id_str)?))
      .await?;
    raw.map(RawResponse::into_response).transpose()
  }

  async fn responses_for_organisation(&self, organisation_id: Uuid) -> Result<Vec<SurveyResponse>> {
    let org_str = encode_uuid(organisation_id);

    let raws: Vec<RawResponse> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RESPONSE_COLUMNS} FROM responses r
           WHERE r.organisation_id = ?1
             AND EXISTS (SELECT 1 FROM questions q WHERE q.survey_id = r.survey_id)
           ORDER BY r.created_at, r.rowid"
        ))?;
        let rows = stmt
          .query_map([&org_str], RawResponse::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawResponse::into_response).collect()
  }

  async fn set_level(&self, id: Uuid, level: Level) -> Result<SurveyResponse> {
    let level = i64::from(level.value());
    let now = encode_dt(Utc::now());

    let raw: RawResponse = self
      .call(move |conn| {
        let mut raw = match draft_response(conn, id)? {
          Ok(raw) => raw,
          Err(e) => return Ok(Err(e)),
        };
        conn.execute(
          "UPDATE responses SET level = ?1, modified_at = ?2 WHERE response_id = ?3",
          params![level, now, raw.response_id],
        )?;
        raw.level = level;
        raw.modified_at = now;
        Ok(Ok(raw))
      })
      .await??;

    raw.into_response()
  }

  async fn submit_response(&self, id: Uuid) -> Result<SurveyResponse> {
    let now = encode_dt(Utc::now());

    let raw: RawResponse = self
      .call(move |conn| {
        let mut raw = match draft_response(conn, id)? {
          Ok(raw) => raw,
          Err(e) => return Ok(Err(e)),
        };
        conn.execute(
          "UPDATE responses SET submitted_at = ?1, modified_at = ?1
           WHERE response_id = ?2 AND submitted_at IS NULL",
          params![now, raw.response_id],
        )?;
        raw.submitted_at = Some(now.clone());
        raw.modified_at = now;
        Ok(Ok(raw))
      })
      .await??;

    raw.into_response()
  }

  async fn response_totals(&self, organisation_id: Uuid) -> Result<Vec<ResponseTotals>> {
    let org_str = encode_uuid(organisation_id);

    let raws: Vec<(RawResponse, u32, u32)> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RESPONSE_COLUMNS},
             (SELECT COUNT(*) FROM questions q
               WHERE q.survey_id = r.survey_id AND q.level <= r.level),
             (SELECT COUNT(*) FROM answers an
               JOIN questions q ON q.question_id = an.question_id
               WHERE an.response_id = r.response_id AND q.level <= r.level)
           FROM responses r
           WHERE r.organisation_id = ?1
           ORDER BY r.modified_at, r.rowid"
        ))?;
        let rows = stmt
          .query_map([&org_str], |row| Ok((RawResponse::read(row)?, row.get(7)?, row.get(8)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw, questions_total, answers_total)| {
        Ok(ResponseTotals { response: raw.into_response()?, questions_total, answers_total })
      })
      .collect()
  }

  // ── Answers ───────────────────────────────────────────────────────────────

  async fn get_answer(&self, response_id: Uuid, question_id: Uuid) -> Result<Option<Answer>> {
    let answers = self
      .select_answers("an.response_id = ?1 AND an.question_id = ?2", vec![
        Value::Text(encode_uuid(response_id)),
        Value::Text(encode_uuid(question_id)),
      ])
      .await?;
    Ok(answers.into_iter().next())
  }

  async fn get_answer_by_id(&self, answer_id: Uuid) -> Result<Option<Answer>> {
    let answers = self
      .select_answers("an.answer_id = ?1", vec![Value::Text(encode_uuid(answer_id))])
      .await?;
    Ok(answers.into_iter().next())
  }

  async fn upsert_answer(&self, response_id: Uuid, question_id: Uuid, input: NewAnswer) -> Result<Answer> {
    let question_str = encode_uuid(question_id);
    let new_id = encode_uuid(Uuid::new_v4());
    let value = input.value.as_ref().to_owned();
    let due_date = input.due_date.map(encode_date);
    let now = encode_dt(Utc::now());

    let raw: RawAnswer = self
      .call(move |conn| {
        let tx = conn.transaction()?;

        let response = match draft_response(&tx, response_id)? {
          Ok(raw) => raw,
          Err(e) => return Ok(Err(e)),
        };
        let survey: Option<String> = tx
          .query_row("SELECT survey_id FROM questions WHERE question_id = ?1", [&question_str], |row| {
            row.get(0)
          })
          .optional()?;
        match survey {
          None => return Ok(Err(CoreError::not_found(Entity::Question, question_id))),
          Some(s) if s != response.survey_id => {
            return Ok(Err(
              IntegrityViolation::ForeignQuestion {
                question: question_id,
                survey:   stored_uuid(&response.survey_id, 2)?,
              }
              .into(),
            ));
          }
          Some(_) => {}
        }
        for option_id in &input.option_ids {
          let owner: Option<String> = tx
            .query_row(
              "SELECT question_id FROM question_options WHERE option_id = ?1",
              [encode_uuid(*option_id)],
              |row| row.get(0),
            )
            .optional()?;
          match owner {
            None => return Ok(Err(CoreError::not_found(Entity::QuestionOption, *option_id))),
            Some(q) if q != question_str => {
              return Ok(Err(
                IntegrityViolation::ForeignOption { option: *option_id, question: question_id }.into(),
              ));
            }
            Some(_) => {}
          }
        }

        let existing: Option<String> = tx
          .query_row(
            "SELECT answer_id FROM answers WHERE response_id = ?1 AND question_id = ?2",
            [&response.response_id, &question_str],
            |row| row.get(0),
          )
          .optional()?;
        let answer_id = match existing {
          Some(answer_id) => {
            tx.execute(
              "UPDATE answers SET value = ?1, explanation = ?2, due_date = ?3 WHERE answer_id = ?4",
              params![value, input.explanation, due_date, answer_id],
            )?;
            tx.execute("DELETE FROM answer_options WHERE answer_id = ?1", [&answer_id])?;
            answer_id
          }
          None => {
            if let Err(e) = insert_unique(
              &tx,
              "INSERT INTO answers (answer_id, response_id, question_id, value, explanation, due_date)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
              params![new_id, response.response_id, question_str, value, input.explanation, due_date],
              || IntegrityViolation::DuplicateAnswer { response: response_id, question: question_id },
            )? {
              return Ok(Err(e));
            }
            new_id
          }
        };
        for option_id in &input.option_ids {
          tx.execute(
            "INSERT OR IGNORE INTO answer_options (answer_id, option_id) VALUES (?1, ?2)",
            params![answer_id, encode_uuid(*option_id)],
          )?;
        }
        touch_response(&tx, &response.response_id, &now)?;

        let stored = select_answers(&tx, "an.answer_id = ?1", &[Value::Text(answer_id)])?;
        tx.commit()?;
        Ok(stored.into_iter().next().ok_or_else(|| CoreError::not_found(Entity::Answer, question_id)))
      })
      .await??;

    raw.into_answer()
  }

  async fn delete_answer(&self, answer_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(answer_id);
    let now = encode_dt(Utc::now());

    self
      .call(move |conn| {
        let owner: Option<(String, Option<String>)> = conn
          .query_row(
            "SELECT r.response_id, r.submitted_at FROM answers an
             JOIN responses r ON r.response_id = an.response_id
             WHERE an.answer_id = ?1",
            [&id_str],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;
        let response_id = match owner {
          None => return Ok(Err(CoreError::not_found(Entity::Answer, answer_id))),
          Some((response_id, Some(_))) => {
            let id = stored_uuid(&response_id, 0)?;
            return Ok(Err(CoreError::AlreadySubmitted(id)));
          }
          Some((response_id, None)) => response_id,
        };
        conn.execute("DELETE FROM answers WHERE answer_id = ?1", [&id_str])?;
        touch_response(conn, &response_id, &now)?;
        Ok(Ok(()))
      })
      .await??;

    Ok(())
  }

  async fn answers_for_response(&self, response_id: Uuid, max_level: Option<Level>) -> Result<Vec<Answer>> {
    let response = Value::Text(encode_uuid(response_id));
    match max_level {
      Some(level) => {
        self
          .select_answers("an.response_id = ?1 AND q.level <= ?2", vec![
            response,
            Value::Integer(i64::from(level.value())),
          ])
          .await
      }
      None => self.select_answers("an.response_id = ?1", vec![response]).await,
    }
  }

  async fn attach_document(
    &self,
    answer_id: Uuid,
    document_id: Uuid,
    explanation: String,
  ) -> Result<AnswerDocument> {
    let answer_str = encode_uuid(answer_id);
    let document_str = encode_uuid(document_id);
    let new_id = encode_uuid(Uuid::new_v4());
    let now = encode_dt(Utc::now());

    let raw: RawAnswerDocument = self
      .call(move |conn| {
        let owner: Option<(String, String, Option<String>)> = conn
          .query_row(
            "SELECT r.response_id, r.organisation_id, r.submitted_at FROM answers an
             JOIN responses r ON r.response_id = an.response_id
             WHERE an.answer_id = ?1",
            [&answer_str],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
          )
          .optional()?;
        let Some((response_id, organisation_id, submitted_at)) = owner else {
          return Ok(Err(CoreError::not_found(Entity::Answer, answer_id)));
        };
        if submitted_at.is_some() {
          let id = stored_uuid(&response_id, 0)?;
          return Ok(Err(CoreError::AlreadySubmitted(id)));
        }

        let document = conn
          .query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE d.document_id = ?1"),
            [&document_str],
            |row| RawDocument::read(row, 0),
          )
          .optional()?;
        let Some(document) = document else {
          return Ok(Err(CoreError::not_found(Entity::Document, document_id)));
        };
        if document.organisation_id != organisation_id {
          return Ok(Err(
            IntegrityViolation::DocumentOrganisationMismatch { document: document_id, answer: answer_id }
              .into(),
          ));
        }

        conn.execute(
          "INSERT INTO answer_documents (answer_document_id, answer_id, document_id, explanation, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![new_id, answer_str, document_str, explanation, now],
        )?;
        touch_response(conn, &response_id, &now)?;

        Ok(Ok(RawAnswerDocument {
          answer_document_id: new_id,
          answer_id: answer_str,
          explanation,
          created_at: now,
          document,
        }))
      })
      .await??;

    raw.into_answer_document()
  }

  async fn detach_document(&self, answer_document_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(answer_document_id);
    let now = encode_dt(Utc::now());

    self
      .call(move |conn| {
        let owner: Option<(String, Option<String>)> = conn
          .query_row(
            "SELECT r.response_id, r.submitted_at FROM answer_documents ad
             JOIN answers an ON an.answer_id = ad.answer_id
             JOIN responses r ON r.response_id = an.response_id
             WHERE ad.answer_document_id = ?1",
            [&id_str],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;
        let response_id = match owner {
          None => return Ok(Err(CoreError::not_found(Entity::AnswerDocument, answer_document_id))),
          Some((response_id, Some(_))) => {
            let id = stored_uuid(&response_id, 0)?;
            return Ok(Err(CoreError::AlreadySubmitted(id)));
          }
          Some((response_id, None)) => response_id,
        };
        conn.execute("DELETE FROM answer_documents WHERE answer_document_id = ?1", [&id_str])?;
        touch_response(conn, &response_id, &now)?;
        Ok(Ok(()))
      })
      .await??;

    Ok(())
  }

  // ── Aggregates ────────────────────────────────────────────────────────────

  async fn tally_questions<'a>(&'a self, survey_id: Uuid, columns: &'a [TallyColumn]) -> Result<Tally> {
    self.tally(TallySource::Questions, survey_id, columns).await
  }

  async fn tally_answers<'a>(&'a self, response_id: Uuid, columns: &'a [TallyColumn]) -> Result<Tally> {
    self.tally(TallySource::Answers, response_id, columns).await
  }
}
