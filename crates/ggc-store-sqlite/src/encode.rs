//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that lexical order matches chronological order. Dates are `YYYY-MM-DD`.
//! UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use ggc_core::{
  Level,
  catalog::{Area, Question, QuestionOption, Section, Survey, UploadType},
  response::{Answer, AnswerDocument, AnswerValue, Document, Organisation, SurveyResponse},
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(date: NaiveDate) -> String { date.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_level(n: i64) -> Result<Level> { Ok(Level::try_from(n)?) }

pub fn decode_value(s: &str) -> Result<AnswerValue> {
  s.parse()
    .map_err(|_| ggc_core::Error::UnknownAnswerValue(s.to_owned()).into())
}

fn decode_upload_type(s: &str) -> Result<UploadType> {
  s.parse().map_err(|_| Error::UnknownUploadType(s.to_owned()))
}

// ─── Column lists ────────────────────────────────────────────────────────────
//
// Each list pairs with a `Raw*::read(row, base)` that reads the same columns
// starting at `base`.

/// `sections s JOIN areas a`.
pub const SECTION_COLUMNS: &str = "s.section_id, s.name, s.number, a.area_id, a.name, a.number";
pub const SECTION_FROM: &str = "sections s JOIN areas a ON a.area_id = s.area_id";

/// `questions q JOIN sections s JOIN areas a`.
pub const QUESTION_COLUMNS: &str = "q.question_id, q.survey_id, q.name, q.notes, q.level, \
                                    q.question_number, q.upload_type, q.reference, \
                                    s.section_id, s.name, s.number, a.area_id, a.name, a.number";
pub const QUESTION_FROM: &str = "questions q \
                                 JOIN sections s ON s.section_id = q.section_id \
                                 JOIN areas a ON a.area_id = s.area_id";

pub const RESPONSE_COLUMNS: &str = "r.response_id, r.organisation_id, r.survey_id, r.level, \
                                    r.created_at, r.modified_at, r.submitted_at";

pub const DOCUMENT_COLUMNS: &str = "d.document_id, d.organisation_id, d.name, d.expiry, d.created_at";

// ─── Catalog rows ────────────────────────────────────────────────────────────

pub struct RawArea {
  pub area_id: String,
  pub name:    String,
  pub number:  i64,
}

impl RawArea {
  pub fn read(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
    Ok(Self { area_id: row.get(base)?, name: row.get(base + 1)?, number: row.get(base + 2)? })
  }

  pub fn into_area(self) -> Result<Area> {
    Ok(Area { area_id: decode_uuid(&self.area_id)?, name: self.name, number: self.number })
  }
}

pub struct RawSection {
  pub section_id: String,
  pub name:       String,
  pub number:     i64,
  pub area:       RawArea,
}

impl RawSection {
  pub fn read(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      section_id: row.get(base)?,
      name:       row.get(base + 1)?,
      number:     row.get(base + 2)?,
      area:       RawArea::read(row, base + 3)?,
    })
  }

  pub fn into_section(self) -> Result<Section> {
    Ok(Section {
      section_id: decode_uuid(&self.section_id)?,
      area:       self.area.into_area()?,
      name:       self.name,
      number:     self.number,
    })
  }
}

pub struct RawSurvey {
  pub survey_id: String,
  pub name:      String,
  pub is_active: bool,
}

impl RawSurvey {
  pub const COLUMNS: &'static str = "v.survey_id, v.name, v.is_active";

  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { survey_id: row.get(0)?, name: row.get(1)?, is_active: row.get(2)? })
  }

  pub fn into_survey(self) -> Result<Survey> {
    Ok(Survey { survey_id: decode_uuid(&self.survey_id)?, name: self.name, is_active: self.is_active })
  }
}

pub struct RawOption {
  pub option_id:   String,
  pub question_id: String,
  pub name:        String,
  pub sort_order:  i64,
}

impl RawOption {
  pub const COLUMNS: &'static str = "o.option_id, o.question_id, o.name, o.sort_order";

  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      option_id:   row.get(0)?,
      question_id: row.get(1)?,
      name:        row.get(2)?,
      sort_order:  row.get(3)?,
    })
  }

  pub fn into_option(self) -> Result<QuestionOption> {
    Ok(QuestionOption {
      option_id:   decode_uuid(&self.option_id)?,
      question_id: decode_uuid(&self.question_id)?,
      name:        self.name,
      sort_order:  self.sort_order,
    })
  }
}

pub struct RawQuestion {
  pub question_id:     String,
  pub survey_id:       String,
  pub name:            String,
  pub notes:           String,
  pub level:           i64,
  pub question_number: i64,
  pub upload_type:     Option<String>,
  pub reference:       Option<String>,
  pub section:         RawSection,
  pub options:         Vec<RawOption>,
}

impl RawQuestion {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      question_id:     row.get(0)?,
      survey_id:       row.get(1)?,
      name:            row.get(2)?,
      notes:           row.get(3)?,
      level:           row.get(4)?,
      question_number: row.get(5)?,
      upload_type:     row.get(6)?,
      reference:       row.get(7)?,
      section:         RawSection::read(row, 8)?,
      options:         Vec::new(),
    })
  }

  pub fn into_question(self) -> Result<Question> {
    Ok(Question {
      question_id:     decode_uuid(&self.question_id)?,
      survey_id:       decode_uuid(&self.survey_id)?,
      section:         self.section.into_section()?,
      name:            self.name,
      notes:           self.notes,
      level:           decode_level(self.level)?,
      question_number: self.question_number,
      upload_type:     self.upload_type.as_deref().map(decode_upload_type).transpose()?,
      reference:       self.reference,
      options:         self
        .options
        .into_iter()
        .map(RawOption::into_option)
        .collect::<Result<_>>()?,
    })
  }
}

// ─── Organisation / document rows ────────────────────────────────────────────

pub struct RawOrganisation {
  pub organisation_id: String,
  pub name:            String,
  pub created_at:      String,
}

impl RawOrganisation {
  pub fn into_organisation(self) -> Result<Organisation> {
    Ok(Organisation {
      organisation_id: decode_uuid(&self.organisation_id)?,
      name:            self.name,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawDocument {
  pub document_id:     String,
  pub organisation_id: String,
  pub name:            String,
  pub expiry:          Option<String>,
  pub created_at:      String,
}

impl RawDocument {
  pub fn read(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      document_id:     row.get(base)?,
      organisation_id: row.get(base + 1)?,
      name:            row.get(base + 2)?,
      expiry:          row.get(base + 3)?,
      created_at:      row.get(base + 4)?,
    })
  }

  pub fn into_document(self) -> Result<Document> {
    Ok(Document {
      document_id:     decode_uuid(&self.document_id)?,
      organisation_id: decode_uuid(&self.organisation_id)?,
      name:            self.name,
      expiry:          self.expiry.as_deref().map(decode_date).transpose()?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

// ─── Response / answer rows ──────────────────────────────────────────────────

pub struct RawResponse {
  pub response_id:     String,
  pub organisation_id: String,
  pub survey_id:       String,
  pub level:           i64,
  pub created_at:      String,
  pub modified_at:     String,
  pub submitted_at:    Option<String>,
}

impl RawResponse {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      response_id:     row.get(0)?,
      organisation_id: row.get(1)?,
      survey_id:       row.get(2)?,
      level:           row.get(3)?,
      created_at:      row.get(4)?,
      modified_at:     row.get(5)?,
      submitted_at:    row.get(6)?,
    })
  }

  pub fn into_response(self) -> Result<SurveyResponse> {
    Ok(SurveyResponse {
      response_id:     decode_uuid(&self.response_id)?,
      organisation_id: decode_uuid(&self.organisation_id)?,
      survey_id:       decode_uuid(&self.survey_id)?,
      level:           decode_level(self.level)?,
      created_at:      decode_dt(&self.created_at)?,
      modified_at:     decode_dt(&self.modified_at)?,
      submitted_at:    self.submitted_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

pub struct RawAnswerDocument {
  pub answer_document_id: String,
  pub answer_id:          String,
  pub explanation:        String,
  pub created_at:         String,
  pub document:           RawDocument,
}

impl RawAnswerDocument {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      answer_document_id: row.get(0)?,
      answer_id:          row.get(1)?,
      explanation:        row.get(2)?,
      created_at:         row.get(3)?,
      document:           RawDocument::read(row, 4)?,
    })
  }

  pub fn into_answer_document(self) -> Result<AnswerDocument> {
    Ok(AnswerDocument {
      answer_document_id: decode_uuid(&self.answer_document_id)?,
      answer_id:          decode_uuid(&self.answer_id)?,
      document:           self.document.into_document()?,
      explanation:        self.explanation,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawAnswer {
  pub answer_id:   String,
  pub response_id: String,
  pub question_id: String,
  pub value:       String,
  pub explanation: String,
  pub due_date:    Option<String>,
  pub option_ids:  Vec<String>,
  pub documents:   Vec<RawAnswerDocument>,
}

impl RawAnswer {
  pub const COLUMNS: &'static str =
    "an.answer_id, an.response_id, an.question_id, an.value, an.explanation, an.due_date";

  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      answer_id:   row.get(0)?,
      response_id: row.get(1)?,
      question_id: row.get(2)?,
      value:       row.get(3)?,
      explanation: row.get(4)?,
      due_date:    row.get(5)?,
      option_ids:  Vec::new(),
      documents:   Vec::new(),
    })
  }

  pub fn into_answer(self) -> Result<Answer> {
    Ok(Answer {
      answer_id:   decode_uuid(&self.answer_id)?,
      response_id: decode_uuid(&self.response_id)?,
      question_id: decode_uuid(&self.question_id)?,
      value:       decode_value(&self.value)?,
      explanation: self.explanation,
      due_date:    self.due_date.as_deref().map(decode_date).transpose()?,
      option_ids:  self
        .option_ids
        .iter()
        .map(|s| decode_uuid(s))
        .collect::<Result<_>>()?,
      documents:   self
        .documents
        .into_iter()
        .map(RawAnswerDocument::into_answer_document)
        .collect::<Result<_>>()?,
    })
  }
}
