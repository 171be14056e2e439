//! SQL schema for the assessment store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ─── Catalog ────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS areas (
    area_id  TEXT PRIMARY KEY,
    name     TEXT NOT NULL,
    number   INTEGER NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS sections (
    section_id TEXT PRIMARY KEY,
    area_id    TEXT NOT NULL REFERENCES areas(area_id),
    name       TEXT NOT NULL,
    number     INTEGER NOT NULL,
    UNIQUE (area_id, number)
);

CREATE TABLE IF NOT EXISTS surveys (
    survey_id TEXT PRIMARY KEY,
    name      TEXT NOT NULL UNIQUE,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS questions (
    question_id     TEXT PRIMARY KEY,
    survey_id       TEXT NOT NULL REFERENCES surveys(survey_id),
    section_id      TEXT NOT NULL REFERENCES sections(section_id),
    name            TEXT NOT NULL,
    notes           TEXT NOT NULL DEFAULT '',
    level           INTEGER NOT NULL CHECK (level BETWEEN 1 AND 4),
    question_number INTEGER NOT NULL,
    upload_type     TEXT,            -- 'policy' | 'procedure' | 'process' | NULL
    reference       TEXT,
    UNIQUE (survey_id, section_id, level, question_number)
);

CREATE TABLE IF NOT EXISTS question_options (
    option_id   TEXT PRIMARY KEY,
    question_id TEXT NOT NULL REFERENCES questions(question_id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    sort_order  INTEGER NOT NULL,
    UNIQUE (question_id, name)
);

-- ─── Organisations and documents ────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS organisations (
    organisation_id TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    document_id     TEXT PRIMARY KEY,
    organisation_id TEXT NOT NULL REFERENCES organisations(organisation_id),
    name            TEXT NOT NULL,
    expiry          TEXT,            -- YYYY-MM-DD or NULL
    created_at      TEXT NOT NULL
);

-- ─── Responses and answers ──────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS responses (
    response_id     TEXT PRIMARY KEY,
    organisation_id TEXT NOT NULL REFERENCES organisations(organisation_id),
    survey_id       TEXT NOT NULL REFERENCES surveys(survey_id),
    level           INTEGER NOT NULL DEFAULT 1 CHECK (level BETWEEN 1 AND 4),
    created_at      TEXT NOT NULL,
    modified_at     TEXT NOT NULL,
    submitted_at    TEXT             -- NULL while a draft; set once
);

CREATE TABLE IF NOT EXISTS answers (
    answer_id   TEXT PRIMARY KEY,
    response_id TEXT NOT NULL REFERENCES responses(response_id) ON DELETE CASCADE,
    question_id TEXT NOT NULL REFERENCES questions(question_id),
    value       TEXT NOT NULL,       -- 'yes' | 'in-progress' | 'no' | 'not-applicable'
    explanation TEXT NOT NULL DEFAULT '',
    due_date    TEXT,
    UNIQUE (response_id, question_id)
);

CREATE TABLE IF NOT EXISTS answer_options (
    answer_id TEXT NOT NULL REFERENCES answers(answer_id) ON DELETE CASCADE,
    option_id TEXT NOT NULL REFERENCES question_options(option_id),
    PRIMARY KEY (answer_id, option_id)
);

CREATE TABLE IF NOT EXISTS answer_documents (
    answer_document_id TEXT PRIMARY KEY,
    answer_id          TEXT NOT NULL REFERENCES answers(answer_id) ON DELETE CASCADE,
    document_id        TEXT NOT NULL REFERENCES documents(document_id),
    explanation        TEXT NOT NULL DEFAULT '',
    created_at         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS questions_survey_idx   ON questions(survey_id, section_id, level);
CREATE INDEX IF NOT EXISTS responses_org_idx      ON responses(organisation_id, survey_id);
CREATE INDEX IF NOT EXISTS answers_response_idx   ON answers(response_id);
CREATE INDEX IF NOT EXISTS answer_docs_answer_idx ON answer_documents(answer_id);

PRAGMA user_version = 1;
";
