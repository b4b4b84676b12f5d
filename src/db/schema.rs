//! SQL DDL for initializing the database schema.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema includes:
/// - `users` (wallet address and/or Telegram chat, credits, xp)
/// - `notes` (free-text study material owned by a user)
/// - `quizzes` (JSON question array generated from a note)
/// - `flashcards` (front/back cards generated from a note)
/// - `schedulers` (multi-day quiz series, one `active` row per user)
/// - `roundups` (round-up deposit ledger)
pub const SQLITE_INIT: &str = r#"
-- ---------------------------------------------------------------------------
-- Users (address and chat id are both optional, each unique when present)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY NOT NULL,
    address TEXT NULL UNIQUE, -- lowercase 0x-prefixed hex
    telegram_chat_id INTEGER NULL UNIQUE,
    credits INTEGER NOT NULL DEFAULT 0,
    xp INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL, -- RFC3339
    updated_at TEXT NOT NULL -- RFC3339
);

-- ---------------------------------------------------------------------------
-- Notes
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_notes_user ON notes(user_id);

-- ---------------------------------------------------------------------------
-- Quizzes
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS quizzes (
    id INTEGER PRIMARY KEY NOT NULL,
    public_id TEXT NOT NULL UNIQUE, -- uuid v4, used in deep links
    note_id INTEGER NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
    questions TEXT NOT NULL, -- JSON array
    created_at TEXT NOT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_quizzes_note ON quizzes(note_id);

-- ---------------------------------------------------------------------------
-- Flashcards (spaced-repetition columns are stored, never recomputed)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS flashcards (
    id INTEGER PRIMARY KEY NOT NULL,
    note_id INTEGER NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
    front TEXT NOT NULL,
    back TEXT NOT NULL,
    ease_factor REAL NOT NULL DEFAULT 2.5,
    interval_days INTEGER NOT NULL DEFAULT 0,
    repetitions INTEGER NOT NULL DEFAULT 0,
    due_at TEXT NULL, -- RFC3339
    created_at TEXT NOT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_flashcards_note ON flashcards(note_id);

-- ---------------------------------------------------------------------------
-- Quiz series schedulers
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS schedulers (
    id INTEGER PRIMARY KEY NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    chat_id INTEGER NOT NULL,
    day INTEGER NOT NULL DEFAULT 0,
    total_days INTEGER NOT NULL,
    content TEXT NOT NULL,
    breakdown TEXT NOT NULL, -- JSON array of strings, one per day
    status TEXT NOT NULL DEFAULT 'active', -- active | completed | cancelled
    revision INTEGER NOT NULL DEFAULT 0, -- bumped when the series is replaced or leaves `active`
    next_run_at TEXT NOT NULL, -- RFC3339
    created_at TEXT NOT NULL, -- RFC3339
    updated_at TEXT NOT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_schedulers_status ON schedulers(status);
CREATE INDEX IF NOT EXISTS idx_schedulers_user ON schedulers(user_id);

-- ---------------------------------------------------------------------------
-- Round-up deposits
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS roundups (
    id INTEGER PRIMARY KEY NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    total_cents INTEGER NOT NULL,
    deposit_cents INTEGER NOT NULL,
    created_at TEXT NOT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_roundups_user ON roundups(user_id);
"#;
