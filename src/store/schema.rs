pub(crate) const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    label       TEXT NOT NULL,
    color       TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS receipts (
    id              TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL,
    merchant        TEXT NOT NULL,
    date            TEXT NOT NULL,
    category        TEXT NOT NULL DEFAULT 'General',
    amount          TEXT NOT NULL,
    score           INTEGER NOT NULL,
    items           TEXT NOT NULL DEFAULT '[]',
    subtotal        TEXT NOT NULL DEFAULT '0',
    tax             TEXT NOT NULL DEFAULT '0',
    discount        TEXT,
    tip             TEXT,
    payment_method  TEXT,
    image_url       TEXT,
    folder_id       TEXT REFERENCES categories(id),
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_categories_user ON categories(user_id);
CREATE INDEX IF NOT EXISTS idx_receipts_user ON receipts(user_id);
CREATE INDEX IF NOT EXISTS idx_receipts_folder ON receipts(folder_id);
"#;

/// Stored in SQLite's `user_version` pragma.
pub(crate) const CURRENT_VERSION: i32 = 1;
