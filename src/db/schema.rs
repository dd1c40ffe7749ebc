//! Table layout for the item store.

/// Bumped whenever the layout changes. Any other stored version is discarded.
pub const SCHEMA_VERSION: i32 = 12;

pub const TABLE_ITEMS: &str = "items";
pub const TABLE_FILES: &str = "files";
pub const TABLE_CLASSIFICATION_ANSWERS: &str = "classification_answers";
pub const TABLE_CLASSIFICATION_CHECKBOXES: &str = "classification_checkboxes";

pub const ALL_TABLES: [&str; 4] = [
  TABLE_ITEMS,
  TABLE_FILES,
  TABLE_CLASSIFICATION_ANSWERS,
  TABLE_CLASSIFICATION_CHECKBOXES,
];

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    _id INTEGER PRIMARY KEY AUTOINCREMENT,
    done INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0,
    subject_id TEXT NOT NULL UNIQUE,
    zooniverse_id TEXT,
    location_standard_uri TEXT,
    location_standard_uri_remote TEXT,
    location_standard_downloaded INTEGER NOT NULL DEFAULT 0,
    location_thumbnail_uri TEXT,
    location_thumbnail_uri_remote TEXT,
    location_thumbnail_downloaded INTEGER NOT NULL DEFAULT 0,
    location_inverted_uri TEXT,
    location_inverted_uri_remote TEXT,
    location_inverted_downloaded INTEGER NOT NULL DEFAULT 0
);

-- _data holds the absolute path of the cached file
CREATE TABLE IF NOT EXISTS files (
    _id INTEGER PRIMARY KEY AUTOINCREMENT,
    _data TEXT
);

-- item_id refers to items._id; rows go away with their item
CREATE TABLE IF NOT EXISTS classification_answers (
    _id INTEGER PRIMARY KEY AUTOINCREMENT,
    sequence INTEGER NOT NULL DEFAULT 0,
    item_id INTEGER NOT NULL,
    question_id TEXT NOT NULL,
    answer_id TEXT
);

CREATE TABLE IF NOT EXISTS classification_checkboxes (
    _id INTEGER PRIMARY KEY AUTOINCREMENT,
    sequence INTEGER NOT NULL DEFAULT 0,
    item_id INTEGER NOT NULL,
    question_id TEXT NOT NULL,
    checkbox_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_items_pending ON items(done, skipped);
CREATE INDEX IF NOT EXISTS idx_answers_item ON classification_answers(item_id, sequence);
CREATE INDEX IF NOT EXISTS idx_checkboxes_item ON classification_checkboxes(item_id, sequence);
"#;
