//! Database schema and migrations for corkboard.
//!
//! Migrations are applied in order; the schema_version table records
//! which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: accounts
    r#"
CREATE TABLE users (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    password    TEXT NOT NULL,           -- Argon2 hash
    pfp_url     TEXT NOT NULL DEFAULT '',
    settings    TEXT NOT NULL DEFAULT '{}',
    created_at  TEXT NOT NULL
);

CREATE INDEX idx_users_name ON users(name);
"#,
    // v2: boards and their access-control lists
    r#"
CREATE TABLE boards (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL CHECK(length(name) < 4096),
    description TEXT NOT NULL,
    creator_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    color       TEXT NOT NULL,
    created     TEXT NOT NULL,
    edited      TEXT NOT NULL
);

-- v4 rebuilds this table with a users reference on user_id.
CREATE TABLE board_perms (
    board_id    TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
    user_id     TEXT NOT NULL,
    perm_level  TEXT NOT NULL,
    UNIQUE(board_id, user_id)
);

CREATE INDEX idx_board_perms_user ON board_perms(user_id);
CREATE INDEX idx_boards_created ON boards(created);
"#,
    // v3: pins
    r#"
CREATE TABLE pins (
    id               TEXT PRIMARY KEY,
    board_id         TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
    pin_type         INTEGER NOT NULL,
    content          TEXT NOT NULL,
    creator_id       TEXT NOT NULL,
    flags            INTEGER NOT NULL DEFAULT 0,
    attachment_paths TEXT NOT NULL DEFAULT '[]',  -- JSON array
    metadata         TEXT NOT NULL DEFAULT '{}',  -- JSON value
    created          TEXT NOT NULL,
    edited           TEXT NOT NULL
);

CREATE INDEX idx_pins_board ON pins(board_id);
CREATE INDEX idx_pins_created ON pins(created);
"#,
    // v4: case-folded search columns; permission entries reference users
    r#"
ALTER TABLE boards ADD COLUMN name_folded TEXT NOT NULL DEFAULT '';
ALTER TABLE boards ADD COLUMN desc_folded TEXT NOT NULL DEFAULT '';
UPDATE boards SET name_folded = lower(name), desc_folded = lower(description);

ALTER TABLE pins ADD COLUMN content_folded TEXT NOT NULL DEFAULT '';
UPDATE pins SET content_folded = lower(content);

-- The public principal has no usable password: '!' is not a PHC hash.
INSERT OR IGNORE INTO users (id, name, password, pfp_url, settings, created_at)
VALUES ('public', 'Public', '!', '', '{}', strftime('%Y-%m-%dT%H:%M:%fZ', 'now'));

CREATE TABLE board_perms_new (
    board_id    TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
    user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    perm_level  TEXT NOT NULL,
    UNIQUE(board_id, user_id)
);
INSERT INTO board_perms_new (board_id, user_id, perm_level)
    SELECT board_id, user_id, perm_level FROM board_perms
    WHERE user_id IN (SELECT id FROM users);
DROP TABLE board_perms;
ALTER TABLE board_perms_new RENAME TO board_perms;

CREATE INDEX idx_board_perms_user ON board_perms(user_id);
"#,
    // v5: pin history and favorites
    r#"
CREATE TABLE pin_history (
    pin_id           TEXT NOT NULL REFERENCES pins(id) ON DELETE CASCADE,
    history_id       INTEGER NOT NULL,
    pin_type         INTEGER NOT NULL,
    content          TEXT NOT NULL,
    flags            INTEGER NOT NULL,
    attachment_paths TEXT NOT NULL,
    metadata         TEXT NOT NULL,
    edited           TEXT NOT NULL,   -- when this version was written
    replaced_by      TEXT NOT NULL,
    replaced_at      TEXT NOT NULL,
    PRIMARY KEY (pin_id, history_id)
);

CREATE TABLE pin_favorites (
    user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    pin_id      TEXT NOT NULL REFERENCES pins(id) ON DELETE CASCADE,
    created     TEXT NOT NULL,
    PRIMARY KEY (user_id, pin_id)
);

CREATE INDEX idx_pin_favorites_pin ON pin_favorites(pin_id);
"#,
    // v6: per-user board tags
    r#"
CREATE TABLE tags (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    color       TEXT NOT NULL,
    created     TEXT NOT NULL
);

CREATE TABLE tag_boards (
    tag_id      INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    board_id    TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
    PRIMARY KEY (tag_id, board_id)
);

CREATE INDEX idx_tags_owner ON tags(owner_id);
CREATE INDEX idx_tag_boards_board ON tag_boards(board_id);
"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_not_empty() {
        assert!(!MIGRATIONS.is_empty());
    }

    #[test]
    fn test_first_migration_creates_users() {
        assert!(MIGRATIONS[0].contains("CREATE TABLE users"));
    }

    #[test]
    fn test_pins_cascade_from_boards() {
        let pins = MIGRATIONS[2];
        assert!(pins.contains("REFERENCES boards(id) ON DELETE CASCADE"));
    }

    #[test]
    fn test_board_perms_unique_per_user() {
        assert!(MIGRATIONS[1].contains("UNIQUE(board_id, user_id)"));
    }

    #[test]
    fn test_board_perms_rebuilt_with_user_reference() {
        let v4 = MIGRATIONS[3];
        assert!(v4.contains("user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE"));
        assert!(v4.contains("VALUES ('public'"));
    }
}
