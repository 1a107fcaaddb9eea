use rusqlite::Connection;
use tracing::info;

use crate::DbResult;

pub fn run(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS departments (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            description TEXT,
            is_active   INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            username      TEXT NOT NULL UNIQUE,
            email         TEXT NOT NULL UNIQUE,
            password      TEXT NOT NULL,
            first_name    TEXT NOT NULL DEFAULT '',
            last_name     TEXT NOT NULL DEFAULT '',
            role          TEXT NOT NULL,
            is_active     INTEGER NOT NULL DEFAULT 1,
            department_id INTEGER REFERENCES departments(id),
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS complaints (
            id                       INTEGER PRIMARY KEY AUTOINCREMENT,
            title                    TEXT NOT NULL,
            description              TEXT NOT NULL,
            type                     TEXT NOT NULL,
            status                   TEXT NOT NULL DEFAULT 'NEW',
            created_by               INTEGER NOT NULL REFERENCES users(id),
            target_department_id     INTEGER REFERENCES departments(id),
            assigned_to              INTEGER REFERENCES users(id),
            total_votes              INTEGER NOT NULL DEFAULT 0,
            student_confirmation     INTEGER NOT NULL DEFAULT 0,
            resolution_announced_at  TEXT,
            confirmed_by_student_at  TEXT,
            created_at               TEXT NOT NULL,
            updated_at               TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_complaints_status
            ON complaints(status);
        CREATE INDEX IF NOT EXISTS idx_complaints_department
            ON complaints(target_department_id);

        CREATE TABLE IF NOT EXISTS complaint_votes (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            complaint_id INTEGER NOT NULL REFERENCES complaints(id),
            user_id      INTEGER NOT NULL REFERENCES users(id),
            created_at   TEXT NOT NULL,
            UNIQUE(complaint_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS complaint_status_history (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            complaint_id INTEGER NOT NULL REFERENCES complaints(id),
            status       TEXT NOT NULL,
            comment      TEXT NOT NULL,
            changed_by   INTEGER NOT NULL REFERENCES users(id),
            created_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_status_history_complaint
            ON complaint_status_history(complaint_id);

        CREATE TABLE IF NOT EXISTS complaint_comments (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            complaint_id INTEGER NOT NULL REFERENCES complaints(id),
            user_id      INTEGER NOT NULL REFERENCES users(id),
            comment      TEXT NOT NULL,
            is_internal  INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_complaint
            ON complaint_comments(complaint_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
