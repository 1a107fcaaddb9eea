use rusqlite::{Connection, OptionalExtension};

use redress_types::api::UserUpdate;
use redress_types::models::Role;

use crate::models::UserRow;
use crate::{Database, DbError, DbResult, time};

/// Insert payload for a new user. The password is already hashed by the
/// caller; plaintext never reaches this layer.
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub department_id: Option<i64>,
}

const USER_SELECT: &str = "SELECT id, username, email, password, first_name, last_name, \
     role, is_active, department_id, created_at, updated_at FROM users";

impl Database {
    pub fn create_user(&self, new: &NewUser) -> DbResult<UserRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if username_exists(&tx, &new.username)? {
                return Err(DbError::Conflict(format!(
                    "Username already exists: {}",
                    new.username
                )));
            }
            if email_exists(&tx, &new.email)? {
                return Err(DbError::Conflict(format!(
                    "Email already exists: {}",
                    new.email
                )));
            }

            let now = time::now();
            tx.execute(
                "INSERT INTO users (username, email, password, first_name, last_name, role, \
                 is_active, department_id, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?8)",
                rusqlite::params![
                    new.username,
                    new.email,
                    new.password_hash,
                    new.first_name,
                    new.last_name,
                    new.role.as_str(),
                    new.department_id,
                    now,
                ],
            )?;

            let id = tx.last_insert_rowid();
            let row = require_user(&tx, id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_user(&self, id: i64) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    pub fn get_user_by_username(&self, username: &str) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{USER_SELECT} WHERE username = ?1"),
                    [username],
                    map_user_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{USER_SELECT} WHERE email = ?1"),
                    [email],
                    map_user_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_users(&self) -> DbResult<Vec<UserRow>> {
        self.with_conn(|conn| query_users(conn, &format!("{USER_SELECT} ORDER BY id"), &[]))
    }

    pub fn users_by_role(&self, role: Role) -> DbResult<Vec<UserRow>> {
        self.with_conn(|conn| {
            query_users(
                conn,
                &format!("{USER_SELECT} WHERE role = ?1 ORDER BY id"),
                &[&role.as_str()],
            )
        })
    }

    pub fn active_users_by_role(&self, role: Role) -> DbResult<Vec<UserRow>> {
        self.with_conn(|conn| {
            query_users(
                conn,
                &format!("{USER_SELECT} WHERE role = ?1 AND is_active = 1 ORDER BY id"),
                &[&role.as_str()],
            )
        })
    }

    pub fn users_by_department(&self, department_id: i64) -> DbResult<Vec<UserRow>> {
        self.with_conn(|conn| {
            query_users(
                conn,
                &format!("{USER_SELECT} WHERE department_id = ?1 ORDER BY id"),
                &[&department_id],
            )
        })
    }

    /// Typed partial update. Each present field is validated independently;
    /// uniqueness is only re-checked when the value actually changes.
    pub fn update_user(&self, id: i64, update: &UserUpdate) -> DbResult<UserRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let existing = require_user(&tx, id)?;
            let now = time::now();

            if let Some(username) = &update.username {
                if *username != existing.username && username_exists(&tx, username)? {
                    return Err(DbError::Conflict(format!(
                        "Username already exists: {username}"
                    )));
                }
                tx.execute(
                    "UPDATE users SET username = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![username, now, id],
                )?;
            }

            if let Some(email) = &update.email {
                if *email != existing.email && email_exists(&tx, email)? {
                    return Err(DbError::Conflict(format!("Email already exists: {email}")));
                }
                tx.execute(
                    "UPDATE users SET email = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![email, now, id],
                )?;
            }

            if let Some(full_name) = &update.full_name {
                let (first, last) = split_full_name(full_name);
                tx.execute(
                    "UPDATE users SET first_name = ?1, last_name = ?2, updated_at = ?3 \
                     WHERE id = ?4",
                    rusqlite::params![first, last, now, id],
                )?;
            }

            if let Some(role) = update.role {
                tx.execute(
                    "UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![role.as_str(), now, id],
                )?;
            }

            if let Some(department_id) = update.department_id {
                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM departments WHERE id = ?1)",
                    [department_id],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(DbError::not_found("Department", department_id));
                }
                tx.execute(
                    "UPDATE users SET department_id = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![department_id, now, id],
                )?;
            }

            let row = require_user(&tx, id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn set_user_active(&self, id: i64, active: bool) -> DbResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![active, time::now(), id],
            )?;
            if changed == 0 {
                return Err(DbError::not_found("User", id));
            }
            Ok(())
        })
    }

    pub fn change_password(&self, id: i64, new_hash: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![new_hash, time::now(), id],
            )?;
            if changed == 0 {
                return Err(DbError::not_found("User", id));
            }
            Ok(())
        })
    }

    pub fn delete_user(&self, id: i64) -> DbResult<()> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            if deleted == 0 {
                return Err(DbError::not_found("User", id));
            }
            Ok(())
        })
    }
}

/// "Jane Q Public" -> ("Jane", "Q Public"); a single token leaves the last
/// name empty.
pub fn split_full_name(full_name: &str) -> (String, String) {
    match full_name.trim().split_once(' ') {
        Some((first, last)) => (first.to_string(), last.trim().to_string()),
        None => (full_name.trim().to_string(), String::new()),
    }
}

pub(crate) fn query_user(conn: &Connection, id: i64) -> DbResult<Option<UserRow>> {
    let row = conn
        .query_row(&format!("{USER_SELECT} WHERE id = ?1"), [id], map_user_row)
        .optional()?;
    Ok(row)
}

pub(crate) fn require_user(conn: &Connection, id: i64) -> DbResult<UserRow> {
    query_user(conn, id)?.ok_or_else(|| DbError::not_found("User", id))
}

pub(crate) fn username_exists(conn: &Connection, username: &str) -> DbResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        [username],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub(crate) fn email_exists(conn: &Connection, email: &str) -> DbResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        [email],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn query_users(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> DbResult<Vec<UserRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_user_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        role: row.get(6)?,
        is_active: row.get(7)?,
        department_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
