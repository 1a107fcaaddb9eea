use rusqlite::{Connection, OptionalExtension};

use redress_types::models::ComplaintType;

use crate::models::{DepartmentRow, UserRow};
use crate::{Database, DbError, DbResult, time};

const DEPARTMENT_SELECT: &str =
    "SELECT id, name, description, is_active, created_at, updated_at FROM departments";

impl Database {
    pub fn create_department(&self, name: &str, description: Option<&str>) -> DbResult<DepartmentRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if department_name_exists(&tx, name)? {
                return Err(DbError::Conflict(format!(
                    "Department name already exists: {name}"
                )));
            }

            let now = time::now();
            tx.execute(
                "INSERT INTO departments (name, description, is_active, created_at, updated_at) \
                 VALUES (?1, ?2, 1, ?3, ?3)",
                rusqlite::params![name, description, now],
            )?;

            let id = tx.last_insert_rowid();
            let row = require_department(&tx, id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn update_department(
        &self,
        id: i64,
        name: &str,
        description: Option<&str>,
    ) -> DbResult<DepartmentRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let existing = require_department(&tx, id)?;

            if existing.name != name && department_name_exists(&tx, name)? {
                return Err(DbError::Conflict(format!(
                    "Department name already exists: {name}"
                )));
            }

            tx.execute(
                "UPDATE departments SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
                rusqlite::params![name, description, time::now(), id],
            )?;

            let row = require_department(&tx, id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_department(&self, id: i64) -> DbResult<Option<DepartmentRow>> {
        self.with_conn(|conn| query_department(conn, id))
    }

    pub fn get_department_by_name(&self, name: &str) -> DbResult<Option<DepartmentRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{DEPARTMENT_SELECT} WHERE name = ?1"),
                    [name],
                    map_department_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_departments(&self) -> DbResult<Vec<DepartmentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{DEPARTMENT_SELECT} ORDER BY id"))?;
            let rows = stmt
                .query_map([], map_department_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn active_departments(&self) -> DbResult<Vec<DepartmentRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("{DEPARTMENT_SELECT} WHERE is_active = 1 ORDER BY id"))?;
            let rows = stmt
                .query_map([], map_department_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn set_department_active(&self, id: i64, active: bool) -> DbResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE departments SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![active, time::now(), id],
            )?;
            if changed == 0 {
                return Err(DbError::not_found("Department", id));
            }
            Ok(())
        })
    }

    pub fn delete_department(&self, id: i64) -> DbResult<()> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM departments WHERE id = ?1", [id])?;
            if deleted == 0 {
                return Err(DbError::not_found("Department", id));
            }
            Ok(())
        })
    }

    /// Active users attached to a department.
    pub fn staff_in_department(&self, department_id: i64) -> DbResult<Vec<UserRow>> {
        self.users_by_department(department_id).map(|users| {
            users.into_iter().filter(|u| u.is_active).collect()
        })
    }

    /// The auto-assignment rule: first active department (lowest id) that has
    /// any historical complaint of the given type. None when no department
    /// qualifies.
    pub fn department_for_complaint_type(
        &self,
        complaint_type: ComplaintType,
    ) -> DbResult<Option<DepartmentRow>> {
        self.with_conn(|conn| query_department_for_type(conn, complaint_type))
    }
}

pub(crate) fn query_department(conn: &Connection, id: i64) -> DbResult<Option<DepartmentRow>> {
    let row = conn
        .query_row(
            &format!("{DEPARTMENT_SELECT} WHERE id = ?1"),
            [id],
            map_department_row,
        )
        .optional()?;
    Ok(row)
}

pub(crate) fn require_department(conn: &Connection, id: i64) -> DbResult<DepartmentRow> {
    query_department(conn, id)?.ok_or_else(|| DbError::not_found("Department", id))
}

pub(crate) fn department_name_exists(conn: &Connection, name: &str) -> DbResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM departments WHERE name = ?1)",
        [name],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub(crate) fn query_department_for_type(
    conn: &Connection,
    complaint_type: ComplaintType,
) -> DbResult<Option<DepartmentRow>> {
    let row = conn
        .query_row(
            &format!(
                "{DEPARTMENT_SELECT} WHERE is_active = 1 AND id IN \
                 (SELECT target_department_id FROM complaints WHERE type = ?1 \
                  AND target_department_id IS NOT NULL) \
                 ORDER BY id ASC LIMIT 1"
            ),
            [complaint_type.as_str()],
            map_department_row,
        )
        .optional()?;
    Ok(row)
}

fn map_department_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DepartmentRow> {
    Ok(DepartmentRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        is_active: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
