//! Complaint lifecycle engine: creation, status changes, assignment,
//! voting, comments, and cascading deletion. Every mutating method runs
//! inside a single transaction so the entity update and its audit row
//! commit together or not at all.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use redress_types::models::{ComplaintStatus, ComplaintType, Role};

use crate::departments::{query_department_for_type, require_department};
use crate::models::{CommentRow, ComplaintRow, StatusHistoryRow};
use crate::users::require_user;
use crate::{Database, DbError, DbResult, time};

#[derive(Debug)]
pub struct NewComplaint {
    pub title: String,
    pub description: String,
    pub complaint_type: ComplaintType,
    pub target_department_id: Option<i64>,
}

const COMPLAINT_SELECT: &str = "SELECT c.id, c.title, c.description, c.type, c.status, \
     c.created_by, u.username, c.target_department_id, d.name, \
     c.assigned_to, a.username, c.total_votes, c.student_confirmation, \
     c.resolution_announced_at, c.confirmed_by_student_at, c.created_at, c.updated_at \
     FROM complaints c \
     JOIN users u ON c.created_by = u.id \
     LEFT JOIN departments d ON c.target_department_id = d.id \
     LEFT JOIN users a ON c.assigned_to = a.id";

impl Database {
    /// Create a complaint. The creator must exist and be active. Status is
    /// forced to NEW; when no target department is supplied the first active
    /// department with a historical complaint of the same type is used, and
    /// the department stays unset when none qualifies.
    pub fn create_complaint(&self, new: &NewComplaint, creator_id: i64) -> DbResult<ComplaintRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let creator = require_user(&tx, creator_id)
                .map_err(|_| DbError::not_found("Creator user", creator_id))?;
            if !creator.is_active {
                return Err(DbError::InvalidState(
                    "Creator user is not active".to_string(),
                ));
            }

            let department_id = match new.target_department_id {
                Some(id) => Some(require_department(&tx, id)?.id),
                None => {
                    query_department_for_type(&tx, new.complaint_type)?.map(|d| d.id)
                }
            };

            let now = time::now();
            tx.execute(
                "INSERT INTO complaints (title, description, type, status, created_by, \
                 target_department_id, total_votes, student_confirmation, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, 'NEW', ?4, ?5, 0, 0, ?6, ?6)",
                rusqlite::params![
                    new.title,
                    new.description,
                    new.complaint_type.as_str(),
                    creator_id,
                    department_id,
                    now,
                ],
            )?;

            let id = tx.last_insert_rowid();
            insert_status_history(
                &tx,
                id,
                ComplaintStatus::New,
                &history_comment(None, ComplaintStatus::New, Some("Initial complaint submission")),
                creator_id,
                &now,
            )?;

            let row = require_complaint(&tx, id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    /// Set a new status. Transitions are deliberately unguarded (any status
    /// may follow any other); side effects key on the target status:
    /// CONFIRMED_BY_STUDENT sets the confirmation flag, RESOLUTION_ANNOUNCED
    /// clears it so the student must confirm each new announcement.
    pub fn change_status(
        &self,
        complaint_id: i64,
        new_status: ComplaintStatus,
        actor_id: i64,
        notes: Option<&str>,
    ) -> DbResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let complaint = require_complaint(&tx, complaint_id)?;
            require_user(&tx, actor_id)?;

            apply_status_change(&tx, &complaint, new_status, actor_id, notes)?;

            tx.commit()?;
            Ok(())
        })
    }

    /// Assign the complaint to a staff member. Assignment from NEW also
    /// advances the status to ASSIGNED with a history entry; on any other
    /// status only the assignee changes.
    pub fn assign_complaint(&self, complaint_id: i64, staff_id: i64, actor_id: i64) -> DbResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let complaint = require_complaint(&tx, complaint_id)?;
            let staff = require_user(&tx, staff_id)
                .map_err(|_| DbError::not_found("Staff user", staff_id))?;
            if staff.role != Role::Staff.as_str() {
                return Err(DbError::InvalidState(
                    "User is not a staff member".to_string(),
                ));
            }
            require_user(&tx, actor_id)?;

            tx.execute(
                "UPDATE complaints SET assigned_to = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![staff_id, time::now(), complaint_id],
            )?;

            if complaint.status == ComplaintStatus::New.as_str() {
                apply_status_change(
                    &tx,
                    &complaint,
                    ComplaintStatus::Assigned,
                    actor_id,
                    Some("Auto-assigned to staff member"),
                )?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Record a vote. Duplicates by the same user are a Conflict; the
    /// UNIQUE(complaint_id, user_id) constraint is the authority, so a lost
    /// check-then-insert race surfaces as the same error.
    pub fn vote(&self, complaint_id: i64, user_id: i64) -> DbResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            require_complaint(&tx, complaint_id)?;
            require_user(&tx, user_id)?;

            if vote_exists(&tx, complaint_id, user_id)? {
                return Err(DbError::Conflict(
                    "User already voted for this complaint".to_string(),
                ));
            }

            match tx.execute(
                "INSERT INTO complaint_votes (complaint_id, user_id, created_at) \
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![complaint_id, user_id, time::now()],
            ) {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    return Err(DbError::Conflict(
                        "User already voted for this complaint".to_string(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }

            tx.execute(
                "UPDATE complaints SET total_votes = total_votes + 1 WHERE id = ?1",
                [complaint_id],
            )?;

            tx.commit()?;
            Ok(())
        })
    }

    /// Remove a vote. A missing vote is a silent no-op; the counter is
    /// clamped at zero.
    pub fn unvote(&self, complaint_id: i64, user_id: i64) -> DbResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            require_complaint(&tx, complaint_id)?;
            require_user(&tx, user_id)?;

            let removed = tx.execute(
                "DELETE FROM complaint_votes WHERE complaint_id = ?1 AND user_id = ?2",
                [complaint_id, user_id],
            )?;
            if removed > 0 {
                tx.execute(
                    "UPDATE complaints SET total_votes = MAX(total_votes - 1, 0) WHERE id = ?1",
                    [complaint_id],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    pub fn add_comment(
        &self,
        complaint_id: i64,
        user_id: i64,
        comment: &str,
        is_internal: bool,
    ) -> DbResult<CommentRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            require_complaint(&tx, complaint_id)?;
            let user = require_user(&tx, user_id)?;

            let now = time::now();
            tx.execute(
                "INSERT INTO complaint_comments (complaint_id, user_id, comment, is_internal, \
                 created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![complaint_id, user_id, comment, is_internal, now],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;

            Ok(CommentRow {
                id,
                complaint_id,
                user_id,
                username: user.username,
                comment: comment.to_string(),
                is_internal,
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    /// Comments for a complaint, oldest first. Internal comments are
    /// filtered out of student-facing reads.
    pub fn comments(&self, complaint_id: i64, include_internal: bool) -> DbResult<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let sql = if include_internal {
                "SELECT cc.id, cc.complaint_id, cc.user_id, u.username, cc.comment, \
                 cc.is_internal, cc.created_at, cc.updated_at \
                 FROM complaint_comments cc JOIN users u ON cc.user_id = u.id \
                 WHERE cc.complaint_id = ?1 ORDER BY cc.id"
            } else {
                "SELECT cc.id, cc.complaint_id, cc.user_id, u.username, cc.comment, \
                 cc.is_internal, cc.created_at, cc.updated_at \
                 FROM complaint_comments cc JOIN users u ON cc.user_id = u.id \
                 WHERE cc.complaint_id = ?1 AND cc.is_internal = 0 ORDER BY cc.id"
            };
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map([complaint_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        complaint_id: row.get(1)?,
                        user_id: row.get(2)?,
                        username: row.get(3)?,
                        comment: row.get(4)?,
                        is_internal: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Append-only audit trail, oldest first.
    pub fn status_history(&self, complaint_id: i64) -> DbResult<Vec<StatusHistoryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT h.id, h.complaint_id, h.status, h.comment, h.changed_by, u.username, \
                 h.created_at \
                 FROM complaint_status_history h JOIN users u ON h.changed_by = u.id \
                 WHERE h.complaint_id = ?1 ORDER BY h.id",
            )?;
            let rows = stmt
                .query_map([complaint_id], |row| {
                    Ok(StatusHistoryRow {
                        id: row.get(0)?,
                        complaint_id: row.get(1)?,
                        status: row.get(2)?,
                        comment: row.get(3)?,
                        changed_by: row.get(4)?,
                        changed_by_username: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Cascade-delete a complaint: comments, then votes, then history, then
    /// the complaint row, all in one transaction.
    pub fn delete_complaint(&self, complaint_id: i64) -> DbResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            require_complaint(&tx, complaint_id)?;

            tx.execute(
                "DELETE FROM complaint_comments WHERE complaint_id = ?1",
                [complaint_id],
            )?;
            tx.execute(
                "DELETE FROM complaint_votes WHERE complaint_id = ?1",
                [complaint_id],
            )?;
            tx.execute(
                "DELETE FROM complaint_status_history WHERE complaint_id = ?1",
                [complaint_id],
            )?;
            tx.execute("DELETE FROM complaints WHERE id = ?1", [complaint_id])?;

            tx.commit()?;
            Ok(())
        })
    }

    // -- Reads --

    pub fn get_complaint(&self, id: i64) -> DbResult<Option<ComplaintRow>> {
        self.with_conn(|conn| query_complaint(conn, id))
    }

    pub fn list_complaints(&self) -> DbResult<Vec<ComplaintRow>> {
        self.with_conn(|conn| {
            query_complaints(conn, &format!("{COMPLAINT_SELECT} ORDER BY c.id"), &[])
        })
    }

    pub fn complaints_by_creator(&self, user_id: i64) -> DbResult<Vec<ComplaintRow>> {
        self.with_conn(|conn| {
            query_complaints(
                conn,
                &format!("{COMPLAINT_SELECT} WHERE c.created_by = ?1 ORDER BY c.id"),
                &[&user_id],
            )
        })
    }

    pub fn complaints_by_type(&self, complaint_type: ComplaintType) -> DbResult<Vec<ComplaintRow>> {
        self.with_conn(|conn| {
            query_complaints(
                conn,
                &format!("{COMPLAINT_SELECT} WHERE c.type = ?1 ORDER BY c.id"),
                &[&complaint_type.as_str()],
            )
        })
    }

    pub fn complaints_by_status(&self, status: ComplaintStatus) -> DbResult<Vec<ComplaintRow>> {
        self.with_conn(|conn| {
            query_complaints(
                conn,
                &format!("{COMPLAINT_SELECT} WHERE c.status = ?1 ORDER BY c.id"),
                &[&status.as_str()],
            )
        })
    }

    pub fn complaints_by_assignee(&self, user_id: i64) -> DbResult<Vec<ComplaintRow>> {
        self.with_conn(|conn| {
            query_complaints(
                conn,
                &format!("{COMPLAINT_SELECT} WHERE c.assigned_to = ?1 ORDER BY c.id"),
                &[&user_id],
            )
        })
    }

    pub fn complaints_by_department(&self, department_id: i64) -> DbResult<Vec<ComplaintRow>> {
        self.with_conn(|conn| {
            query_complaints(
                conn,
                &format!("{COMPLAINT_SELECT} WHERE c.target_department_id = ?1 ORDER BY c.id"),
                &[&department_id],
            )
        })
    }

    pub fn complaints_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<ComplaintRow>> {
        let (start, end) = (start.to_rfc3339(), end.to_rfc3339());
        self.with_conn(|conn| {
            query_complaints(
                conn,
                &format!(
                    "{COMPLAINT_SELECT} WHERE c.created_at >= ?1 AND c.created_at <= ?2 \
                     ORDER BY c.created_at DESC"
                ),
                &[&start, &end],
            )
        })
    }

    /// Complaints with at least one vote, most-voted first, newest breaking
    /// ties. Public prioritization view.
    pub fn top_voted_complaints(&self) -> DbResult<Vec<ComplaintRow>> {
        self.with_conn(|conn| {
            query_complaints(
                conn,
                &format!(
                    "{COMPLAINT_SELECT} WHERE c.total_votes > 0 \
                     ORDER BY c.total_votes DESC, c.created_at DESC"
                ),
                &[],
            )
        })
    }

    /// Announced resolutions the student has not yet confirmed.
    pub fn complaints_requiring_confirmation(&self) -> DbResult<Vec<ComplaintRow>> {
        self.with_conn(|conn| {
            query_complaints(
                conn,
                &format!(
                    "{COMPLAINT_SELECT} WHERE c.status = 'RESOLUTION_ANNOUNCED' \
                     AND c.student_confirmation = 0 ORDER BY c.id"
                ),
                &[],
            )
        })
    }

    /// Authoritative vote count from the vote rows, for invariant checks
    /// against the denormalized counter.
    pub fn vote_count(&self, complaint_id: i64) -> DbResult<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM complaint_votes WHERE complaint_id = ?1",
                [complaint_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

fn apply_status_change(
    conn: &Connection,
    complaint: &ComplaintRow,
    new_status: ComplaintStatus,
    actor_id: i64,
    notes: Option<&str>,
) -> DbResult<()> {
    let now = time::now();
    conn.execute(
        "UPDATE complaints SET status = ?1, updated_at = ?2 WHERE id = ?3",
        rusqlite::params![new_status.as_str(), now, complaint.id],
    )?;

    match new_status {
        ComplaintStatus::ConfirmedByStudent => {
            conn.execute(
                "UPDATE complaints SET student_confirmation = 1, confirmed_by_student_at = ?1 \
                 WHERE id = ?2",
                rusqlite::params![now, complaint.id],
            )?;
        }
        ComplaintStatus::ResolutionAnnounced => {
            // Reset: the student must confirm each new announcement
            conn.execute(
                "UPDATE complaints SET student_confirmation = 0, resolution_announced_at = ?1 \
                 WHERE id = ?2",
                rusqlite::params![now, complaint.id],
            )?;
        }
        _ => {}
    }

    insert_status_history(
        conn,
        complaint.id,
        new_status,
        &history_comment(Some(&complaint.status), new_status, notes),
        actor_id,
        &now,
    )
}

fn insert_status_history(
    conn: &Connection,
    complaint_id: i64,
    status: ComplaintStatus,
    comment: &str,
    changed_by: i64,
    now: &str,
) -> DbResult<()> {
    conn.execute(
        "INSERT INTO complaint_status_history (complaint_id, status, comment, changed_by, \
         created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![complaint_id, status.as_str(), comment, changed_by, now],
    )?;
    Ok(())
}

fn history_comment(old: Option<&str>, new: ComplaintStatus, notes: Option<&str>) -> String {
    let mut comment = format!(
        "Status changed from {} to {}",
        old.unwrap_or("NONE"),
        new.as_str()
    );
    if let Some(notes) = notes.filter(|n| !n.is_empty()) {
        comment.push_str(": ");
        comment.push_str(notes);
    }
    comment
}

fn vote_exists(conn: &Connection, complaint_id: i64, user_id: i64) -> DbResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM complaint_votes WHERE complaint_id = ?1 AND user_id = ?2)",
        [complaint_id, user_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub(crate) fn query_complaint(conn: &Connection, id: i64) -> DbResult<Option<ComplaintRow>> {
    let row = conn
        .query_row(
            &format!("{COMPLAINT_SELECT} WHERE c.id = ?1"),
            [id],
            map_complaint_row,
        )
        .optional()?;
    Ok(row)
}

pub(crate) fn require_complaint(conn: &Connection, id: i64) -> DbResult<ComplaintRow> {
    query_complaint(conn, id)?.ok_or_else(|| DbError::not_found("Complaint", id))
}

fn query_complaints(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> DbResult<Vec<ComplaintRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_complaint_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_complaint_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ComplaintRow> {
    Ok(ComplaintRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        complaint_type: row.get(3)?,
        status: row.get(4)?,
        created_by: row.get(5)?,
        created_by_username: row.get(6)?,
        target_department_id: row.get(7)?,
        target_department_name: row.get(8)?,
        assigned_to: row.get(9)?,
        assigned_to_username: row.get(10)?,
        total_votes: row.get(11)?,
        student_confirmation: row.get(12)?,
        resolution_announced_at: row.get(13)?,
        confirmed_by_student_at: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::NewUser;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed_user(db: &Database, username: &str, role: Role) -> i64 {
        db.create_user(&NewUser {
            username: username.to_string(),
            email: format!("{username}@uni.edu"),
            password_hash: "$argon2id$stub".to_string(),
            first_name: username.to_string(),
            last_name: String::new(),
            role,
            department_id: None,
        })
        .unwrap()
        .id
    }

    fn seed_complaint(db: &Database, creator: i64, dept: Option<i64>) -> i64 {
        db.create_complaint(
            &NewComplaint {
                title: "Broken projector".to_string(),
                description: "Room 204 projector flickers".to_string(),
                complaint_type: ComplaintType::Facility,
                target_department_id: dept,
            },
            creator,
        )
        .unwrap()
        .id
    }

    fn assert_vote_invariant(db: &Database, complaint_id: i64) {
        let row = db.get_complaint(complaint_id).unwrap().unwrap();
        assert_eq!(row.total_votes, db.vote_count(complaint_id).unwrap());
    }

    #[test]
    fn create_forces_initial_state_and_history() {
        let db = test_db();
        let student = seed_user(&db, "stu", Role::Student);
        let dept = db.create_department("Facilities", None).unwrap().id;

        let row = db
            .create_complaint(
                &NewComplaint {
                    title: "Leaky roof".to_string(),
                    description: "Water in the hallway".to_string(),
                    complaint_type: ComplaintType::Facility,
                    target_department_id: Some(dept),
                },
                student,
            )
            .unwrap();

        assert_eq!(row.status, "NEW");
        assert_eq!(row.total_votes, 0);
        assert!(!row.student_confirmation);
        assert_eq!(row.target_department_name.as_deref(), Some("Facilities"));

        let history = db.status_history(row.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, "NEW");
        assert_eq!(
            history[0].comment,
            "Status changed from NONE to NEW: Initial complaint submission"
        );
    }

    #[test]
    fn date_range_read_brackets_creation_time() {
        let db = test_db();
        let student = seed_user(&db, "stu", Role::Student);
        let id = seed_complaint(&db, student, None);

        let now = chrono::Utc::now();
        let hour = chrono::Duration::hours(1);

        let hits = db
            .complaints_created_between(now - hour, now + hour)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);

        let misses = db
            .complaints_created_between(now + hour, now + hour + hour)
            .unwrap();
        assert!(misses.is_empty());
    }

    #[test]
    fn create_rejects_missing_or_inactive_creator() {
        let db = test_db();
        let draft = NewComplaint {
            title: "t".to_string(),
            description: "d".to_string(),
            complaint_type: ComplaintType::Academic,
            target_department_id: None,
        };

        let err = db.create_complaint(&draft, 404).unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));

        let student = seed_user(&db, "inactive", Role::Student);
        db.set_user_active(student, false).unwrap();
        let err = db.create_complaint(&draft, student).unwrap_err();
        assert!(matches!(err, DbError::InvalidState(_)));
    }

    #[test]
    fn auto_assignment_uses_lowest_department_with_matching_history() {
        let db = test_db();
        let student = seed_user(&db, "stu", Role::Student);
        let facilities = db.create_department("Facilities", None).unwrap().id;
        let housing = db.create_department("Housing", None).unwrap().id;

        // No FACILITY history anywhere yet: department stays unset
        let orphan = seed_complaint(&db, student, None);
        assert_eq!(
            db.get_complaint(orphan)
                .unwrap()
                .unwrap()
                .target_department_id,
            None
        );

        // Give both departments FACILITY history; lowest id must win
        seed_complaint(&db, student, Some(housing));
        seed_complaint(&db, student, Some(facilities));
        let auto = seed_complaint(&db, student, None);
        assert_eq!(
            db.get_complaint(auto).unwrap().unwrap().target_department_id,
            Some(facilities)
        );

        // Inactive departments are skipped
        db.set_department_active(facilities, false).unwrap();
        let auto = seed_complaint(&db, student, None);
        assert_eq!(
            db.get_complaint(auto).unwrap().unwrap().target_department_id,
            Some(housing)
        );

        // A different type has no history: unset
        let academic = db
            .create_complaint(
                &NewComplaint {
                    title: "Grading dispute".to_string(),
                    description: "Midterm score".to_string(),
                    complaint_type: ComplaintType::Academic,
                    target_department_id: None,
                },
                student,
            )
            .unwrap();
        assert_eq!(academic.target_department_id, None);
    }

    #[test]
    fn duplicate_vote_conflicts_and_counter_stays_consistent() {
        let db = test_db();
        let student = seed_user(&db, "stu", Role::Student);
        let complaint = seed_complaint(&db, student, None);

        db.vote(complaint, student).unwrap();
        assert_vote_invariant(&db, complaint);

        let err = db.vote(complaint, student).unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        assert_vote_invariant(&db, complaint);
        assert_eq!(db.get_complaint(complaint).unwrap().unwrap().total_votes, 1);
    }

    #[test]
    fn unvote_without_vote_is_a_noop() {
        let db = test_db();
        let student = seed_user(&db, "stu", Role::Student);
        let complaint = seed_complaint(&db, student, None);

        db.unvote(complaint, student).unwrap();
        assert_eq!(db.get_complaint(complaint).unwrap().unwrap().total_votes, 0);
        assert_vote_invariant(&db, complaint);
    }

    #[test]
    fn interleaved_votes_keep_counter_equal_to_rows() {
        let db = test_db();
        let a = seed_user(&db, "a", Role::Student);
        let b = seed_user(&db, "b", Role::Student);
        let complaint = seed_complaint(&db, a, None);

        db.vote(complaint, a).unwrap();
        assert_vote_invariant(&db, complaint);
        db.vote(complaint, b).unwrap();
        assert_vote_invariant(&db, complaint);
        assert!(db.vote(complaint, a).is_err());
        assert_vote_invariant(&db, complaint);
        db.unvote(complaint, a).unwrap();
        assert_vote_invariant(&db, complaint);
        db.unvote(complaint, a).unwrap(); // repeat removal: no-op
        assert_vote_invariant(&db, complaint);
        db.vote(complaint, a).unwrap();
        assert_vote_invariant(&db, complaint);

        assert_eq!(db.get_complaint(complaint).unwrap().unwrap().total_votes, 2);
    }

    #[test]
    fn vote_on_missing_complaint_or_user_fails() {
        let db = test_db();
        let student = seed_user(&db, "stu", Role::Student);
        let complaint = seed_complaint(&db, student, None);

        assert!(matches!(
            db.vote(404, student).unwrap_err(),
            DbError::NotFound(_)
        ));
        assert!(matches!(
            db.vote(complaint, 404).unwrap_err(),
            DbError::NotFound(_)
        ));
    }

    #[test]
    fn confirmation_flag_follows_announcement_cycle() {
        let db = test_db();
        let student = seed_user(&db, "stu", Role::Student);
        let staff = seed_user(&db, "staff", Role::Staff);
        let complaint = seed_complaint(&db, student, None);

        db.change_status(complaint, ComplaintStatus::ResolutionAnnounced, staff, None)
            .unwrap();
        let row = db.get_complaint(complaint).unwrap().unwrap();
        assert!(!row.student_confirmation);
        assert!(row.resolution_announced_at.is_some());

        db.change_status(complaint, ComplaintStatus::ConfirmedByStudent, student, None)
            .unwrap();
        let row = db.get_complaint(complaint).unwrap().unwrap();
        assert!(row.student_confirmation);
        assert!(row.confirmed_by_student_at.is_some());

        // A fresh announcement resets the confirmation
        db.change_status(complaint, ComplaintStatus::ResolutionAnnounced, staff, None)
            .unwrap();
        let row = db.get_complaint(complaint).unwrap().unwrap();
        assert!(!row.student_confirmation);
    }

    #[test]
    fn change_status_composes_history_comment() {
        let db = test_db();
        let student = seed_user(&db, "stu", Role::Student);
        let staff = seed_user(&db, "staff", Role::Staff);
        let complaint = seed_complaint(&db, student, None);

        db.change_status(
            complaint,
            ComplaintStatus::InProgress,
            staff,
            Some("Taking a look"),
        )
        .unwrap();

        let history = db.status_history(complaint).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(
            history[1].comment,
            "Status changed from NEW to IN_PROGRESS: Taking a look"
        );
        assert_eq!(history[1].changed_by_username, "staff");

        // Without notes, no trailing colon
        db.change_status(complaint, ComplaintStatus::Closed, staff, None)
            .unwrap();
        let history = db.status_history(complaint).unwrap();
        assert_eq!(
            history[2].comment,
            "Status changed from IN_PROGRESS to CLOSED"
        );
    }

    #[test]
    fn assign_from_new_advances_status_once() {
        let db = test_db();
        let student = seed_user(&db, "stu", Role::Student);
        let staff = seed_user(&db, "staff", Role::Staff);
        let staff2 = seed_user(&db, "staff2", Role::Staff);
        let admin = seed_user(&db, "admin", Role::Admin);
        let complaint = seed_complaint(&db, student, None);

        db.assign_complaint(complaint, staff, admin).unwrap();
        let row = db.get_complaint(complaint).unwrap().unwrap();
        assert_eq!(row.status, "ASSIGNED");
        assert_eq!(row.assigned_to, Some(staff));
        // initial NEW entry + the auto ASSIGNED entry
        assert_eq!(db.status_history(complaint).unwrap().len(), 2);

        // Re-assignment on a non-NEW complaint: assignee changes, no new
        // history row
        db.assign_complaint(complaint, staff2, admin).unwrap();
        let row = db.get_complaint(complaint).unwrap().unwrap();
        assert_eq!(row.assigned_to, Some(staff2));
        assert_eq!(db.status_history(complaint).unwrap().len(), 2);
    }

    #[test]
    fn assign_rejects_non_staff_assignee() {
        let db = test_db();
        let student = seed_user(&db, "stu", Role::Student);
        let admin = seed_user(&db, "admin", Role::Admin);
        let complaint = seed_complaint(&db, student, None);

        let err = db.assign_complaint(complaint, student, admin).unwrap_err();
        assert!(matches!(err, DbError::InvalidState(_)));
        let err = db.assign_complaint(complaint, admin, admin).unwrap_err();
        assert!(matches!(err, DbError::InvalidState(_)));
    }

    #[test]
    fn internal_comments_hidden_from_student_reads() {
        let db = test_db();
        let student = seed_user(&db, "stu", Role::Student);
        let staff = seed_user(&db, "staff", Role::Staff);
        let complaint = seed_complaint(&db, student, None);

        db.add_comment(complaint, student, "Please hurry", false)
            .unwrap();
        db.add_comment(complaint, staff, "Vendor quote pending", true)
            .unwrap();

        let visible = db.comments(complaint, false).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].comment, "Please hurry");

        let all = db.comments(complaint, true).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn delete_cascades_children_before_complaint() {
        let db = test_db();
        let student = seed_user(&db, "stu", Role::Student);
        let staff = seed_user(&db, "staff", Role::Staff);
        let complaint = seed_complaint(&db, student, None);

        db.vote(complaint, student).unwrap();
        db.add_comment(complaint, staff, "noted", true).unwrap();
        db.change_status(complaint, ComplaintStatus::InProgress, staff, None)
            .unwrap();

        db.delete_complaint(complaint).unwrap();

        let remaining: i64 = db
            .with_conn(|conn| {
                let votes: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM complaint_votes WHERE complaint_id = ?1",
                    [complaint],
                    |r| r.get(0),
                )?;
                let comments: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM complaint_comments WHERE complaint_id = ?1",
                    [complaint],
                    |r| r.get(0),
                )?;
                let history: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM complaint_status_history WHERE complaint_id = ?1",
                    [complaint],
                    |r| r.get(0),
                )?;
                Ok(votes + comments + history)
            })
            .unwrap();
        assert_eq!(remaining, 0);
        assert!(db.get_complaint(complaint).unwrap().is_none());

        let err = db.delete_complaint(complaint).unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn top_voted_orders_by_votes_then_recency() {
        let db = test_db();
        let a = seed_user(&db, "a", Role::Student);
        let b = seed_user(&db, "b", Role::Student);
        let quiet = seed_complaint(&db, a, None);
        let popular = seed_complaint(&db, a, None);
        let single = seed_complaint(&db, b, None);

        db.vote(popular, a).unwrap();
        db.vote(popular, b).unwrap();
        db.vote(single, a).unwrap();

        let top = db.top_voted_complaints().unwrap();
        let ids: Vec<i64> = top.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![popular, single]);
        assert!(!ids.contains(&quiet));
    }

    #[test]
    fn requiring_confirmation_lists_unconfirmed_announcements() {
        let db = test_db();
        let student = seed_user(&db, "stu", Role::Student);
        let staff = seed_user(&db, "staff", Role::Staff);
        let announced = seed_complaint(&db, student, None);
        let confirmed = seed_complaint(&db, student, None);

        db.change_status(announced, ComplaintStatus::ResolutionAnnounced, staff, None)
            .unwrap();
        db.change_status(confirmed, ComplaintStatus::ResolutionAnnounced, staff, None)
            .unwrap();
        db.change_status(confirmed, ComplaintStatus::ConfirmedByStudent, student, None)
            .unwrap();

        let pending = db.complaints_requiring_confirmation().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, announced);
    }
}
