//! Read-side aggregate metrics for the admin dashboard. Nothing here is
//! cached; every call recomputes from the current complaint set.

use rusqlite::{Connection, OptionalExtension};

use crate::{Database, DbResult, time};

#[derive(Debug, Clone, Default)]
pub struct ComplaintStats {
    pub total: i64,
    /// NEW complaints awaiting triage.
    pub pending: i64,
    /// ASSIGNED complaints.
    pub in_progress: i64,
    /// CLOSED complaints.
    pub resolved: i64,
    /// CONFIRMED_BY_STUDENT complaints.
    pub confirmed_by_student: i64,
    pub academic: i64,
    pub facility: i64,
}

#[derive(Debug, Clone, Default)]
pub struct UserStats {
    pub total: i64,
    pub active: i64,
}

#[derive(Debug, Clone, Default)]
pub struct DepartmentStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
}

impl Database {
    pub fn complaint_stats(&self) -> DbResult<ComplaintStats> {
        self.with_conn(|conn| {
            let mut stats = ComplaintStats {
                total: count(conn, "SELECT COUNT(*) FROM complaints", &[])?,
                pending: count_by_status(conn, "NEW")?,
                in_progress: count_by_status(conn, "ASSIGNED")?,
                resolved: count_by_status(conn, "CLOSED")?,
                confirmed_by_student: count_by_status(conn, "CONFIRMED_BY_STUDENT")?,
                ..Default::default()
            };

            let mut stmt = conn.prepare("SELECT type, COUNT(*) FROM complaints GROUP BY type")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (complaint_type, n) = row?;
                match complaint_type.as_str() {
                    "ACADEMIC" => stats.academic = n,
                    "FACILITY" => stats.facility = n,
                    _ => {}
                }
            }

            Ok(stats)
        })
    }

    /// Mean of (updated_at - created_at) in hours over CLOSED complaints;
    /// 0.0 when none are closed. updated_at is only bumped by status and
    /// assignment changes, so it stands in for a resolution timestamp.
    pub fn average_resolution_hours(&self) -> DbResult<f64> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT created_at, updated_at FROM complaints WHERE status = 'CLOSED'")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut total_hours = 0.0;
            let mut closed = 0u32;
            for row in rows {
                let (created_at, updated_at) = row?;
                let elapsed = time::parse(&updated_at) - time::parse(&created_at);
                total_hours += elapsed.num_seconds() as f64 / 3600.0;
                closed += 1;
            }

            if closed == 0 {
                Ok(0.0)
            } else {
                Ok(total_hours / f64::from(closed))
            }
        })
    }

    /// Department with the highest raw complaint count across all statuses.
    /// Ties break toward the lowest department id; ("N/A", 0) when no
    /// complaint references a department.
    pub fn most_active_department(&self) -> DbResult<(String, i64)> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT d.name, COUNT(c.id) AS cnt \
                     FROM complaints c JOIN departments d ON c.target_department_id = d.id \
                     GROUP BY d.id ORDER BY cnt DESC, d.id ASC LIMIT 1",
                    [],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?;
            Ok(row.unwrap_or_else(|| ("N/A".to_string(), 0)))
        })
    }

    /// CLOSED complaints as a percentage of all complaints; 0.0 when the
    /// system has no complaints at all.
    pub fn satisfaction_rate(&self) -> DbResult<f64> {
        self.with_conn(|conn| {
            let total = count(conn, "SELECT COUNT(*) FROM complaints", &[])?;
            if total == 0 {
                return Ok(0.0);
            }
            let resolved = count_by_status(conn, "CLOSED")?;
            Ok(resolved as f64 / total as f64 * 100.0)
        })
    }

    pub fn user_stats(&self) -> DbResult<UserStats> {
        self.with_conn(|conn| {
            Ok(UserStats {
                total: count(conn, "SELECT COUNT(*) FROM users", &[])?,
                active: count(conn, "SELECT COUNT(*) FROM users WHERE is_active = 1", &[])?,
            })
        })
    }

    pub fn department_stats(&self) -> DbResult<DepartmentStats> {
        self.with_conn(|conn| {
            let total = count(conn, "SELECT COUNT(*) FROM departments", &[])?;
            let active = count(
                conn,
                "SELECT COUNT(*) FROM departments WHERE is_active = 1",
                &[],
            )?;
            Ok(DepartmentStats {
                total,
                active,
                inactive: total - active,
            })
        })
    }
}

fn count(conn: &Connection, sql: &str, params: &[&dyn rusqlite::types::ToSql]) -> DbResult<i64> {
    let n = conn.query_row(sql, params, |row| row.get(0))?;
    Ok(n)
}

fn count_by_status(conn: &Connection, status: &str) -> DbResult<i64> {
    count(
        conn,
        "SELECT COUNT(*) FROM complaints WHERE status = ?1",
        &[&status],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complaints::NewComplaint;
    use crate::users::NewUser;
    use redress_types::models::{ComplaintStatus, ComplaintType, Role};

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

    fn seed_complaint(
        db: &Database,
        creator: i64,
        complaint_type: ComplaintType,
        dept: Option<i64>,
    ) -> i64 {
        db.create_complaint(
            &NewComplaint {
                title: "t".to_string(),
                description: "d".to_string(),
                complaint_type,
                target_department_id: dept,
            },
            creator,
        )
        .unwrap()
        .id
    }

    #[test]
    fn status_and_type_counts() {
        let db = test_db();
        let stu = seed_user(&db, "stu", Role::Student);
        let staff = seed_user(&db, "staff", Role::Staff);

        let a = seed_complaint(&db, stu, ComplaintType::Academic, None);
        let b = seed_complaint(&db, stu, ComplaintType::Facility, None);
        seed_complaint(&db, stu, ComplaintType::Facility, None);

        db.change_status(a, ComplaintStatus::Closed, staff, None)
            .unwrap();
        db.change_status(b, ComplaintStatus::ConfirmedByStudent, stu, None)
            .unwrap();

        let stats = db.complaint_stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.in_progress, 0);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.confirmed_by_student, 1);
        assert_eq!(stats.academic, 1);
        assert_eq!(stats.facility, 2);
    }

    #[test]
    fn satisfaction_rate_edges() {
        let db = test_db();
        assert_eq!(db.satisfaction_rate().unwrap(), 0.0);

        let stu = seed_user(&db, "stu", Role::Student);
        let staff = seed_user(&db, "staff", Role::Staff);
        let closed = seed_complaint(&db, stu, ComplaintType::Academic, None);
        seed_complaint(&db, stu, ComplaintType::Academic, None);
        seed_complaint(&db, stu, ComplaintType::Facility, None);

        db.change_status(closed, ComplaintStatus::Closed, staff, None)
            .unwrap();

        let rate = db.satisfaction_rate().unwrap();
        assert!((rate - 33.333333).abs() < 0.001, "rate was {rate}");
    }

    #[test]
    fn average_resolution_time_edges() {
        let db = test_db();
        assert_eq!(db.average_resolution_hours().unwrap(), 0.0);

        let stu = seed_user(&db, "stu", Role::Student);
        let staff = seed_user(&db, "staff", Role::Staff);
        let c = seed_complaint(&db, stu, ComplaintType::Facility, None);
        db.change_status(c, ComplaintStatus::Closed, staff, None)
            .unwrap();

        // Still 0-ish: closed immediately
        assert!(db.average_resolution_hours().unwrap() < 0.01);

        // Backdate: created at T, closed at T+5h
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE complaints SET created_at = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![
                    "2026-08-01T08:00:00+00:00",
                    "2026-08-01T13:00:00+00:00",
                    c
                ],
            )?;
            Ok(())
        })
        .unwrap();
        assert!((db.average_resolution_hours().unwrap() - 5.0).abs() < 1e-9);

        // Open complaints never enter the mean
        seed_complaint(&db, stu, ComplaintType::Facility, None);
        assert!((db.average_resolution_hours().unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn most_active_department_tie_breaks_on_lowest_id() {
        let db = test_db();
        assert_eq!(db.most_active_department().unwrap(), ("N/A".to_string(), 0));

        let stu = seed_user(&db, "stu", Role::Student);
        let facilities = db.create_department("Facilities", None).unwrap().id;
        let housing = db.create_department("Housing", None).unwrap().id;

        // Complaint without a department does not count toward any
        seed_complaint(&db, stu, ComplaintType::Academic, None);
        assert_eq!(db.most_active_department().unwrap(), ("N/A".to_string(), 0));

        seed_complaint(&db, stu, ComplaintType::Facility, Some(facilities));
        seed_complaint(&db, stu, ComplaintType::Facility, Some(housing));
        // Tie at 1 each: Facilities has the lower id
        assert_eq!(
            db.most_active_department().unwrap(),
            ("Facilities".to_string(), 1)
        );

        seed_complaint(&db, stu, ComplaintType::Facility, Some(housing));
        assert_eq!(
            db.most_active_department().unwrap(),
            ("Housing".to_string(), 2)
        );
    }

    #[test]
    fn user_and_department_stats() {
        let db = test_db();
        let stu = seed_user(&db, "stu", Role::Student);
        seed_user(&db, "staff", Role::Staff);
        db.set_user_active(stu, false).unwrap();

        let users = db.user_stats().unwrap();
        assert_eq!(users.total, 2);
        assert_eq!(users.active, 1);

        let dept = db.create_department("Facilities", None).unwrap().id;
        db.create_department("Housing", None).unwrap();
        db.set_department_active(dept, false).unwrap();

        let depts = db.department_stats().unwrap();
        assert_eq!(depts.total, 2);
        assert_eq!(depts.active, 1);
        assert_eq!(depts.inactive, 1);
    }
}
