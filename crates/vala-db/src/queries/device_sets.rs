//! Device vote-set query functions.
//!
//! Three named string sets (`my_pulses`, `respected_pulses`,
//! `denied_reports`) persisted per device with no server-side backing.
//! [`insert_if_absent`] is the atomic read-modify-write the vote ledgers
//! rely on: membership check and insert are one SQL statement, so rapid
//! double-taps cannot both count.

use rusqlite::Connection;

use crate::Result;

/// Insert `pulse_id` into the named set. Returns `false` if it was
/// already a member.
pub fn insert_if_absent(
    conn: &Connection,
    set_name: &str,
    pulse_id: &str,
    added_at: u64,
) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO device_sets (set_name, pulse_id, added_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![set_name, pulse_id, added_at as i64],
    )?;
    Ok(changed > 0)
}

/// Whether `pulse_id` is a member of the named set.
pub fn contains(conn: &Connection, set_name: &str, pulse_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM device_sets WHERE set_name = ?1 AND pulse_id = ?2",
        [set_name, pulse_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// All members of the named set, oldest first.
pub fn list(conn: &Connection, set_name: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT pulse_id FROM device_sets WHERE set_name = ?1 ORDER BY added_at, pulse_id",
    )?;
    let ids = stmt
        .query_map([set_name], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Remove a member. Removing an absent member is a no-op.
pub fn remove(conn: &Connection, set_name: &str, pulse_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM device_sets WHERE set_name = ?1 AND pulse_id = ?2",
        [set_name, pulse_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_insert_if_absent_is_atomic_membership() {
        let conn = test_db();
        assert!(insert_if_absent(&conn, "respected_pulses", "p1", 100).expect("insert"));
        assert!(!insert_if_absent(&conn, "respected_pulses", "p1", 101).expect("insert"));
        assert!(contains(&conn, "respected_pulses", "p1").expect("contains"));
    }

    #[test]
    fn test_sets_are_independent() {
        let conn = test_db();
        insert_if_absent(&conn, "respected_pulses", "p1", 100).expect("insert");

        assert!(!contains(&conn, "denied_reports", "p1").expect("contains"));
        assert!(insert_if_absent(&conn, "denied_reports", "p1", 100).expect("insert"));
    }

    #[test]
    fn test_list_orders_by_added_at() {
        let conn = test_db();
        insert_if_absent(&conn, "my_pulses", "later", 200).expect("insert");
        insert_if_absent(&conn, "my_pulses", "earlier", 100).expect("insert");

        let ids = list(&conn, "my_pulses").expect("list");
        assert_eq!(ids, vec!["earlier".to_string(), "later".to_string()]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let conn = test_db();
        insert_if_absent(&conn, "my_pulses", "p1", 100).expect("insert");
        remove(&conn, "my_pulses", "p1").expect("remove");
        remove(&conn, "my_pulses", "p1").expect("second remove");
        assert!(!contains(&conn, "my_pulses", "p1").expect("contains"));
    }

    #[test]
    fn test_survives_reopen_on_disk() {
        let dir = std::env::temp_dir().join(format!("vala-db-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("sets.db");
        let _ = std::fs::remove_file(&path);

        {
            let conn = crate::open(&path).expect("open");
            insert_if_absent(&conn, "respected_pulses", "p1", 100).expect("insert");
        }
        {
            let conn = crate::open(&path).expect("reopen");
            assert!(contains(&conn, "respected_pulses", "p1").expect("contains"));
            assert!(!insert_if_absent(&conn, "respected_pulses", "p1", 200).expect("insert"));
        }

        let _ = std::fs::remove_file(&path);
    }
}
