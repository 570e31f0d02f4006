//! Pulses collection query functions.

use rusqlite::{Connection, Row};

use vala_types::pulse::{Pulse, PulseCategory};

use crate::{DbError, Result};

fn pulse_from_row(row: &Row<'_>) -> rusqlite::Result<Pulse> {
    let category_tag: String = row.get(6)?;
    Ok(Pulse {
        id: row.get(0)?,
        lat: row.get(1)?,
        lng: row.get(2)?,
        energy_value: row.get(3)?,
        audio_url: row.get(4)?,
        created_at: row.get::<_, i64>(5)? as u64,
        // Unknown tags degrade to chat rather than poisoning the read.
        category: PulseCategory::parse(&category_tag).unwrap_or(PulseCategory::Chat),
        respect_count: row.get::<_, i64>(7)? as u32,
        parent_id: row.get(8)?,
        is_quick_report: row.get(9)?,
        deny_count: row.get::<_, i64>(10)? as u32,
    })
}

const COLUMNS: &str = "id, lat, lng, energy_value, audio_url, created_at, category,
     respect_count, parent_id, is_quick_report, deny_count";

/// Insert a full pulse row.
pub fn insert(conn: &Connection, pulse: &Pulse) -> Result<()> {
    conn.execute(
        "INSERT INTO pulses (id, lat, lng, energy_value, audio_url, created_at, category,
             respect_count, parent_id, is_quick_report, deny_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            pulse.id,
            pulse.lat,
            pulse.lng,
            pulse.energy_value,
            pulse.audio_url,
            pulse.created_at as i64,
            pulse.category.as_str(),
            pulse.respect_count as i64,
            pulse.parent_id,
            pulse.is_quick_report,
            pulse.deny_count as i64,
        ],
    )?;
    Ok(())
}

/// Get a pulse by id.
pub fn get(conn: &Connection, id: &str) -> Result<Pulse> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM pulses WHERE id = ?1"),
        [id],
        pulse_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("pulse '{id}'")),
        other => DbError::Sqlite(other),
    })
}

/// All pulses with `created_at >= threshold`, newest first.
pub fn select_since(conn: &Connection, threshold: u64) -> Result<Vec<Pulse>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM pulses WHERE created_at >= ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt
        .query_map([threshold as i64], pulse_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Delete a pulse by id. Returns whether a row was removed.
pub fn delete(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute("DELETE FROM pulses WHERE id = ?1", [id])?;
    Ok(changed > 0)
}

/// Atomically increment a counter column and return the fresh row.
pub fn increment(conn: &Connection, id: &str, column: &str) -> Result<Pulse> {
    // The column name is interpolated, so only the two known counters are
    // accepted.
    let sql = match column {
        "respect_count" => "UPDATE pulses SET respect_count = respect_count + 1 WHERE id = ?1",
        "deny_count" => "UPDATE pulses SET deny_count = deny_count + 1 WHERE id = ?1",
        other => {
            return Err(DbError::Constraint(format!(
                "unknown counter column: {other}"
            )))
        }
    };
    let changed = conn.execute(sql, [id])?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("pulse '{id}'")));
    }
    get(conn, id)
}

/// Drop rows older than the threshold. The collection only promises data
/// within each pulse's TTL; this keeps the table from accumulating dead
/// rows forever.
pub fn prune_before(conn: &Connection, threshold: u64) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM pulses WHERE created_at < ?1",
        [threshold as i64],
    )?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn pulse(id: &str, created_at: u64) -> Pulse {
        Pulse {
            id: id.to_string(),
            lat: 41.3275,
            lng: 19.8187,
            energy_value: 0.62,
            audio_url: format!("https://blobs/{id}.webm"),
            created_at,
            category: PulseCategory::Music,
            respect_count: 0,
            deny_count: 0,
            parent_id: None,
            is_quick_report: false,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let conn = test_db();
        insert(&conn, &pulse("p1", 1_000)).expect("insert");

        let row = get(&conn, "p1").expect("get");
        assert_eq!(row.category, PulseCategory::Music);
        assert!((row.lat - 41.3275).abs() < 1e-9);
        assert_eq!(row.created_at, 1_000);
    }

    #[test]
    fn test_get_missing() {
        let conn = test_db();
        assert!(matches!(get(&conn, "nope"), Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_select_since_orders_newest_first() {
        let conn = test_db();
        insert(&conn, &pulse("old", 100)).expect("insert");
        insert(&conn, &pulse("mid", 500)).expect("insert");
        insert(&conn, &pulse("new", 900)).expect("insert");

        let rows = select_since(&conn, 200).expect("select");
        let ids: Vec<&str> = rows.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[test]
    fn test_delete_reports_existence() {
        let conn = test_db();
        insert(&conn, &pulse("p1", 1_000)).expect("insert");
        assert!(delete(&conn, "p1").expect("delete"));
        assert!(!delete(&conn, "p1").expect("second delete"));
    }

    #[test]
    fn test_increment_counters() {
        let conn = test_db();
        insert(&conn, &pulse("p1", 1_000)).expect("insert");

        let row = increment(&conn, "p1", "respect_count").expect("increment");
        assert_eq!(row.respect_count, 1);
        let row = increment(&conn, "p1", "deny_count").expect("increment");
        assert_eq!(row.deny_count, 1);
        assert_eq!(row.respect_count, 1);
    }

    #[test]
    fn test_increment_rejects_arbitrary_column() {
        let conn = test_db();
        insert(&conn, &pulse("p1", 1_000)).expect("insert");
        let result = increment(&conn, "p1", "energy_value");
        assert!(matches!(result, Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_increment_missing_row() {
        let conn = test_db();
        let result = increment(&conn, "ghost", "respect_count");
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_prune_before() {
        let conn = test_db();
        insert(&conn, &pulse("old", 100)).expect("insert");
        insert(&conn, &pulse("new", 5_000)).expect("insert");

        let removed = prune_before(&conn, 1_000).expect("prune");
        assert_eq!(removed, 1);
        assert!(get(&conn, "new").is_ok());
        assert!(matches!(get(&conn, "old"), Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_quick_report_roundtrip() {
        let conn = test_db();
        let mut quick = pulse("q1", 2_000);
        quick.category = PulseCategory::QuickPolice;
        quick.is_quick_report = true;
        quick.audio_url = String::new();
        quick.parent_id = Some("p1".to_string());
        insert(&conn, &quick).expect("insert");

        let row = get(&conn, "q1").expect("get");
        assert!(row.is_quick_report);
        assert_eq!(row.category, PulseCategory::QuickPolice);
        assert_eq!(row.parent_id.as_deref(), Some("p1"));
    }
}
