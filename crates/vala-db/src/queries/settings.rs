//! Settings query functions.

use rusqlite::Connection;

use crate::{DbError, Result};

/// Get a setting value by key.
pub fn get(conn: &Connection, key: &str) -> Result<String> {
    conn.query_row(
        "SELECT value FROM settings WHERE key = ?1",
        [key],
        |row| row.get(0),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("setting '{key}'")),
        other => DbError::Sqlite(other),
    })
}

/// Set a setting value.
pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

/// Get a setting as a boolean, defaulting to `default` if not found.
pub fn get_bool(conn: &Connection, key: &str, default: bool) -> Result<bool> {
    match get(conn, key) {
        Ok(v) => Ok(v == "true" || v == "1"),
        Err(DbError::NotFound(_)) => Ok(default),
        Err(e) => Err(e),
    }
}

/// Get a setting as u64, defaulting to `default` if not found.
pub fn get_u64(conn: &Connection, key: &str, default: u64) -> Result<u64> {
    match get(conn, key) {
        Ok(v) => v
            .parse()
            .map_err(|e: std::num::ParseIntError| DbError::Parse(e.to_string())),
        Err(DbError::NotFound(_)) => Ok(default),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_default_settings_present() {
        let conn = test_db();
        let refresh = get_u64(&conn, "last_full_refresh", 99).expect("get");
        assert_eq!(refresh, 0);
    }

    #[test]
    fn test_set_and_get() {
        let conn = test_db();
        set(&conn, "theme_mode", "light").expect("set");
        assert_eq!(get(&conn, "theme_mode").expect("get"), "light");
    }

    #[test]
    fn test_get_nonexistent() {
        let conn = test_db();
        assert!(matches!(
            get(&conn, "nonexistent"),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn test_get_bool_defaults() {
        let conn = test_db();
        assert!(get_bool(&conn, "notifications_enabled", false).expect("get"));
        assert!(!get_bool(&conn, "never_written", false).expect("get"));
    }

    #[test]
    fn test_get_u64_roundtrip() {
        let conn = test_db();
        set(&conn, "last_full_refresh", "1700000000").expect("set");
        assert_eq!(
            get_u64(&conn, "last_full_refresh", 0).expect("get"),
            1_700_000_000
        );
    }

    #[test]
    fn test_get_u64_parse_error() {
        let conn = test_db();
        set(&conn, "last_full_refresh", "not-a-number").expect("set");
        assert!(matches!(
            get_u64(&conn, "last_full_refresh", 0),
            Err(DbError::Parse(_))
        ));
    }
}
