//! SQL schema definitions.

/// Complete schema for the Vala v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Pulses collection (self-hosted remote store)
-- ============================================================

CREATE TABLE IF NOT EXISTS pulses (
    id TEXT PRIMARY KEY,
    lat REAL NOT NULL,
    lng REAL NOT NULL,
    energy_value REAL NOT NULL DEFAULT 0,
    audio_url TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL,
    category TEXT NOT NULL,
    respect_count INTEGER NOT NULL DEFAULT 0,
    parent_id TEXT,
    is_quick_report INTEGER NOT NULL DEFAULT 0,
    deny_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_pulses_created ON pulses(created_at);
CREATE INDEX IF NOT EXISTS idx_pulses_parent ON pulses(parent_id);

-- ============================================================
-- Device-scoped vote sets (my_pulses / respected_pulses /
-- denied_reports), no server-side backing
-- ============================================================

CREATE TABLE IF NOT EXISTS device_sets (
    set_name TEXT NOT NULL,
    pulse_id TEXT NOT NULL,
    added_at INTEGER NOT NULL,
    PRIMARY KEY (set_name, pulse_id)
);

-- ============================================================
-- Settings
-- ============================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
