use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

/// Names of the fixed-schema tables under a given prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub forms: String,
    pub form_fields: String,
    pub form_submissions: String,
    pub ip_addresses: String,
    pub pages: String,
}

impl TableNames {
    pub fn new(prefix: &str) -> Self {
        Self {
            forms: format!("{prefix}forms"),
            form_fields: format!("{prefix}form_fields"),
            form_submissions: format!("{prefix}form_submissions"),
            ip_addresses: format!("{prefix}ip_addresses"),
            pages: format!("{prefix}pages"),
        }
    }
}

/// Creates the header and metadata tables. Per-form result tables are never created here.
pub fn init_schema(conn: &Connection, tables: &TableNames) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(&schema_sql(tables))?;
    Ok(())
}

fn schema_sql(t: &TableNames) -> String {
    format!(
        "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES ({SCHEMA_VERSION}, unixepoch());

CREATE TABLE IF NOT EXISTS {forms} (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    alias TEXT NOT NULL UNIQUE,
    description TEXT
);

CREATE TABLE IF NOT EXISTS {fields} (
    id INTEGER PRIMARY KEY,
    form_id INTEGER NOT NULL REFERENCES {forms}(id),
    label TEXT NOT NULL,
    alias TEXT NOT NULL,
    type TEXT NOT NULL,
    field_order INTEGER NOT NULL DEFAULT 0,
    UNIQUE (form_id, alias)
);

CREATE TABLE IF NOT EXISTS {pages} (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    alias TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS {ips} (
    id INTEGER PRIMARY KEY,
    ip_address TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS {subs} (
    id INTEGER PRIMARY KEY,
    form_id INTEGER NOT NULL REFERENCES {forms}(id),
    page_id INTEGER REFERENCES {pages}(id),
    ip_id INTEGER REFERENCES {ips}(id),
    referer TEXT,
    date_submitted TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_{subs}_form_date ON {subs} (form_id, date_submitted);
",
        forms = t.forms,
        fields = t.form_fields,
        pages = t.pages,
        ips = t.ip_addresses,
        subs = t.form_submissions,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_names() {
        let t = TableNames::new("mt_");
        assert_eq!(t.form_submissions, "mt_form_submissions");
        assert_eq!(t.forms, "mt_forms");
    }

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let t = TableNames::new("");
        init_schema(&conn, &t).unwrap();
        init_schema(&conn, &t).unwrap();
        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }
}
