use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "rollcall.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    // One row per stored path. `parent` + `seq` give cheap child listing in
    // insertion order; overwrites keep the first seq.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS nodes(
            path TEXT PRIMARY KEY,
            parent TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            seq INTEGER NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_nodes_parent_seq ON nodes(parent, seq)",
        [],
    )?;

    ensure_nodes_updated_at(conn)?;
    Ok(())
}

fn ensure_nodes_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "nodes", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE nodes ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let conn = open_memory().expect("open");
        init_schema(&conn).expect("second init");
        assert!(table_has_column(&conn, "nodes", "seq").expect("pragma"));
        assert!(table_has_column(&conn, "nodes", "updated_at").expect("pragma"));
    }

    #[test]
    fn open_db_creates_workspace_file() {
        let dir = std::env::temp_dir().join(format!("rollcall-db-{}", uuid::Uuid::new_v4()));
        let _conn = open_db(&dir).expect("open db");
        assert!(dir.join(DB_FILE_NAME).is_file());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
