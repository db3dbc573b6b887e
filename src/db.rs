use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("hifz.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            student_no TEXT,
            active INTEGER NOT NULL,
            sort_order INTEGER NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class_sort ON students(class_id, sort_order)",
        [],
    )?;

    // Para lists are stored as JSON integer arrays. Overlap between the two
    // lists and out-of-range values are legal here; the para engine dedups
    // and filters on every read.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS hifz_records(
            student_id TEXT PRIMARY KEY,
            already_memorized TEXT NOT NULL DEFAULT '[]',
            completed TEXT NOT NULL DEFAULT '[]',
            current_para INTEGER,
            current_para_progress REAL NOT NULL DEFAULT 0,
            updated_at TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    ensure_records_progress_column(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS hifz_sessions(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            session_date TEXT NOT NULL,
            para INTEGER NOT NULL,
            new_lesson_lines INTEGER NOT NULL DEFAULT 0,
            revision_lines INTEGER NOT NULL DEFAULT 0,
            mistakes INTEGER NOT NULL DEFAULT 0,
            note TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_hifz_sessions_student ON hifz_sessions(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_hifz_sessions_student_date ON hifz_sessions(student_id, session_date)",
        [],
    )?;

    Ok(conn)
}

/// Lenient decode of a stored para list. A corrupt or non-array value reads
/// as empty rather than failing the whole request; the engine filters the
/// rest.
pub fn parse_para_list(raw: &str) -> Vec<i64> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(items)) => {
            items.iter().filter_map(|v| v.as_i64()).collect()
        }
        _ => Vec::new(),
    }
}

pub fn encode_para_list(paras: &[i64]) -> String {
    serde_json::to_string(paras).unwrap_or_else(|_| "[]".to_string())
}

fn ensure_records_progress_column(conn: &Connection) -> anyhow::Result<()> {
    // Early workspaces tracked the current para without a progress value.
    if table_has_column(conn, "hifz_records", "current_para_progress")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE hifz_records ADD COLUMN current_para_progress REAL NOT NULL DEFAULT 0",
        [],
    )?;
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
