use crate::db;
use crate::ipc::error::err;
use crate::ipc::types::AppState;
use crate::para::HifzRecord;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn query(e: impl ToString) -> Self {
        Self::new("db_query_failed", e.to_string())
    }

    pub fn write(e: impl ToString) -> Self {
        Self::new("db_write_failed", e.to_string())
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "no workspace selected"))
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_optional_i64(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be an integer", key))),
    }
}

/// Reads a JSON array of integers from params. Values are passed through as
/// stored; range filtering is the engine's job.
pub fn get_para_array(params: &serde_json::Value, key: &str) -> Result<Vec<i64>, HandlerErr> {
    let Some(raw) = params.get(key) else {
        return Err(HandlerErr::new("bad_params", format!("missing {}", key)));
    };
    let Some(items) = raw.as_array() else {
        return Err(HandlerErr::new(
            "bad_params",
            format!("{} must be an array of integers", key),
        ));
    };
    let mut out = Vec::with_capacity(items.len());
    for v in items {
        let Some(n) = v.as_i64() else {
            return Err(HandlerErr::new(
                "bad_params",
                format!("{} must contain only integers", key),
            ));
        };
        out.push(n);
    }
    Ok(out)
}

pub fn student_exists(conn: &Connection, student_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(HandlerErr::query)
}

pub fn require_student(conn: &Connection, student_id: &str) -> Result<(), HandlerErr> {
    if student_exists(conn, student_id)? {
        Ok(())
    } else {
        Err(HandlerErr {
            code: "not_found",
            message: "student not found".to_string(),
            details: Some(json!({ "studentId": student_id })),
        })
    }
}

pub fn load_record(
    conn: &Connection,
    student_id: &str,
) -> Result<Option<HifzRecord>, HandlerErr> {
    conn.query_row(
        "SELECT already_memorized, completed, current_para, current_para_progress
         FROM hifz_records
         WHERE student_id = ?",
        [student_id],
        |r| {
            let already_raw: String = r.get(0)?;
            let completed_raw: String = r.get(1)?;
            Ok(HifzRecord {
                already_memorized: db::parse_para_list(&already_raw),
                completed: db::parse_para_list(&completed_raw),
                current_para: r.get(2)?,
                current_para_progress: r.get(3)?,
            })
        },
    )
    .optional()
    .map_err(HandlerErr::query)
}

pub fn save_record(
    conn: &Connection,
    student_id: &str,
    record: &HifzRecord,
) -> Result<(), HandlerErr> {
    conn.execute(
        "INSERT INTO hifz_records(student_id, already_memorized, completed, current_para, current_para_progress, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id) DO UPDATE SET
            already_memorized = excluded.already_memorized,
            completed = excluded.completed,
            current_para = excluded.current_para,
            current_para_progress = excluded.current_para_progress,
            updated_at = excluded.updated_at",
        (
            student_id,
            db::encode_para_list(&record.already_memorized),
            db::encode_para_list(&record.completed),
            record.current_para,
            record.current_para_progress,
            now_stamp(),
        ),
    )
    .map_err(HandlerErr::write)?;
    Ok(())
}

pub fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
