use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_required_str, load_record, require_db, require_student, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::para;
use crate::para::SessionTotals;
use rusqlite::Connection;
use serde_json::json;

fn load_session_totals(
    conn: &Connection,
    student_id: &str,
) -> Result<Option<SessionTotals>, HandlerErr> {
    let totals = conn
        .query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(new_lesson_lines), 0),
                    COALESCE(SUM(revision_lines), 0),
                    COALESCE(SUM(mistakes), 0)
             FROM hifz_sessions
             WHERE student_id = ?",
            [student_id],
            |r| {
                Ok(SessionTotals {
                    total_sessions: r.get(0)?,
                    new_lesson_lines: r.get(1)?,
                    revision_lines: r.get(2)?,
                    mistakes: r.get(3)?,
                })
            },
        )
        .map_err(HandlerErr::query)?;

    // No sessions at all means no analytics snapshot, not a zero snapshot;
    // progress_stats treats the two differently when the record is also
    // absent.
    if totals.total_sessions == 0 {
        Ok(None)
    } else {
        Ok(Some(totals))
    }
}

fn progress_open(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    require_student(conn, &student_id)?;

    let record = load_record(conn, &student_id)?;
    let totals = load_session_totals(conn, &student_id)?;

    let derived_current = match &record {
        Some(r) => para::next_para(&r.already_memorized, &r.completed),
        None => 1,
    };

    let stats = para::progress_stats(totals.as_ref(), record.as_ref(), derived_current);
    let visualization = para::visualization(record.as_ref(), derived_current);

    Ok(json!({
        "stats": stats
            .map(|s| serde_json::to_value(s).unwrap_or_else(|_| json!(null)))
            .unwrap_or(json!(null)),
        "visualization": serde_json::to_value(visualization).unwrap_or_else(|_| json!(null))
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "hifz.progress.open" => {
            let resp = match require_db(state) {
                Ok(conn) => match progress_open(conn, &req.params) {
                    Ok(result) => ok(&req.id, result),
                    Err(e) => e.response(&req.id),
                },
                Err(e) => e.response(&req.id),
            };
            Some(resp)
        }
        _ => None,
    }
}
