use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_optional_i64, get_required_i64, get_required_str, require_db, require_student, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::para;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

const SESSIONS_LIST_DEFAULT_LIMIT: i64 = 100;
const SESSIONS_LIST_MAX_LIMIT: i64 = 1000;

fn parse_session_date(raw: &str) -> Result<String, HandlerErr> {
    let t = raw.trim();
    NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .map(|_| t.to_string())
        .map_err(|_| HandlerErr::new("bad_params", "date must be YYYY-MM-DD"))
}

fn non_negative_count(
    params: &serde_json::Value,
    key: &str,
) -> Result<i64, HandlerErr> {
    let value = get_optional_i64(params, key)?.unwrap_or(0);
    if value < 0 {
        return Err(HandlerErr::new(
            "bad_params",
            format!("{} must not be negative", key),
        ));
    }
    Ok(value)
}

fn sessions_log(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let date = parse_session_date(&get_required_str(params, "date")?)?;
    let session_para = get_required_i64(params, "para")?;

    // Any in-range para is loggable: revision sessions revisit memorized
    // paras, so this is looser than the completion gate.
    if !para::in_range(session_para) {
        return Err(HandlerErr {
            code: "invalid_para",
            message: "out of range".to_string(),
            details: Some(json!({ "para": session_para })),
        });
    }

    let new_lesson_lines = non_negative_count(params, "newLessonLines")?;
    let revision_lines = non_negative_count(params, "revisionLines")?;
    let mistakes = non_negative_count(params, "mistakes")?;
    let note = params
        .get("note")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    require_student(conn, &student_id)?;

    let session_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO hifz_sessions(id, student_id, session_date, para, new_lesson_lines, revision_lines, mistakes, note)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &session_id,
            &student_id,
            &date,
            session_para,
            new_lesson_lines,
            revision_lines,
            mistakes,
            &note,
        ),
    )
    .map_err(HandlerErr::write)?;

    Ok(json!({ "sessionId": session_id }))
}

fn sessions_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let limit = get_optional_i64(params, "limit")?
        .unwrap_or(SESSIONS_LIST_DEFAULT_LIMIT)
        .clamp(1, SESSIONS_LIST_MAX_LIMIT);
    require_student(conn, &student_id)?;

    let mut stmt = conn
        .prepare(
            "SELECT id, session_date, para, new_lesson_lines, revision_lines, mistakes, note
             FROM hifz_sessions
             WHERE student_id = ?
             ORDER BY session_date DESC, rowid DESC
             LIMIT ?",
        )
        .map_err(HandlerErr::query)?;
    let sessions: Vec<serde_json::Value> = stmt
        .query_map((&student_id, limit), |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "date": r.get::<_, String>(1)?,
                "para": r.get::<_, i64>(2)?,
                "newLessonLines": r.get::<_, i64>(3)?,
                "revisionLines": r.get::<_, i64>(4)?,
                "mistakes": r.get::<_, i64>(5)?,
                "note": r.get::<_, Option<String>>(6)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::query)?;

    Ok(json!({ "sessions": sessions }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler = match req.method.as_str() {
        "hifz.sessions.log" => sessions_log,
        "hifz.sessions.list" => sessions_list,
        _ => return None,
    };

    let resp = match require_db(state) {
        Ok(conn) => match handler(conn, &req.params) {
            Ok(result) => ok(&req.id, result),
            Err(e) => e.response(&req.id),
        },
        Err(e) => e.response(&req.id),
    };
    Some(resp)
}
