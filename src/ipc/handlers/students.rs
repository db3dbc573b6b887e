use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_required_str, now_stamp, require_db, require_student, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn class_exists(conn: &Connection, class_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(HandlerErr::query)
}

fn students_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    if !class_exists(conn, &class_id)? {
        return Err(HandlerErr::new("not_found", "class not found"));
    }

    let mut stmt = conn
        .prepare(
            "SELECT id, last_name, first_name, student_no, active, sort_order
             FROM students
             WHERE class_id = ?
             ORDER BY sort_order",
        )
        .map_err(HandlerErr::query)?;
    let students: Vec<serde_json::Value> = stmt
        .query_map([&class_id], |r| {
            let last: String = r.get(1)?;
            let first: String = r.get(2)?;
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "lastName": last.clone(),
                "firstName": first.clone(),
                "displayName": format!("{}, {}", last, first),
                "studentNo": r.get::<_, Option<String>>(3)?,
                "active": r.get::<_, i64>(4)? != 0,
                "sortOrder": r.get::<_, i64>(5)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::query)?;

    Ok(json!({ "students": students }))
}

fn students_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let last_name = get_required_str(params, "lastName")?;
    let first_name = get_required_str(params, "firstName")?;
    let student_no = params
        .get("studentNo")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    if last_name.trim().is_empty() || first_name.trim().is_empty() {
        return Err(HandlerErr::new("bad_params", "name must not be empty"));
    }
    if !class_exists(conn, &class_id)? {
        return Err(HandlerErr::new("not_found", "class not found"));
    }

    let next_sort: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM students WHERE class_id = ?",
            [&class_id],
            |r| r.get(0),
        )
        .map_err(HandlerErr::query)?;

    let student_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, class_id, last_name, first_name, student_no, active, sort_order, updated_at)
         VALUES (?, ?, ?, ?, ?, 1, ?, ?)",
        (
            &student_id,
            &class_id,
            last_name.trim(),
            first_name.trim(),
            &student_no,
            next_sort,
            now_stamp(),
        ),
    )
    .map_err(HandlerErr::write)?;

    Ok(json!({ "studentId": student_id, "sortOrder": next_sort }))
}

fn students_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    require_student(conn, &student_id)?;

    if let Some(v) = params.get("lastName").and_then(|v| v.as_str()) {
        if v.trim().is_empty() {
            return Err(HandlerErr::new("bad_params", "lastName must not be empty"));
        }
        conn.execute(
            "UPDATE students SET last_name = ?, updated_at = ? WHERE id = ?",
            (v.trim(), now_stamp(), &student_id),
        )
        .map_err(HandlerErr::write)?;
    }
    if let Some(v) = params.get("firstName").and_then(|v| v.as_str()) {
        if v.trim().is_empty() {
            return Err(HandlerErr::new("bad_params", "firstName must not be empty"));
        }
        conn.execute(
            "UPDATE students SET first_name = ?, updated_at = ? WHERE id = ?",
            (v.trim(), now_stamp(), &student_id),
        )
        .map_err(HandlerErr::write)?;
    }
    if let Some(v) = params.get("studentNo") {
        let value = v.as_str().map(|s| s.to_string());
        conn.execute(
            "UPDATE students SET student_no = ?, updated_at = ? WHERE id = ?",
            (&value, now_stamp(), &student_id),
        )
        .map_err(HandlerErr::write)?;
    }
    if let Some(v) = params.get("active").and_then(|v| v.as_bool()) {
        conn.execute(
            "UPDATE students SET active = ?, updated_at = ? WHERE id = ?",
            (v as i64, now_stamp(), &student_id),
        )
        .map_err(HandlerErr::write)?;
    }

    Ok(json!({ "studentId": student_id }))
}

fn students_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    require_student(conn, &student_id)?;

    let tx = conn.unchecked_transaction().map_err(HandlerErr::write)?;
    // Dependency order; no ON DELETE CASCADE in the schema.
    for sql in [
        "DELETE FROM hifz_sessions WHERE student_id = ?",
        "DELETE FROM hifz_records WHERE student_id = ?",
        "DELETE FROM students WHERE id = ?",
    ] {
        if let Err(e) = tx.execute(sql, [&student_id]) {
            let _ = tx.rollback();
            return Err(HandlerErr::write(e));
        }
    }
    tx.commit().map_err(HandlerErr::write)?;

    Ok(json!({ "studentId": student_id, "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler = match req.method.as_str() {
        "students.list" => students_list,
        "students.create" => students_create,
        "students.update" => students_update,
        "students.delete" => students_delete,
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
