use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_para_array, get_required_i64, get_required_str, load_record, require_db, require_student,
    save_record, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::para;
use crate::para::HifzRecord;
use rusqlite::Connection;
use serde_json::json;

fn record_json(record: &HifzRecord) -> serde_json::Value {
    serde_json::to_value(record).unwrap_or_else(|_| json!(null))
}

fn require_record(conn: &Connection, student_id: &str) -> Result<HifzRecord, HandlerErr> {
    load_record(conn, student_id)?.ok_or_else(|| HandlerErr {
        code: "not_found",
        message: "hifz record not found; run hifz.record.setup first".to_string(),
        details: Some(json!({ "studentId": student_id })),
    })
}

fn record_open(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    require_student(conn, &student_id)?;

    let record = load_record(conn, &student_id)?;
    let next = match &record {
        Some(r) => para::next_para(&r.already_memorized, &r.completed),
        None => 1,
    };
    Ok(json!({
        "record": record.as_ref().map(record_json),
        "nextPara": next
    }))
}

/// Initial setup and the administrative-correction path for the
/// pre-enrollment set. Unlike the lenient read paths, writes here are
/// strict: every para must be in range.
fn record_setup(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    require_student(conn, &student_id)?;

    let already = get_para_array(params, "alreadyMemorized")?;
    if let Some(bad) = already.iter().find(|p| !para::in_range(**p)) {
        return Err(HandlerErr {
            code: "invalid_para",
            message: "out of range".to_string(),
            details: Some(json!({ "para": bad })),
        });
    }

    let mut record = load_record(conn, &student_id)?.unwrap_or_default();
    record.already_memorized = already;

    // Keep an explicit current para only while it is still unmemorized;
    // otherwise fall back to the first gap, with progress reset.
    let memorized_current = record.current_para.map(|p| {
        !para::can_work_on(p, &record.completed, &record.already_memorized).allowed
    });
    if record.current_para.is_none() || memorized_current == Some(true) {
        let next = para::next_para(&record.already_memorized, &record.completed);
        record.current_para = if next == para::ALL_PARAS_DONE {
            None
        } else {
            Some(next)
        };
        record.current_para_progress = 0.0;
    }

    save_record(conn, &student_id, &record)?;
    Ok(json!({
        "record": record_json(&record),
        "nextPara": para::next_para(&record.already_memorized, &record.completed)
    }))
}

fn current_set(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let target = get_required_i64(params, "para")?;
    require_student(conn, &student_id)?;
    let mut record = require_record(conn, &student_id)?;

    let check = para::can_work_on(target, &record.completed, &record.already_memorized);
    if !check.allowed {
        return Err(HandlerErr {
            code: "invalid_para",
            message: check.reason,
            details: Some(json!({ "para": target })),
        });
    }

    record.current_para = Some(target);
    record.current_para_progress = 0.0;
    save_record(conn, &student_id, &record)?;
    Ok(json!({ "record": record_json(&record) }))
}

fn current_progress(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let percent = params
        .get("percent")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::new("bad_params", "missing percent"))?;
    if !(0.0..=100.0).contains(&percent) {
        return Err(HandlerErr::new("bad_params", "percent must be in [0,100]"));
    }

    require_student(conn, &student_id)?;
    let mut record = require_record(conn, &student_id)?;
    if record.current_para.is_none() {
        return Err(HandlerErr::new("bad_params", "no current para to update"));
    }

    record.current_para_progress = percent;
    save_record(conn, &student_id, &record)?;
    Ok(json!({ "record": record_json(&record) }))
}

fn para_complete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let target = get_required_i64(params, "para")?;
    require_student(conn, &student_id)?;
    let mut record = require_record(conn, &student_id)?;

    // Effective current: the stored choice when one exists, else the first
    // gap. Completion is pinned to it; see validate_completion.
    let effective_current = record
        .current_para
        .unwrap_or_else(|| para::next_para(&record.already_memorized, &record.completed));

    let check = para::validate_completion(
        target,
        effective_current,
        &record.completed,
        &record.already_memorized,
    );
    if !check.valid {
        return Err(HandlerErr {
            code: "invalid_completion",
            message: check.error,
            details: Some(json!({ "para": target, "currentPara": effective_current })),
        });
    }

    record.completed.push(target);
    let next = para::next_para(&record.already_memorized, &record.completed);
    record.current_para = if next == para::ALL_PARAS_DONE {
        None
    } else {
        Some(next)
    };
    record.current_para_progress = 0.0;

    save_record(conn, &student_id, &record)?;
    Ok(json!({
        "record": record_json(&record),
        "nextPara": next,
        "allDone": next == para::ALL_PARAS_DONE
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler = match req.method.as_str() {
        "hifz.record.open" => record_open,
        "hifz.record.setup" => record_setup,
        "hifz.current.set" => current_set,
        "hifz.current.progress" => current_progress,
        "hifz.para.complete" => para_complete,
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
