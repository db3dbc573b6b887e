mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, setup_student, spawn_sidecar, temp_dir};

#[test]
fn session_totals_feed_the_stats_view() {
    let workspace = temp_dir("hifzd-sessions-stats");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_class_id, student_id) = setup_student(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "hifz.record.setup",
        json!({ "studentId": student_id, "alreadyMemorized": [1, 2] }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "hifz.sessions.log",
        json!({
            "studentId": student_id,
            "date": "2026-08-24",
            "para": 3,
            "newLessonLines": 15,
            "revisionLines": 10,
            "mistakes": 2,
            "note": "good recall"
        }),
    );
    // Counts default to zero when omitted.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "hifz.sessions.log",
        json!({
            "studentId": student_id,
            "date": "2026-08-25",
            "para": 1,
            "newLessonLines": 15
        }),
    );

    let progress = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "hifz.progress.open",
        json!({ "studentId": student_id }),
    );
    let stats = progress.get("stats").expect("stats");
    assert_eq!(stats.get("totalSessions").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(
        stats.get("newLessonLines").and_then(|v| v.as_i64()),
        Some(30)
    );
    assert_eq!(stats.get("revisionLines").and_then(|v| v.as_i64()), Some(10));
    assert_eq!(stats.get("mistakes").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(
        stats.get("avgLinesPerSession").and_then(|v| v.as_f64()),
        Some(20.0)
    );
    assert_eq!(stats.get("completedCount").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(
        stats.get("alreadyMemorizedCount").and_then(|v| v.as_i64()),
        Some(2)
    );
    assert_eq!(stats.get("totalMemorized").and_then(|v| v.as_i64()), Some(2));
}

#[test]
fn stats_appear_with_sessions_but_no_record() {
    let workspace = temp_dir("hifzd-sessions-norecord");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_class_id, student_id) = setup_student(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "hifz.sessions.log",
        json!({ "studentId": student_id, "date": "2026-08-25", "para": 1, "revisionLines": 8 }),
    );

    let progress = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "hifz.progress.open",
        json!({ "studentId": student_id }),
    );
    // Sessions alone are enough data: record-derived fields degrade to zero.
    let stats = progress.get("stats").expect("stats");
    assert_eq!(stats.get("totalSessions").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(stats.get("totalMemorized").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(
        stats.get("progressPercentage").and_then(|v| v.as_f64()),
        Some(0.0)
    );
    assert_eq!(stats.get("currentPara").and_then(|v| v.as_i64()), Some(1));
}

#[test]
fn sessions_list_is_newest_first_and_limited() {
    let workspace = temp_dir("hifzd-sessions-list");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_class_id, student_id) = setup_student(&mut stdin, &mut reader, &workspace);

    for (id, date, para) in [
        ("1", "2026-08-20", 1),
        ("2", "2026-08-22", 2),
        ("3", "2026-08-21", 3),
    ] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            id,
            "hifz.sessions.log",
            json!({ "studentId": student_id, "date": date, "para": para }),
        );
    }

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "hifz.sessions.list",
        json!({ "studentId": student_id }),
    );
    let dates: Vec<&str> = listed
        .get("sessions")
        .and_then(|v| v.as_array())
        .expect("sessions")
        .iter()
        .filter_map(|s| s.get("date").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(dates, vec!["2026-08-22", "2026-08-21", "2026-08-20"]);

    let limited = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "hifz.sessions.list",
        json!({ "studentId": student_id, "limit": 1 }),
    );
    assert_eq!(
        limited
            .get("sessions")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );
}

#[test]
fn session_log_validates_inputs() {
    let workspace = temp_dir("hifzd-sessions-validate");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_class_id, student_id) = setup_student(&mut stdin, &mut reader, &workspace);

    let _ = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "hifz.sessions.log",
        json!({ "studentId": student_id, "date": "25/08/2026", "para": 1 }),
        "bad_params",
    );
    let error = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "hifz.sessions.log",
        json!({ "studentId": student_id, "date": "2026-08-25", "para": 31 }),
        "invalid_para",
    );
    assert_eq!(
        error.get("message").and_then(|v| v.as_str()),
        Some("out of range")
    );
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "hifz.sessions.log",
        json!({ "studentId": student_id, "date": "2026-08-25", "para": 1, "mistakes": -1 }),
        "bad_params",
    );
}
