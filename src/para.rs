use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const TOTAL_PARAS: i64 = 30;

/// Sentinel returned by `next_para` once all 30 paras are memorized.
/// Never a valid para identifier; callers must treat it as "finished".
pub const ALL_PARAS_DONE: i64 = TOTAL_PARAS + 1;

/// A student's memorization record as stored. The two para lists may
/// overlap and may carry out-of-range values from older writers; every
/// operation here sanitizes before counting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HifzRecord {
    pub already_memorized: Vec<i64>,
    pub completed: Vec<i64>,
    pub current_para: Option<i64>,
    pub current_para_progress: f64,
}

/// Cumulative totals over a student's logged sessions.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTotals {
    pub total_sessions: i64,
    pub new_lesson_lines: i64,
    pub revision_lines: i64,
    pub mistakes: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkEligibility {
    pub allowed: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionCheck {
    pub valid: bool,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub total_sessions: i64,
    pub new_lesson_lines: i64,
    pub revision_lines: i64,
    pub mistakes: i64,
    pub current_para: i64,
    pub avg_lines_per_session: f64,
    pub completed_count: usize,
    pub already_memorized_count: usize,
    pub total_memorized: usize,
    pub progress_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationView {
    pub completed: Vec<i64>,
    pub already_memorized: Vec<i64>,
    pub all_memorized: Vec<i64>,
    pub all_paras: Vec<i64>,
    pub remaining: Vec<i64>,
    pub current_para: i64,
    pub current_para_progress: f64,
    pub total_memorized: usize,
    pub completion_percentage: f64,
}

pub fn in_range(para: i64) -> bool {
    (1..=TOTAL_PARAS).contains(&para)
}

fn sanitize(values: &[i64]) -> BTreeSet<i64> {
    values.iter().copied().filter(|p| in_range(*p)).collect()
}

/// Deduplicated union of the pre-enrollment and in-program sets, restricted
/// to [1,30]. This union is the authoritative "memorized" set everywhere.
fn memorized_union(already_memorized: &[i64], completed: &[i64]) -> BTreeSet<i64> {
    let mut set = sanitize(already_memorized);
    set.extend(sanitize(completed));
    set
}

/// First-gap policy: the smallest para in [1,30] not yet memorized, or the
/// `ALL_PARAS_DONE` sentinel when the union covers all 30. Gaps are never
/// skipped: memorized {1,3} yields 2, not 4.
pub fn next_para(already_memorized: &[i64], completed: &[i64]) -> i64 {
    let memorized = memorized_union(already_memorized, completed);
    (1..=TOTAL_PARAS)
        .find(|p| !memorized.contains(p))
        .unwrap_or(ALL_PARAS_DONE)
}

pub fn can_work_on(para: i64, completed: &[i64], already_memorized: &[i64]) -> WorkEligibility {
    if !in_range(para) {
        return WorkEligibility {
            allowed: false,
            reason: "out of range".to_string(),
        };
    }
    if memorized_union(already_memorized, completed).contains(&para) {
        return WorkEligibility {
            allowed: false,
            reason: "already memorized".to_string(),
        };
    }
    WorkEligibility {
        allowed: true,
        reason: String::new(),
    }
}

pub fn progress_percentage(completed: &[i64], already_memorized: &[i64]) -> f64 {
    let memorized = memorized_union(already_memorized, completed);
    100.0 * (memorized.len() as f64) / (TOTAL_PARAS as f64)
}

pub fn remaining_paras(completed: &[i64], already_memorized: &[i64]) -> Vec<i64> {
    let memorized = memorized_union(already_memorized, completed);
    (1..=TOTAL_PARAS)
        .filter(|p| !memorized.contains(p))
        .collect()
}

/// Strict completion gate: only the current para may be completed, in order
/// of the checks below. Intentionally stricter than the display paths.
pub fn validate_completion(
    target: i64,
    current: i64,
    completed: &[i64],
    already_memorized: &[i64],
) -> CompletionCheck {
    if !in_range(target) {
        return CompletionCheck {
            valid: false,
            error: "out of range".to_string(),
        };
    }
    if memorized_union(already_memorized, completed).contains(&target) {
        return CompletionCheck {
            valid: false,
            error: "already memorized".to_string(),
        };
    }
    if target != current {
        return CompletionCheck {
            valid: false,
            error: format!("para {} must be completed first", current),
        };
    }
    CompletionCheck {
        valid: true,
        error: String::new(),
    }
}

/// Read-only aggregate for the stats panel. Absent sources degrade to zero
/// fields; `None` only when there is neither a record nor any sessions,
/// which the UI renders as its empty state.
pub fn progress_stats(
    totals: Option<&SessionTotals>,
    record: Option<&HifzRecord>,
    derived_current: i64,
) -> Option<StatsView> {
    if totals.is_none() && record.is_none() {
        return None;
    }

    let empty_record = HifzRecord::default();
    let record = record.unwrap_or(&empty_record);
    let empty_totals = SessionTotals::default();
    let totals = totals.unwrap_or(&empty_totals);

    let completed = sanitize(&record.completed);
    let already = sanitize(&record.already_memorized);
    let memorized = memorized_union(&record.already_memorized, &record.completed);

    let avg_lines_per_session = if totals.total_sessions > 0 {
        (totals.new_lesson_lines + totals.revision_lines) as f64 / totals.total_sessions as f64
    } else {
        0.0
    };

    Some(StatsView {
        total_sessions: totals.total_sessions,
        new_lesson_lines: totals.new_lesson_lines,
        revision_lines: totals.revision_lines,
        mistakes: totals.mistakes,
        current_para: record.current_para.unwrap_or(derived_current),
        avg_lines_per_session,
        completed_count: completed.len(),
        already_memorized_count: already.len(),
        total_memorized: memorized.len(),
        progress_percentage: progress_percentage(&record.completed, &record.already_memorized),
    })
}

/// Canonical shape for any rendering layer. Lenient by design: a current
/// para that is already memorized passes through untouched, even though
/// `validate_completion` would refuse to complete it.
pub fn visualization(record: Option<&HifzRecord>, derived_current: i64) -> VisualizationView {
    let empty_record = HifzRecord::default();
    let record = record.unwrap_or(&empty_record);

    let completed: Vec<i64> = sanitize(&record.completed).into_iter().collect();
    let already_memorized: Vec<i64> = sanitize(&record.already_memorized).into_iter().collect();
    let all_memorized: Vec<i64> =
        memorized_union(&record.already_memorized, &record.completed)
            .into_iter()
            .collect();
    let remaining = remaining_paras(&record.completed, &record.already_memorized);
    let total_memorized = all_memorized.len();

    VisualizationView {
        completed,
        already_memorized,
        all_memorized,
        all_paras: (1..=TOTAL_PARAS).collect(),
        remaining,
        current_para: record.current_para.unwrap_or(derived_current),
        current_para_progress: record.current_para_progress,
        total_memorized,
        completion_percentage: 100.0 * (total_memorized as f64) / (TOTAL_PARAS as f64),
    }
}
