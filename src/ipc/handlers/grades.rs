use crate::calc::{self, StudentAcademicRecord};
use crate::config;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    bool_or, calc_err, optional_u64, required_f64, required_param, required_str, store_err,
};
use crate::ipc::types::{AppState, Request};
use crate::remarks;
use serde_json::json;

fn handle_grades_scale(_state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "bands": calc::GRADE_BANDS }))
}

fn handle_grades_classify(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let marks = match required_f64(req, "marksObtained") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let total = match required_f64(req, "totalMarks") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let percentage = match calc::percentage(marks, total) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };
    let band = calc::band_for_percent(percentage);
    ok(
        &req.id,
        json!({
            "letter": band.letter,
            "percentage": calc::round_off_1_decimal(percentage),
            "band": band,
        }),
    )
}

fn handle_marks_validate(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let marks = match required_f64(req, "marksObtained") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let total = match required_f64(req, "totalMarks") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match calc::validate_mark(marks, total) {
        Ok(()) => ok(&req.id, json!({ "valid": true })),
        Err(e) => calc_err(req, e),
    }
}

fn handle_remarks_select(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let letter = match required_str(req, "letter") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let seed = match optional_u64(req, "seed") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let deterministic = match bool_or(req, "deterministic", false) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let picked = if deterministic {
        remarks::first_remark(&letter)
    } else {
        remarks::select_remark(&letter, &mut remarks::remark_rng(seed))
    };
    match picked {
        Ok(remark) => ok(&req.id, json!({ "letter": letter, "remark": remark })),
        Err(e) => calc_err(req, e),
    }
}

/// Shared by aggregate and stats: optional config overlay, then aggregation.
fn aggregate_cohort(
    state: &AppState,
    req: &Request,
) -> Result<(Vec<StudentAcademicRecord>, config::EngineConfig), serde_json::Value> {
    let mut cohort: Vec<StudentAcademicRecord> = required_param(req, "cohort")?;
    let apply_subject_config = bool_or(req, "applySubjectConfig", false)?;
    let cfg = config::load_config(state.store.as_ref())
        .map_err(|e| store_err(req, "db_query_failed", e))?;

    if apply_subject_config {
        for record in cohort.iter_mut() {
            cfg.apply_to_record(record);
        }
    }
    let cohort = calc::aggregate(cohort).map_err(|e| calc_err(req, e))?;
    Ok((cohort, cfg))
}

fn handle_results_aggregate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let fill_remarks = match bool_or(req, "fillRemarks", false) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let seed = match optional_u64(req, "seed") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (mut cohort, _) = match aggregate_cohort(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    if fill_remarks {
        let mut rng = remarks::remark_rng(seed);
        for record in cohort.iter_mut() {
            if let Err(e) = remarks::fill_blank_remarks(record, &mut rng) {
                return calc_err(req, e);
            }
        }
    }
    ok(&req.id, json!({ "cohort": cohort }))
}

fn handle_results_cohort_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (cohort, cfg) = match aggregate_cohort(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let thresholds = cfg.thresholds();
    let stats = calc::cohort_stats(&cohort, &thresholds);
    ok(
        &req.id,
        json!({
            "thresholds": thresholds,
            "stats": stats,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.scale" => Some(handle_grades_scale(state, req)),
        "grades.classify" => Some(handle_grades_classify(state, req)),
        "marks.validate" => Some(handle_marks_validate(state, req)),
        "remarks.select" => Some(handle_remarks_select(state, req)),
        "results.aggregate" => Some(handle_results_aggregate(state, req)),
        "results.cohortStats" => Some(handle_results_cohort_stats(state, req)),
        _ => None,
    }
}
