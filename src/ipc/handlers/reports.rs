use crate::calc::{self, CalcError, StudentAcademicRecord};
use crate::config;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    bad_params, bool_or, calc_err, optional_param, required_param, required_str, store_err,
};
use crate::ipc::types::{AppState, Request};
use crate::report::{self, CertificateType, ComposeOptions, DocumentKind, SchoolMeta, Signature};
use chrono::{DateTime, Utc};
use serde_json::json;

fn parse_kind(req: &Request) -> Result<DocumentKind, serde_json::Value> {
    match req.params.get("kind").and_then(|v| v.as_str()) {
        None => Ok(DocumentKind::ResultSlip),
        Some(s) => DocumentKind::parse(s).ok_or_else(|| {
            bad_params(
                req,
                "kind must be one of: resultSlip, termReport, certificate",
                Some(json!({ "kind": s })),
            )
        }),
    }
}

fn parse_certificate_type(req: &Request) -> Result<CertificateType, serde_json::Value> {
    match req.params.get("certificateType").and_then(|v| v.as_str()) {
        None => Ok(CertificateType::Achievement),
        Some(s) => CertificateType::parse(s).ok_or_else(|| {
            bad_params(
                req,
                "certificateType must be one of: achievement, completion, excellence, participation",
                Some(json!({ "certificateType": s })),
            )
        }),
    }
}

fn parse_generated_at(req: &Request) -> Result<DateTime<Utc>, serde_json::Value> {
    match req.params.get("generatedAt").and_then(|v| v.as_str()) {
        None => Ok(Utc::now()),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                bad_params(
                    req,
                    format!("generatedAt must be RFC 3339: {}", e),
                    None,
                )
            }),
    }
}

fn compose_options(
    state: &AppState,
    req: &Request,
) -> Result<ComposeOptions, serde_json::Value> {
    let cfg = config::load_config(state.store.as_ref())
        .map_err(|e| store_err(req, "db_query_failed", e))?;
    let mut options = ComposeOptions::new(parse_kind(req)?, parse_generated_at(req)?);
    options.certificate_type = parse_certificate_type(req)?;
    options.subject_filter = optional_param(req, "subjects")?;
    options.thresholds = cfg.thresholds();
    Ok(options)
}

fn handle_reports_compose(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut student: StudentAcademicRecord = match required_param(req, "student") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let school: SchoolMeta = match required_param(req, "school") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let exam_name = match required_str(req, "examName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let signatures: Vec<Signature> = match optional_param(req, "signatures") {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return e,
    };
    let summarize = match bool_or(req, "aggregate", false) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let options = match compose_options(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    // No subjects or a zero denominator render as placeholders, not errors.
    if summarize && !student.subjects.is_empty() {
        let mut summarized = student.clone();
        match calc::summarize_student(&mut summarized) {
            Ok(()) => student = summarized,
            Err(CalcError::InvalidInput(_)) => {}
            Err(e) => return calc_err(req, e),
        }
    }

    match report::compose(&student, &school, &exam_name, &signatures, &options) {
        Ok(doc) => ok(&req.id, json!(doc)),
        Err(e) => calc_err(req, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.compose" => Some(handle_reports_compose(state, req)),
        _ => None,
    }
}
