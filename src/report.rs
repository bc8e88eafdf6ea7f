//! Builds the in-memory document for a result slip, term report or certificate.
//! Printing and export happen outside this process; the document is a plain value.

use crate::calc::{self, round_off_1_decimal, CalcError, StudentAcademicRecord, Thresholds};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const NO_SUBJECTS_PLACEHOLDER: &str = "No subjects selected";
pub const MAX_SIGNATURES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentKind {
    ResultSlip,
    TermReport,
    Certificate,
}

impl DocumentKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resultslip" | "result_slip" | "result-slip" => Some(Self::ResultSlip),
            "termreport" | "term_report" | "term-report" => Some(Self::TermReport),
            "certificate" => Some(Self::Certificate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CertificateType {
    Achievement,
    Completion,
    Excellence,
    Participation,
}

impl CertificateType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "achievement" => Some(Self::Achievement),
            "completion" => Some(Self::Completion),
            "excellence" => Some(Self::Excellence),
            "participation" => Some(Self::Participation),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Achievement => "Certificate of Achievement",
            Self::Completion => "Certificate of Completion",
            Self::Excellence => "Certificate of Excellence",
            Self::Participation => "Certificate of Participation",
        }
    }

    fn phrase(self) -> &'static str {
        match self {
            Self::Achievement => "has demonstrated outstanding achievement in",
            Self::Completion => "has successfully completed",
            Self::Excellence => "has shown academic excellence in",
            Self::Participation => "has actively participated in",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolMeta {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRow {
    pub subject_name: String,
    pub marks_obtained: f64,
    pub total_marks: f64,
    pub grade: String,
    pub remarks: String,
    pub is_core_subject: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTable {
    pub rows: Vec<SubjectRow>,
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    Computed,
    CannotCompute,
    NoSubjects,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    pub status: SummaryStatus,
    pub marks_obtained: f64,
    pub marks_possible: f64,
    pub percentage: Option<f64>,
    /// Mean of the per-subject percentages.
    pub average_percent: Option<f64>,
    pub overall_grade: Option<String>,
    pub rank: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermFooter {
    pub days_absent: u32,
    pub passing_threshold: f64,
    /// None when the percentage cannot be computed.
    pub passed: Option<bool>,
    pub distinction: Option<bool>,
    pub verdict: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateBody {
    pub certificate_type: CertificateType,
    pub title: String,
    pub statement: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    pub kind: DocumentKind,
    pub school_name: String,
    pub school_address: String,
    pub school_logo: Option<String>,
    pub signature_image: Option<String>,
    pub exam_name: String,
    pub student: StudentAcademicRecord,
    pub generated_at: DateTime<Utc>,
    pub subject_table: Option<SubjectTable>,
    pub summary: Option<SummaryRow>,
    pub general_remarks: String,
    pub signatures: Vec<Signature>,
    pub footer: Option<TermFooter>,
    pub certificate: Option<CertificateBody>,
}

#[derive(Debug, Clone)]
pub struct ComposeOptions {
    pub kind: DocumentKind,
    pub certificate_type: CertificateType,
    /// Only these subjects (case-insensitive), in record order.
    pub subject_filter: Option<Vec<String>>,
    pub thresholds: Thresholds,
    pub generated_at: DateTime<Utc>,
}

impl ComposeOptions {
    pub fn new(kind: DocumentKind, generated_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            certificate_type: CertificateType::Achievement,
            subject_filter: None,
            thresholds: Thresholds::default(),
            generated_at,
        }
    }
}

fn subject_rows(
    student: &StudentAcademicRecord,
    filter: Option<&[String]>,
) -> Result<(Vec<SubjectRow>, bool), CalcError> {
    let mut rows = Vec::new();
    let mut computable = true;
    for s in &student.subjects {
        if let Some(names) = filter {
            let wanted = names
                .iter()
                .any(|n| n.trim().eq_ignore_ascii_case(s.subject_name.trim()));
            if !wanted {
                continue;
            }
        }
        let grade = match calc::classify(s.marks_obtained, s.total_marks) {
            Ok(letter) => letter.to_string(),
            Err(CalcError::InvalidInput(_)) => {
                computable = false;
                String::new()
            }
            Err(e) => return Err(e.within(&format!("{}/{}", student.student_id, s.subject_name))),
        };
        rows.push(SubjectRow {
            subject_name: s.subject_name.clone(),
            marks_obtained: s.marks_obtained,
            total_marks: s.total_marks,
            grade,
            remarks: s.remarks.clone(),
            is_core_subject: s.is_core_subject,
        });
    }
    Ok((rows, computable))
}

fn summarize_rows(rows: &[SubjectRow], computable: bool, rank: u32) -> SummaryRow {
    let marks_obtained: f64 = rows.iter().map(|r| r.marks_obtained).sum();
    let marks_possible: f64 = rows.iter().map(|r| r.total_marks).sum();
    let rank = if rank > 0 { Some(rank) } else { None };

    if rows.is_empty() {
        return SummaryRow {
            status: SummaryStatus::NoSubjects,
            marks_obtained,
            marks_possible,
            percentage: None,
            average_percent: None,
            overall_grade: None,
            rank,
        };
    }
    let percentage = if computable {
        calc::percentage(marks_obtained, marks_possible)
            .ok()
            .map(round_off_1_decimal)
    } else {
        None
    };
    match percentage {
        Some(pct) => {
            let subject_percent_sum: f64 = rows
                .iter()
                .map(|r| 100.0 * r.marks_obtained / r.total_marks)
                .sum();
            SummaryRow {
                status: SummaryStatus::Computed,
                marks_obtained,
                marks_possible,
                percentage: Some(pct),
                average_percent: Some(round_off_1_decimal(
                    subject_percent_sum / (rows.len() as f64),
                )),
                overall_grade: Some(calc::band_for_percent(pct).letter.to_string()),
                rank,
            }
        }
        None => SummaryRow {
            status: SummaryStatus::CannotCompute,
            marks_obtained,
            marks_possible,
            percentage: None,
            average_percent: None,
            overall_grade: None,
            rank,
        },
    }
}

fn term_footer(
    student: &StudentAcademicRecord,
    summary: &SummaryRow,
    thresholds: &Thresholds,
) -> TermFooter {
    let passed = summary.percentage.map(|p| thresholds.passed(p));
    let distinction = summary.percentage.map(|p| thresholds.distinction(p));
    let verdict = match (passed, distinction) {
        (Some(true), Some(true)) => "Passed with distinction",
        (Some(true), _) => "Passed",
        (Some(false), _) => "Failed",
        (None, _) => "Result not available",
    };
    TermFooter {
        days_absent: student.days_absent,
        passing_threshold: thresholds.passing,
        passed,
        distinction,
        verdict: verdict.to_string(),
    }
}

fn certificate_body(
    student: &StudentAcademicRecord,
    exam_name: &str,
    certificate_type: CertificateType,
) -> CertificateBody {
    let class_label = match (student.grade_level.trim(), student.section.trim()) {
        ("", _) => String::new(),
        (grade, "") => format!(" of Grade {}", grade),
        (grade, section) => format!(" of Grade {} ({})", grade, section),
    };
    CertificateBody {
        certificate_type,
        title: certificate_type.title().to_string(),
        statement: format!(
            "This is to certify that {}{} {} {}.",
            student.name.trim(),
            class_label,
            certificate_type.phrase(),
            exam_name.trim()
        ),
    }
}

/// Assemble an immutable report document. A student with no (selected) subjects gets
/// an empty table with a placeholder; a zero denominator yields a `cannot_compute`
/// summary. Only out-of-range marks and too many signatures are errors.
pub fn compose(
    student: &StudentAcademicRecord,
    school: &SchoolMeta,
    exam_name: &str,
    signatures: &[Signature],
    options: &ComposeOptions,
) -> Result<ReportDocument, CalcError> {
    if signatures.len() > MAX_SIGNATURES {
        return Err(CalcError::validation(
            "signatures",
            format!("at most {} signatures are allowed", MAX_SIGNATURES),
        ));
    }
    if school.name.trim().is_empty() {
        return Err(CalcError::validation("school.name", "must not be empty"));
    }

    let mut subject_table = None;
    let mut summary = None;
    let mut footer = None;
    let mut certificate = None;

    match options.kind {
        DocumentKind::ResultSlip | DocumentKind::TermReport => {
            let (rows, computable) = subject_rows(student, options.subject_filter.as_deref())?;
            let row_summary = summarize_rows(&rows, computable, student.rank);
            if options.kind == DocumentKind::TermReport {
                footer = Some(term_footer(student, &row_summary, &options.thresholds));
            }
            let placeholder = if rows.is_empty() {
                Some(NO_SUBJECTS_PLACEHOLDER.to_string())
            } else {
                None
            };
            subject_table = Some(SubjectTable { rows, placeholder });
            summary = Some(row_summary);
        }
        DocumentKind::Certificate => {
            certificate = Some(certificate_body(
                student,
                exam_name,
                options.certificate_type,
            ));
        }
    }

    Ok(ReportDocument {
        kind: options.kind,
        school_name: school.name.trim().to_string(),
        school_address: school.address.trim().to_string(),
        school_logo: school.logo.clone(),
        signature_image: signatures.iter().find_map(|s| s.image.clone()),
        exam_name: exam_name.trim().to_string(),
        student: student.clone(),
        generated_at: options.generated_at,
        subject_table,
        summary,
        general_remarks: student.general_remarks.clone(),
        signatures: signatures.to_vec(),
        footer,
        certificate,
    })
}
