use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Round-half-up to one decimal, used for every stored and displayed percentage:
/// `floor(10*x + 0.5) / 10`
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    /// A mark or denominator rejected at entry. `field` names the offending input.
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
    /// A percentage cannot be computed (zero denominator).
    #[error("cannot compute: {0}")]
    InvalidInput(String),
}

impl CalcError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        CalcError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CalcError::Validation { .. } => "validation_error",
            CalcError::InvalidInput(_) => "invalid_input",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            CalcError::Validation { field, .. } => Some(json!({ "field": field })),
            CalcError::InvalidInput(_) => None,
        }
    }

    /// Prefix the error with the record it came from, e.g. `s-01/Mathematics.marksObtained`.
    pub fn within(self, scope: &str) -> Self {
        match self {
            CalcError::Validation { field, message } => CalcError::Validation {
                field: format!("{}.{}", scope, field),
                message,
            },
            CalcError::InvalidInput(message) => {
                CalcError::InvalidInput(format!("{}: {}", scope, message))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBand {
    pub min_percent: f64,
    pub max_percent: f64,
    pub letter: &'static str,
}

impl GradeBand {
    /// `[min, max)`, except the top band which also holds 100.
    pub fn contains(&self, percent: f64) -> bool {
        if percent < self.min_percent {
            return false;
        }
        percent < self.max_percent || (self.max_percent >= 100.0 && percent <= 100.0)
    }
}

/// Descending by `min_percent`, non-overlapping, covering `[0, 100]`.
pub const GRADE_BANDS: [GradeBand; 7] = [
    GradeBand {
        min_percent: 90.0,
        max_percent: 100.0,
        letter: "A",
    },
    GradeBand {
        min_percent: 80.0,
        max_percent: 90.0,
        letter: "B+",
    },
    GradeBand {
        min_percent: 70.0,
        max_percent: 80.0,
        letter: "B",
    },
    GradeBand {
        min_percent: 60.0,
        max_percent: 70.0,
        letter: "C+",
    },
    GradeBand {
        min_percent: 50.0,
        max_percent: 60.0,
        letter: "C",
    },
    GradeBand {
        min_percent: 40.0,
        max_percent: 50.0,
        letter: "D",
    },
    GradeBand {
        min_percent: 0.0,
        max_percent: 40.0,
        letter: "F",
    },
];

pub fn band_for_percent(percent: f64) -> &'static GradeBand {
    GRADE_BANDS
        .iter()
        .find(|b| b.contains(percent))
        .unwrap_or(&GRADE_BANDS[GRADE_BANDS.len() - 1])
}

/// Position of a letter in the band table; 0 is the highest grade.
pub fn grade_ordinal(letter: &str) -> Option<usize> {
    GRADE_BANDS.iter().position(|b| b.letter == letter)
}

pub fn validate_mark(marks_obtained: f64, total_marks: f64) -> Result<(), CalcError> {
    if !total_marks.is_finite() {
        return Err(CalcError::validation(
            "totalMarks",
            "must be a finite number",
        ));
    }
    if total_marks <= 0.0 {
        return Err(CalcError::validation("totalMarks", "must be greater than 0"));
    }
    if !marks_obtained.is_finite() {
        return Err(CalcError::validation(
            "marksObtained",
            "must be a finite number",
        ));
    }
    if marks_obtained < 0.0 || marks_obtained > total_marks {
        return Err(CalcError::validation(
            "marksObtained",
            format!("must be between 0 and {}", total_marks),
        ));
    }
    Ok(())
}

/// Unrounded percentage of a validated mark.
pub fn percentage(marks_obtained: f64, total_marks: f64) -> Result<f64, CalcError> {
    if total_marks == 0.0 {
        return Err(CalcError::InvalidInput(
            "totalMarks is 0, percentage is undefined".to_string(),
        ));
    }
    validate_mark(marks_obtained, total_marks)?;
    Ok(100.0 * marks_obtained / total_marks)
}

pub fn classify_band(marks_obtained: f64, total_marks: f64) -> Result<&'static GradeBand, CalcError> {
    Ok(band_for_percent(percentage(marks_obtained, total_marks)?))
}

pub fn classify(marks_obtained: f64, total_marks: f64) -> Result<&'static str, CalcError> {
    Ok(classify_band(marks_obtained, total_marks)?.letter)
}

fn default_total_marks() -> f64 {
    100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectResult {
    pub subject_name: String,
    pub marks_obtained: f64,
    #[serde(default = "default_total_marks")]
    pub total_marks: f64,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub is_core_subject: bool,
}

impl SubjectResult {
    /// Re-derive `grade` from the current marks.
    pub fn derive_grade(&mut self) -> Result<(), CalcError> {
        self.grade = classify(self.marks_obtained, self.total_marks)?.to_string();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAcademicRecord {
    pub student_id: String,
    pub name: String,
    #[serde(default)]
    pub grade_level: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub subjects: Vec<SubjectResult>,
    #[serde(default)]
    pub total_marks: f64,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub overall_grade: String,
    /// 1-based within the grade+section cohort; 0 until ranked.
    #[serde(default)]
    pub rank: u32,
    #[serde(default)]
    pub general_remarks: String,
    #[serde(default)]
    pub days_absent: u32,
}

impl StudentAcademicRecord {
    fn cohort_key(&self) -> (String, String) {
        (
            self.grade_level.trim().to_ascii_lowercase(),
            self.section.trim().to_ascii_lowercase(),
        )
    }

    pub fn total_possible(&self) -> f64 {
        self.subjects.iter().map(|s| s.total_marks).sum()
    }
}

/// Derive subject grades, totals, percentage and overall grade for one student.
pub fn summarize_student(student: &mut StudentAcademicRecord) -> Result<(), CalcError> {
    if student.subjects.is_empty() {
        return Err(CalcError::InvalidInput(format!(
            "student {} has no subjects",
            student.student_id
        )));
    }

    let mut obtained = 0.0_f64;
    let mut possible = 0.0_f64;
    for subject in student.subjects.iter_mut() {
        subject
            .derive_grade()
            .map_err(|e| e.within(&format!("{}/{}", student.student_id, subject.subject_name)))?;
        obtained += subject.marks_obtained;
        possible += subject.total_marks;
    }

    let stored = round_off_1_decimal(
        percentage(obtained, possible).map_err(|e| e.within(&student.student_id))?,
    );
    // Grade, pass and distinction all read the stored one-decimal value.
    student.total_marks = obtained;
    student.percentage = stored;
    student.overall_grade = band_for_percent(stored).letter.to_string();
    Ok(())
}

/// Rank by stored percentage within each grade+section cohort. Equal percentages keep
/// input order and still get distinct positions.
fn assign_ranks(cohort: &mut [StudentAcademicRecord]) {
    let mut groups: HashMap<(String, String), Vec<usize>> = HashMap::new();
    for (i, s) in cohort.iter().enumerate() {
        groups.entry(s.cohort_key()).or_default().push(i);
    }

    for (_, mut members) in groups {
        members.sort_by(|a, b| {
            cohort[*b]
                .percentage
                .partial_cmp(&cohort[*a].percentage)
                .unwrap_or(Ordering::Equal)
        });
        for (pos, idx) in members.into_iter().enumerate() {
            cohort[idx].rank = (pos as u32) + 1;
        }
    }
}

/// Populate totals, percentage, overall grade and rank. The cohort is consumed and
/// returned in input order.
pub fn aggregate(
    cohort: Vec<StudentAcademicRecord>,
) -> Result<Vec<StudentAcademicRecord>, CalcError> {
    let mut cohort = cohort;
    for student in cohort.iter_mut() {
        summarize_student(student)?;
    }
    assign_ranks(&mut cohort);
    Ok(cohort)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    pub passing: f64,
    pub distinction: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            passing: 40.0,
            distinction: 75.0,
        }
    }
}

impl Thresholds {
    pub fn passed(&self, percentage: f64) -> bool {
        percentage >= self.passing
    }

    pub fn distinction(&self, percentage: f64) -> bool {
        percentage >= self.distinction
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCount {
    pub letter: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub subject_name: String,
    pub average_percent: f64,
    pub student_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortStats {
    pub student_count: usize,
    pub class_average: Option<f64>,
    pub highest: Option<f64>,
    pub lowest: Option<f64>,
    pub pass_count: usize,
    pub fail_count: usize,
    pub distinction_count: usize,
    pub grade_distribution: Vec<GradeCount>,
    pub subject_averages: Vec<SubjectAverage>,
}

/// Dashboard statistics over already aggregated records.
pub fn cohort_stats(records: &[StudentAcademicRecord], thresholds: &Thresholds) -> CohortStats {
    let mut grade_distribution: Vec<GradeCount> = GRADE_BANDS
        .iter()
        .map(|b| GradeCount {
            letter: b.letter,
            count: 0,
        })
        .collect();

    let mut sum = 0.0_f64;
    let mut highest: Option<f64> = None;
    let mut lowest: Option<f64> = None;
    let mut pass_count = 0usize;
    let mut distinction_count = 0usize;

    // Keep first-seen subject order for the dashboard table.
    let mut subject_order: Vec<String> = Vec::new();
    let mut subject_totals: HashMap<String, (f64, usize)> = HashMap::new();

    for r in records {
        sum += r.percentage;
        highest = Some(highest.map_or(r.percentage, |h| h.max(r.percentage)));
        lowest = Some(lowest.map_or(r.percentage, |l| l.min(r.percentage)));
        if thresholds.passed(r.percentage) {
            pass_count += 1;
        }
        if thresholds.distinction(r.percentage) {
            distinction_count += 1;
        }
        if let Some(ord) = grade_ordinal(&r.overall_grade) {
            grade_distribution[ord].count += 1;
        }

        for s in &r.subjects {
            if s.total_marks <= 0.0 {
                continue;
            }
            let key = s.subject_name.trim().to_string();
            let entry = subject_totals.entry(key.clone()).or_insert_with(|| {
                subject_order.push(key);
                (0.0, 0)
            });
            entry.0 += 100.0 * s.marks_obtained / s.total_marks;
            entry.1 += 1;
        }
    }

    let student_count = records.len();
    let class_average = if student_count > 0 {
        Some(round_off_1_decimal(sum / (student_count as f64)))
    } else {
        None
    };

    let subject_averages = subject_order
        .into_iter()
        .filter_map(|name| {
            let (total, count) = subject_totals.get(&name).copied()?;
            Some(SubjectAverage {
                average_percent: round_off_1_decimal(total / (count as f64)),
                student_count: count,
                subject_name: name,
            })
        })
        .collect();

    CohortStats {
        student_count,
        class_average,
        highest,
        lowest,
        pass_count,
        fail_count: student_count - pass_count,
        distinction_count,
        grade_distribution,
        subject_averages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn subject(name: &str, marks: f64, total: f64) -> SubjectResult {
        SubjectResult {
            subject_name: name.to_string(),
            marks_obtained: marks,
            total_marks: total,
            grade: String::new(),
            remarks: String::new(),
            is_core_subject: false,
        }
    }

    fn student(id: &str, subjects: Vec<SubjectResult>) -> StudentAcademicRecord {
        StudentAcademicRecord {
            student_id: id.to_string(),
            name: format!("Student {}", id),
            grade_level: "10".to_string(),
            section: "A".to_string(),
            subjects,
            total_marks: 0.0,
            percentage: 0.0,
            overall_grade: String::new(),
            rank: 0,
            general_remarks: String::new(),
            days_absent: 0,
        }
    }

    #[test]
    fn round_off_is_half_up() {
        assert_eq!(round_off_1_decimal(0.0), 0.0);
        assert_eq!(round_off_1_decimal(84.04), 84.0);
        assert_eq!(round_off_1_decimal(88.25), 88.3);
        assert_eq!(round_off_1_decimal(72.44), 72.4);
    }

    #[test]
    fn classify_band_boundaries() {
        assert_eq!(classify(85.0, 100.0), Ok("B+"));
        assert_eq!(classify(40.0, 100.0), Ok("D"));
        assert_eq!(classify(39.0, 100.0), Ok("F"));
        assert_eq!(classify(100.0, 100.0), Ok("A"));
        assert_eq!(classify(90.0, 100.0), Ok("A"));
        assert_eq!(classify(0.0, 100.0), Ok("F"));
        assert_eq!(classify(45.0, 50.0), Ok("A"));
        assert_eq!(classify(30.0, 50.0), Ok("C+"));
    }

    #[test]
    fn classify_zero_total_is_invalid_input() {
        let e = classify(10.0, 0.0).unwrap_err();
        assert_eq!(e.code(), "invalid_input");
        let e = classify(0.0, 0.0).unwrap_err();
        assert!(matches!(e, CalcError::InvalidInput(_)));
    }

    #[test]
    fn out_of_range_marks_are_rejected_not_clamped() {
        let e = classify(-1.0, 100.0).unwrap_err();
        assert_eq!(
            e,
            CalcError::validation("marksObtained", "must be between 0 and 100")
        );
        assert_eq!(classify(101.0, 100.0).unwrap_err().code(), "validation_error");
        assert_eq!(
            validate_mark(10.0, -5.0).unwrap_err(),
            CalcError::validation("totalMarks", "must be greater than 0")
        );
        assert_eq!(validate_mark(f64::NAN, 100.0).unwrap_err().code(), "validation_error");
    }

    #[test]
    fn aggregate_scenario_420_of_500() {
        let s = student(
            "s-1",
            vec![
                subject("English", 90.0, 100.0),
                subject("Mathematics", 80.0, 100.0),
                subject("Science", 85.0, 100.0),
                subject("Social Studies", 75.0, 100.0),
                subject("Computer", 90.0, 100.0),
            ],
        );
        let out = aggregate(vec![s]).expect("aggregate");
        assert_eq!(out[0].total_marks, 420.0);
        assert_eq!(out[0].percentage, 84.0);
        assert_eq!(out[0].overall_grade, "B+");
        assert_eq!(out[0].rank, 1);
        let grades: Vec<&str> = out[0].subjects.iter().map(|s| s.grade.as_str()).collect();
        assert_eq!(grades, vec!["A", "B+", "B+", "B", "A"]);
    }

    #[test]
    fn aggregate_ranks_three_students() {
        // 84.0, 88.2, 72.4
        let cohort = vec![
            student("a", vec![subject("English", 420.0, 500.0)]),
            student("b", vec![subject("English", 441.0, 500.0)]),
            student("c", vec![subject("English", 362.0, 500.0)]),
        ];
        let out = aggregate(cohort).expect("aggregate");
        let pcts: Vec<f64> = out.iter().map(|s| s.percentage).collect();
        assert_eq!(pcts, vec![84.0, 88.2, 72.4]);
        let ranks: Vec<u32> = out.iter().map(|s| s.rank).collect();
        assert_eq!(ranks, vec![2, 1, 3]);
    }

    #[test]
    fn ranks_are_per_grade_and_section() {
        let mut b = student("b", vec![subject("English", 50.0, 100.0)]);
        b.section = "B".to_string();
        let cohort = vec![
            student("a1", vec![subject("English", 60.0, 100.0)]),
            b,
            student("a2", vec![subject("English", 70.0, 100.0)]),
        ];
        let out = aggregate(cohort).expect("aggregate");
        assert_eq!(out[0].rank, 2);
        assert_eq!(out[1].rank, 1);
        assert_eq!(out[2].rank, 1);
    }

    #[test]
    fn equal_percentages_keep_input_order() {
        let cohort = vec![
            student("first", vec![subject("English", 70.0, 100.0)]),
            student("top", vec![subject("English", 95.0, 100.0)]),
            student("second", vec![subject("English", 70.0, 100.0)]),
        ];
        let out = aggregate(cohort).expect("aggregate");
        assert_eq!(out[1].rank, 1);
        assert_eq!(out[0].rank, 2);
        assert_eq!(out[2].rank, 3);
    }

    #[test]
    fn student_without_subjects_is_invalid_input() {
        let e = aggregate(vec![student("empty", vec![])]).unwrap_err();
        assert_eq!(e.code(), "invalid_input");
        assert!(e.to_string().contains("empty"));
    }

    #[test]
    fn invalid_subject_mark_names_the_record() {
        let e = aggregate(vec![student("s-9", vec![subject("Science", 120.0, 100.0)])])
            .unwrap_err();
        assert_eq!(
            e.details(),
            Some(json!({ "field": "s-9/Science.marksObtained" }))
        );
    }

    #[test]
    fn cohort_stats_counts_pass_and_distinction() {
        let cohort = aggregate(vec![
            student("a", vec![subject("English", 80.0, 100.0), subject("Science", 40.0, 50.0)]),
            student("b", vec![subject("English", 30.0, 100.0), subject("Science", 10.0, 50.0)]),
            student("c", vec![subject("English", 60.0, 100.0), subject("Science", 20.0, 50.0)]),
        ])
        .expect("aggregate");
        let stats = cohort_stats(&cohort, &Thresholds::default());
        assert_eq!(stats.student_count, 3);
        assert_eq!(stats.pass_count, 2);
        assert_eq!(stats.fail_count, 1);
        assert_eq!(stats.distinction_count, 1);
        assert_eq!(stats.highest, Some(80.0));
        assert_eq!(stats.lowest, Some(26.7));
        assert_eq!(stats.grade_distribution.len(), GRADE_BANDS.len());
        let b_plus = stats
            .grade_distribution
            .iter()
            .find(|g| g.letter == "B+")
            .map(|g| g.count);
        assert_eq!(b_plus, Some(1));
        assert_eq!(stats.subject_averages[0].subject_name, "English");
        assert_eq!(stats.subject_averages[0].average_percent, 56.7);
        assert_eq!(stats.subject_averages[1].average_percent, 46.7);
    }

    #[test]
    fn overall_grade_follows_stored_percentage() {
        let cohort = aggregate(vec![
            student("low", vec![subject("English", 39.96, 100.0)]),
            student("high", vec![subject("English", 89.96, 100.0)]),
        ])
        .expect("aggregate");
        assert_eq!(cohort[0].percentage, 40.0);
        assert_eq!(cohort[0].overall_grade, "D");
        assert_eq!(cohort[1].percentage, 90.0);
        assert_eq!(cohort[1].overall_grade, "A");
        // Subject grades still use the exact ratio.
        assert_eq!(cohort[0].subjects[0].grade, "F");
        assert_eq!(cohort[1].subjects[0].grade, "B+");

        let stats = cohort_stats(&cohort, &Thresholds::default());
        assert_eq!(stats.pass_count, 2);
        let count = |letter: &str| {
            stats
                .grade_distribution
                .iter()
                .find(|g| g.letter == letter)
                .map(|g| g.count)
        };
        assert_eq!(count("F"), Some(0));
        assert_eq!(count("D"), Some(1));
        assert_eq!(count("A"), Some(1));
    }

    #[test]
    fn cohort_stats_empty_cohort() {
        let stats = cohort_stats(&[], &Thresholds::default());
        assert_eq!(stats.student_count, 0);
        assert_eq!(stats.class_average, None);
        assert_eq!(stats.fail_count, 0);
        assert!(stats.subject_averages.is_empty());
    }

    proptest! {
        #[test]
        fn classify_band_contains_percentage(
            (total, marks) in (1u32..=500).prop_flat_map(|t| (Just(t), 0..=t))
        ) {
            let band = classify_band(marks as f64, total as f64).expect("classify");
            let pct = 100.0 * marks as f64 / total as f64;
            prop_assert!(grade_ordinal(band.letter).is_some());
            prop_assert!(band.contains(pct), "{} not in {:?}", pct, band);
        }

        #[test]
        fn classify_is_monotone(
            (total, m1, m2) in (1u32..=200).prop_flat_map(|t| (Just(t), 0..=t, 0..=t))
        ) {
            let (hi, lo) = if m1 >= m2 { (m1, m2) } else { (m2, m1) };
            let g_hi = grade_ordinal(classify(hi as f64, total as f64).expect("hi")).expect("ord");
            let g_lo = grade_ordinal(classify(lo as f64, total as f64).expect("lo")).expect("ord");
            prop_assert!(g_hi <= g_lo);
        }

        #[test]
        fn aggregate_is_idempotent_and_ranks_follow_percentage(
            marks in prop::collection::vec(prop::collection::vec(0u32..=100, 1..5), 1..12)
        ) {
            let cohort: Vec<StudentAcademicRecord> = marks
                .iter()
                .enumerate()
                .map(|(i, row)| {
                    let subjects = row
                        .iter()
                        .enumerate()
                        .map(|(j, m)| subject(&format!("S{}", j), *m as f64, 100.0))
                        .collect();
                    student(&format!("s{}", i), subjects)
                })
                .collect();

            let once = aggregate(cohort).expect("first pass");
            let twice = aggregate(once.clone()).expect("second pass");
            prop_assert_eq!(&once, &twice);

            let mut ranks: Vec<u32> = once.iter().map(|s| s.rank).collect();
            ranks.sort_unstable();
            let expected: Vec<u32> = (1..=once.len() as u32).collect();
            prop_assert_eq!(ranks, expected);

            for a in &once {
                for b in &once {
                    if a.percentage > b.percentage {
                        prop_assert!(a.rank < b.rank);
                    }
                }
            }
        }
    }
}
