use crate::calc::{self, CalcError, StudentAcademicRecord};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const REMARKS_A: &[&str] = &[
    "Excellent performance",
    "Outstanding work",
    "Exceptional understanding",
];
const REMARKS_B_PLUS: &[&str] = &[
    "Very good performance",
    "Strong grasp of concepts",
    "Consistently good work",
];
const REMARKS_B: &[&str] = &[
    "Good performance",
    "Solid effort",
    "Shows good understanding",
];
const REMARKS_C_PLUS: &[&str] = &["Above average", "Fair performance with room to grow"];
const REMARKS_C: &[&str] = &[
    "Average performance",
    "Satisfactory work",
    "Needs more practice",
];
const REMARKS_D: &[&str] = &[
    "Below average",
    "Needs improvement",
    "Requires extra support",
];
const REMARKS_F: &[&str] = &[
    "Poor performance",
    "Must work harder",
    "Requires immediate attention",
];

/// Candidate remarks for a letter grade, first entry is the deterministic choice.
pub fn candidates(letter: &str) -> Result<&'static [&'static str], CalcError> {
    match letter.trim() {
        "A" => Ok(REMARKS_A),
        "B+" => Ok(REMARKS_B_PLUS),
        "B" => Ok(REMARKS_B),
        "C+" => Ok(REMARKS_C_PLUS),
        "C" => Ok(REMARKS_C),
        "D" => Ok(REMARKS_D),
        "F" => Ok(REMARKS_F),
        other => Err(CalcError::validation(
            "letter",
            format!("unknown grade letter '{}'", other),
        )),
    }
}

pub fn first_remark(letter: &str) -> Result<&'static str, CalcError> {
    Ok(candidates(letter)?[0])
}

pub fn select_remark<R: Rng + ?Sized>(letter: &str, rng: &mut R) -> Result<&'static str, CalcError> {
    let options = candidates(letter)?;
    Ok(options.choose(rng).copied().unwrap_or(options[0]))
}

/// Seeded when a seed is given, entropy-backed otherwise.
pub fn remark_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Fill blank subject remarks and blank general remarks. Remarks already
/// typed are left alone. Blank subject grades are derived first.
pub fn fill_blank_remarks<R: Rng + ?Sized>(
    student: &mut StudentAcademicRecord,
    rng: &mut R,
) -> Result<(), CalcError> {
    for subject in student.subjects.iter_mut() {
        if !subject.remarks.trim().is_empty() {
            continue;
        }
        if subject.grade.is_empty() {
            subject.derive_grade()?;
        }
        subject.remarks = select_remark(&subject.grade, rng)?.to_string();
    }

    if student.general_remarks.trim().is_empty() && !student.subjects.is_empty() {
        let letter = if student.overall_grade.is_empty() {
            calc::classify(student.total_marks, student.total_possible())?
        } else {
            student.overall_grade.as_str()
        };
        student.general_remarks = select_remark(letter, rng)?.to_string();
    }
    Ok(())
}
