//! # Export Module
//!
//! Flat CSV renditions of a [`GradeOutput`] for spreadsheets and learning
//! management systems:
//!
//! - [`write_summary_csv`]: one row per student with totals.
//! - [`write_detailed_csv`]: one row per student and outcome.
//! - [`write_canvas_csv`]: the two-column grade import Canvas accepts.

use std::path::Path;

use util::document::{DocumentError, ensure_parent_dir};

use crate::report::GradeOutput;

/// Header Canvas uses to match rows to students.
pub const CANVAS_STUDENT_ID_FIELD: &str = "SIS User ID";

/// Canvas column title when the rubric has no name.
pub const DEFAULT_ASSIGNMENT_NAME: &str = "Assignment";

fn write_rows<I>(path: &Path, header: &[&str], rows: I) -> Result<(), DocumentError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let csv_err = |source| DocumentError::Csv {
        path: path.to_path_buf(),
        source,
    };

    ensure_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(header).map_err(csv_err)?;
    for row in rows {
        writer.write_record(&row).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// `student_id,total_points,max_points,percentage`, percentage to two places.
pub fn write_summary_csv(output: &GradeOutput, path: &Path) -> Result<(), DocumentError> {
    let rows = output.results.iter().map(|r| {
        vec![
            r.student_id.clone(),
            r.total_points.to_string(),
            r.max_points.to_string(),
            format!("{:.2}", r.percentage),
        ]
    });
    write_rows(
        path,
        &["student_id", "total_points", "max_points", "percentage"],
        rows,
    )?;
    tracing::debug!(path = %path.display(), "Wrote summary CSV");
    Ok(())
}

/// One row per outcome. `is_correct` is blank for rules that did not apply.
pub fn write_detailed_csv(output: &GradeOutput, path: &Path) -> Result<(), DocumentError> {
    let rows = output.results.iter().flat_map(|r| {
        r.details.iter().map(move |d| {
            vec![
                r.student_id.clone(),
                d.question_id.clone(),
                d.student_answer.clone().unwrap_or_default(),
                d.correct_answer.clone().unwrap_or_default(),
                d.points_awarded.to_string(),
                d.max_points.to_string(),
                d.is_correct.map(|c| c.to_string()).unwrap_or_default(),
                d.feedback.clone(),
            ]
        })
    });
    write_rows(
        path,
        &[
            "student_id",
            "question_id",
            "student_answer",
            "correct_answer",
            "points_awarded",
            "max_points",
            "is_correct",
            "feedback",
        ],
        rows,
    )?;
    tracing::debug!(path = %path.display(), "Wrote detailed CSV");
    Ok(())
}

/// Canvas gradebook import: the student id and the total under a column named
/// after the rubric.
pub fn write_canvas_csv(output: &GradeOutput, path: &Path) -> Result<(), DocumentError> {
    let assignment = match output.metadata.rubric_name.trim() {
        "" => DEFAULT_ASSIGNMENT_NAME,
        name => name,
    };
    let rows = output
        .results
        .iter()
        .map(|r| vec![r.student_id.clone(), format!("{:.2}", r.total_points)]);
    write_rows(path, &[CANVAS_STUDENT_ID_FIELD, assignment], rows)?;
    tracing::debug!(path = %path.display(), assignment, "Wrote Canvas CSV");
    Ok(())
}
