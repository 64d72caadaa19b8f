use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::document::{self, DocumentError};

/// One student's answers, keyed by question id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub student_id: String,
    #[serde(deserialize_with = "answers_as_text")]
    pub answers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl Submission {
    pub fn new<I, K, V>(student_id: impl Into<String>, answers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            student_id: student_id.into(),
            answers: answers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            metadata: BTreeMap::new(),
        }
    }

    /// The answer for `question_id`, or `""` when the student left it out.
    pub fn answer(&self, question_id: &str) -> &str {
        self.answers
            .get(question_id)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Answers in hand-written YAML are often bare numbers or booleans.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarAnswer {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
    Missing(()),
}

impl ScalarAnswer {
    fn into_text(self) -> String {
        match self {
            ScalarAnswer::Text(s) => s,
            ScalarAnswer::Integer(i) => i.to_string(),
            ScalarAnswer::Float(f) => f.to_string(),
            ScalarAnswer::Flag(b) => b.to_string(),
            ScalarAnswer::Missing(()) => String::new(),
        }
    }
}

fn answers_as_text<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, ScalarAnswer>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(question, answer)| (question.trim().to_string(), answer.into_text()))
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SubmissionDocument {
    List(Vec<Submission>),
    Wrapped { submissions: Vec<Submission> },
}

/// Loads submissions from a YAML or JSON file holding either a bare list or a
/// `submissions:` key.
pub fn load_submissions(path: impl AsRef<Path>) -> Result<Vec<Submission>, DocumentError> {
    let path = path.as_ref();
    let submissions = match document::read_document::<SubmissionDocument>(path)? {
        SubmissionDocument::List(list) => list,
        SubmissionDocument::Wrapped { submissions } => submissions,
    };

    if let Some(blank) = submissions.iter().position(|s| s.student_id.trim().is_empty()) {
        return Err(DocumentError::Invalid {
            path: path.to_path_buf(),
            message: format!("submission #{} has an empty student_id", blank + 1),
        });
    }

    tracing::debug!(path = %path.display(), count = submissions.len(), "Loaded submissions");
    Ok(submissions)
}

/// Column holding the student id in CSV submission files.
pub const DEFAULT_STUDENT_ID_COLUMN: &str = "student_id";

/// Loads one submission per row of a CSV file.
///
/// Every column other than `student_id_col` is a question id. Cells are
/// trimmed and empty cells become empty answers. The 1-based source row (the
/// header is row 1) is kept in `metadata["row_number"]`.
pub fn load_submissions_csv(
    path: impl AsRef<Path>,
    student_id_col: &str,
) -> Result<Vec<Submission>, DocumentError> {
    let path = path.as_ref();
    let csv_err = |source| DocumentError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let invalid = |message: String| DocumentError::Invalid {
        path: path.to_path_buf(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();
    if headers.is_empty() {
        return Err(invalid("CSV file is empty or has no header row".into()));
    }
    let id_index = headers
        .iter()
        .position(|h| h == student_id_col)
        .ok_or_else(|| invalid(format!("student id column '{student_id_col}' not found")))?;

    let mut submissions = Vec::new();
    for (offset, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let row_number = offset + 2;
        let student_id = record.get(id_index).unwrap_or("");
        if student_id.is_empty() {
            return Err(invalid(format!("row {row_number} has an empty student id")));
        }

        let answers = headers
            .iter()
            .zip(record.iter())
            .enumerate()
            .filter(|(i, _)| *i != id_index)
            .map(|(_, (question, answer))| (question, answer));
        let mut submission = Submission::new(student_id, answers);
        submission
            .metadata
            .insert("row_number".into(), Value::from(row_number));
        submissions.push(submission);
    }

    tracing::debug!(path = %path.display(), count = submissions.len(), "Loaded CSV submissions");
    Ok(submissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn loads_bare_list_with_scalar_answers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("subs.yaml");
        fs::write(
            &path,
            "- student_id: s1\n  answers:\n    ' Q1 ': paris\n    Q2: 42\n    Q3: 2.5\n    Q4: true\n",
        )
        .unwrap();

        let subs = load_submissions(&path).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].answer("Q1"), "paris");
        assert_eq!(subs[0].answer("Q2"), "42");
        assert_eq!(subs[0].answer("Q3"), "2.5");
        assert_eq!(subs[0].answer("Q4"), "true");
        assert_eq!(subs[0].answer("Q9"), "");
    }

    #[test]
    fn loads_wrapped_json_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("subs.json");
        fs::write(
            &path,
            r#"{"submissions": [{"student_id": "a", "answers": {"Q1": "x"}},
                               {"student_id": "b", "answers": {}}]}"#,
        )
        .unwrap();

        let subs = load_submissions(&path).unwrap();
        assert_eq!(subs.iter().map(|s| s.student_id.as_str()).collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn empty_student_id_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("subs.json");
        fs::write(&path, r#"[{"student_id": " ", "answers": {}}]"#).unwrap();

        let err = load_submissions(&path).unwrap_err();
        assert!(err.to_string().contains("submission #1"));
    }

    #[test]
    fn loads_csv_rows_with_a_custom_id_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("subs.csv");
        fs::write(&path, "sid,Q1,Q2\n s1 , Paris ,42\ns2,,\"a, b\"\n").unwrap();

        let subs = load_submissions_csv(&path, "sid").unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].student_id, "s1");
        assert_eq!(subs[0].answer("Q1"), "Paris");
        assert_eq!(subs[0].answer("Q2"), "42");
        assert!(!subs[0].answers.contains_key("sid"));
        assert_eq!(subs[0].metadata["row_number"], 2);
        assert_eq!(subs[1].answer("Q1"), "");
        assert_eq!(subs[1].answer("Q2"), "a, b");
        assert_eq!(subs[1].metadata["row_number"], 3);
    }

    #[test]
    fn csv_without_the_id_column_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("subs.csv");
        fs::write(&path, "student,Q1\ns1,x\n").unwrap();

        let err = load_submissions_csv(&path, DEFAULT_STUDENT_ID_COLUMN).unwrap_err();
        assert!(matches!(err, DocumentError::Invalid { .. }));
        assert!(err.to_string().contains("'student_id' not found"), "{err}");
    }

    #[test]
    fn csv_rows_need_a_student_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("subs.csv");
        fs::write(&path, "student_id,Q1\ns1,x\n  ,y\n").unwrap();

        let err = load_submissions_csv(&path, DEFAULT_STUDENT_ID_COLUMN).unwrap_err();
        assert!(err.to_string().contains("row 3"), "{err}");
    }

    #[test]
    fn empty_csv_has_no_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("subs.csv");
        fs::write(&path, "").unwrap();

        let err = load_submissions_csv(&path, DEFAULT_STUDENT_ID_COLUMN).unwrap_err();
        assert!(err.to_string().contains("no header row"), "{err}");
    }
}
