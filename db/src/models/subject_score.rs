use serde::{Deserialize, Serialize};

/// A raw contest mark as recorded by an admin: points earned out of the
/// contest's own maximum, on whatever scale that contest used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestEntry {
    pub contest_id: String,
    pub raw_score: f64,
    pub max_score: f64,
}

/// One contest entry after normalization to the common 0-50 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedContestEntry {
    pub contest_id: String,
    pub raw_score: f64,
    pub max_score: f64,
    /// `raw/max x 50`, clamped to [0, 50].
    pub normalized: f64,
}

/// A student's composite standing in one subject, keyed by
/// `studentId_subjectId`. Recomputed wholesale on every score publish, never
/// incrementally, so re-publication with the same inputs is idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectScore {
    pub student_id: String,
    pub subject_id: String,
    pub contest_entries: Vec<NormalizedContestEntry>,
    /// Contest performance scaled into the 0-40 band of the composite.
    pub contest_scaled40: f64,
    /// Mock-assessment score clamped to [0, 60].
    pub mock_score: f64,
    /// Bounded composite in [0, 100].
    pub total: f64,
}
