use serde::{Deserialize, Serialize};

/// Three-level classification derived deterministically from a 0-100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStrength {
    Weak,
    Medium,
    Strong,
}

impl TopicStrength {
    /// `>= 75` is strong, `< 50` is weak, anything between is medium.
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            TopicStrength::Strong
        } else if score < 50.0 {
            TopicStrength::Weak
        } else {
            TopicStrength::Medium
        }
    }
}

impl std::fmt::Display for TopicStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TopicStrength::Weak => "weak",
            TopicStrength::Medium => "medium",
            TopicStrength::Strong => "strong",
        };
        write!(f, "{}", s)
    }
}

/// Per-topic standing for one `(studentId, subjectId)` pair. Topic names are
/// normalized (lowercase, trimmed) before they become keys, so "Arrays" and
/// "arrays " collide to the same entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicAnalyticsEntry {
    pub score: f64,
    pub strength: TopicStrength,
    /// How many merges have touched this topic.
    pub contest_count: u32,
}

/// One topic's contribution from a freshly evaluated contest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicUpdate {
    /// When present, overwrites the stored score and recomputes strength.
    pub score: Option<f64>,
}
