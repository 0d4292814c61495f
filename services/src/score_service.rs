//! Score normalization, aggregation, and topic-analytics merging.
//!
//! Contests are marked on arbitrary point scales, so every entry is first
//! normalized to a common 0-50 scale, then the normalized sum is mapped into
//! the 0-40 band of the composite subject score. The mock assessment
//! contributes the remaining 0-60 band directly. All arithmetic here is pure
//! and recomputed wholesale on every publish; the service wrapper only adds
//! persistence on top.

use crate::error::ServiceError;
use db::models::{
    ContestEntry, NormalizedContestEntry, SubjectScore, TopicAnalyticsEntry, TopicStrength,
    TopicUpdate,
};
use db::{composite_key, DocumentStore};
use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const SUBJECT_SCORES_COLLECTION: &str = "subject_scores";
pub const TOPIC_ANALYTICS_COLLECTION: &str = "topic_analytics";

/// Width of the per-contest normalized scale.
const CONTEST_SCALE: f64 = 50.0;
/// Band of the composite reserved for contest performance.
const CONTEST_BAND: f64 = 40.0;
/// Band of the composite reserved for the mock assessment.
const MOCK_BAND: f64 = 60.0;

/// Normalizes raw contest entries to the common 0-50 scale.
///
/// An entry with a zero, negative, or non-finite maximum cannot be
/// normalized meaningfully; it is excluded entirely rather than counted as a
/// zero, so a bad import never drags the aggregate down.
pub fn normalize_contest_entries(entries: &[ContestEntry]) -> Vec<NormalizedContestEntry> {
    entries
        .iter()
        .filter(|entry| {
            entry.max_score.is_finite() && entry.max_score > 0.0 && entry.raw_score.is_finite()
        })
        .map(|entry| NormalizedContestEntry {
            contest_id: entry.contest_id.clone(),
            raw_score: entry.raw_score,
            max_score: entry.max_score,
            normalized: (entry.raw_score / entry.max_score * CONTEST_SCALE)
                .clamp(0.0, CONTEST_SCALE),
        })
        .collect()
}

/// Computes the composite subject score from raw inputs.
///
/// The contest portion is the normalized sum over the participating entries
/// divided by the maximum attainable sum (`count x 50`, floored at 1 so an
/// empty list yields zero instead of dividing by zero), scaled into the 0-40
/// band. The mock score is clamped to its 0-60 band and the total to [0, 100].
pub fn compose_subject_score(
    student_id: &str,
    subject_id: &str,
    entries: &[ContestEntry],
    mock_score: f64,
) -> SubjectScore {
    let contest_entries = normalize_contest_entries(entries);

    let normalized_sum: f64 = contest_entries.iter().map(|e| e.normalized).sum();
    let attainable = (contest_entries.len() as f64 * CONTEST_SCALE).max(1.0);
    let contest_scaled40 = normalized_sum / attainable * CONTEST_BAND;

    let mock_score = if mock_score.is_finite() {
        mock_score.clamp(0.0, MOCK_BAND)
    } else {
        0.0
    };
    let total = (contest_scaled40 + mock_score).clamp(0.0, 100.0);

    SubjectScore {
        student_id: student_id.to_string(),
        subject_id: subject_id.to_string(),
        contest_entries,
        contest_scaled40,
        mock_score,
        total,
    }
}

/// Folds one round of topic updates into the stored analytics map.
///
/// Topic keys are normalized (trimmed, lowercased) before lookup; empty keys
/// are dropped. Every touched topic gains one contest count. An update that
/// carries a score overwrites the stored score and recomputes the strength;
/// one without a score only bumps the count.
pub fn merge_topic_updates(
    analytics: &mut BTreeMap<String, TopicAnalyticsEntry>,
    updates: &BTreeMap<String, TopicUpdate>,
) {
    for (topic, update) in updates {
        let key = topic.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        match analytics.get_mut(&key) {
            Some(entry) => {
                if let Some(score) = update.score {
                    entry.score = score;
                    entry.strength = TopicStrength::from_score(score);
                }
                entry.contest_count += 1;
            }
            None => {
                let score = update.score.unwrap_or(0.0);
                analytics.insert(
                    key,
                    TopicAnalyticsEntry {
                        score,
                        strength: TopicStrength::from_score(score),
                        contest_count: 1,
                    },
                );
            }
        }
    }
}

pub struct ScoreService {
    store: Arc<dyn DocumentStore>,
}

impl ScoreService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Recomputes and stores a student's composite score for one subject.
    /// The whole document is replaced, so republishing the same inputs is
    /// idempotent.
    pub async fn publish_subject_score(
        &self,
        student_id: &str,
        subject_id: &str,
        entries: &[ContestEntry],
        mock_score: f64,
    ) -> Result<SubjectScore, ServiceError> {
        let score = compose_subject_score(student_id, subject_id, entries, mock_score);
        let key = composite_key(&[student_id, subject_id]);
        self.store
            .put(SUBJECT_SCORES_COLLECTION, &key, serde_json::to_value(&score)?)
            .await?;
        info!(
            "subject score published for {key}: contest {:.1} + mock {:.1} = {:.1}",
            score.contest_scaled40, score.mock_score, score.total
        );
        Ok(score)
    }

    pub async fn get_subject_score(
        &self,
        student_id: &str,
        subject_id: &str,
    ) -> Result<Option<SubjectScore>, ServiceError> {
        let key = composite_key(&[student_id, subject_id]);
        match self.store.get(SUBJECT_SCORES_COLLECTION, &key).await? {
            Some(document) => Ok(Some(serde_json::from_value(document)?)),
            None => Ok(None),
        }
    }

    /// Applies one evaluation's topic updates to the student's analytics
    /// document for the subject, creating it on first touch.
    pub async fn merge_topic_analytics(
        &self,
        student_id: &str,
        subject_id: &str,
        updates: &BTreeMap<String, TopicUpdate>,
    ) -> Result<BTreeMap<String, TopicAnalyticsEntry>, ServiceError> {
        let key = composite_key(&[student_id, subject_id]);
        let mut analytics: BTreeMap<String, TopicAnalyticsEntry> =
            match self.store.get(TOPIC_ANALYTICS_COLLECTION, &key).await? {
                Some(document) => serde_json::from_value(document)?,
                None => BTreeMap::new(),
            };

        merge_topic_updates(&mut analytics, updates);

        self.store
            .put(TOPIC_ANALYTICS_COLLECTION, &key, serde_json::to_value(&analytics)?)
            .await?;
        Ok(analytics)
    }

    pub async fn get_topic_analytics(
        &self,
        student_id: &str,
        subject_id: &str,
    ) -> Result<BTreeMap<String, TopicAnalyticsEntry>, ServiceError> {
        let key = composite_key(&[student_id, subject_id]);
        match self.store.get(TOPIC_ANALYTICS_COLLECTION, &key).await? {
            Some(document) => Ok(serde_json::from_value(document)?),
            None => Ok(BTreeMap::new()),
        }
    }
}

/// Builds topic updates from an evaluation report's per-topic scores.
pub fn updates_from_topic_scores(
    topic_scores: &BTreeMap<String, f64>,
) -> BTreeMap<String, TopicUpdate> {
    topic_scores
        .iter()
        .map(|(topic, score)| (topic.clone(), TopicUpdate { score: Some(*score) }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::MemoryStore;

    fn entry(contest_id: &str, raw: f64, max: f64) -> ContestEntry {
        ContestEntry {
            contest_id: contest_id.into(),
            raw_score: raw,
            max_score: max,
        }
    }

    #[test]
    fn test_compose_worked_example() {
        // Two contests on different point scales: 18/20 normalizes to 45 and
        // 8/10 to 40, so the sum 85 over attainable 100 lands at 34.0 in the
        // contest band, plus a mock of 55.
        let score = compose_subject_score(
            "s1",
            "algo",
            &[entry("c1", 18.0, 20.0), entry("c2", 8.0, 10.0)],
            55.0,
        );
        assert_eq!(score.contest_entries[0].normalized, 45.0);
        assert_eq!(score.contest_entries[1].normalized, 40.0);
        assert_eq!(score.contest_scaled40, 34.0);
        assert_eq!(score.mock_score, 55.0);
        assert_eq!(score.total, 89.0);
    }

    #[test]
    fn test_normalize_handles_arbitrary_scales() {
        let normalized = normalize_contest_entries(&[entry("c1", 30.0, 100.0)]);
        assert_eq!(normalized[0].normalized, 15.0);
    }

    #[test]
    fn test_normalize_excludes_unusable_maxima() {
        let normalized = normalize_contest_entries(&[
            entry("zero", 10.0, 0.0),
            entry("negative", 10.0, -5.0),
            entry("nan", 10.0, f64::NAN),
            entry("ok", 25.0, 50.0),
        ]);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].contest_id, "ok");
    }

    #[test]
    fn test_normalize_clamps_overshoot() {
        // Bonus points can push raw past max; the scale still tops out at 50.
        let normalized = normalize_contest_entries(&[entry("c1", 60.0, 50.0)]);
        assert_eq!(normalized[0].normalized, 50.0);
    }

    #[test]
    fn test_compose_with_no_contests_is_mock_only() {
        let score = compose_subject_score("s1", "algo", &[], 48.0);
        assert_eq!(score.contest_scaled40, 0.0);
        assert_eq!(score.total, 48.0);
    }

    #[test]
    fn test_compose_clamps_mock_band_and_total() {
        let score = compose_subject_score("s1", "algo", &[entry("c1", 50.0, 50.0)], 95.0);
        assert_eq!(score.mock_score, 60.0);
        assert_eq!(score.total, 100.0);

        let nan_mock = compose_subject_score("s1", "algo", &[], f64::NAN);
        assert_eq!(nan_mock.mock_score, 0.0);
        assert_eq!(nan_mock.total, 0.0);
    }

    #[test]
    fn test_merge_updates_creates_then_reclassifies() {
        let mut analytics = BTreeMap::new();

        let mut first = BTreeMap::new();
        first.insert("Arrays".to_string(), TopicUpdate { score: Some(80.0) });
        merge_topic_updates(&mut analytics, &first);

        let arrays = &analytics["arrays"];
        assert_eq!(arrays.score, 80.0);
        assert_eq!(arrays.strength, TopicStrength::Strong);
        assert_eq!(arrays.contest_count, 1);

        let mut second = BTreeMap::new();
        second.insert(" arrays ".to_string(), TopicUpdate { score: Some(40.0) });
        merge_topic_updates(&mut analytics, &second);

        let arrays = &analytics["arrays"];
        assert_eq!(arrays.score, 40.0);
        assert_eq!(arrays.strength, TopicStrength::Weak);
        assert_eq!(arrays.contest_count, 2);
    }

    #[test]
    fn test_merge_update_without_score_only_counts() {
        let mut analytics = BTreeMap::new();
        let mut first = BTreeMap::new();
        first.insert("graphs".to_string(), TopicUpdate { score: Some(66.0) });
        merge_topic_updates(&mut analytics, &first);

        let mut second = BTreeMap::new();
        second.insert("graphs".to_string(), TopicUpdate { score: None });
        second.insert("  ".to_string(), TopicUpdate { score: Some(10.0) });
        merge_topic_updates(&mut analytics, &second);

        assert_eq!(analytics.len(), 1);
        let graphs = &analytics["graphs"];
        assert_eq!(graphs.score, 66.0);
        assert_eq!(graphs.strength, TopicStrength::Medium);
        assert_eq!(graphs.contest_count, 2);
    }

    #[tokio::test]
    async fn test_publish_is_idempotent() {
        let service = ScoreService::new(Arc::new(MemoryStore::new()));
        let entries = [entry("c1", 45.0, 50.0), entry("c2", 40.0, 50.0)];

        service
            .publish_subject_score("s1", "algo", &entries, 55.0)
            .await
            .unwrap();
        service
            .publish_subject_score("s1", "algo", &entries, 55.0)
            .await
            .unwrap();

        let stored = service.get_subject_score("s1", "algo").await.unwrap().unwrap();
        assert_eq!(stored.total, 89.0);
        assert_eq!(stored.contest_entries.len(), 2);
    }

    #[tokio::test]
    async fn test_merge_topic_analytics_persists_across_calls() {
        let service = ScoreService::new(Arc::new(MemoryStore::new()));

        let mut first = BTreeMap::new();
        first.insert("arrays".to_string(), TopicUpdate { score: Some(80.0) });
        service
            .merge_topic_analytics("s1", "algo", &first)
            .await
            .unwrap();

        let mut second = BTreeMap::new();
        second.insert("arrays".to_string(), TopicUpdate { score: Some(40.0) });
        let merged = service
            .merge_topic_analytics("s1", "algo", &second)
            .await
            .unwrap();

        assert_eq!(merged["arrays"].contest_count, 2);
        assert_eq!(merged["arrays"].strength, TopicStrength::Weak);

        let stored = service.get_topic_analytics("s1", "algo").await.unwrap();
        assert_eq!(stored, merged);
    }
}
