pub mod contest;
pub mod subject_score;
pub mod submission;
pub mod topic_analytics;

pub use contest::{Contest, Question, TestCase};
pub use subject_score::{ContestEntry, NormalizedContestEntry, SubjectScore};
pub use submission::{Submission, SubmissionStatus};
pub use topic_analytics::{TopicAnalyticsEntry, TopicStrength, TopicUpdate};
