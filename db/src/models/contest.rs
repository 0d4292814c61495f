use serde::{Deserialize, Serialize};

/// One input/expected-output pair run against a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

/// A contest question with its reference material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    /// 1-based position inside the contest; bulk imports resolve by number.
    pub number: u32,
    pub title: String,
    pub description: String,
    pub reference_solution: String,
    #[serde(default)]
    pub code_template: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    /// Topic tags produced by analysis housekeeping; empty until tagged.
    #[serde(default)]
    pub topics: Vec<String>,
}

/// A contest and its ordered questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    pub id: String,
    pub subject_id: String,
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Contest {
    pub fn question_by_id(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn question_by_number(&self, number: u32) -> Option<&Question> {
        self.questions.iter().find(|q| q.number == number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contest() -> Contest {
        Contest {
            id: "c1".into(),
            subject_id: "algo".into(),
            title: "Week 1".into(),
            questions: vec![Question {
                id: "q1".into(),
                number: 1,
                title: "Sum".into(),
                description: "Add two numbers.".into(),
                reference_solution: "a + b".into(),
                code_template: String::new(),
                test_cases: vec![],
                topics: vec![],
            }],
        }
    }

    #[test]
    fn test_question_lookup_by_id_and_number() {
        let contest = contest();
        assert_eq!(contest.question_by_id("q1").unwrap().title, "Sum");
        assert_eq!(contest.question_by_number(1).unwrap().id, "q1");
        assert!(contest.question_by_id("missing").is_none());
        assert!(contest.question_by_number(2).is_none());
    }
}
