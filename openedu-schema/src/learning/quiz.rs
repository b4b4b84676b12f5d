use serde::{Deserialize, Serialize};

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 6;

/// One multiple-choice question as stored in `quizzes.questions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub answer: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl QuizQuestion {
    pub fn is_valid(&self) -> bool {
        !self.question.trim().is_empty()
            && (MIN_OPTIONS..=MAX_OPTIONS).contains(&self.options.len())
            && self.options.iter().all(|o| !o.trim().is_empty())
            && self.answer < self.options.len()
    }
}

/// Question as shown to learners, answer withheld.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicQuizQuestion {
    pub question: String,
    pub options: Vec<String>,
}

impl From<&QuizQuestion> for PublicQuizQuestion {
    fn from(q: &QuizQuestion) -> Self {
        Self {
            question: q.question.clone(),
            options: q.options.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardDraft {
    pub front: String,
    pub back: String,
}

impl FlashcardDraft {
    pub fn is_valid(&self) -> bool {
        !self.front.trim().is_empty() && !self.back.trim().is_empty()
    }
}
