use super::client::LlmClient;
use super::parse::extract_json;
use super::prompts;
use crate::error::LlmError;
use openedu_schema::{ChatCompletionRequest, FlashcardDraft, Intent, IntentDecision, QuizQuestion};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Series length used when a scheduling request names no day count.
pub const DEFAULT_SCHEDULE_DAYS: u32 = 7;

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(default)]
    question: String,
    #[serde(default, alias = "choices")]
    options: Vec<String>,
    #[serde(default, alias = "correct", alias = "answer_index")]
    answer: Value,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuizEnvelope {
    Wrapped { questions: Vec<RawQuestion> },
    Bare(Vec<RawQuestion>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FlashcardEnvelope {
    Wrapped {
        #[serde(alias = "cards")]
        flashcards: Vec<FlashcardDraft>,
    },
    Bare(Vec<FlashcardDraft>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TopicsEnvelope {
    Wrapped {
        #[serde(alias = "days", alias = "breakdown")]
        topics: Vec<String>,
    },
    Bare(Vec<String>),
}

impl LlmClient {
    /// Classifies a free-text Telegram message.
    ///
    /// Transport failures are returned; output that cannot be read is treated as `general`.
    pub async fn classify_intent(
        &self,
        text: &str,
        max_days: u32,
    ) -> Result<IntentDecision, LlmError> {
        let request = ChatCompletionRequest::new(self.model(), prompts::classify(text))
            .with_temperature(0.0)
            .json_mode();
        let output = self.complete("classify_intent", request).await?;

        let decision = extract_json::<IntentDecision>(&output).unwrap_or_else(|| {
            warn!(output = %format!("{output:.200}"), "unreadable intent output, using general");
            IntentDecision::general()
        });
        let decision = normalize_decision(decision, text, max_days);
        debug!(intent = decision.intent.as_str(), topic = ?decision.topic, days = ?decision.days, "intent classified");
        Ok(decision)
    }

    pub async fn generate_quiz(
        &self,
        content: &str,
        count: usize,
    ) -> Result<Vec<QuizQuestion>, LlmError> {
        let count = count.max(1);
        let request = ChatCompletionRequest::new(self.model(), prompts::quiz(content, count))
            .with_temperature(self.temperature())
            .json_mode();
        let output = self.complete("generate_quiz", request).await?;

        let raw = match extract_json::<QuizEnvelope>(&output) {
            Some(QuizEnvelope::Wrapped { questions }) | Some(QuizEnvelope::Bare(questions)) => {
                questions
            }
            None => return Err(LlmError::Malformed("quiz output is not JSON".to_string())),
        };

        let offered = raw.len();
        let questions: Vec<QuizQuestion> = raw
            .into_iter()
            .filter_map(into_question)
            .take(count)
            .collect();

        if questions.is_empty() {
            return Err(LlmError::Malformed(format!(
                "none of the {offered} generated questions were usable"
            )));
        }
        if questions.len() < offered.min(count) {
            debug!(offered, kept = questions.len(), "dropped invalid quiz questions");
        }
        Ok(questions)
    }

    pub async fn generate_flashcards(
        &self,
        content: &str,
        count: usize,
    ) -> Result<Vec<FlashcardDraft>, LlmError> {
        let count = count.max(1);
        let request = ChatCompletionRequest::new(self.model(), prompts::flashcards(content, count))
            .with_temperature(self.temperature())
            .json_mode();
        let output = self.complete("generate_flashcards", request).await?;

        let drafts = match extract_json::<FlashcardEnvelope>(&output) {
            Some(FlashcardEnvelope::Wrapped { flashcards })
            | Some(FlashcardEnvelope::Bare(flashcards)) => flashcards,
            None => {
                return Err(LlmError::Malformed(
                    "flashcard output is not JSON".to_string(),
                ));
            }
        };

        let cards: Vec<FlashcardDraft> = drafts
            .into_iter()
            .map(|d| FlashcardDraft {
                front: d.front.trim().to_string(),
                back: d.back.trim().to_string(),
            })
            .filter(FlashcardDraft::is_valid)
            .take(count)
            .collect();

        if cards.is_empty() {
            return Err(LlmError::Malformed("no usable flashcards".to_string()));
        }
        Ok(cards)
    }

    /// Splits study material into exactly `days` subtopics.
    pub async fn breakdown(&self, content: &str, days: u32) -> Result<Vec<String>, LlmError> {
        let days = days.max(1);
        let request = ChatCompletionRequest::new(self.model(), prompts::breakdown(content, days))
            .with_temperature(self.temperature())
            .json_mode();
        let output = self.complete("breakdown", request).await?;

        let topics = match extract_json::<TopicsEnvelope>(&output) {
            Some(TopicsEnvelope::Wrapped { topics }) | Some(TopicsEnvelope::Bare(topics)) => topics,
            None => {
                warn!("unreadable breakdown output, repeating the whole content");
                Vec::new()
            }
        };
        Ok(normalize_breakdown(topics, days, content))
    }

    pub async fn chat(&self, text: &str) -> Result<String, LlmError> {
        let request = ChatCompletionRequest::new(self.model(), prompts::chat(text))
            .with_temperature(self.temperature());
        self.complete("chat", request).await
    }
}

/// Cleans a classifier decision: trims the topic, bounds `days`, and fills defaults.
pub fn normalize_decision(mut decision: IntentDecision, text: &str, max_days: u32) -> IntentDecision {
    let max_days = max_days.max(1);

    decision.topic = decision
        .topic
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    match decision.intent {
        Intent::General => {
            decision.topic = None;
            decision.days = None;
        }
        Intent::QuizNow => {
            decision.days = None;
            if decision.topic.is_none() {
                decision.topic = Some(text.trim().to_string());
            }
        }
        Intent::QuizScheduling => {
            let days = decision.days.unwrap_or(DEFAULT_SCHEDULE_DAYS);
            decision.days = Some(days.clamp(1, max_days));
            if decision.topic.is_none() {
                decision.topic = Some(text.trim().to_string());
            }
        }
    }
    decision
}

/// Forces a per-day topic list to exactly `days` entries.
///
/// Extra entries are dropped, missing ones are filled by cycling, and an empty list
/// repeats `content` for every day.
pub fn normalize_breakdown(topics: Vec<String>, days: u32, content: &str) -> Vec<String> {
    let days = days.max(1) as usize;
    let topics: Vec<String> = topics
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    if topics.is_empty() {
        return vec![content.trim().to_string(); days];
    }

    topics.iter().cycle().take(days).cloned().collect()
}

fn into_question(raw: RawQuestion) -> Option<QuizQuestion> {
    let options: Vec<String> = raw.options.iter().map(|o| o.trim().to_string()).collect();
    let answer = resolve_answer(&raw.answer, &options)?;
    let question = QuizQuestion {
        question: raw.question.trim().to_string(),
        options,
        answer,
        explanation: raw
            .explanation
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty()),
    };
    question.is_valid().then_some(question)
}

/// Accepts an index, a numeric string, a letter (`"B"`), or the option text itself.
fn resolve_answer(answer: &Value, options: &[String]) -> Option<usize> {
    match answer {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<usize>() {
                return Some(n);
            }
            if let Some(idx) = options.iter().position(|o| o.eq_ignore_ascii_case(s)) {
                return Some(idx);
            }
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => {
                    Some((c.to_ascii_uppercase() as u8 - b'A') as usize)
                }
                _ => None,
            }
        }
        _ => None,
    }
}
