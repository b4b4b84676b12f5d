use openedu_schema::ChatMessage;

const CLASSIFY_SYSTEM: &str = r#"You route messages sent to an educational Telegram bot.
Reply with a single JSON object and nothing else:
{"intent": "quiz_now" | "quiz_scheduling" | "general", "topic": string | null, "days": integer | null}
- quiz_now: the user wants a quiz right away about some topic or text.
- quiz_scheduling: the user wants a series of quizzes spread over several days.
- general: anything else (greetings, questions, small talk).
"topic" is the subject or study material to quiz on. "days" is only set for quiz_scheduling."#;

const QUIZ_SYSTEM: &str = r#"You write multiple-choice quizzes for learners.
Reply with a single JSON object and nothing else:
{"questions": [{"question": string, "options": [string, ...], "answer": integer, "explanation": string}]}
Each question has between 2 and 6 options. "answer" is the zero-based index of the correct option."#;

const FLASHCARDS_SYSTEM: &str = r#"You write study flashcards.
Reply with a single JSON object and nothing else:
{"flashcards": [{"front": string, "back": string}]}
"front" is a short prompt or term, "back" the answer or definition."#;

const BREAKDOWN_SYSTEM: &str = r#"You plan multi-day study series.
Split the material into one focused subtopic per day, in a sensible learning order.
Reply with a single JSON object and nothing else:
{"topics": [string, ...]}"#;

const CHAT_SYSTEM: &str = r#"You are OpenEdu, a friendly study assistant on Telegram.
Answer briefly. When it fits, remind the user they can ask for a quiz on any topic
("quiz me on ...") or a daily quiz series ("quiz me on ... for 7 days")."#;

pub(super) fn classify(text: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system(CLASSIFY_SYSTEM), ChatMessage::user(text)]
}

pub(super) fn quiz(content: &str, count: usize) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(QUIZ_SYSTEM),
        ChatMessage::user(format!(
            "Write exactly {count} questions about the following material.\n\n{content}"
        )),
    ]
}

pub(super) fn flashcards(content: &str, count: usize) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(FLASHCARDS_SYSTEM),
        ChatMessage::user(format!(
            "Write exactly {count} flashcards about the following material.\n\n{content}"
        )),
    ]
}

pub(super) fn breakdown(content: &str, days: u32) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(BREAKDOWN_SYSTEM),
        ChatMessage::user(format!(
            "Plan exactly {days} days of study for the following material.\n\n{content}"
        )),
    ]
}

pub(super) fn chat(text: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system(CHAT_SYSTEM), ChatMessage::user(text)]
}
