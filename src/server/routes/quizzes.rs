use super::{charge_for, optional_json, user_by_address};
use crate::db::DbQuiz;
use crate::error::OpenEduError;
use crate::learning::{QuizScore, grade, quiz_link};
use crate::server::router::OpenEduState;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use openedu_schema::PublicQuizQuestion;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Upper bound for a caller-supplied question or card count.
pub(crate) const MAX_GENERATION_COUNT: usize = 20;

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    pub count: Option<usize>,
}

impl GenerateRequest {
    pub(crate) fn count_or(&self, default: usize) -> usize {
        self.count.unwrap_or(default).clamp(1, MAX_GENERATION_COUNT)
    }
}

#[derive(Debug, Serialize)]
pub struct QuizSummary {
    pub public_id: String,
    pub note_id: i64,
    pub url: String,
    pub question_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PublicQuiz {
    pub public_id: String,
    pub note_id: i64,
    pub questions: Vec<PublicQuizQuestion>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub address: String,
    pub answers: Vec<usize>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    #[serde(flatten)]
    pub score: QuizScore,
    pub xp_total: i64,
}

fn summarize(state: &OpenEduState, quiz: &DbQuiz) -> Result<QuizSummary, OpenEduError> {
    Ok(QuizSummary {
        public_id: quiz.public_id.clone(),
        note_id: quiz.note_id,
        url: quiz_link(&state.services.settings.web_base_url, &quiz.public_id),
        question_count: quiz.questions()?.len(),
        created_at: quiz.created_at,
    })
}

/// POST /notes/{id}/quiz
pub async fn generate_quiz(
    State(state): State<OpenEduState>,
    Path(note_id): Path<i64>,
    body: Bytes,
) -> Result<(StatusCode, Json<QuizSummary>), OpenEduError> {
    let req: GenerateRequest = optional_json(&body)?;
    let count = req.count_or(state.services.settings.scheduler.questions_per_quiz);

    let note = state.services.db.get_note(note_id).await?;
    let quiz = charge_for(&state, note.user_id, || async {
        let questions = state.services.llm.generate_quiz(&note.content, count).await?;
        state.services.db.create_quiz(note.id, questions).await
    })
    .await?;

    info!(note_id, quiz = %quiz.public_id, "quiz generated");
    Ok((StatusCode::CREATED, Json(summarize(&state, &quiz)?)))
}

/// GET /notes/{id}/quizzes
pub async fn list_note_quizzes(
    State(state): State<OpenEduState>,
    Path(note_id): Path<i64>,
) -> Result<Json<Vec<QuizSummary>>, OpenEduError> {
    let note = state.services.db.get_note(note_id).await?;
    let quizzes = state.services.db.list_quizzes(note.id).await?;
    let summaries = quizzes
        .iter()
        .map(|q| summarize(&state, q))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(summaries))
}

/// GET /quizzes/{public_id}
///
/// Answers and explanations are withheld.
pub async fn get_quiz(
    State(state): State<OpenEduState>,
    Path(public_id): Path<String>,
) -> Result<Json<PublicQuiz>, OpenEduError> {
    let quiz = state.services.db.get_quiz_by_public_id(public_id).await?;
    let questions = quiz.questions()?;
    Ok(Json(PublicQuiz {
        public_id: quiz.public_id,
        note_id: quiz.note_id,
        questions: questions.iter().map(PublicQuizQuestion::from).collect(),
        created_at: quiz.created_at,
    }))
}

/// POST /quizzes/{public_id}/submit
pub async fn submit_quiz(
    State(state): State<OpenEduState>,
    Path(public_id): Path<String>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, OpenEduError> {
    let Json(req) = payload?;
    let quiz = state.services.db.get_quiz_by_public_id(public_id).await?;
    let user = user_by_address(&state, &req.address).await?;

    let score = grade(
        &quiz.questions()?,
        &req.answers,
        state.services.settings.rewards.xp_per_correct,
    )?;

    let xp_total = if score.xp_awarded > 0 {
        state.services.db.add_xp(user.id, score.xp_awarded).await?.xp
    } else {
        user.xp
    };

    info!(
        user_id = user.id,
        quiz = %quiz.public_id,
        correct = score.correct,
        total = score.total,
        xp_awarded = score.xp_awarded,
        "quiz submitted"
    );
    Ok(Json(SubmitResponse { score, xp_total }))
}
