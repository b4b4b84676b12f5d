use crate::error::OpenEduError;
use openedu_schema::QuizQuestion;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizScore {
    pub correct: usize,
    pub total: usize,
    pub xp_awarded: i64,
    pub results: Vec<bool>,
}

/// Grades submitted option indices against the stored answers.
pub fn grade(
    questions: &[QuizQuestion],
    answers: &[usize],
    xp_per_correct: i64,
) -> Result<QuizScore, OpenEduError> {
    if answers.len() != questions.len() {
        return Err(OpenEduError::InvalidInput(format!(
            "expected {} answers, got {}",
            questions.len(),
            answers.len()
        )));
    }

    let results: Vec<bool> = questions
        .iter()
        .zip(answers)
        .map(|(q, a)| q.answer == *a)
        .collect();
    let correct = results.iter().filter(|r| **r).count();

    Ok(QuizScore {
        correct,
        total: questions.len(),
        xp_awarded: i64::try_from(correct)
            .unwrap_or(i64::MAX)
            .saturating_mul(xp_per_correct.max(0)),
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(answer: usize) -> QuizQuestion {
        QuizQuestion {
            question: "?".to_string(),
            options: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            answer,
            explanation: None,
        }
    }

    #[test]
    fn counts_correct_answers_and_xp() {
        let score = grade(&[q(0), q(2), q(1)], &[0, 1, 1], 10).unwrap();
        assert_eq!(score.correct, 2);
        assert_eq!(score.total, 3);
        assert_eq!(score.xp_awarded, 20);
        assert_eq!(score.results, vec![true, false, true]);
    }

    #[test]
    fn answer_count_must_match() {
        let err = grade(&[q(0), q(1)], &[0], 10).unwrap_err();
        assert!(matches!(err, OpenEduError::InvalidInput(_)));
    }
}
