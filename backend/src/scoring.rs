use crate::models::Question;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerStatus {
    NotAnswered,
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GradeTier {
    Excellent,
    Great,
    Good,
    KeepPracticing,
}

impl GradeTier {
    /// Lower bounds are inclusive: 80, 60, 40.
    pub fn from_score(score: u32) -> Self {
        match score {
            80.. => GradeTier::Excellent,
            60..=79 => GradeTier::Great,
            40..=59 => GradeTier::Good,
            _ => GradeTier::KeepPracticing,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            GradeTier::Excellent => "Excellent Work!",
            GradeTier::Great => "Great Job!",
            GradeTier::Good => "Good Effort!",
            GradeTier::KeepPracticing => "Keep Practicing!",
        }
    }

    /// Style token for the result banner.
    pub fn style(self) -> &'static str {
        match self {
            GradeTier::Excellent => "success",
            GradeTier::Great => "info",
            GradeTier::Good => "warning",
            GradeTier::KeepPracticing => "danger",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub tier: GradeTier,
    pub message: &'static str,
    pub style: &'static str,
}

impl From<GradeTier> for Grade {
    fn from(tier: GradeTier) -> Self {
        Self {
            tier,
            message: tier.message(),
            style: tier.style(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub total_questions: usize,
    pub correct_answers_count: usize,
    pub score: u32,
    pub statuses: Vec<AnswerStatus>,
    pub grade: Grade,
}

pub fn answer_status(answer: Option<&str>, correct_answer: &str) -> AnswerStatus {
    match answer {
        None => AnswerStatus::NotAnswered,
        Some(a) if a == correct_answer => AnswerStatus::Correct,
        Some(_) => AnswerStatus::Incorrect,
    }
}

/// Integer percentage rounded half-up; 0 for an empty quiz.
pub fn percentage(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    // floor(correct / total * 100 + 0.5) in integer arithmetic
    ((correct * 200 + total) / (total * 2)) as u32
}

/// Pure derivation from the quiz and the sparse answer map. Answers keyed by an
/// index outside the quiz are ignored.
pub fn score_quiz(questions: &[Question], answers: &BTreeMap<usize, String>) -> ScoreResult {
    let statuses: Vec<AnswerStatus> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| answer_status(answers.get(&i).map(String::as_str), &q.correct_answer))
        .collect();
    let correct_answers_count = statuses
        .iter()
        .filter(|s| **s == AnswerStatus::Correct)
        .count();
    let score = percentage(correct_answers_count, questions.len());
    ScoreResult {
        total_questions: questions.len(),
        correct_answers_count,
        score,
        statuses,
        grade: GradeTier::from_score(score).into(),
    }
}
