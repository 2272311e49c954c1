use crate::models::Question;
use crate::scoring::{score_quiz, ScoreResult};
use crate::validation::option_label;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Active,
    /// Submit was requested with unanswered questions left.
    ConfirmingSubmit,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionAction {
    SelectAnswer { answer: String },
    NextQuestion,
    PreviousQuestion,
    GoToQuestion { index: usize },
    SubmitQuiz,
    ConfirmSubmit,
    CancelSubmit,
    ResetQuiz,
}

impl SessionAction {
    /// Wire name of the action, as used in the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SelectAnswer { .. } => "select_answer",
            Self::NextQuestion => "next_question",
            Self::PreviousQuestion => "previous_question",
            Self::GoToQuestion { .. } => "go_to_question",
            Self::SubmitQuiz => "submit_quiz",
            Self::ConfirmSubmit => "confirm_submit",
            Self::CancelSubmit => "cancel_submit",
            Self::ResetQuiz => "reset_quiz",
        }
    }
}

/// One quiz-taking attempt. The question list is fixed for the attempt's lifetime
/// and assumed valid; it is never re-validated here.
#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<Question>,
    current_index: usize,
    answers: BTreeMap<usize, String>,
    phase: SessionPhase,
}

impl QuizSession {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            current_index: 0,
            answers: BTreeMap::new(),
            phase: SessionPhase::Active,
        }
    }

    pub fn apply(&mut self, action: SessionAction) -> bool {
        let kind = action.kind();
        let accepted = match action {
            SessionAction::SelectAnswer { answer } => self.select_answer(answer),
            SessionAction::NextQuestion => self.next_question(),
            SessionAction::PreviousQuestion => self.previous_question(),
            SessionAction::GoToQuestion { index } => self.go_to_question(index),
            SessionAction::SubmitQuiz => self.submit_quiz(),
            SessionAction::ConfirmSubmit => self.confirm_submit(),
            SessionAction::CancelSubmit => self.cancel_submit(),
            SessionAction::ResetQuiz => {
                self.reset_quiz();
                true
            }
        };
        if !accepted {
            debug!(action = kind, phase = ?self.phase, "session action refused");
        }
        accepted
    }

    pub fn select_answer(&mut self, answer: impl Into<String>) -> bool {
        if self.is_completed() || self.questions.is_empty() {
            return false;
        }
        self.answers.insert(self.current_index, answer.into());
        true
    }

    pub fn next_question(&mut self) -> bool {
        if self.is_completed() || self.is_last_question() || self.questions.is_empty() {
            return false;
        }
        self.current_index += 1;
        true
    }

    pub fn previous_question(&mut self) -> bool {
        if self.is_completed() || self.current_index == 0 {
            return false;
        }
        self.current_index -= 1;
        true
    }

    /// Jumps to `index`, clamped to the last question.
    pub fn go_to_question(&mut self, index: usize) -> bool {
        if self.is_completed() || self.questions.is_empty() {
            return false;
        }
        self.current_index = index.min(self.questions.len() - 1);
        true
    }

    /// Completes straight away when everything is answered, otherwise asks for
    /// confirmation first.
    pub fn submit_quiz(&mut self) -> bool {
        if self.phase != SessionPhase::Active {
            return false;
        }
        self.phase = if self.is_all_answered() {
            SessionPhase::Completed
        } else {
            SessionPhase::ConfirmingSubmit
        };
        true
    }

    pub fn confirm_submit(&mut self) -> bool {
        if self.phase != SessionPhase::ConfirmingSubmit {
            return false;
        }
        self.phase = SessionPhase::Completed;
        true
    }

    pub fn cancel_submit(&mut self) -> bool {
        if self.phase != SessionPhase::ConfirmingSubmit {
            return false;
        }
        self.phase = SessionPhase::Active;
        true
    }

    /// Retake: forget all answers and start over from the first question.
    pub fn reset_quiz(&mut self) {
        self.answers.clear();
        self.current_index = 0;
        self.phase = SessionPhase::Active;
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    pub fn answers(&self) -> &BTreeMap<usize, String> {
        &self.answers
    }

    pub fn answer_for(&self, index: usize) -> Option<&str> {
        self.answers.get(&index).map(String::as_str)
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Position-based progress in percent; 0 for an empty quiz.
    pub fn progress(&self) -> f64 {
        if self.questions.is_empty() {
            return 0.0;
        }
        (self.current_index + 1) as f64 / self.questions.len() as f64 * 100.0
    }

    pub fn is_first_question(&self) -> bool {
        self.current_index == 0
    }

    pub fn is_last_question(&self) -> bool {
        self.current_index + 1 == self.questions.len()
    }

    pub fn is_all_answered(&self) -> bool {
        self.answered_count() == self.total_questions()
    }

    pub fn show_results(&self) -> bool {
        self.is_completed()
    }

    pub fn submit_dialog_open(&self) -> bool {
        self.phase == SessionPhase::ConfirmingSubmit
    }

    pub fn is_completed(&self) -> bool {
        self.phase == SessionPhase::Completed
    }

    /// Score of the current answers. Available at any time; only meaningful to
    /// show once the session is completed.
    pub fn score(&self) -> ScoreResult {
        score_quiz(&self.questions, &self.answers)
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            phase: self.phase,
            current_question_index: self.current_index,
            current_question: self.current_question().map(QuestionView::from),
            answers: self.answers.clone(),
            total_questions: self.total_questions(),
            answered_count: self.answered_count(),
            progress: self.progress(),
            is_first_question: self.is_first_question(),
            is_last_question: self.is_last_question(),
            is_all_answered: self.is_all_answered(),
            show_results: self.show_results(),
            submit_dialog_open: self.submit_dialog_open(),
            result: self.is_completed().then(|| self.score()),
        }
    }
}

/// A question as shown to the quiz taker: the correct answer stays hidden until
/// the result is revealed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub question_text: String,
    pub options: Vec<String>,
    pub option_labels: Vec<String>,
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        Self {
            question_text: q.question_text.clone(),
            options: q.options.clone(),
            option_labels: (0..q.options.len()).map(option_label).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub phase: SessionPhase,
    pub current_question_index: usize,
    pub current_question: Option<QuestionView>,
    pub answers: BTreeMap<usize, String>,
    pub total_questions: usize,
    pub answered_count: usize,
    pub progress: f64,
    pub is_first_question: bool,
    pub is_last_question: bool,
    pub is_all_answered: bool,
    pub show_results: bool,
    pub submit_dialog_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ScoreResult>,
}
