use crate::models::Question;
use crate::validation::{can_add_option, can_remove_option, is_question_valid, valid_options, MIN_OPTIONS};
use serde::{Deserialize, Serialize};

/// The question currently being authored. Unlike [`Question`] it may hold blank
/// option slots and a correct answer that does not match any option yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DraftAction {
    SetQuestionText { text: String },
    SetOption { index: usize, value: String },
    AddOption,
    RemoveOption { index: usize },
    SetCorrectAnswer { answer: String },
    Reset,
}

impl Default for QuestionDraft {
    fn default() -> Self {
        Self {
            question_text: String::new(),
            options: vec![String::new(); MIN_OPTIONS],
            correct_answer: String::new(),
        }
    }
}

impl From<&Question> for QuestionDraft {
    fn from(q: &Question) -> Self {
        Self {
            question_text: q.question_text.clone(),
            options: q.options.clone(),
            correct_answer: q.correct_answer.clone(),
        }
    }
}

impl QuestionDraft {
    /// Applies one action. Returns `false` when the action was refused (out of
    /// range index, option bounds) and the draft is unchanged.
    pub fn apply(&mut self, action: DraftAction) -> bool {
        match action {
            DraftAction::SetQuestionText { text } => {
                self.question_text = text;
                true
            }
            DraftAction::SetOption { index, value } => match self.options.get_mut(index) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            },
            DraftAction::AddOption => {
                if !can_add_option(self.options.len()) {
                    return false;
                }
                self.options.push(String::new());
                true
            }
            DraftAction::RemoveOption { index } => {
                if !can_remove_option(self.options.len()) || index >= self.options.len() {
                    return false;
                }
                let removed = self.options.remove(index);
                if removed == self.correct_answer {
                    self.correct_answer.clear();
                }
                true
            }
            DraftAction::SetCorrectAnswer { answer } => {
                self.correct_answer = answer;
                true
            }
            DraftAction::Reset => {
                *self = Self::default();
                true
            }
        }
    }

    pub fn set_question_text(&mut self, text: impl Into<String>) {
        self.apply(DraftAction::SetQuestionText { text: text.into() });
    }

    pub fn set_option(&mut self, index: usize, value: impl Into<String>) -> bool {
        self.apply(DraftAction::SetOption {
            index,
            value: value.into(),
        })
    }

    pub fn add_option(&mut self) -> bool {
        self.apply(DraftAction::AddOption)
    }

    pub fn remove_option(&mut self, index: usize) -> bool {
        self.apply(DraftAction::RemoveOption { index })
    }

    pub fn set_correct_answer(&mut self, answer: impl Into<String>) {
        self.apply(DraftAction::SetCorrectAnswer {
            answer: answer.into(),
        });
    }

    pub fn reset(&mut self) {
        self.apply(DraftAction::Reset);
    }

    pub fn is_valid(&self) -> bool {
        is_question_valid(&self.question_text, &self.options, &self.correct_answer)
    }

    /// The committed form of this draft: trimmed text, blank slots dropped.
    /// `None` while the draft is not valid.
    pub fn to_question(&self) -> Option<Question> {
        if !self.is_valid() {
            return None;
        }
        Some(Question {
            question_text: self.question_text.trim().to_string(),
            options: valid_options(&self.options),
            correct_answer: self.correct_answer.clone(),
        })
    }
}
