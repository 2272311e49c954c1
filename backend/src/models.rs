use crate::validation::{MAX_OPTIONS, MIN_OPTIONS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_TITLE_LEN: usize = 100;
pub const MIN_QUESTIONS: usize = 1;
pub const MAX_QUESTIONS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

/// What the builder hands to the persistence layer on save.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizPayload {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub questions: Vec<Question>,
}

impl QuizPayload {
    /// Trims title and description the way the stored document does; a blank
    /// description is dropped.
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        for q in &mut self.questions {
            q.question_text = q.question_text.trim().to_string();
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizRecord {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub questions: Vec<Question>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub questions_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&QuizRecord> for QuizSummary {
    fn from(q: &QuizRecord) -> Self {
        Self {
            id: q.id.clone(),
            title: q.title.clone(),
            description: q.description.clone(),
            questions_count: q.questions.len(),
            created_at: q.created_at,
            updated_at: q.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub profile_photo: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub issue: String,
}

impl ValidationIssue {
    fn new(field: impl Into<String>, issue: &str) -> Self {
        Self {
            field: field.into(),
            issue: issue.into(),
        }
    }
}

/// Document-level rules enforced on every create/update, independent of how the
/// questions were authored.
pub fn validate_quiz(quiz: &QuizPayload) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    let title = quiz.title.trim();
    if title.is_empty() {
        issues.push(ValidationIssue::new("title", "must not be empty"));
    } else if title.chars().count() > MAX_TITLE_LEN {
        issues.push(ValidationIssue::new("title", "must not exceed 100 characters"));
    }

    if quiz.questions.len() < MIN_QUESTIONS || quiz.questions.len() > MAX_QUESTIONS {
        issues.push(ValidationIssue::new(
            "questions",
            "must contain between 1 and 50 questions",
        ));
    }

    for (i, q) in quiz.questions.iter().enumerate() {
        if q.question_text.trim().is_empty() {
            issues.push(ValidationIssue::new(
                format!("questions[{i}].questionText"),
                "must not be empty",
            ));
        }
        if q.options.len() < MIN_OPTIONS || q.options.len() > MAX_OPTIONS {
            issues.push(ValidationIssue::new(
                format!("questions[{i}].options"),
                "must contain between 2 and 6 options",
            ));
        }
        for (j, opt) in q.options.iter().enumerate() {
            if opt.trim().is_empty() {
                issues.push(ValidationIssue::new(
                    format!("questions[{i}].options[{j}]"),
                    "must not be empty",
                ));
            }
        }
        if q.correct_answer.is_empty() {
            issues.push(ValidationIssue::new(
                format!("questions[{i}].correctAnswer"),
                "must not be empty",
            ));
        } else if !q.options.contains(&q.correct_answer) {
            issues.push(ValidationIssue::new(
                format!("questions[{i}].correctAnswer"),
                "must be one of the options",
            ));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str, options: &[&str], answer: &str) -> Question {
        Question {
            question_text: text.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_answer: answer.into(),
        }
    }

    fn sample_payload() -> QuizPayload {
        QuizPayload {
            title: "Geography".into(),
            description: Some("Capitals".into()),
            questions: vec![
                question("Capital of France", &["Paris", "Rome"], "Paris"),
                question("Capital of Italy", &["Paris", "Rome", "Oslo"], "Rome"),
            ],
        }
    }

    #[test]
    fn validate_quiz_ok() {
        assert!(validate_quiz(&sample_payload()).is_ok());
    }

    #[test]
    fn validate_quiz_negative() {
        let mut quiz = sample_payload();
        quiz.title = "x".repeat(101);
        quiz.questions[0].options = vec!["Paris".into()];
        quiz.questions[1].correct_answer = "Madrid".into();
        let issues = validate_quiz(&quiz).unwrap_err();
        assert!(issues.iter().any(|i| i.field == "title"));
        assert!(issues.iter().any(|i| i.field == "questions[0].options"));
        assert!(issues
            .iter()
            .any(|i| i.field == "questions[1].correctAnswer" && i.issue.contains("one of")));
    }

    #[test]
    fn validate_quiz_requires_questions() {
        let mut quiz = sample_payload();
        quiz.questions.clear();
        let issues = validate_quiz(&quiz).unwrap_err();
        assert_eq!(issues[0].field, "questions");
    }

    #[test]
    fn question_wire_names_are_camel_case() {
        let raw = serde_json::to_value(question("Q", &["A", "B"], "A")).unwrap();
        assert_eq!(raw["questionText"], "Q");
        assert_eq!(raw["correctAnswer"], "A");
    }

    #[test]
    fn normalized_trims_and_drops_blank_description() {
        let payload = QuizPayload {
            title: "  T  ".into(),
            description: Some("   ".into()),
            questions: vec![question(" Q ", &["A", "B"], "A")],
        }
        .normalized();
        assert_eq!(payload.title, "T");
        assert_eq!(payload.description, None);
        assert_eq!(payload.questions[0].question_text, "Q");
    }
}
