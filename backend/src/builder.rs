use crate::draft::{DraftAction, QuestionDraft};
use crate::error::StoreError;
use crate::models::{Question, QuizPayload, QuizRecord};
use crate::store::{QuizStore, SavedQuiz};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The one committed question currently open for in-place revision. The draft is a
/// by-value copy so cancelling leaves the committed list untouched.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EditingQuestion {
    pub index: usize,
    pub draft: QuestionDraft,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuilderAction {
    SetQuestionText { text: String },
    SetOption { index: usize, value: String },
    AddOption,
    RemoveOption { index: usize },
    SetCorrectAnswer { answer: String },
    ResetDraft,
    AddQuestion,
    RemoveQuestion { index: usize },
    StartEditing { index: usize },
    UpdateEditingText { text: String },
    UpdateEditingOption { index: usize, value: String },
    AddEditingOption,
    RemoveEditingOption { index: usize },
    UpdateEditingCorrectAnswer { answer: String },
    SaveEdit,
    CancelEdit,
    Reorder { from: usize, to: usize },
}

impl BuilderAction {
    /// Wire name of the action, as used in the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetQuestionText { .. } => "set_question_text",
            Self::SetOption { .. } => "set_option",
            Self::AddOption => "add_option",
            Self::RemoveOption { .. } => "remove_option",
            Self::SetCorrectAnswer { .. } => "set_correct_answer",
            Self::ResetDraft => "reset_draft",
            Self::AddQuestion => "add_question",
            Self::RemoveQuestion { .. } => "remove_question",
            Self::StartEditing { .. } => "start_editing",
            Self::UpdateEditingText { .. } => "update_editing_text",
            Self::UpdateEditingOption { .. } => "update_editing_option",
            Self::AddEditingOption => "add_editing_option",
            Self::RemoveEditingOption { .. } => "remove_editing_option",
            Self::UpdateEditingCorrectAnswer { .. } => "update_editing_correct_answer",
            Self::SaveEdit => "save_edit",
            Self::CancelEdit => "cancel_edit",
            Self::Reorder { .. } => "reorder",
        }
    }
}

/// In-memory draft of a whole quiz: the committed question list, the question being
/// authored, and the optional editing sub-state.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizBuilder {
    quiz_id: Option<String>,
    questions: Vec<Question>,
    draft: QuestionDraft,
    editing: Option<EditingQuestion>,
}

impl QuizBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pre-loaded with an existing quiz; saving it updates that quiz.
    pub fn for_quiz(record: &QuizRecord) -> Self {
        Self {
            quiz_id: Some(record.id.clone()),
            questions: record.questions.clone(),
            ..Self::default()
        }
    }

    pub fn quiz_id(&self) -> Option<&str> {
        self.quiz_id.as_deref()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn draft(&self) -> &QuestionDraft {
        &self.draft
    }

    pub fn editing(&self) -> Option<&EditingQuestion> {
        self.editing.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    /// Single transition function. Returns whether the action was accepted;
    /// a refused action leaves the builder exactly as it was.
    pub fn apply(&mut self, action: BuilderAction) -> bool {
        let kind = action.kind();
        let accepted = match action {
            BuilderAction::SetQuestionText { text } => {
                self.draft.apply(DraftAction::SetQuestionText { text })
            }
            BuilderAction::SetOption { index, value } => {
                self.draft.apply(DraftAction::SetOption { index, value })
            }
            BuilderAction::AddOption => self.draft.apply(DraftAction::AddOption),
            BuilderAction::RemoveOption { index } => {
                self.draft.apply(DraftAction::RemoveOption { index })
            }
            BuilderAction::SetCorrectAnswer { answer } => {
                self.draft.apply(DraftAction::SetCorrectAnswer { answer })
            }
            BuilderAction::ResetDraft => self.draft.apply(DraftAction::Reset),
            BuilderAction::AddQuestion => self.add_question(),
            BuilderAction::RemoveQuestion { index } => self.remove_question(index),
            BuilderAction::StartEditing { index } => self.start_editing(index),
            BuilderAction::UpdateEditingText { text } => {
                self.apply_to_editing(DraftAction::SetQuestionText { text })
            }
            BuilderAction::UpdateEditingOption { index, value } => {
                self.apply_to_editing(DraftAction::SetOption { index, value })
            }
            BuilderAction::AddEditingOption => self.apply_to_editing(DraftAction::AddOption),
            BuilderAction::RemoveEditingOption { index } => {
                self.apply_to_editing(DraftAction::RemoveOption { index })
            }
            BuilderAction::UpdateEditingCorrectAnswer { answer } => {
                self.apply_to_editing(DraftAction::SetCorrectAnswer { answer })
            }
            BuilderAction::SaveEdit => self.save_edit(),
            BuilderAction::CancelEdit => self.cancel_edit(),
            BuilderAction::Reorder { from, to } => self.reorder(from, to),
        };
        if !accepted {
            debug!(action = kind, editing = self.is_editing(), "builder action refused");
        }
        accepted
    }

    /// Commits the draft to the back of the list and resets it.
    pub fn add_question(&mut self) -> bool {
        let Some(question) = self.draft.to_question() else {
            return false;
        };
        self.questions.push(question);
        self.draft.reset();
        true
    }

    /// Removes a committed question. An edit targeting it is dropped; an edit
    /// targeting a later question follows it down one slot.
    pub fn remove_question(&mut self, index: usize) -> bool {
        if index >= self.questions.len() {
            return false;
        }
        self.questions.remove(index);
        match self.editing.as_mut() {
            Some(editing) if editing.index == index => self.editing = None,
            Some(editing) if editing.index > index => editing.index -= 1,
            _ => {}
        }
        true
    }

    /// Only valid from idle. Starting a second edit is ignored; cancel or save first.
    pub fn start_editing(&mut self, index: usize) -> bool {
        if self.editing.is_some() {
            return false;
        }
        let Some(question) = self.questions.get(index) else {
            return false;
        };
        self.editing = Some(EditingQuestion {
            index,
            draft: QuestionDraft::from(question),
        });
        true
    }

    fn apply_to_editing(&mut self, action: DraftAction) -> bool {
        match self.editing.as_mut() {
            Some(editing) => editing.draft.apply(action),
            None => false,
        }
    }

    pub fn save_edit(&mut self) -> bool {
        let Some(editing) = self.editing.as_ref() else {
            return false;
        };
        let Some(question) = editing.draft.to_question() else {
            return false;
        };
        let index = editing.index;
        match self.questions.get_mut(index) {
            Some(slot) => *slot = question,
            None => return false,
        }
        self.editing = None;
        true
    }

    pub fn cancel_edit(&mut self) -> bool {
        self.editing.take().is_some()
    }

    /// Array-move: the element at `from` ends up at `to`, everything else keeps its
    /// relative order. Refused while an edit is open so its index stays meaningful.
    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        let len = self.questions.len();
        if from >= len || to >= len || self.editing.is_some() {
            return false;
        }
        if from != to {
            let moved = self.questions.remove(from);
            self.questions.insert(to, moved);
        }
        true
    }

    pub fn payload(&self, title: impl Into<String>, description: Option<String>) -> QuizPayload {
        QuizPayload {
            title: title.into(),
            description,
            questions: self.questions.clone(),
        }
    }

    /// Hands the finished quiz to the persistence collaborator: create for a new
    /// builder, update for one loaded with [`QuizBuilder::for_quiz`]. The builder is
    /// only borrowed, so a failed save leaves it untouched for a retry.
    pub async fn submit(
        &self,
        store: &dyn QuizStore,
        owner_id: &str,
        title: impl Into<String>,
        description: Option<String>,
    ) -> Result<SavedQuiz, StoreError> {
        let payload = self.payload(title, description);
        match &self.quiz_id {
            Some(id) => store.update_quiz(owner_id, id, payload).await,
            None => store.create_quiz(owner_id, payload).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str) -> Question {
        Question {
            question_text: text.into(),
            options: vec!["A".into(), "B".into()],
            correct_answer: "A".into(),
        }
    }

    fn builder_with(texts: &[&str]) -> QuizBuilder {
        let mut builder = QuizBuilder::new();
        builder.questions = texts.iter().map(|t| question(t)).collect();
        builder
    }

    fn texts(builder: &QuizBuilder) -> Vec<&str> {
        builder
            .questions()
            .iter()
            .map(|q| q.question_text.as_str())
            .collect()
    }

    #[test]
    fn add_question_commits_trimmed_draft_and_resets() {
        let mut builder = QuizBuilder::new();
        builder.apply(BuilderAction::SetQuestionText { text: "Q1".into() });
        builder.apply(BuilderAction::SetOption { index: 0, value: "A".into() });
        builder.apply(BuilderAction::SetOption { index: 1, value: "B".into() });
        builder.apply(BuilderAction::AddOption);
        builder.apply(BuilderAction::SetCorrectAnswer { answer: "A".into() });

        assert!(builder.apply(BuilderAction::AddQuestion));
        assert_eq!(
            builder.questions(),
            &[Question {
                question_text: "Q1".into(),
                options: vec!["A".into(), "B".into()],
                correct_answer: "A".into(),
            }]
        );
        assert_eq!(builder.draft(), &QuestionDraft::default());
    }

    #[test]
    fn add_question_appends_at_the_back() {
        let mut builder = builder_with(&["first"]);
        builder.draft = QuestionDraft::from(&question("second"));
        assert!(builder.add_question());
        assert_eq!(texts(&builder), vec!["first", "second"]);
    }

    #[test]
    fn invalid_draft_is_not_committed() {
        let mut builder = QuizBuilder::new();
        builder.apply(BuilderAction::SetQuestionText { text: "Q1".into() });
        builder.apply(BuilderAction::SetOption { index: 0, value: "A".into() });
        let before = builder.draft().clone();
        assert!(!builder.apply(BuilderAction::AddQuestion));
        assert!(builder.questions().is_empty());
        assert_eq!(builder.draft(), &before);
    }

    #[test]
    fn edit_then_cancel_leaves_list_untouched() {
        let mut builder = builder_with(&["one", "two"]);
        assert!(builder.apply(BuilderAction::StartEditing { index: 1 }));
        assert!(builder.is_editing());
        builder.apply(BuilderAction::UpdateEditingText { text: "changed".into() });
        assert_eq!(texts(&builder), vec!["one", "two"]);

        assert!(builder.apply(BuilderAction::CancelEdit));
        assert!(!builder.is_editing());
        assert_eq!(texts(&builder), vec!["one", "two"]);
    }

    #[test]
    fn save_edit_overwrites_in_place() {
        let mut builder = builder_with(&["one", "two"]);
        builder.start_editing(0);
        builder.apply(BuilderAction::UpdateEditingText { text: " uno ".into() });
        builder.apply(BuilderAction::AddEditingOption);
        builder.apply(BuilderAction::UpdateEditingOption { index: 2, value: "C".into() });
        builder.apply(BuilderAction::UpdateEditingCorrectAnswer { answer: "C".into() });

        assert!(builder.apply(BuilderAction::SaveEdit));
        assert!(builder.editing().is_none());
        assert_eq!(builder.questions()[0].question_text, "uno");
        assert_eq!(builder.questions()[0].options, vec!["A", "B", "C"]);
        assert_eq!(builder.questions()[0].correct_answer, "C");
    }

    #[test]
    fn invalid_save_keeps_editing() {
        let mut builder = builder_with(&["one"]);
        builder.start_editing(0);
        builder.apply(BuilderAction::RemoveEditingOption { index: 0 });
        // still two options: removal refused at the minimum
        assert_eq!(builder.editing().unwrap().draft.options.len(), 2);
        builder.apply(BuilderAction::UpdateEditingOption { index: 0, value: " ".into() });

        assert!(!builder.apply(BuilderAction::SaveEdit));
        assert_eq!(builder.editing().unwrap().index, 0);
        assert_eq!(builder.questions()[0], question("one"));
    }

    #[test]
    fn second_start_editing_is_ignored() {
        let mut builder = builder_with(&["one", "two"]);
        assert!(builder.start_editing(0));
        builder.apply(BuilderAction::UpdateEditingText { text: "draft".into() });
        assert!(!builder.start_editing(1));
        let editing = builder.editing().unwrap();
        assert_eq!(editing.index, 0);
        assert_eq!(editing.draft.question_text, "draft");
    }

    #[test]
    fn editing_mutators_are_no_ops_when_idle() {
        let mut builder = builder_with(&["one"]);
        assert!(!builder.apply(BuilderAction::UpdateEditingText { text: "x".into() }));
        assert!(!builder.apply(BuilderAction::AddEditingOption));
        assert!(!builder.apply(BuilderAction::SaveEdit));
        assert!(!builder.apply(BuilderAction::CancelEdit));
        assert_eq!(texts(&builder), vec!["one"]);
    }

    #[test]
    fn start_editing_out_of_range_is_refused() {
        let mut builder = builder_with(&["one"]);
        assert!(!builder.start_editing(3));
        assert!(!builder.is_editing());
    }

    #[test]
    fn remove_question_adjusts_open_edit() {
        let mut builder = builder_with(&["one", "two", "three"]);
        builder.start_editing(2);
        assert!(builder.remove_question(0));
        assert_eq!(builder.editing().unwrap().index, 1);
        builder.apply(BuilderAction::UpdateEditingText { text: "THREE".into() });
        assert!(builder.save_edit());
        assert_eq!(texts(&builder), vec!["two", "THREE"]);

        builder.start_editing(0);
        assert!(builder.remove_question(0));
        assert!(!builder.is_editing());
    }

    #[test]
    fn reorder_moves_one_element() {
        let mut builder = builder_with(&["a", "b", "c", "d"]);
        assert!(builder.reorder(0, 2));
        assert_eq!(texts(&builder), vec!["b", "c", "a", "d"]);
        assert!(builder.reorder(3, 0));
        assert_eq!(texts(&builder), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn reorder_preserves_the_set_for_every_move() {
        let original = ["a", "b", "c", "d", "e"];
        for from in 0..original.len() {
            for to in 0..original.len() {
                let mut builder = builder_with(&original);
                assert!(builder.reorder(from, to));
                let result = texts(&builder);

                let mut sorted = result.clone();
                sorted.sort_unstable();
                assert_eq!(sorted, original.to_vec());

                assert_eq!(result[to], original[from]);
                let others: Vec<_> = result.iter().filter(|t| **t != original[from]).collect();
                let expected: Vec<_> = original.iter().filter(|t| **t != original[from]).collect();
                assert_eq!(others, expected);
            }
        }
    }

    #[test]
    fn reorder_refused_out_of_range_or_while_editing() {
        let mut builder = builder_with(&["a", "b"]);
        assert!(!builder.reorder(0, 2));
        builder.start_editing(0);
        assert!(!builder.reorder(0, 1));
        assert_eq!(texts(&builder), vec!["a", "b"]);
    }

    struct FailingStore;

    impl QuizStore for FailingStore {
        fn create_quiz<'a>(
            &'a self,
            _owner_id: &'a str,
            _payload: QuizPayload,
        ) -> futures::future::BoxFuture<'a, Result<SavedQuiz, StoreError>> {
            Box::pin(async { Err(StoreError::Io("disk full".into())) })
        }

        fn update_quiz<'a>(
            &'a self,
            _owner_id: &'a str,
            _id: &'a str,
            _payload: QuizPayload,
        ) -> futures::future::BoxFuture<'a, Result<SavedQuiz, StoreError>> {
            Box::pin(async { Err(StoreError::NotFound) })
        }

        fn delete_quiz<'a>(
            &'a self,
            _owner_id: &'a str,
            _id: &'a str,
        ) -> futures::future::BoxFuture<'a, Result<QuizRecord, StoreError>> {
            Box::pin(async { Err(StoreError::NotFound) })
        }

        fn get_quiz<'a>(&'a self, _id: &'a str) -> futures::future::BoxFuture<'a, Result<QuizRecord, StoreError>> {
            Box::pin(async { Err(StoreError::NotFound) })
        }

        fn list_quizzes(&self, _query: crate::store::ListQuery) -> futures::future::BoxFuture<'_, crate::store::QuizPage> {
            unreachable!("not used by the builder")
        }
    }

    #[tokio::test]
    async fn failed_submit_leaves_builder_untouched() {
        let mut builder = builder_with(&["one"]);
        builder.start_editing(0);
        let before = format!("{builder:?}");
        let result = builder.submit(&FailingStore, "u1", "Title", None).await;
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert_eq!(format!("{builder:?}"), before);
    }

    #[tokio::test]
    async fn submit_creates_then_updates() {
        let store = crate::store::InMemoryStore::new(None);
        let builder = builder_with(&["one", "two"]);
        let saved = builder
            .submit(&store, "u1", "Quiz", Some("desc".into()))
            .await
            .unwrap();
        assert_eq!(saved.questions_count, 2);
        assert_eq!(saved.message, "Quiz created successfully");

        let record = store.get_quiz(&saved.id).await.unwrap();
        let mut editor = QuizBuilder::for_quiz(&record);
        assert_eq!(editor.quiz_id(), Some(saved.id.as_str()));
        editor.remove_question(1);
        let updated = editor.submit(&store, "u1", "Quiz", None).await.unwrap();
        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.questions_count, 1);
    }

    #[tokio::test]
    async fn submitting_an_empty_quiz_is_rejected_by_the_store() {
        let store = crate::store::InMemoryStore::new(None);
        let result = QuizBuilder::new().submit(&store, "u1", "Quiz", None).await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    #[test]
    fn action_kind_matches_the_type_tag() {
        let actions = [
            BuilderAction::SetQuestionText { text: "x".into() },
            BuilderAction::AddOption,
            BuilderAction::UpdateEditingCorrectAnswer { answer: "a".into() },
            BuilderAction::Reorder { from: 0, to: 1 },
            BuilderAction::SaveEdit,
        ];
        for action in actions {
            let json = serde_json::to_value(&action).unwrap();
            assert_eq!(json["type"], action.kind());
        }
    }

    #[test]
    fn refused_action_leaves_builder_unchanged() {
        let mut builder = builder_with(&["one"]);
        let before = format!("{builder:?}");
        assert!(!builder.apply(BuilderAction::Reorder { from: 0, to: 5 }));
        assert!(!builder.apply(BuilderAction::UpdateEditingText { text: "x".into() }));
        assert_eq!(format!("{builder:?}"), before);
    }

    #[test]
    fn builder_actions_deserialize_from_tagged_json() {
        let action: BuilderAction =
            serde_json::from_str(r#"{"type":"reorder","from":2,"to":0}"#).unwrap();
        assert_eq!(action, BuilderAction::Reorder { from: 2, to: 0 });
        let action: BuilderAction = serde_json::from_str(r#"{"type":"save_edit"}"#).unwrap();
        assert_eq!(action, BuilderAction::SaveEdit);
    }
}
