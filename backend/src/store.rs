use crate::error::StoreError;
use crate::models::{validate_quiz, QuizPayload, QuizRecord, QuizSummary, User};
use chrono::Utc;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{fs, path::Path};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 50;
const RECENT_QUIZZES: usize = 5;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuiz {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub questions_count: usize,
    pub message: String,
}

impl SavedQuiz {
    fn from_record(record: &QuizRecord, message: &str) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            questions_count: record.questions.len(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub q: Option<String>,
    #[serde(skip)]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizPage {
    pub quizzes: Vec<QuizSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_quizzes: usize,
    pub total_questions: usize,
    pub my_quizzes: usize,
    pub my_questions: usize,
    pub recently_modified: Vec<QuizSummary>,
}

/// Persistence collaborator for quizzes. Create and update validate the document;
/// update and delete are scoped to the owner.
pub trait QuizStore: Send + Sync {
    fn create_quiz<'a>(
        &'a self,
        owner_id: &'a str,
        payload: QuizPayload,
    ) -> BoxFuture<'a, Result<SavedQuiz, StoreError>>;

    fn update_quiz<'a>(
        &'a self,
        owner_id: &'a str,
        id: &'a str,
        payload: QuizPayload,
    ) -> BoxFuture<'a, Result<SavedQuiz, StoreError>>;

    fn delete_quiz<'a>(
        &'a self,
        owner_id: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<QuizRecord, StoreError>>;

    fn get_quiz<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<QuizRecord, StoreError>>;

    fn list_quizzes(&self, query: ListQuery) -> BoxFuture<'_, QuizPage>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistentSnapshot {
    quizzes: HashMap<String, QuizRecord>,
    users: HashMap<String, User>,
}

pub struct InMemoryStore {
    quizzes: RwLock<HashMap<String, QuizRecord>>,
    users: RwLock<HashMap<String, User>>,
    snapshot_path: Option<String>,
    /// Held from mutation through snapshot write so snapshots land in mutation order.
    writer: Mutex<()>,
}

impl InMemoryStore {
    pub fn new(snapshot_path: Option<String>) -> Self {
        let snapshot = snapshot_path
            .as_deref()
            .and_then(|path| {
                let raw = fs::read_to_string(path).ok()?;
                match serde_json::from_str::<PersistentSnapshot>(&raw) {
                    Ok(s) => Some(s),
                    Err(err) => {
                        warn!("failed to read local snapshot {}: {}", path, err);
                        None
                    }
                }
            })
            .unwrap_or_default();
        if !snapshot.quizzes.is_empty() {
            info!(quizzes = snapshot.quizzes.len(), users = snapshot.users.len(), "local snapshot loaded");
        }

        Self {
            quizzes: RwLock::new(snapshot.quizzes),
            users: RwLock::new(snapshot.users),
            snapshot_path,
            writer: Mutex::new(()),
        }
    }

    async fn persist(&self) -> anyhow::Result<()> {
        let Some(path) = self.snapshot_path.as_ref() else {
            return Ok(());
        };
        let snapshot = PersistentSnapshot {
            quizzes: self.quizzes.read().await.clone(),
            users: self.users.read().await.clone(),
        };
        let serialized = serde_json::to_vec_pretty(&snapshot)?;
        if let Some(parent) = Path::new(path).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serialized).await?;
        Ok(())
    }

    async fn persist_or_warn(&self, after: &str) {
        if let Err(err) = self.persist().await {
            warn!("failed to persist local state after {}: {}", after, err);
        }
    }

    /// Login bookkeeping: find the user by email or create it from the verified
    /// provider profile. A failed snapshot write only costs the profile refresh;
    /// the next sign-in recreates the user, so it is logged rather than returned.
    pub async fn upsert_user(&self, email: &str, name: &str, profile_photo: &str) -> User {
        let _guard = self.writer.lock().await;
        let email = email.trim().to_lowercase();
        let now = Utc::now();
        let user = {
            let mut users = self.users.write().await;
            match users.values_mut().find(|u| u.email == email) {
                Some(existing) => {
                    existing.name = name.to_string();
                    existing.profile_photo = profile_photo.to_string();
                    existing.updated_at = now;
                    existing.clone()
                }
                None => {
                    let user = User {
                        id: uuid::Uuid::new_v4().to_string(),
                        email,
                        name: name.to_string(),
                        profile_photo: profile_photo.to_string(),
                        created_at: now,
                        updated_at: now,
                    };
                    users.insert(user.id.clone(), user.clone());
                    info!(user_id = %user.id, "user created");
                    user
                }
            }
        };
        self.persist_or_warn("upsert_user").await;
        user
    }

    pub async fn get_user(&self, id: &str) -> Option<User> {
        self.users.read().await.get(id).cloned()
    }

    pub async fn dashboard(&self, user_id: &str) -> DashboardStats {
        let quizzes = self.quizzes.read().await;
        let total_questions = quizzes.values().map(|q| q.questions.len()).sum();
        let mut mine: Vec<&QuizRecord> = quizzes.values().filter(|q| q.created_by == user_id).collect();
        mine.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| b.id.cmp(&a.id)));
        DashboardStats {
            total_quizzes: quizzes.len(),
            total_questions,
            my_quizzes: mine.len(),
            my_questions: mine.iter().map(|q| q.questions.len()).sum(),
            recently_modified: mine.iter().take(RECENT_QUIZZES).map(|q| QuizSummary::from(*q)).collect(),
        }
    }
}

fn persist_failed(after: &str, err: anyhow::Error) -> StoreError {
    warn!("failed to persist local state after {}: {}", after, err);
    StoreError::Io(format!("could not save changes: {err}"))
}

fn checked(payload: QuizPayload) -> Result<QuizPayload, StoreError> {
    let payload = payload.normalized();
    validate_quiz(&payload).map_err(StoreError::Validation)?;
    Ok(payload)
}

impl QuizStore for InMemoryStore {
    fn create_quiz<'a>(
        &'a self,
        owner_id: &'a str,
        payload: QuizPayload,
    ) -> BoxFuture<'a, Result<SavedQuiz, StoreError>> {
        Box::pin(async move {
            let payload = checked(payload)?;
            let now = Utc::now();
            let record = QuizRecord {
                id: uuid::Uuid::new_v4().to_string(),
                title: payload.title,
                description: payload.description,
                questions: payload.questions,
                created_by: owner_id.to_string(),
                created_at: now,
                updated_at: now,
            };
            let saved = SavedQuiz::from_record(&record, "Quiz created successfully");
            let _guard = self.writer.lock().await;
            self.quizzes.write().await.insert(record.id.clone(), record);
            if let Err(err) = self.persist().await {
                self.quizzes.write().await.remove(&saved.id);
                return Err(persist_failed("create_quiz", err));
            }
            info!(quiz_id = %saved.id, owner = owner_id, "quiz created");
            Ok(saved)
        })
    }

    fn update_quiz<'a>(
        &'a self,
        owner_id: &'a str,
        id: &'a str,
        payload: QuizPayload,
    ) -> BoxFuture<'a, Result<SavedQuiz, StoreError>> {
        Box::pin(async move {
            let payload = checked(payload)?;
            let _guard = self.writer.lock().await;
            let (saved, previous) = {
                let mut quizzes = self.quizzes.write().await;
                let item = quizzes.get_mut(id).ok_or(StoreError::NotFound)?;
                if item.created_by != owner_id {
                    return Err(StoreError::Forbidden);
                }
                let previous = item.clone();
                item.title = payload.title;
                item.description = payload.description;
                item.questions = payload.questions;
                item.updated_at = Utc::now();
                (SavedQuiz::from_record(item, "Quiz updated successfully"), previous)
            };
            if let Err(err) = self.persist().await {
                self.quizzes.write().await.insert(previous.id.clone(), previous);
                return Err(persist_failed("update_quiz", err));
            }
            info!(quiz_id = id, "quiz updated");
            Ok(saved)
        })
    }

    fn delete_quiz<'a>(
        &'a self,
        owner_id: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<QuizRecord, StoreError>> {
        Box::pin(async move {
            let _guard = self.writer.lock().await;
            let removed = {
                let mut quizzes = self.quizzes.write().await;
                let existing = quizzes.get(id).ok_or(StoreError::NotFound)?;
                if existing.created_by != owner_id {
                    return Err(StoreError::Forbidden);
                }
                quizzes.remove(id).ok_or(StoreError::NotFound)?
            };
            if let Err(err) = self.persist().await {
                self.quizzes.write().await.insert(removed.id.clone(), removed);
                return Err(persist_failed("delete_quiz", err));
            }
            info!(quiz_id = id, "quiz deleted");
            Ok(removed)
        })
    }

    fn get_quiz<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<QuizRecord, StoreError>> {
        Box::pin(async move {
            self.quizzes
                .read()
                .await
                .get(id)
                .cloned()
                .ok_or(StoreError::NotFound)
        })
    }

    fn list_quizzes(&self, query: ListQuery) -> BoxFuture<'_, QuizPage> {
        Box::pin(async move {
            let page = query.page.unwrap_or(1).max(1);
            let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
            let term = query
                .q
                .as_deref()
                .map(|t| t.trim().to_lowercase())
                .unwrap_or_default();

            let quizzes = self.quizzes.read().await;
            let mut matching: Vec<&QuizRecord> = quizzes
                .values()
                .filter(|q| query.owner.as_deref().map_or(true, |o| q.created_by == o))
                .filter(|q| {
                    term.is_empty()
                        || q.title.to_lowercase().contains(&term)
                        || q
                            .description
                            .as_ref()
                            .map(|d| d.to_lowercase().contains(&term))
                            .unwrap_or(false)
                })
                .collect();
            matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

            let total = matching.len();
            let items = matching
                .into_iter()
                .skip((page - 1).saturating_mul(limit))
                .take(limit)
                .map(QuizSummary::from)
                .collect();
            QuizPage {
                quizzes: items,
                pagination: Pagination {
                    page,
                    limit,
                    total,
                    total_pages: total.div_ceil(limit),
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Question;

    fn payload(title: &str) -> QuizPayload {
        QuizPayload {
            title: title.into(),
            description: Some("about capitals".into()),
            questions: vec![Question {
                question_text: "Capital of France".into(),
                options: vec!["Paris".into(), "Rome".into()],
                correct_answer: "Paris".into(),
            }],
        }
    }

    #[tokio::test]
    async fn create_get_update_delete() {
        let store = InMemoryStore::new(None);
        let saved = store.create_quiz("u1", payload("  Geo  ")).await.unwrap();
        assert_eq!(saved.title, "Geo");
        assert_eq!(saved.questions_count, 1);
        assert_eq!(saved.message, "Quiz created successfully");

        let record = store.get_quiz(&saved.id).await.unwrap();
        assert_eq!(record.created_by, "u1");

        let updated = store.update_quiz("u1", &saved.id, payload("Geo 2")).await.unwrap();
        assert_eq!(updated.message, "Quiz updated successfully");
        assert_eq!(store.get_quiz(&saved.id).await.unwrap().title, "Geo 2");

        store.delete_quiz("u1", &saved.id).await.unwrap();
        assert!(matches!(store.get_quiz(&saved.id).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn only_owner_may_change() {
        let store = InMemoryStore::new(None);
        let saved = store.create_quiz("u1", payload("Geo")).await.unwrap();
        assert!(matches!(
            store.update_quiz("u2", &saved.id, payload("mine now")).await,
            Err(StoreError::Forbidden)
        ));
        assert!(matches!(store.delete_quiz("u2", &saved.id).await, Err(StoreError::Forbidden)));
        assert_eq!(store.get_quiz(&saved.id).await.unwrap().title, "Geo");
    }

    #[tokio::test]
    async fn invalid_documents_are_rejected() {
        let store = InMemoryStore::new(None);
        let mut bad = payload("");
        bad.questions[0].correct_answer = "Berlin".into();
        let Err(StoreError::Validation(issues)) = store.create_quiz("u1", bad).await else {
            panic!("expected validation error");
        };
        assert_eq!(issues.len(), 2);
        assert_eq!(store.list_quizzes(ListQuery::default()).await.pagination.total, 0);
    }

    #[tokio::test]
    async fn listing_paginates_and_searches() {
        let store = InMemoryStore::new(None);
        for i in 0..12 {
            store.create_quiz("u1", payload(&format!("Quiz {i}"))).await.unwrap();
        }
        store.create_quiz("u2", payload("History")).await.unwrap();

        let first = store.list_quizzes(ListQuery::default()).await;
        assert_eq!(first.quizzes.len(), 10);
        assert_eq!(first.pagination.total, 13);
        assert_eq!(first.pagination.total_pages, 2);

        let second = store
            .list_quizzes(ListQuery { page: Some(2), ..ListQuery::default() })
            .await;
        assert_eq!(second.quizzes.len(), 3);

        let search = store
            .list_quizzes(ListQuery { q: Some("HIST".into()), ..ListQuery::default() })
            .await;
        assert_eq!(search.quizzes.len(), 1);
        assert_eq!(search.quizzes[0].title, "History");

        let owned = store
            .list_quizzes(ListQuery { owner: Some("u2".into()), ..ListQuery::default() })
            .await;
        assert_eq!(owned.pagination.total, 1);
    }

    #[tokio::test]
    async fn upsert_user_is_keyed_by_email() {
        let store = InMemoryStore::new(None);
        let a = store.upsert_user("Ann@Example.com", "Ann", "a.png").await;
        let b = store.upsert_user("ann@example.com", "Ann B", "b.png").await;
        assert_eq!(a.id, b.id);
        assert_eq!(b.name, "Ann B");
        assert_eq!(store.get_user(&a.id).await.unwrap().profile_photo, "b.png");
    }

    #[tokio::test]
    async fn dashboard_counts() {
        let store = InMemoryStore::new(None);
        store.create_quiz("u1", payload("A")).await.unwrap();
        store.create_quiz("u2", payload("B")).await.unwrap();
        let stats = store.dashboard("u1").await;
        assert_eq!(stats.total_quizzes, 2);
        assert_eq!(stats.total_questions, 2);
        assert_eq!(stats.my_quizzes, 1);
        assert_eq!(stats.my_questions, 1);
        assert_eq!(stats.recently_modified[0].title, "A");
    }

    #[tokio::test]
    async fn page_far_past_the_end_is_empty() {
        let store = InMemoryStore::new(None);
        store.create_quiz("u1", payload("Only")).await.unwrap();
        let page = store
            .list_quizzes(ListQuery { page: Some(usize::MAX), ..ListQuery::default() })
            .await;
        assert!(page.quizzes.is_empty());
        assert_eq!(page.pagination.total, 1);

        let huge_limit = store
            .list_quizzes(ListQuery { page: Some(usize::MAX), limit: Some(usize::MAX), ..ListQuery::default() })
            .await;
        assert!(huge_limit.quizzes.is_empty());
        assert_eq!(huge_limit.pagination.limit, MAX_PAGE_SIZE);
    }

    /// A snapshot path whose parent is a regular file can never be written.
    fn unwritable_path() -> (String, std::path::PathBuf) {
        let blocker = std::env::temp_dir().join(format!("quizforge-blocker-{}", uuid::Uuid::new_v4()));
        std::fs::write(&blocker, b"not a directory").unwrap();
        let path = blocker.join("state.json").to_string_lossy().to_string();
        (path, blocker)
    }

    #[tokio::test]
    async fn failed_snapshot_write_is_reported_and_rolled_back() {
        let (path, blocker) = unwritable_path();
        let store = InMemoryStore::new(Some(path));

        let result = store.create_quiz("u1", payload("Lost")).await;
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert_eq!(store.list_quizzes(ListQuery::default()).await.pagination.total, 0);

        let _ = std::fs::remove_file(blocker);
    }

    #[tokio::test]
    async fn failed_update_and_delete_leave_the_quiz_as_it_was() {
        let (path, blocker) = unwritable_path();
        let store = InMemoryStore::new(None);
        let saved = store.create_quiz("u1", payload("Before")).await.unwrap();
        let before = store.get_quiz(&saved.id).await.unwrap();

        // same data, now backed by a path that cannot be written
        let broken = InMemoryStore {
            quizzes: RwLock::new(store.quizzes.read().await.clone()),
            users: RwLock::new(HashMap::new()),
            snapshot_path: Some(path),
            writer: Mutex::new(()),
        };
        let updated = broken.update_quiz("u1", &saved.id, payload("After")).await;
        assert!(matches!(updated, Err(StoreError::Io(_))));
        assert_eq!(broken.get_quiz(&saved.id).await.unwrap(), before);

        let deleted = broken.delete_quiz("u1", &saved.id).await;
        assert!(matches!(deleted, Err(StoreError::Io(_))));
        assert_eq!(broken.get_quiz(&saved.id).await.unwrap(), before);

        let _ = std::fs::remove_file(blocker);
    }

    #[tokio::test]
    async fn concurrent_creates_all_reach_the_snapshot() {
        let path = std::env::temp_dir().join(format!("quizforge-{}.json", uuid::Uuid::new_v4()));
        let path = path.to_string_lossy().to_string();
        let store = std::sync::Arc::new(InMemoryStore::new(Some(path.clone())));

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.create_quiz("u1", payload(&format!("Quiz {i}"))).await.unwrap().id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }

        let reopened = InMemoryStore::new(Some(path.clone()));
        for id in ids {
            assert!(reopened.get_quiz(&id).await.is_ok());
        }
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn snapshot_survives_restart() {
        let path = std::env::temp_dir().join(format!("quizforge-{}.json", uuid::Uuid::new_v4()));
        let path = path.to_string_lossy().to_string();
        let id = {
            let store = InMemoryStore::new(Some(path.clone()));
            store.create_quiz("u1", payload("Kept")).await.unwrap().id
        };
        let reopened = InMemoryStore::new(Some(path.clone()));
        assert_eq!(reopened.get_quiz(&id).await.unwrap().title, "Kept");
        let _ = std::fs::remove_file(path);
    }
}
