use crate::builder::QuizBuilder;
use crate::config::AppConfig;
use crate::models::Role;
use crate::session::QuizSession;
use crate::store::InMemoryStore;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct UserSession {
    pub user_id: String,
    pub role: Role,
    pub csrf_token: String,
}

/// A quiz being authored on the server, bound to the user who opened it.
#[derive(Debug, Clone)]
pub struct DraftEntry {
    pub owner_id: String,
    pub builder: QuizBuilder,
    pub touched: Instant,
}

#[derive(Debug, Clone)]
pub struct AttemptEntry {
    pub quiz_id: String,
    pub session: QuizSession,
    pub touched: Instant,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<InMemoryStore>,
    pub sessions: Arc<DashMap<String, UserSession>>,
    pub drafts: Arc<DashMap<String, DraftEntry>>,
    pub attempts: Arc<DashMap<String, AttemptEntry>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let store = InMemoryStore::new(config.local_state_path.clone());
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            sessions: Arc::new(DashMap::new()),
            drafts: Arc::new(DashMap::new()),
            attempts: Arc::new(DashMap::new()),
        }
    }

    pub fn open_session(&self, user_id: &str, role: Role) -> (String, UserSession) {
        let session_id = uuid::Uuid::new_v4().to_string();
        let session = UserSession {
            user_id: user_id.to_string(),
            role,
            csrf_token: uuid::Uuid::new_v4().to_string(),
        };
        self.sessions.insert(session_id.clone(), session.clone());
        (session_id, session)
    }

    /// Drops drafts and attempts nobody has acted on for longer than the idle ttl.
    pub fn evict_idle(&self) -> usize {
        let ttl = self.config.idle_ttl;
        let before = self.drafts.len() + self.attempts.len();
        self.drafts.retain(|_, d| d.touched.elapsed() < ttl);
        self.attempts.retain(|_, a| a.touched.elapsed() < ttl);
        let evicted = before.saturating_sub(self.drafts.len() + self.attempts.len());
        if evicted > 0 {
            debug!(evicted, "idle drafts and attempts dropped");
        }
        evicted
    }

    pub fn open_draft(&self, owner_id: &str, builder: QuizBuilder) -> String {
        self.evict_idle();
        let id = uuid::Uuid::new_v4().to_string();
        self.drafts.insert(
            id.clone(),
            DraftEntry {
                owner_id: owner_id.to_string(),
                builder,
                touched: Instant::now(),
            },
        );
        id
    }

    pub fn start_attempt(&self, quiz_id: &str, session: QuizSession) -> String {
        self.evict_idle();
        let id = uuid::Uuid::new_v4().to_string();
        self.attempts.insert(
            id.clone(),
            AttemptEntry {
                quiz_id: quiz_id.to_string(),
                session,
                touched: Instant::now(),
            },
        );
        id
    }
}
