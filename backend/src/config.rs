use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_IDLE_TTL_SECS: u64 = 2 * 60 * 60;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// JSON snapshot of quizzes and users; `None` keeps everything in memory only.
    pub local_state_path: Option<String>,
    pub admin_emails: Vec<String>,
    pub cors_origins: Vec<String>,
    /// How long an untouched builder draft or quiz attempt is kept on the server.
    pub idle_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            local_state_path: None,
            admin_emails: Vec::new(),
            cors_origins: vec!["http://localhost:3000".into()],
            idle_ttl: Duration::from_secs(DEFAULT_IDLE_TTL_SECS),
        }
    }
}

fn env_list(name: &str) -> Option<Vec<String>> {
    let raw = std::env::var(name).ok()?;
    Some(
        raw.split(',')
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect(),
    )
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let host = std::env::var("QUIZ_HOST")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.host);
        let port = std::env::var("QUIZ_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(defaults.port);
        let local_state_path = match std::env::var("LOCAL_STATE_PATH") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(v),
            Err(_) => Some(format!("{}/local_state.json", env!("CARGO_MANIFEST_DIR"))),
        };
        let admin_emails = env_list("ADMIN_EMAILS")
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.to_lowercase())
            .collect();
        let cors_origins = env_list("CORS_ORIGINS").unwrap_or(defaults.cors_origins);
        let idle_ttl = std::env::var("QUIZ_IDLE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.idle_ttl);

        Self {
            host,
            port,
            local_state_path,
            admin_emails,
            cors_origins,
            idle_ttl,
        }
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn is_admin(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|a| a.trim().eq_ignore_ascii_case(&email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_match_ignores_case() {
        let config = AppConfig {
            admin_emails: vec!["boss@example.com".into()],
            ..AppConfig::default()
        };
        assert!(config.is_admin(" Boss@Example.com"));
        assert!(!config.is_admin("someone@example.com"));
    }

    #[test]
    fn addr_parses() {
        let config = AppConfig {
            host: "127.0.0.1".into(),
            port: 9000,
            ..AppConfig::default()
        };
        assert_eq!(config.addr().unwrap().port(), 9000);
    }
}
