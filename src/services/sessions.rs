//! Admin sessions
//!
//! Login trades the admin API key for an opaque session token; the actor
//! bound to the session is recorded on status-change notes.

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Open a session for `actor` and return its token
    async fn create(&self, actor: &str) -> String;
    /// Actor for a live session, `None` when unknown or expired
    async fn validate(&self, token: &str) -> Option<String>;
    async fn destroy(&self, token: &str);
    fn ttl(&self) -> Duration;
}

/// In-process store; sessions expire `ttl` after login
#[derive(Clone)]
pub struct MemorySessionStore {
    sessions: Arc<Cache<String, String>>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        let sessions = Cache::builder().max_capacity(10_000).time_to_live(ttl).build();
        Self {
            sessions: Arc::new(sessions),
            ttl,
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, actor: &str) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.sessions.insert(token.clone(), actor.to_string()).await;
        tracing::debug!(actor = %actor, "Admin session created");
        token
    }

    async fn validate(&self, token: &str) -> Option<String> {
        self.sessions.get(token).await
    }

    async fn destroy(&self, token: &str) {
        self.sessions.invalidate(token).await;
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}
