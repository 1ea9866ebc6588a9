//! The key-value collaborator's interface (§6), consumed but not owned by
//! this crate: session persistence lives in a browser-extension-backed
//! store outside the core. Modeled as a trait so integration tests can
//! substitute an in-memory fake.

use async_trait::async_trait;
use chartgate_types::{Credentials, GatewayError, SessionRecord};

#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub total_sessions: u64,
    pub per_platform_counts: std::collections::HashMap<String, u64>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_latest_session_for_user(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<SessionRecord>, GatewayError>;

    async fn get_session_stats(&self) -> Result<SessionStats, GatewayError>;
}

/// An in-memory [`SessionStore`] for tests and local demos; never used in
/// the eventual production deployment, where the real store is the
/// credential-capture collaborator's database.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: parking_lot::Mutex<Vec<(Credentials, SessionRecord)>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, credentials: Credentials, record: SessionRecord) {
        self.sessions.lock().push((credentials, record));
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_latest_session_for_user(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<SessionRecord>, GatewayError> {
        Ok(self
            .sessions
            .lock()
            .iter()
            .rev()
            .find(|(c, _)| c == credentials)
            .map(|(_, record)| record.clone()))
    }

    async fn get_session_stats(&self) -> Result<SessionStats, GatewayError> {
        let sessions = self.sessions.lock();
        let mut per_platform_counts = std::collections::HashMap::new();
        for (credentials, _) in sessions.iter() {
            *per_platform_counts
                .entry(credentials.platform.clone())
                .or_insert(0u64) += 1;
        }
        Ok(SessionStats {
            total_sessions: sessions.len() as u64,
            per_platform_counts,
        })
    }
}
