//! Open sessions keyed by notebook path

use crate::config::ProvConfig;
use crate::error::SessionError;
use crate::session::{Session, SessionServices};
use dashmap::DashMap;
use prov_store::ProvenancePersistence;
use std::sync::Arc;

/// Owns one [`Session`] per open notebook
#[derive(Debug)]
pub struct SessionRegistry {
    config: ProvConfig,
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(config: ProvConfig) -> Self {
        Self {
            config,
            sessions: DashMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ProvConfig {
        &self.config
    }

    /// Session for `path`, opening it if needed
    ///
    /// # Errors
    /// Store errors while loading a new session's document
    pub async fn open(
        &self,
        path: &str,
        persistence: Arc<dyn ProvenancePersistence>,
        services: SessionServices,
    ) -> Result<Arc<Session>, SessionError> {
        if let Some(existing) = self.sessions.get(path) {
            return Ok(Arc::clone(existing.value()));
        }

        let session = Session::open(path, &self.config, persistence, services).await?;
        let entry = self.sessions.entry(path.to_string()).or_insert(session);
        Ok(Arc::clone(entry.value()))
    }

    /// # Errors
    /// `SessionError::UnknownSession` when no session is open for `path`
    pub fn get(&self, path: &str) -> Result<Arc<Session>, SessionError> {
        self.sessions
            .get(path)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SessionError::UnknownSession(path.to_string()))
    }

    /// Close and forget the session for `path`
    pub fn close(&self, path: &str) -> bool {
        match self.sessions.remove(path) {
            Some((_, session)) => {
                session.close();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Paths of open sessions, sorted
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.sessions.iter().map(|entry| entry.key().clone()).collect();
        paths.sort();
        paths
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(ProvConfig::default())
    }
}
