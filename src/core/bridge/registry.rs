//! Session registry.
//!
//! Admits each new Media Stream connection, creates its realtime link and
//! hands back a [`BridgeSession`]. The registry keeps a row per live call so
//! the health endpoint can report load and `max_sessions` can be enforced.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::session::BridgeSession;
use crate::core::realtime::{
    BoxedRealtime, RealtimeConfig, RealtimeError, RealtimeResult, create_realtime_provider,
};
use crate::core::telephony::TwilioOutgoing;

/// Errors admitting a new call.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Session limit reached ({limit} active calls)")]
    AtCapacity { limit: usize },

    #[error("Failed to create realtime link: {0}")]
    Realtime(#[from] RealtimeError),
}

/// Builds the realtime link for a new call.
pub type RealtimeLinkFactory =
    Arc<dyn Fn(RealtimeConfig) -> RealtimeResult<BoxedRealtime> + Send + Sync>;

/// Per-call settings shared by every session.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub realtime: RealtimeConfig,
    pub log_timing_math: bool,
}

/// Bookkeeping for one live call.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub started_at: Instant,
}

struct RegistryInner {
    sessions: DashMap<String, SessionInfo>,
    max_sessions: Option<usize>,
    settings: BridgeSettings,
    link_factory: RealtimeLinkFactory,
}

/// Creates one [`BridgeSession`] per Media Stream connection.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(settings: BridgeSettings, max_sessions: Option<usize>) -> Self {
        Self::with_link_factory(settings, max_sessions, Arc::new(create_realtime_provider))
    }

    /// Registry that builds realtime links with `link_factory`.
    pub fn with_link_factory(
        settings: BridgeSettings,
        max_sessions: Option<usize>,
        link_factory: RealtimeLinkFactory,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: DashMap::new(),
                max_sessions,
                settings,
                link_factory,
            }),
        }
    }

    /// Number of calls currently bridged.
    pub fn active_sessions(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn max_sessions(&self) -> Option<usize> {
        self.inner.max_sessions
    }

    /// Whether a new call would be refused right now.
    pub fn at_capacity(&self) -> bool {
        self.inner
            .max_sessions
            .is_some_and(|limit| self.active_sessions() >= limit)
    }

    /// Admit a new call whose outbound Twilio frames go to `telephony_tx`.
    ///
    /// The returned session keeps its registry slot until it is dropped.
    pub fn create_session(
        &self,
        telephony_tx: mpsc::Sender<TwilioOutgoing>,
    ) -> Result<BridgeSession, RegistryError> {
        let guard = self.reserve()?;
        let realtime = (self.inner.link_factory)(self.inner.settings.realtime.clone())?;

        info!(
            session_id = %guard.id,
            active = self.active_sessions(),
            "Bridge session created"
        );
        let session = BridgeSession::new(
            guard.id.clone(),
            realtime,
            telephony_tx,
            self.inner.settings.log_timing_math,
        );
        Ok(session.with_guard(guard))
    }

    fn reserve(&self) -> Result<SessionGuard, RegistryError> {
        let id = Uuid::new_v4().to_string();
        let info = SessionInfo {
            started_at: Instant::now(),
        };

        if let Some(limit) = self.inner.max_sessions {
            // The count checked below includes this slot.
            self.inner.sessions.insert(id.clone(), info);
            if self.inner.sessions.len() > limit {
                self.inner.sessions.remove(&id);
                return Err(RegistryError::AtCapacity { limit });
            }
        } else {
            self.inner.sessions.insert(id.clone(), info);
        }

        Ok(SessionGuard {
            id,
            registry: self.inner.clone(),
        })
    }
}

/// Registry slot held by a live session; released on drop.
pub struct SessionGuard {
    id: String,
    registry: Arc<RegistryInner>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some((_, info)) = self.registry.sessions.remove(&self.id) {
            debug!(
                session_id = %self.id,
                duration_ms = info.started_at.elapsed().as_millis() as u64,
                "Bridge session removed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BridgeSettings {
        BridgeSettings {
            realtime: RealtimeConfig {
                api_key: "test_key".to_string().into(),
                ..Default::default()
            },
            log_timing_math: false,
        }
    }

    #[test]
    fn test_sessions_tracked_until_dropped() {
        let registry = SessionRegistry::new(settings(), None);
        let (tx, _rx) = mpsc::channel(8);

        let first = registry.create_session(tx.clone()).unwrap();
        let second = registry.create_session(tx).unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(registry.active_sessions(), 2);

        drop(first);
        assert_eq!(registry.active_sessions(), 1);
        drop(second);
        assert_eq!(registry.active_sessions(), 0);
    }

    #[test]
    fn test_max_sessions_enforced() {
        let registry = SessionRegistry::new(settings(), Some(1));
        let (tx, _rx) = mpsc::channel(8);

        assert!(!registry.at_capacity());
        let first = registry.create_session(tx.clone()).unwrap();
        assert!(registry.at_capacity());
        assert!(matches!(
            registry.create_session(tx.clone()),
            Err(RegistryError::AtCapacity { limit: 1 })
        ));
        assert_eq!(registry.active_sessions(), 1);

        drop(first);
        assert!(registry.create_session(tx).is_ok());
    }

    #[test]
    fn test_link_failure_releases_slot() {
        let mut bad = settings();
        bad.realtime.api_key.clear();
        let registry = SessionRegistry::new(bad, Some(4));
        let (tx, _rx) = mpsc::channel(8);

        assert!(matches!(
            registry.create_session(tx),
            Err(RegistryError::Realtime(RealtimeError::AuthenticationFailed(_)))
        ));
        assert_eq!(registry.active_sessions(), 0);
    }

    #[test]
    fn test_session_starts_with_fresh_state() {
        let registry = SessionRegistry::new(settings(), None);
        let (tx, _rx) = mpsc::channel(8);
        let session = registry.create_session(tx).unwrap();

        assert_eq!(session.state().stream_sid(), None);
        assert_eq!(session.state().pending_marks(), 0);
        assert!(!session.state().realtime_open());
    }

    #[test]
    fn test_custom_link_factory() {
        let factory: RealtimeLinkFactory = Arc::new(|mut config: RealtimeConfig| {
            config.voice = Some("verse".to_string());
            create_realtime_provider(config)
        });
        let registry = SessionRegistry::with_link_factory(settings(), None, factory);
        let (tx, _rx) = mpsc::channel(8);

        let session = registry.create_session(tx).unwrap();
        assert_eq!(registry.active_sessions(), 1);
        drop(session);
        assert_eq!(registry.active_sessions(), 0);
    }
}
