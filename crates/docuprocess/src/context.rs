//! Application context: every long-lived component, built from configuration.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::broadcast::{NotificationBroadcaster, UploadProgressBroadcaster};
use crate::config::{Config, PersistenceBackend, PersistenceConfig, SessionConfig, SessionMode};
use crate::db::default_database_path;
use crate::error::{ConfigError, Result};
use crate::history::{
    HistoryStore, HistoryViewAdapter, MemoryHistoryStore, RestHistoryStore, SqliteHistoryStore,
};
use crate::processing::{CannedClassifier, DocumentClassifier};
use crate::secrets::expand_home;
use crate::session::{
    Identity, IdentityProvider, OAuthRedirectProvider, SessionProvider, StaticIdentityProvider,
};
use crate::upload::{ProgressSchedule, UploadLimits, UploadSessionManager};

/// User id used in static mode when no `session.static` block is configured.
pub const LOCAL_USER_ID: &str = "local-user";

pub struct AppContext {
    pub config: Config,
    pub session: SessionProvider,
    pub store: Arc<dyn HistoryStore>,
    pub uploads: UploadSessionManager,
    pub history: HistoryViewAdapter,
    cancel: CancellationToken,
    history_follower: JoinHandle<()>,
}

impl AppContext {
    /// Builds the context from configuration. Nobody is signed in yet.
    pub async fn init(config: Config) -> Result<Self> {
        let store = build_store(&config.persistence)?;
        let provider = build_identity_provider(&config.session)?;
        let classifier: Arc<dyn DocumentClassifier> = Arc::new(CannedClassifier::embedded()?);

        Ok(Self::with_components(config, classifier, store, provider))
    }

    /// Assembles a context from already-built collaborators.
    pub fn with_components(
        config: Config,
        classifier: Arc<dyn DocumentClassifier>,
        store: Arc<dyn HistoryStore>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let session = SessionProvider::new(provider);
        let uploads = UploadSessionManager::builder(classifier, Arc::clone(&store), session.clone())
            .limits(UploadLimits::from(&config.upload))
            .schedule(ProgressSchedule::from(&config.simulation))
            .events(UploadProgressBroadcaster::default())
            .notifications(NotificationBroadcaster::default())
            .build();

        let history = HistoryViewAdapter::new(Arc::clone(&store));
        let cancel = CancellationToken::new();
        let history_follower = history.follow_session(&session, cancel.child_token());

        info!(
            backend = ?config.persistence.backend,
            session_mode = ?config.session.mode,
            "Application context ready"
        );

        Self {
            config,
            session,
            store,
            uploads,
            history,
            cancel,
            history_follower,
        }
    }

    /// Stops all drivers and the history follower.
    pub async fn shutdown(self) {
        self.uploads.shutdown().await;
        self.cancel.cancel();
        if let Err(e) = self.history_follower.await {
            tracing::warn!("History follower ended abnormally: {}", e);
        }
        info!("Application context shut down");
    }
}

pub fn build_store(config: &PersistenceConfig) -> Result<Arc<dyn HistoryStore>> {
    let store: Arc<dyn HistoryStore> = match config.backend {
        PersistenceBackend::Memory => Arc::new(MemoryHistoryStore::new()),
        PersistenceBackend::Sqlite => {
            let path = config
                .sqlite_path
                .as_ref()
                .map(|p| PathBuf::from(expand_home(&p.to_string_lossy())))
                .or_else(default_database_path)
                .ok_or_else(|| ConfigError::Validation {
                    message: "Cannot determine home directory for the history database; set persistence.sqlite_path".to_string(),
                })?;
            Arc::new(SqliteHistoryStore::open(&path)?)
        }
        PersistenceBackend::Rest => {
            let rest = config.rest.as_ref().ok_or_else(|| ConfigError::Validation {
                message: "persistence.rest is required for the rest backend".to_string(),
            })?;
            Arc::new(RestHistoryStore::from_config(rest)?)
        }
    };
    Ok(store)
}

pub fn build_identity_provider(config: &SessionConfig) -> Result<Arc<dyn IdentityProvider>> {
    let provider: Arc<dyn IdentityProvider> = match config.mode {
        SessionMode::Static => {
            let identity = match &config.static_identity {
                Some(s) => Identity {
                    user_id: s.user_id.clone(),
                    email: s.email.clone(),
                    display_name: s.display_name.clone(),
                    avatar_url: s.avatar_url.clone(),
                    access_token: None,
                },
                None => Identity::new(LOCAL_USER_ID).with_display_name("Local User"),
            };
            Arc::new(StaticIdentityProvider::new(identity))
        }
        SessionMode::Oauth => {
            let oauth = config.oauth.as_ref().ok_or_else(|| ConfigError::Validation {
                message: "session.oauth is required for oauth mode".to_string(),
            })?;
            Arc::new(OAuthRedirectProvider::new(
                &oauth.base_url,
                &oauth.provider,
                oauth.redirect_to.as_deref(),
            )?)
        }
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_from_str, OAuthConfig, StaticIdentityConfig};
    use crate::session::SignInFlow;

    fn memory_config() -> Config {
        load_config_from_str("persistence:\n  backend: memory\n").unwrap()
    }

    #[tokio::test]
    async fn test_init_with_memory_backend() {
        let ctx = AppContext::init(memory_config()).await.unwrap();
        assert!(ctx.session.current_identity().is_none());
        assert!(ctx.uploads.entries().is_empty());
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_sqlite_backend_uses_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = PersistenceConfig {
            backend: PersistenceBackend::Sqlite,
            sqlite_path: Some(dir.path().join("h.db")),
            rest: None,
        };
        build_store(&config).unwrap();
        assert!(dir.path().join("h.db").exists());
    }

    #[test]
    fn test_rest_backend_requires_block() {
        let config = PersistenceConfig {
            backend: PersistenceBackend::Rest,
            sqlite_path: None,
            rest: None,
        };
        assert!(build_store(&config).is_err());
    }

    #[tokio::test]
    async fn test_static_provider_defaults_to_local_user() {
        let provider = build_identity_provider(&SessionConfig::default()).unwrap();
        match provider.begin_sign_in().await.unwrap() {
            SignInFlow::Completed(identity) => assert_eq!(identity.user_id, LOCAL_USER_ID),
            other => panic!("unexpected flow: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_static_provider_from_config() {
        let config = SessionConfig {
            mode: SessionMode::Static,
            static_identity: Some(StaticIdentityConfig {
                user_id: "u-42".to_string(),
                email: Some("claims@example.com".to_string()),
                display_name: None,
                avatar_url: None,
            }),
            oauth: None,
        };
        let provider = build_identity_provider(&config).unwrap();
        let SignInFlow::Completed(identity) = provider.begin_sign_in().await.unwrap() else {
            panic!("expected immediate sign-in");
        };
        assert_eq!(identity.user_id, "u-42");
        assert_eq!(identity.label(), "claims@example.com");
    }

    #[tokio::test]
    async fn test_oauth_provider_from_config() {
        let config = SessionConfig {
            mode: SessionMode::Oauth,
            static_identity: None,
            oauth: Some(OAuthConfig {
                base_url: "https://project.example.co".to_string(),
                provider: "google".to_string(),
                redirect_to: None,
            }),
        };
        let provider = build_identity_provider(&config).unwrap();
        assert!(matches!(
            provider.begin_sign_in().await.unwrap(),
            SignInFlow::Redirect { .. }
        ));
    }
}
