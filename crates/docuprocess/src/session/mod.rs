//! Session provider: the current identity and sign-in/sign-out actions.
//!
//! The identity protocol itself lives in an external service. This module only
//! tracks the resulting [`Identity`] and publishes changes over a watch channel.

pub mod providers;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::SessionError;

pub use providers::{OAuthRedirectProvider, StaticIdentityProvider};

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Per-user token from the hosted identity service. Stores use it as the
    /// bearer so row policies see the signed-in user.
    #[serde(skip)]
    pub access_token: Option<AccessToken>,
}

/// Bearer token issued to a signed-in user.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

impl PartialEq for AccessToken {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for AccessToken {}

/// Session payload handed back by the hosted identity service after sign-in.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user: AuthUser,
}

/// User payload as returned by the hosted identity service.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: AuthUserMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthUserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            display_name: None,
            avatar_url: None,
            access_token: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(AccessToken::new(token));
        self
    }

    pub fn from_auth_user(user: AuthUser) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            display_name: user.user_metadata.full_name,
            avatar_url: user.user_metadata.avatar_url,
            access_token: None,
        }
    }

    pub fn from_auth_session(session: AuthSession) -> Self {
        Self::from_auth_user(session.user).with_access_token(session.access_token)
    }

    /// Display name, falling back to email, then user id.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.email.as_deref())
            .unwrap_or(&self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    SignedOut,
    /// Waiting for the external flow to hand back an identity.
    SigningIn,
    SignedIn(Identity),
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }
}

/// What the caller must do to finish signing in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInFlow {
    /// Send the user to this URL; the identity arrives later via
    /// [`SessionProvider::complete_sign_in`].
    Redirect { authorize_url: String },
    Completed(Identity),
}

/// External identity collaborator.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn begin_sign_in(&self) -> Result<SignInFlow, SessionError>;

    async fn sign_out(&self, identity: &Identity) -> Result<(), SessionError>;
}

/// Holds the current session and exposes sign-in/sign-out. Cheap to clone.
#[derive(Clone)]
pub struct SessionProvider {
    provider: Arc<dyn IdentityProvider>,
    state: Arc<watch::Sender<SessionState>>,
}

impl SessionProvider {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state, _) = watch::channel(SessionState::SignedOut);
        Self {
            provider,
            state: Arc::new(state),
        }
    }

    pub async fn sign_in(&self) -> Result<SignInFlow, SessionError> {
        self.state.send_replace(SessionState::SigningIn);

        match self.provider.begin_sign_in().await {
            Ok(SignInFlow::Completed(identity)) => {
                self.complete_sign_in(identity.clone());
                Ok(SignInFlow::Completed(identity))
            }
            Ok(flow) => Ok(flow),
            Err(e) => {
                warn!("Sign-in failed: {}", e);
                self.state.send_replace(SessionState::SignedOut);
                Err(e)
            }
        }
    }

    /// Records the identity handed back by the external flow.
    pub fn complete_sign_in(&self, identity: Identity) {
        info!(user_id = %identity.user_id, "Signed in");
        self.state.send_replace(SessionState::SignedIn(identity));
    }

    /// Signs out locally even if the provider call fails.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        let previous = self.state.send_replace(SessionState::SignedOut);
        match previous {
            SessionState::SignedIn(identity) => {
                info!(user_id = %identity.user_id, "Signed out");
                self.provider.sign_out(&identity).await
            }
            _ => Ok(()),
        }
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.state.borrow().identity().cloned()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::SigningIn)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProvider;

    #[async_trait]
    impl IdentityProvider for FailingProvider {
        async fn begin_sign_in(&self) -> Result<SignInFlow, SessionError> {
            Err(SessionError::SignInFailed("popup closed".to_string()))
        }

        async fn sign_out(&self, _identity: &Identity) -> Result<(), SessionError> {
            Err(SessionError::NotSignedIn)
        }
    }

    fn static_session(user_id: &str) -> SessionProvider {
        SessionProvider::new(Arc::new(StaticIdentityProvider::new(Identity::new(
            user_id,
        ))))
    }

    #[test]
    fn test_starts_signed_out() {
        let session = static_session("u1");
        assert_eq!(session.state(), SessionState::SignedOut);
        assert!(session.current_identity().is_none());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_static_sign_in_and_out() {
        let session = static_session("u1");
        let flow = session.sign_in().await.unwrap();
        assert!(matches!(flow, SignInFlow::Completed(_)));
        assert_eq!(session.current_identity().unwrap().user_id, "u1");

        session.sign_out().await.unwrap();
        assert!(session.current_identity().is_none());
    }

    #[tokio::test]
    async fn test_failed_sign_in_returns_to_signed_out() {
        let session = SessionProvider::new(Arc::new(FailingProvider));
        assert!(session.sign_in().await.is_err());
        assert_eq!(session.state(), SessionState::SignedOut);
    }

    #[tokio::test]
    async fn test_sign_out_when_signed_out_is_noop() {
        let session = SessionProvider::new(Arc::new(FailingProvider));
        session.sign_out().await.unwrap();
    }

    #[tokio::test]
    async fn test_sign_out_clears_state_even_if_provider_fails() {
        let session = SessionProvider::new(Arc::new(FailingProvider));
        session.complete_sign_in(Identity::new("u2"));
        assert!(session.sign_out().await.is_err());
        assert!(session.current_identity().is_none());
    }

    #[tokio::test]
    async fn test_redirect_flow_waits_for_completion() {
        let provider = OAuthRedirectProvider::new("https://project.example.co", "google", None)
            .unwrap();
        let session = SessionProvider::new(Arc::new(provider));
        let mut rx = session.subscribe();

        let flow = session.sign_in().await.unwrap();
        assert!(matches!(flow, SignInFlow::Redirect { .. }));
        assert!(session.is_loading());
        assert!(session.current_identity().is_none());

        session.complete_sign_in(Identity::new("u3"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().identity().unwrap().user_id, "u3");
    }

    #[test]
    fn test_identity_from_auth_user() {
        let json = r#"{
            "id": "5f1c",
            "email": "priya@example.com",
            "user_metadata": {"full_name": "Priya Patel", "avatar_url": "https://img/p.png"}
        }"#;
        let user: AuthUser = serde_json::from_str(json).unwrap();
        let identity = Identity::from_auth_user(user);
        assert_eq!(identity.user_id, "5f1c");
        assert_eq!(identity.label(), "Priya Patel");
        assert_eq!(identity.avatar_url.as_deref(), Some("https://img/p.png"));
    }

    #[test]
    fn test_identity_from_auth_session_keeps_token_private() {
        let json = r#"{
            "access_token": "eyJhbGciOi.user-token",
            "token_type": "bearer",
            "user": {"id": "5f1c", "email": "priya@example.com"}
        }"#;
        let session: AuthSession = serde_json::from_str(json).unwrap();
        let identity = Identity::from_auth_session(session);

        assert_eq!(identity.user_id, "5f1c");
        assert_eq!(
            identity.access_token.as_ref().map(AccessToken::expose),
            Some("eyJhbGciOi.user-token")
        );
        assert!(!format!("{:?}", identity).contains("user-token"));
        assert!(!serde_json::to_string(&identity).unwrap().contains("user-token"));
    }

    #[test]
    fn test_identity_label_fallbacks() {
        let identity = Identity::new("u1").with_email("a@example.com");
        assert_eq!(identity.label(), "a@example.com");
        assert_eq!(Identity::new("u1").label(), "u1");
        let blank = Identity::new("u1").with_display_name("  ");
        assert_eq!(blank.label(), "u1");
    }

    #[test]
    fn test_auth_user_without_metadata() {
        let user: AuthUser = serde_json::from_str(r#"{"id": "x"}"#).unwrap();
        let identity = Identity::from_auth_user(user);
        assert!(identity.display_name.is_none());
        assert!(identity.email.is_none());
    }
}
