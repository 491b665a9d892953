//! Identity provider implementations.

use async_trait::async_trait;
use reqwest::Url;

use super::{Identity, IdentityProvider, SignInFlow};
use crate::error::SessionError;

/// Signs in as a fixed identity. Used offline and in tests.
pub struct StaticIdentityProvider {
    identity: Identity,
}

impl StaticIdentityProvider {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn begin_sign_in(&self) -> Result<SignInFlow, SessionError> {
        Ok(SignInFlow::Completed(self.identity.clone()))
    }

    async fn sign_out(&self, _identity: &Identity) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Hosted identity service using an OAuth redirect
/// (`{base_url}/auth/v1/authorize?provider=…`).
///
/// Sign-out is local; token revocation is left to the service's own expiry.
#[derive(Debug, Clone)]
pub struct OAuthRedirectProvider {
    authorize_endpoint: Url,
    provider: String,
    redirect_to: Option<String>,
}

impl OAuthRedirectProvider {
    pub fn new(
        base_url: &str,
        provider: &str,
        redirect_to: Option<&str>,
    ) -> Result<Self, SessionError> {
        let endpoint = format!("{}/auth/v1/authorize", base_url.trim_end_matches('/'));
        let authorize_endpoint =
            Url::parse(&endpoint).map_err(|e| SessionError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        if provider.trim().is_empty() {
            return Err(SessionError::SignInFailed(
                "OAuth provider name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            authorize_endpoint,
            provider: provider.to_string(),
            redirect_to: redirect_to.map(|s| s.to_string()),
        })
    }

    pub fn authorize_url(&self) -> String {
        let mut url = self.authorize_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("provider", &self.provider);
            if let Some(redirect) = &self.redirect_to {
                query.append_pair("redirect_to", redirect);
            }
        }
        url.to_string()
    }
}

#[async_trait]
impl IdentityProvider for OAuthRedirectProvider {
    async fn begin_sign_in(&self) -> Result<SignInFlow, SessionError> {
        Ok(SignInFlow::Redirect {
            authorize_url: self.authorize_url(),
        })
    }

    async fn sign_out(&self, _identity: &Identity) -> Result<(), SessionError> {
        Ok(())
    }
}
