//! Bearer-token issuance against a target cluster's OAuth endpoint.
//!
//! Used by the inventory source's break-glass path: once an administrative
//! identity exists, a short-lived access token is requested from the
//! target's OAuth server with the identity's username/password.

use crate::error::ControllerError;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Issues a bearer token for a username/password against a target endpoint.
#[async_trait::async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn request_token(
        &self,
        api_url: &str,
        username: &str,
        password: &str,
    ) -> Result<String, ControllerError>;
}

/// Token issuer speaking the OAuth implicit challenge flow exposed by the
/// target clusters' integrated OAuth server.
pub struct OauthTokenIssuer {
    client: Client,
}

impl OauthTokenIssuer {
    pub fn new() -> Result<Self, ControllerError> {
        // The token comes back in a redirect Location fragment, so redirects
        // must not be followed.
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(Policy::none())
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| ControllerError::TokenRequest(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl TokenIssuer for OauthTokenIssuer {
    async fn request_token(
        &self,
        api_url: &str,
        username: &str,
        password: &str,
    ) -> Result<String, ControllerError> {
        let url = format!(
            "{}/oauth/authorize?response_type=token&client_id=openshift-challenging-client",
            api_url.trim_end_matches('/')
        );
        debug!("Requesting access token from {}", api_url);

        let response = self
            .client
            .get(&url)
            .basic_auth(username, Some(password))
            .header("X-CSRF-Token", "1")
            .send()
            .await
            .map_err(|e| ControllerError::TokenRequest(e.to_string()))?;

        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ControllerError::TokenRequest(format!(
                    "no redirect from OAuth endpoint, status {}",
                    response.status()
                ))
            })?;

        parse_access_token(location).ok_or_else(|| {
            ControllerError::TokenRequest("redirect carried no access_token".to_string())
        })
    }
}

/// Extract `access_token` from an implicit-flow redirect fragment.
fn parse_access_token(location: &str) -> Option<String> {
    let fragment = location.split_once('#')?.1;
    fragment.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == "access_token").then(|| value.to_string())
    })
}
