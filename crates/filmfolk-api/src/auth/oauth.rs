//! Google OAuth 2.0 client
//!
//! Authorization-code flow: the browser is sent to Google's consent page
//! with a random `state`, comes back with a code, and the code is traded
//! for an access token that reads the userinfo endpoint.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use filmfolk_core::config::OAuthConfig;
use filmfolk_core::AuthProvider;
use rand::RngCore;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::service::SocialProfile;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

const GOOGLE_SCOPES: &str = "https://www.googleapis.com/auth/userinfo.email \
                             https://www.googleapis.com/auth/userinfo.profile";

/// Name of the cookie carrying the CSRF state between the two legs
pub const STATE_COOKIE: &str = "oauth_state";

/// Lifetime of the state cookie in seconds
pub const STATE_COOKIE_MAX_AGE: i64 = 600;

/// OAuth errors
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("OAuth provider is not configured")]
    NotConfigured,

    #[error("failed to exchange code for token: {0}")]
    Exchange(String),

    #[error("failed to get user info: {0}")]
    UserInfo(String),

    #[error("email not verified with Google")]
    UnverifiedEmail,

    #[error("OAuth request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// A social login provider
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn provider(&self) -> AuthProvider;

    /// Consent page URL carrying `state`
    fn authorization_url(&self, state: &str) -> Result<String, OAuthError>;

    /// Trade an authorization code for the user's verified profile
    async fn exchange_code(&self, code: &str) -> Result<SocialProfile, OAuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Userinfo payload
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub verified_email: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl GoogleUserInfo {
    /// Reject unverified addresses before they can claim an account
    pub fn into_profile(self) -> Result<SocialProfile, OAuthError> {
        if !self.verified_email {
            return Err(OAuthError::UnverifiedEmail);
        }
        Ok(SocialProfile {
            provider: AuthProvider::Google,
            provider_id: self.id,
            email: self.email,
            name: self.name,
            given_name: self.given_name,
            avatar_url: self.picture,
        })
    }
}

/// Google client built from the configured credentials
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_url: String,
}

impl GoogleOAuthClient {
    pub fn new(client_id: String, client_secret: String, redirect_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
            client_secret,
            redirect_url,
        }
    }

    /// `None` unless every Google credential is configured
    pub fn from_config(config: &OAuthConfig) -> Option<Self> {
        match (
            &config.google_client_id,
            &config.google_client_secret,
            &config.google_redirect_url,
        ) {
            (Some(id), Some(secret), Some(redirect)) => {
                Some(Self::new(id.clone(), secret.clone(), redirect.clone()))
            }
            _ => None,
        }
    }

    async fn fetch_access_token(&self, code: &str) -> Result<String, OAuthError> {
        let response: TokenResponse = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_url.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        match (response.access_token, response.error) {
            (Some(token), _) => Ok(token),
            (None, Some(error)) => Err(OAuthError::Exchange(match response.error_description {
                Some(description) => format!("{error}: {description}"),
                None => error,
            })),
            (None, None) => Err(OAuthError::Exchange(
                "token response missing access_token".to_string(),
            )),
        }
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthClient {
    fn provider(&self) -> AuthProvider {
        AuthProvider::Google
    }

    fn authorization_url(&self, state: &str) -> Result<String, OAuthError> {
        let url = Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", GOOGLE_SCOPES),
                ("state", state),
                ("access_type", "offline"),
            ],
        )
        .map_err(|e| OAuthError::Exchange(e.to_string()))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<SocialProfile, OAuthError> {
        let access_token = self.fetch_access_token(code).await?;

        let response = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(OAuthError::UserInfo(format!(
                "userinfo returned {}",
                response.status()
            )));
        }

        let info: GoogleUserInfo = response
            .json()
            .await
            .map_err(|e| OAuthError::UserInfo(e.to_string()))?;
        debug!(provider_id = %info.id, "fetched Google profile");
        info.into_profile()
    }
}

/// Random CSRF state: 32 bytes, URL-safe base64 without padding
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `Set-Cookie` value storing the state
pub fn state_cookie(state: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{STATE_COOKIE}={state}; HttpOnly; SameSite=Lax; Path=/; Max-Age={STATE_COOKIE_MAX_AGE}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value deleting the state cookie
pub fn clear_state_cookie(secure: bool) -> String {
    let mut cookie = format!("{STATE_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GoogleOAuthClient {
        GoogleOAuthClient::new(
            "client-123".to_string(),
            "shh".to_string(),
            "http://localhost:8080/api/v1/auth/google/callback".to_string(),
        )
    }

    #[test]
    fn test_authorization_url_parameters() {
        let url = client().authorization_url("abc").unwrap();
        let parsed = Url::parse(&url).unwrap();
        let params: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["state"], "abc");
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["response_type"], "code");
        assert!(params["scope"].contains("userinfo.email"));
        assert!(params["scope"].contains("userinfo.profile"));
        assert!(!url.contains("shh"));
    }

    #[test]
    fn test_generate_state() {
        let a = generate_state();
        let b = generate_state();
        assert_ne!(a, b);
        assert_eq!(URL_SAFE_NO_PAD.decode(&a).unwrap().len(), 32);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_state_cookie_attributes() {
        let cookie = state_cookie("xyz", false);
        assert!(cookie.starts_with("oauth_state=xyz"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=600"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));
        assert!(state_cookie("xyz", true).ends_with("; Secure"));
        assert!(clear_state_cookie(false).contains("Max-Age=0"));
    }

    #[test]
    fn test_unverified_email_rejected() {
        let info = GoogleUserInfo {
            id: "1".to_string(),
            email: "a@gmail.com".to_string(),
            verified_email: false,
            name: None,
            given_name: None,
            picture: None,
        };
        assert!(matches!(
            info.into_profile(),
            Err(OAuthError::UnverifiedEmail)
        ));
    }

    #[test]
    fn test_userinfo_deserialization() {
        let json = r#"{"id":"42","email":"bob@gmail.com","verified_email":true,
                       "name":"Bob Stone","given_name":"Bob","picture":"https://x/p.png",
                       "locale":"en"}"#;
        let profile = serde_json::from_str::<GoogleUserInfo>(json)
            .unwrap()
            .into_profile()
            .unwrap();
        assert_eq!(profile.provider_id, "42");
        assert_eq!(profile.given_name.as_deref(), Some("Bob"));
        assert_eq!(profile.provider, AuthProvider::Google);
    }

    #[test]
    fn test_from_config_requires_all_fields() {
        let mut config = OAuthConfig {
            google_client_id: Some("id".to_string()),
            google_client_secret: Some("secret".to_string()),
            google_redirect_url: None,
            frontend_url: None,
        };
        assert!(GoogleOAuthClient::from_config(&config).is_none());
        config.google_redirect_url = Some("http://localhost/cb".to_string());
        assert!(GoogleOAuthClient::from_config(&config).is_some());
    }
}
