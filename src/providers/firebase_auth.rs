use async_trait::async_trait;
use reqwest::Response;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::core::auth::{AuthProvider, AuthSession};
use crate::core::error::AuthError;

/// Email/password accounts through the Identity Toolkit REST API, with
/// token refresh through the Secure Token API.
pub struct FirebaseAuthProvider {
    api_key: String,
    auth_url: String,
    token_url: String,
    client: reqwest::Client,
}

impl FirebaseAuthProvider {
    pub fn new(api_key: &str, auth_url: &str, token_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("fintrack/1.0")
            .build()?;
        Ok(Self {
            api_key: api_key.to_string(),
            auth_url: auth_url.trim_end_matches('/').to_string(),
            token_url: token_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post<T: DeserializeOwned>(&self, url: &str, body: &Value) -> Result<T, AuthError> {
        debug!("Requesting {}", url.split('?').next().unwrap_or(url));
        let response = self
            .client
            .post(format!("{url}?key={}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        parse(response).await
    }

    async fn accounts<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, AuthError> {
        let url = format!("{}/v1/accounts:{}", self.auth_url, method);
        self.post(&url, &body).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    id_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, AuthError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| AuthError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => AuthError::from_code(&body.error.message),
            Err(_) => AuthError::Transport(format!("HTTP {status}")),
        });
    }
    serde_json::from_str(&text)
        .map_err(|e| AuthError::Transport(format!("Failed to parse response: {e}")))
}

impl AccountResponse {
    /// Builds a session, keeping the tokens of `previous` where the
    /// response carries none.
    fn into_session(self, previous: Option<&AuthSession>) -> Result<AuthSession, AuthError> {
        let id_token = self
            .id_token
            .or_else(|| previous.map(|p| p.id_token.clone()))
            .ok_or_else(|| AuthError::Transport("Response carried no id token".to_string()))?;
        let refresh_token = self
            .refresh_token
            .or_else(|| previous.map(|p| p.refresh_token.clone()))
            .unwrap_or_default();
        Ok(AuthSession {
            uid: self.local_id,
            email: self.email,
            display_name: self.display_name.filter(|n| !n.is_empty()),
            id_token,
            refresh_token,
        })
    }
}

#[async_trait]
impl AuthProvider for FirebaseAuthProvider {
    #[instrument(name = "FirebaseSignIn", skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let body = json!({ "email": email, "password": password, "returnSecureToken": true });
        let account: AccountResponse = self.accounts("signInWithPassword", body).await?;
        account.into_session(None)
    }

    #[instrument(name = "FirebaseSignUp", skip(self, password))]
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let body = json!({ "email": email, "password": password, "returnSecureToken": true });
        let account: AccountResponse = self.accounts("signUp", body).await?;
        account.into_session(None)
    }

    #[instrument(name = "FirebaseUpdateProfile", skip(self, session), fields(uid = %session.uid))]
    async fn update_profile(
        &self,
        session: &AuthSession,
        display_name: &str,
    ) -> Result<AuthSession, AuthError> {
        let body = json!({
            "idToken": session.id_token,
            "displayName": display_name,
            "returnSecureToken": true,
        });
        let account: AccountResponse = self.accounts("update", body).await?;
        let mut updated = account.into_session(Some(session))?;
        if updated.email.is_none() {
            updated.email = session.email.clone();
        }
        Ok(updated)
    }

    #[instrument(name = "FirebaseRefresh", skip(self, session), fields(uid = %session.uid))]
    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, AuthError> {
        let url = format!("{}/v1/token", self.token_url);
        let body = json!({
            "grant_type": "refresh_token",
            "refresh_token": session.refresh_token,
        });
        let tokens: TokenResponse = self.post(&url, &body).await?;
        Ok(AuthSession {
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
            ..session.clone()
        })
    }
}
