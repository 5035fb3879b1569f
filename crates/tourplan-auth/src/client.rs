//! Sign-in / sign-up against the planner's token issuance endpoints.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::store::CredentialStore;

const SIGN_IN_PATH: &str = "/auth/signin";
const SIGN_UP_PATH: &str = "/auth/signup";
const MIN_PASSWORD_CHARS: usize = 6;

const SIGN_IN_FALLBACK: &str = "Sign in failed. Please try again.";
const SIGN_UP_FALLBACK: &str = "Signup failed. Please try again.";

#[derive(Debug, Clone, Default, Serialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

impl SignInForm {
    pub fn validate(&self) -> Result<(), Error> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err(Error::Validation("All fields are required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignUpForm {
    pub fn validate(&self) -> Result<(), Error> {
        if [&self.name, &self.email, &self.password, &self.confirm_password]
            .iter()
            .any(|field| field.is_empty())
        {
            return Err(Error::Validation("All fields are required".to_string()));
        }
        if self.password != self.confirm_password {
            return Err(Error::Validation("Passwords do not match".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(Error::Validation(format!(
                "Password must be at least {MIN_PASSWORD_CHARS} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<AuthUser>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthUser {
    #[serde(default)]
    name: Option<String>,
}

/// Result of a successful sign-in or sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub has_token: bool,
    pub display_name: Option<String>,
}

/// Issues bearer tokens and records them in the [`CredentialStore`].
pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
    credentials: CredentialStore,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>, credentials: CredentialStore) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            credentials,
        }
    }

    pub async fn sign_in(&self, form: &SignInForm) -> Result<SignedIn, Error> {
        form.validate()?;
        self.issue(SIGN_IN_PATH, form, SIGN_IN_FALLBACK).await
    }

    pub async fn sign_up(&self, form: &SignUpForm) -> Result<SignedIn, Error> {
        form.validate()?;
        self.issue(SIGN_UP_PATH, form, SIGN_UP_FALLBACK).await
    }

    async fn issue<F: Serialize>(
        &self,
        path: &str,
        form: &F,
        fallback: &str,
    ) -> Result<SignedIn, Error> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .json(form)
            .send()
            .await
            .map_err(Error::Network)?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Network)?;
        let parsed = serde_json::from_str::<AuthResponse>(&body);

        if !status.is_success() {
            let message = parsed
                .ok()
                .and_then(|r| r.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| fallback.to_string());
            tracing::info!(url = %url, status = status.as_u16(), "token issuance rejected");
            return Err(Error::Rejected(message));
        }

        let response = parsed?;
        if let Some(token) = response.access_token.as_deref() {
            self.credentials.save_token(token)?;
        }
        let display_name = response.user.and_then(|u| u.name);
        if let Some(name) = display_name.as_deref() {
            self.credentials.save_display_name(name)?;
        }
        tracing::info!(url = %url, "signed in");

        Ok(SignedIn {
            has_token: response.access_token.is_some(),
            display_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tourplan_db::Store;

    use super::{AuthClient, SignInForm, SignUpForm};
    use crate::error::Error;
    use crate::store::CredentialStore;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}")
    }

    fn credentials() -> CredentialStore {
        let store = Arc::new(Mutex::new(Store::open_in_memory().expect("open store")));
        CredentialStore::new("tourplan-test", store)
    }

    fn sign_up_form() -> SignUpForm {
        SignUpForm {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "hunter22".to_string(),
            confirm_password: "hunter22".to_string(),
        }
    }

    #[test]
    fn sign_up_validation_messages() {
        let mut form = sign_up_form();
        form.name.clear();
        assert_eq!(form.validate().unwrap_err().to_string(), "All fields are required");

        let mut form = sign_up_form();
        form.confirm_password = "different".to_string();
        assert_eq!(form.validate().unwrap_err().to_string(), "Passwords do not match");

        let mut form = sign_up_form();
        form.password = "abc".to_string();
        form.confirm_password = "abc".to_string();
        assert_eq!(
            form.validate().unwrap_err().to_string(),
            "Password must be at least 6 characters"
        );

        assert!(sign_up_form().validate().is_ok());
    }

    #[tokio::test]
    async fn sign_in_persists_token_and_name() {
        let router = Router::new().route(
            "/auth/signin",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["email"], "ada@example.com");
                Json(json!({ "access_token": "tok-1", "user": { "name": "Ada" } }))
            }),
        );
        let store = credentials();
        let client = AuthClient::new(serve(router).await, store.clone());

        let signed_in = client
            .sign_in(&SignInForm {
                email: "ada@example.com".to_string(),
                password: "pw".to_string(),
            })
            .await
            .expect("sign in");

        assert!(signed_in.has_token);
        let loaded = store.load().expect("load");
        assert_eq!(loaded.token.as_deref(), Some("tok-1"));
        assert_eq!(loaded.display_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn rejection_uses_server_message_or_fallback() {
        let router = Router::new()
            .route(
                "/auth/signin",
                post(|| async {
                    (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({ "message": "Invalid email or password" })),
                    )
                }),
            )
            .route(
                "/auth/signup",
                post(|| async { (StatusCode::CONFLICT, "duplicate") }),
            );
        let store = credentials();
        let client = AuthClient::new(serve(router).await, store.clone());

        let err = client
            .sign_in(&SignInForm {
                email: "ada@example.com".to_string(),
                password: "wrong".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid email or password");

        let err = client.sign_up(&sign_up_form()).await.unwrap_err();
        assert_eq!(err.to_string(), "Signup failed. Please try again.");
        assert!(!store.load().expect("load").is_authenticated());
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_network() {
        // Nothing listens on port 9; a request would fail as a network error.
        let client = AuthClient::new("http://127.0.0.1:9", credentials());
        let err = client.sign_in(&SignInForm::default()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got {err:?}");
    }
}
