use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};
use super::token::{SessionClaims, SessionIssuer};
use crate::error::ApiError;
use crate::ids::UserId;
use crate::store::RepositoryError;
use crate::users::{User, UserRepository};

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned by signup and login.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

/// Account registration, credential checks, and bearer resolution.
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionIssuer>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, sessions: Arc<dyn SessionIssuer>) -> Self {
        Self { users, sessions }
    }

    pub fn signup(&self, request: SignupRequest) -> Result<AuthSession, ApiError> {
        let email = normalize_email(&request.email)?;
        if self.users.find_user_by_email(&email)?.is_some() {
            return Err(ApiError::Conflict("Email already registered".to_string()));
        }
        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ApiError::validation(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            email,
            password_hash: hash_password(&request.password)?,
            name: request
                .name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };

        let user = self.users.insert_user(user).map_err(|err| match err {
            RepositoryError::Conflict(_) => {
                ApiError::Conflict("Email already registered".to_string())
            }
            other => other.into(),
        })?;
        let token = self.sessions.issue(&user, now)?;
        info!(user_id = %user.id, "user signed up");
        Ok(AuthSession { user, token })
    }

    pub fn login(&self, request: LoginRequest) -> Result<AuthSession, ApiError> {
        let invalid = || ApiError::unauthorized("Invalid credentials");
        let email = normalize_email(&request.email).map_err(|_| invalid())?;

        let Some(user) = self.users.find_user_by_email(&email)? else {
            return Err(invalid());
        };
        if !verify_password(&request.password, &user.password_hash)? {
            warn!(user_id = %user.id, "login rejected");
            return Err(invalid());
        }

        let token = self.sessions.issue(&user, Utc::now())?;
        Ok(AuthSession { user, token })
    }

    pub fn authenticate(&self, token: &str) -> Result<SessionClaims, ApiError> {
        self.sessions.resolve(token, Utc::now())
    }
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ApiError::validation("A valid email address is required")),
    }
}
