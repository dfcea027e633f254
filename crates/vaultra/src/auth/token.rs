use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::ids::{BusinessId, UserId};
use crate::users::User;

const INVALID_TOKEN: &str = "Invalid or expired token";

/// How long a provider connect flow may take between redirect and callback.
pub const CONNECT_STATE_TTL_MINUTES: i64 = 10;

/// Payload carried inside a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: UserId,
    pub email: String,
    /// Expiry as unix seconds.
    pub exp: i64,
}

/// OAuth `state` for a provider connect: who started it, for which business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectState {
    pub business_id: BusinessId,
    pub user_id: UserId,
    pub exp: i64,
}

/// Issues and resolves bearer sessions.
pub trait SessionIssuer: Send + Sync {
    fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<String, ApiError>;
    fn resolve(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, ApiError>;
}

/// Signs the OAuth `state` round-tripped through the payment provider.
pub trait ConnectStateSigner: Send + Sync {
    fn sign_state(
        &self,
        business_id: BusinessId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<String, ApiError>;
    fn verify_state(&self, state: &str, now: DateTime<Utc>) -> Result<ConnectState, ApiError>;
}

/// HS256 JWTs for sessions and connect state.
///
/// Expiry is checked against the caller's `now` rather than the wall clock.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl_days: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
            ttl: Duration::days(ttl_days),
        }
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, ApiError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|err| ApiError::internal(format!("token signing failed: {err}")))
    }

    fn verify<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        decode::<T>(token, &self.decoding, &validation)
            .ok()
            .map(|data| data.claims)
    }
}

impl SessionIssuer for TokenSigner {
    fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<String, ApiError> {
        self.sign(&SessionClaims {
            user_id: user.id,
            email: user.email.clone(),
            exp: (now + self.ttl).timestamp(),
        })
    }

    fn resolve(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, ApiError> {
        self.verify::<SessionClaims>(token)
            .filter(|claims| claims.exp > now.timestamp())
            .ok_or_else(|| ApiError::unauthorized(INVALID_TOKEN))
    }
}

impl ConnectStateSigner for TokenSigner {
    fn sign_state(
        &self,
        business_id: BusinessId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<String, ApiError> {
        self.sign(&ConnectState {
            business_id,
            user_id,
            exp: (now + Duration::minutes(CONNECT_STATE_TTL_MINUTES)).timestamp(),
        })
    }

    fn verify_state(&self, state: &str, now: DateTime<Utc>) -> Result<ConnectState, ApiError> {
        self.verify::<ConnectState>(state)
            .filter(|claims| claims.exp > now.timestamp())
            .ok_or_else(|| ApiError::validation("Invalid OAuth state"))
    }
}
