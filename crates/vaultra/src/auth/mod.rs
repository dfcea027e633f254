//! Signup, login, and bearer-token sessions.

pub mod password;
pub mod router;
pub mod service;
pub mod token;

pub use router::auth_router;
pub use service::{AuthService, AuthSession, LoginRequest, SignupRequest};
pub use token::{
    ConnectState, ConnectStateSigner, SessionClaims, SessionIssuer, TokenSigner,
    CONNECT_STATE_TTL_MINUTES,
};
