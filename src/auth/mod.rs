//! OAuth Authentication Module
//!
//! Provides browser OAuth sign-in against the identity provider
//! Supports:
//! - PKCE sign-in start with consent flags carried through the redirect
//! - Authorization code callback with best-effort consent metadata
//! - Session lookup and sign-out

mod handler;
mod pkce;
mod provider;
pub mod redirect;
mod router;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use provider::{ExchangeError, IdentityProvider};
pub use router::{AuthSettings, AuthState, create_auth_router};
