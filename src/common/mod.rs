pub mod auth;
pub mod cookie;
pub mod cors;
pub mod error;
