//! Supabase clients
//!
//! Thin REST clients for the hosted backend:
//! - `SupabaseAuth`: GoTrue sign-in, code exchange and user metadata
//! - `SupabaseRest`: PostgREST upserts with the service role key
//! - `SupabaseStorage`: public bucket uploads

mod auth;
mod rest;
mod storage;
pub mod types;

pub use auth::SupabaseAuth;
pub use rest::SupabaseRest;
pub use storage::SupabaseStorage;
