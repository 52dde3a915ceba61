//! # HTTP Request Handlers
//!
//! Thin adapters between HTTP and the ceremony engine. Each handler extracts
//! the session and body, calls one engine phase, and shapes the JSON reply.
//!
//! ## Submodules
//! - `health`: Health check endpoint (for monitoring)
//! - `auth`: Ceremony endpoints plus logout and session status
//! - `users`: Current user profile

pub mod auth;
pub mod health;
pub mod users;
