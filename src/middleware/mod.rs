//! # Middleware Module
//!
//! Middleware runs before the route handlers and may short-circuit a request.
//!
//! ## Our Middleware
//! - `auth`: Checks the session belongs to a logged-in user

pub mod auth;
