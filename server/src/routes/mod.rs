//! HTTP route handlers.
//!
//! [`filedb`] is the file database resource handler and sits behind the
//! [`crate::auth::require_permission`] middleware. [`health`] is public.

pub mod filedb;
pub mod health;
