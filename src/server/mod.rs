//! Server module for building HTTP servers
//!
//! This module provides a `ServerBuilder` that registers:
//! - Generic list/get/create/update/delete routes for every configured collection
//! - The topic overview route
//! - Health check routes

pub mod builder;
pub mod handlers;
pub mod router;

pub use builder::ServerBuilder;
pub use handlers::AppState;
