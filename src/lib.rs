//! Shelfmark - book catalog server
//!
//! Books with shared deduplicated covers, reader reviews that go through a
//! moderation queue, approved-only rating aggregates, personal collections
//! and role-based access for admins, moderators and users.

pub mod access;
pub mod account;
pub mod api;
pub mod auth;
pub mod catalog;
pub mod collections;
pub mod config;
pub mod context;
pub mod cover_store;
pub mod db;
pub mod error;
pub mod reviews;
pub mod sanitize;
pub mod server;
pub mod validation;

#[cfg(test)]
mod testing;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{CatalogError, CatalogResult};
