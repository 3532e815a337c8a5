//! Domain types and DTOs
//!
//! These types define the dashboard document, saved-project records and the
//! request/response bodies of the HTTP API.

pub mod ai;
pub mod chat;
pub mod dashboard;
pub mod projects;
pub mod sessions;

// Re-export commonly used types
pub use chat::*;
pub use dashboard::*;
pub use projects::*;
pub use sessions::*;

// AI types are accessed via crate::domain::ai:: to avoid namespace pollution
