//! Data models for the Friendsgiving application.
//!
//! These models match the frontend TypeScript interfaces for seamless interoperability.

mod dish;
mod gallery;

pub use dish::*;
pub use gallery::*;

use chrono::Utc;

/// Generate a `<prefix>_<epoch-millis>_<9 hex chars>` identifier.
pub fn new_id(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), &suffix[..9])
}
