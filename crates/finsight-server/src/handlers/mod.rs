//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod analytics;
pub mod audit;
pub mod auth;
pub mod model;
pub mod reports;
pub mod rules;
pub mod transactions;
pub mod upload;

// Re-export all handlers for use in router
pub use analytics::*;
pub use audit::*;
pub use auth::*;
pub use model::*;
pub use reports::*;
pub use rules::*;
pub use transactions::*;
pub use upload::*;
