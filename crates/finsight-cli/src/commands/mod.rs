//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, find_user)
//! - `import` - Statement import
//! - `reports` - Stats, anomalies, projections, recurring and the PDF report
//! - `serve` - Web server command
//! - `train` - Categorizer model training
//! - `users` - User management

pub mod core;
pub mod import;
pub mod reports;
pub mod serve;
pub mod train;
pub mod users;

// Re-export command functions for main.rs
pub use self::core::*;
pub use import::*;
pub use reports::*;
pub use serve::*;
pub use train::*;
pub use users::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
