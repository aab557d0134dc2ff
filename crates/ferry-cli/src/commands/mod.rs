//! CLI commands

pub mod diagnose;
pub mod permissions;
pub mod serve;

pub use diagnose::diagnose;
pub use permissions::show_permissions;
pub use serve::serve;
