//! Roundtable Core - Core data structures and trait definitions
//!
//! Defines the capability seams (text generation, search, checkpointing),
//! the shared data model, and the ambient utilities used across the
//! Roundtable workspace.

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use retry::*;
pub use traits::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tokio;
pub use tracing;
