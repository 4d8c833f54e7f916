//! # Hearth Common Library
//!
//! Shared code for the Hearth heat-engine services including:
//! - Database models, schema init and settings access
//! - The pure momentum ("heat") update rule and history replay
//! - Tier classification table
//! - Event types and broadcast bus, SSE bridge
//! - Configuration loading and global parameters
//! - Timestamp/day-key utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod heat;
pub mod params;
pub mod sse;
pub mod tiers;
pub mod time;

pub use error::{Error, Result};
pub use tiers::TierTable;
