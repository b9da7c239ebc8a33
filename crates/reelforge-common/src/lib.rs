//! Reelforge-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across reelforge:
//!
//! - **Typed IDs**: Wrappers for queue item and run identifiers
//! - **Core Types**: Queue item model and its status lifecycle
//! - **Path Utilities**: Scratch directory layout for generated assets
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use reelforge_common::{ItemId, ItemStatus, Error, Result};
//!
//! let id = ItemId::from("42");
//! let status: ItemStatus = "in_progress".parse().unwrap();
//! assert_eq!(status, ItemStatus::InProgress);
//! assert!(status.can_transition_to(ItemStatus::Done));
//!
//! fn lookup(id: &ItemId) -> Result<()> {
//!     Err(Error::not_found(id.to_string()))
//! }
//! # assert!(lookup(&id).is_err());
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
