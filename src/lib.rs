//! Reelforge - queue-driven short video automation
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod credentials;
pub mod error;
pub mod google;
pub mod http;
pub mod ideas;
pub mod logging;
pub mod pipeline;
pub mod providers;
pub mod queue;
pub mod retry;
