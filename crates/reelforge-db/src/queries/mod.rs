//! Database query modules.
//!
//! - queue_items: queue item CRUD and status-checked transitions

pub mod queue_items;
