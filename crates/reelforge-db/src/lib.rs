//! Reelforge-DB: SQLite storage for the content queue.
//!
//! This crate backs the local queue with SQLite through rusqlite and r2d2
//! connection pooling. Status changes are compare-and-set updates so two
//! writers cannot both move the same item.
//!
//! # Modules
//!
//! - `migrations` - Embedded schema migrations
//! - `pool` - Connection pool management
//! - `queries` - Queue item operations
//!
//! # Example
//!
//! ```no_run
//! use reelforge_common::{ItemId, ItemStatus, ItemUpdate, QueueItem};
//! use reelforge_db::pool::{init_pool, get_conn};
//! use reelforge_db::queries::queue_items;
//!
//! let pool = init_pool("queue.sqlite").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let item = QueueItem::new_pending(ItemId::from("1"), "POV: You are a scribe");
//! queue_items::insert_item(&conn, &item).unwrap();
//! queue_items::transition(
//!     &conn,
//!     &item.id,
//!     ItemStatus::Pending,
//!     ItemStatus::InProgress,
//!     &ItemUpdate::default(),
//! )
//! .unwrap();
//! ```

pub mod migrations;
pub mod pool;
pub mod queries;
