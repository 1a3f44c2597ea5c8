//! Document store for users, posts and comments.
//!
//! Services talk to a [`store::Store`]; [`postgres::PgStore`] backs it with
//! PostgreSQL and [`memory::MemoryStore`] keeps everything in process.

pub mod batch;
pub mod memory;
pub mod postgres;
mod record;
pub mod store;
