//! Tidepool Core - Core abstractions for the Tidepool connection pool
//!
//! This crate defines the traits and types the pool crate builds on:
//!
//! - `RawConnection` - The capability surface the pool requires from a
//!   live database connection (liveness probe, auto-commit inspection,
//!   rollback, close)
//! - `ConnectionFactory` - The caller-supplied boundary that opens new
//!   physical connections
//! - `TidepoolError` / `Result` - The common error type and result alias

mod connection;
mod error;

pub use connection::*;
pub use error::*;
