//! Transaction scoping protocol
//!
//! This module decides the fate of a leased connection once the work using
//! it has finished. On settlement the connection is validated and then,
//! depending on the work's outcome, restored to the pool (after a rollback
//! when an explicit transaction was left open) or permanently invalidated.
//!
//! # Example
//!
//! ```ignore
//! use tidepool::scope::{TransactionScope, WorkOutcome};
//!
//! let lease = pool.acquire().await?;
//! let scope = TransactionScope::new(lease);
//! let result = do_work(scope.connection()).await;
//! scope
//!     .finish(if result.is_ok() { WorkOutcome::Succeeded } else { WorkOutcome::Failed })
//!     .await;
//! ```

mod scope;

#[cfg(test)]
mod tests;

pub use scope::{TransactionScope, WorkOutcome};
