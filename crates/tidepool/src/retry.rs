//! Retry policy for connection acquisition
//!
//! This module provides the retry schedule applied to the caller-supplied
//! connect operation: a bounded number of attempts with exponential backoff
//! between them.
//!
//! # Example
//!
//! ```ignore
//! use tidepool::retry::{BackoffStrategy, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3, BackoffStrategy::new(100, 30_000));
//! let conn = policy.run(|| factory.connect()).await?;
//! ```

mod backoff;
mod policy;


pub use backoff::BackoffStrategy;
pub use policy::RetryPolicy;
