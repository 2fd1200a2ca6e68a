//! Core abstractions for the dispatch engine: worker identity and pools,
//! work units, the worker execution task, and error types.

pub mod error;
pub mod pool;
pub mod unit;
pub mod worker;

pub use error::{AdminError, PoolError};
pub use pool::{WorkerId, WorkerPool, WorkerStatus};
