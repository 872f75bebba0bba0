//! HTTP load generator.
//!
//! A [`Dispatcher`] issues a fixed number of requests described by a
//! [`RequestPlan`] against a single target, never keeping more than the
//! configured number in flight, and aggregates latencies in a shared
//! [`StatsAggregator`] that a [`Reporter`] logs periodically.

pub mod admission;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod plan;
pub mod reporter;
pub mod stats;
pub mod worker;

pub use crate::config::Config;
pub use crate::dispatcher::{AbortCause, Dispatcher, RunOutcome};
pub use crate::error::{ConfigError, RequestError};
pub use crate::plan::RequestPlan;
pub use crate::reporter::Reporter;
pub use crate::stats::{Snapshot, StatsAggregator};
pub use crate::worker::RequestWorker;
