//! Types shared by every Markbook crate
//!
//! - `RequestId` correlating one import run across logs, errors and summary
//! - `Sensitive<T>` for values that must never reach a log line
//! - Canonical log field keys and event names

pub mod correlation;
pub mod schema;
pub mod sensitive;

pub use correlation::RequestId;
pub use sensitive::Sensitive;
