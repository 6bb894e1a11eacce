//! Structured logging for import runs
//!
//! - One initialization point, `init(profile)`, called by the binary
//! - Op-boundary macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//!   shared by every crate in the workspace
//! - An in-memory capture layer so tests can assert on emitted events
//!
//! ```rust
//! use markbook_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
