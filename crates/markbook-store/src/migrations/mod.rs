//! Migration framework
//!
//! Embedded SQL migrations applied once each, in order, with their SHA-256
//! recorded so that an edited migration is detected on the next open.

mod checksums;
mod embedded;
mod runner;

pub use runner::apply_migrations;
