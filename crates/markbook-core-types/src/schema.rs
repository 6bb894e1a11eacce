//! Canonical field keys and event names for structured logging
//!
//! `tracing` macros need literal field names, so emitters spell these out;
//! the constants are what log consumers and the test capture match on.

pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_STUDENT_ID: &str = "student_id";
/// Snake-case `WarningKind` on warning events
pub const FIELD_WARNING: &str = "warning";
pub const FIELD_ERR_CODE: &str = "err_code";

pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
