//! Op-boundary logging macros
//!
//! Each op emits exactly one `start` event and one of `end` / `end_error`.
//! Extra `tracing` fields may follow the fixed ones. Expanding crates must
//! depend on `markbook-core-types` for the event names.

/// Emit the `start` event of an op
///
/// ```
/// # use markbook_core::log_op_start;
/// log_op_start!("import_archive");
/// log_op_start!("import_archive", task = "hw1", format = "log");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)+)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = markbook_core_types::schema::EVENT_START,
            $($($field)+)?
        )
    };
}

/// Emit the `end` event of an op that succeeded
///
/// ```
/// # use markbook_core::log_op_end;
/// log_op_end!("import_archive", duration_ms = 42u64);
/// log_op_end!("import_archive", duration_ms = 42u64, created = 3);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)+)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = markbook_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($($field)+)?
        )
    };
}

/// Emit the `end_error` event of an op that failed
///
/// `$err` is anything convertible into `ExError`; its stable code lands in
/// `err_code`.
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)+)?) => {{
        let failure: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = markbook_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?failure.kind(),
            err_code = failure.code(),
            message = %failure,
            $($($field)+)?
        );
    }};
}
