//! Engine-level commands that require I/O (database, book files).

use markbook_core::{ExError, ImportSummary};
use rusqlite::Connection;

use crate::commands::import::{import_archive, ImportContext, ImportRequest};

/// Engine-level commands.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Import one submission archive into a task.
    ImportArchive(ImportRequest),
}

/// Result of applying an engine command.
#[derive(Debug, Clone)]
pub enum EngineCommandResult {
    ImportArchive(ImportSummary),
}

/// Apply an engine command against an open store.
///
/// # Errors
///
/// Run-level failures only; per-student failures are part of the summary.
pub fn apply_engine_command(
    cmd: EngineCommand,
    conn: &mut Connection,
    ctx: &ImportContext<'_>,
) -> Result<EngineCommandResult, ExError> {
    match cmd {
        EngineCommand::ImportArchive(request) => {
            import_archive(&request, conn, ctx).map(EngineCommandResult::ImportArchive)
        }
    }
}
