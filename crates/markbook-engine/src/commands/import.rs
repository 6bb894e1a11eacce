//! Archive import orchestration.
//!
//! ## Pipeline (in order):
//! 1. Validate the request (required files, format constraints)
//! 2. Ensure the task exists and is not locked (no writes to books)
//! 3. Unpack the archive into a scoped scratch directory
//! 4. Scan student folders with the selected importer
//! 5. Per student: resolve, plan, and apply the plan in one transaction
//! 6. Copy book files and schedule replication
//!
//! Failures in steps 1-4 abort the run. Failures in step 5 are recorded
//! against the student and the batch continues.

use std::path::PathBuf;
use std::time::Instant;

use markbook_core::{
    log_op_end, log_op_error, log_op_start, ContentHasher, ExError, ImportError, ImportPolicy,
    ImportSummary, PageCounter, Reconciler, RequiredFileSet, Replicator,
    StudentId, StudentPlan, StudentSubmission,
};
use markbook_core_types::RequestId;
use markbook_ingest::{unpack, ImportFormat};
use markbook_store::repo::{AppliedPlan, SqliteRepo, TaskRecord};
use markbook_store::BookLayout;
use rusqlite::Connection;

use crate::staging::Staging;

const OP: &str = "import_archive";

/// One "import archive for task X requiring files [..]" request.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub task: String,
    pub archive: PathBuf,
    pub required: RequiredFileSet,
    pub format: ImportFormat,
}

/// Collaborators and settings injected into an import run.
pub struct ImportContext<'a> {
    pub layout: &'a BookLayout,
    pub policy: &'a ImportPolicy,
    pub hasher: &'a dyn ContentHasher,
    pub counter: &'a dyn PageCounter,
    pub replicator: &'a dyn Replicator,
    /// Parent for the run's scratch directory; the system temp dir if `None`
    pub scratch_parent: Option<PathBuf>,
}

/// Import an archive and return the run summary.
///
/// # Errors
///
/// Returns an `ExError` for archive-level failures (`Unpack`,
/// `FormatDiscovery`, `UnsupportedLayout`, `TaskLocked`, invalid input).
/// No book is touched in that case.
pub fn import_archive(
    request: &ImportRequest,
    conn: &mut Connection,
    ctx: &ImportContext<'_>,
) -> Result<ImportSummary, ExError> {
    let request_id = RequestId::new();
    let started = Instant::now();
    log_op_start!(
        OP,
        request_id = request_id.as_str(),
        task = request.task.as_str(),
        format = request.format.as_str(),
        archive = %request.archive.display()
    );

    match run_import(request, conn, ctx, ImportSummary::new(request_id.clone())) {
        Ok(summary) => {
            log_op_end!(
                OP,
                duration_ms = started.elapsed().as_millis() as u64,
                request_id = request_id.as_str(),
                created = summary.created,
                updated = summary.updated,
                skipped = summary.skipped,
                failed = summary.failures.len(),
                copied = summary.copied
            );
            Ok(summary)
        }
        Err(err) => {
            let err = err.with_op(OP).with_request_id(request_id.clone());
            log_op_error!(
                OP,
                err.clone(),
                duration_ms = started.elapsed().as_millis() as u64,
                request_id = request_id.as_str()
            );
            Err(err)
        }
    }
}

fn run_import(
    request: &ImportRequest,
    conn: &mut Connection,
    ctx: &ImportContext<'_>,
    mut summary: ImportSummary,
) -> Result<ImportSummary, ExError> {
    if request.required.is_empty() {
        return Err(ImportError::InvalidRequiredFiles {
            reason: "no required files given".to_string(),
        }
        .into());
    }
    let importer = request
        .format
        .importer(request.required.clone(), ctx.policy.clone())?;

    if let Some(task) = SqliteRepo::get_task_by_name(conn, &request.task)? {
        ensure_unlocked(&task)?;
    }

    let mut builder = tempfile::Builder::new();
    builder.prefix("markbook-import-");
    let scratch = match &ctx.scratch_parent {
        Some(parent) => builder.tempdir_in(parent),
        None => builder.tempdir(),
    }
    .map_err(|e| ImportError::io("create scratch dir", &e))?;
    let unpacked = scratch.path().join("unpacked");
    let extracted = scratch.path().join("extracted");

    let kind = unpack(&request.archive, &unpacked)?;
    tracing::debug!(kind = ?kind, "archive unpacked");

    let scan = importer.scan(&unpacked, &extracted)?;
    tracing::info!(root = %scan.root.display(), format = importer.format().as_str(), "scanning students");
    for warning in scan.warnings {
        warning.emit();
        summary.warnings.push(warning);
    }

    let task = SqliteRepo::ensure_task(conn, &request.task)?;
    ensure_unlocked(&task)?;

    let reconciler = Reconciler::new(ctx.hasher, ctx.counter, ctx.policy);
    let mut staging = Staging::new();

    for item in scan.students {
        let submission = match item {
            Ok(submission) => submission,
            Err(err) => match err.student_id().cloned() {
                Some(student_id) => {
                    record_student_failure(&mut summary, student_id, err);
                    continue;
                }
                None => return Err(err.into()),
            },
        };

        let student_id = submission.student_id.clone();
        match import_student(conn, ctx, &reconciler, &task, &request.required, &submission) {
            Ok(StudentImport { plan, applied }) => {
                for warning in plan.warnings {
                    warning.emit();
                    summary.warnings.push(warning);
                }
                summary.record(plan.action.outcome());
                if let Some(applied) = applied {
                    tracing::debug!(
                        student_id = student_id.as_str(),
                        book_id = applied.book_id,
                        pages_added = applied.pages_added,
                        pages_deleted = applied.pages_deleted,
                        markings_deleted = applied.markings_deleted,
                        annotations_deleted = applied.annotations_deleted,
                        "book written"
                    );
                    staging.queue(&student_id, applied.book_id, &plan.copies);
                }
            }
            Err(err) => {
                for warning in &submission.warnings {
                    warning.emit();
                }
                summary.warnings.extend(submission.warnings.iter().cloned());
                record_student_failure(&mut summary, student_id, err);
            }
        }
    }

    let report = staging.commit(ctx.layout, ctx.replicator);
    summary.copied = report.copied;
    summary.copy_failures = report.failures;

    drop(scratch);
    Ok(summary)
}

fn ensure_unlocked(task: &TaskRecord) -> Result<(), ImportError> {
    if task.is_locked {
        return Err(ImportError::TaskLocked {
            task: task.name.clone(),
        });
    }
    Ok(())
}

struct StudentImport {
    plan: StudentPlan,
    applied: Option<AppliedPlan>,
}

fn import_student(
    conn: &mut Connection,
    ctx: &ImportContext<'_>,
    reconciler: &Reconciler<'_>,
    task: &TaskRecord,
    required: &RequiredFileSet,
    submission: &StudentSubmission,
) -> Result<StudentImport, ImportError> {
    let student_id = &submission.student_id;
    let existing = SqliteRepo::load_existing_book(conn, ctx.layout, task.id, student_id)
        .map_err(|e| ImportError::Reconciliation {
            student_id: student_id.clone(),
            reason: e.to_string(),
        })?;

    let plan = reconciler.plan_student(required, submission, existing.as_ref())?;
    let applied = SqliteRepo::apply_plan(conn, task, &plan)?;
    Ok(StudentImport { plan, applied })
}

fn record_student_failure(
    summary: &mut ImportSummary,
    student_id: StudentId,
    err: ImportError,
) {
    let ex: ExError = err.clone().into();
    tracing::error!(
        student_id = student_id.as_str(),
        err_code = ex.code(),
        "student import failed: {}",
        ex
    );
    summary.record_failure(student_id, err);
}
