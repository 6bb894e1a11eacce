//! Phase one of an import: decide what to do with one student's book
//!
//! The planner reads files (to hash and count pages) but never writes. Its
//! output is a `StudentPlan` that the store applies in one transaction and
//! whose `copies` are executed only after every student has been planned.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::collaborators::{ContentHasher, PageCounter};
use crate::errors::{ImportError, Result};
use crate::model::{ExistingBook, NewPage, RequiredFileSet, StudentId, StudentSubmission};
use crate::policy::{is_multi_page, ImportPolicy};
use crate::resolve::{resolve_files, Resolution, ResolvedFile};
use crate::summary::{ImportWarning, Outcome, WarningKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The student contributed no required file
    NoFiles,
    /// This exact version is already stored
    AlreadyImported,
    /// The stored version is newer than anything in the archive
    OlderThanStored,
    /// Newer version with identical content, and the policy keeps the timestamp
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanAction {
    Create {
        submitted_at: DateTime<Utc>,
        pages: Vec<NewPage>,
    },
    Update {
        book_id: i64,
        submitted_at: DateTime<Utc>,
        delete_page_ids: Vec<i64>,
        add_pages: Vec<NewPage>,
        /// Remove every marking and annotation on the book
        invalidate_markings: bool,
    },
    /// Newer version with identical content: only `submitted_at` moves
    AdvanceTimestamp {
        book_id: i64,
        submitted_at: DateTime<Utc>,
    },
    /// Version already stored but some of its files never landed on disk;
    /// only the plan's copies run, the database is left alone
    RestoreFiles {
        book_id: i64,
    },
    Skip {
        reason: SkipReason,
    },
}

impl PlanAction {
    pub fn outcome(&self) -> Outcome {
        match self {
            PlanAction::Create { .. } => Outcome::Created,
            PlanAction::Update { .. } => Outcome::Updated,
            PlanAction::AdvanceTimestamp { .. }
            | PlanAction::RestoreFiles { .. }
            | PlanAction::Skip { .. } => Outcome::Skipped,
        }
    }

    /// Whether applying the plan writes to the database
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            PlanAction::Create { .. } | PlanAction::Update { .. } | PlanAction::AdvanceTimestamp { .. }
        )
    }
}

/// A physical copy deferred until the whole batch has been planned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCopy {
    pub source: PathBuf,
    /// Destination relative to the book's storage directory
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentPlan {
    pub student_id: StudentId,
    pub action: PlanAction,
    pub copies: Vec<PendingCopy>,
    pub warnings: Vec<ImportWarning>,
}

impl StudentPlan {
    fn skip(student_id: &StudentId, reason: SkipReason, warnings: Vec<ImportWarning>) -> Self {
        Self {
            student_id: student_id.clone(),
            action: PlanAction::Skip { reason },
            copies: Vec::new(),
            warnings,
        }
    }
}

/// Pure planner over injected hashing and page counting
pub struct Reconciler<'a> {
    hasher: &'a dyn ContentHasher,
    counter: &'a dyn PageCounter,
    policy: &'a ImportPolicy,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        hasher: &'a dyn ContentHasher,
        counter: &'a dyn PageCounter,
        policy: &'a ImportPolicy,
    ) -> Self {
        Self {
            hasher,
            counter,
            policy,
        }
    }

    /// Resolve the student's snapshots and plan against the stored book
    ///
    /// # Errors
    ///
    /// Returns a student-scoped error if a newly resolved file cannot be
    /// read for hashing.
    pub fn plan_student(
        &self,
        required: &RequiredFileSet,
        submission: &StudentSubmission,
        existing: Option<&ExistingBook>,
    ) -> Result<StudentPlan> {
        let resolution = resolve_files(required, &submission.snapshots);
        let mut warnings = submission.warnings.clone();
        warnings.extend(resolution.staleness_warnings(&submission.student_id));
        self.plan(&submission.student_id, &resolution, existing, warnings)
    }

    /// Plan from an already computed resolution
    ///
    /// # Errors
    ///
    /// See [`Reconciler::plan_student`].
    pub fn plan(
        &self,
        student_id: &StudentId,
        resolution: &Resolution,
        existing: Option<&ExistingBook>,
        mut warnings: Vec<ImportWarning>,
    ) -> Result<StudentPlan> {
        let Some(resolved_at) = resolution.resolved_at else {
            return Ok(StudentPlan::skip(student_id, SkipReason::NoFiles, warnings));
        };

        match existing {
            None => Ok(self.plan_create(student_id, resolution, resolved_at, warnings)),
            Some(book) => match book.submitted_at {
                Some(stored) if stored == resolved_at => {
                    Ok(Self::plan_restore(student_id, resolution, book, warnings))
                }
                Some(stored) if stored > resolved_at => {
                    warnings.push(ImportWarning::student(
                        student_id,
                        WarningKind::OlderThanStored,
                        format!(
                            "archive version {} is older than stored version {}",
                            resolved_at.to_rfc3339(),
                            stored.to_rfc3339()
                        ),
                    ));
                    Ok(StudentPlan::skip(
                        student_id,
                        SkipReason::OlderThanStored,
                        warnings,
                    ))
                }
                _ => self.plan_update(student_id, resolution, resolved_at, book, warnings),
            },
        }
    }

    /// Same version as stored: re-copy any page file missing from disk
    ///
    /// A failed copy in an earlier run leaves the rows committed and the
    /// files absent; the resolved files of this version put them back.
    fn plan_restore(
        student_id: &StudentId,
        resolution: &Resolution,
        book: &ExistingBook,
        mut warnings: Vec<ImportWarning>,
    ) -> StudentPlan {
        let mut copies = Vec::new();
        for file_path in book.missing_files() {
            match resolution.get(&file_path) {
                Some(file) => copies.push(PendingCopy {
                    source: file.path.clone(),
                    file_path,
                }),
                None => warnings.push(ImportWarning::student(
                    student_id,
                    WarningKind::MissingStoredFile,
                    format!("stored {file_path} is missing and the archive does not provide it"),
                )),
            }
        }

        if copies.is_empty() {
            return StudentPlan::skip(student_id, SkipReason::AlreadyImported, warnings);
        }
        warnings.push(ImportWarning::student(
            student_id,
            WarningKind::MissingStoredFile,
            format!("restoring {} missing stored file(s)", copies.len()),
        ));
        StudentPlan {
            student_id: student_id.clone(),
            action: PlanAction::RestoreFiles {
                book_id: book.book_id,
            },
            copies,
            warnings,
        }
    }

    fn plan_create(
        &self,
        student_id: &StudentId,
        resolution: &Resolution,
        resolved_at: DateTime<Utc>,
        mut warnings: Vec<ImportWarning>,
    ) -> StudentPlan {
        let mut pages = Vec::new();
        let mut copies = Vec::new();
        let mut next_index = 1;

        for file in &resolution.files {
            match self.split(student_id, file, next_index) {
                Ok(new_pages) => {
                    next_index += new_pages.len() as i64;
                    pages.extend(new_pages);
                    copies.push(PendingCopy {
                        source: file.path.clone(),
                        file_path: file.logical_name.clone(),
                    });
                }
                Err(warning) => warnings.push(warning),
            }
        }

        if pages.is_empty() {
            return StudentPlan::skip(student_id, SkipReason::NoFiles, warnings);
        }

        StudentPlan {
            student_id: student_id.clone(),
            action: PlanAction::Create {
                submitted_at: resolved_at,
                pages,
            },
            copies,
            warnings,
        }
    }

    fn plan_update(
        &self,
        student_id: &StudentId,
        resolution: &Resolution,
        resolved_at: DateTime<Utc>,
        book: &ExistingBook,
        mut warnings: Vec<ImportWarning>,
    ) -> Result<StudentPlan> {
        let mut next_index = book.next_index();
        let mut delete_page_ids = Vec::new();
        let mut add_pages = Vec::new();
        let mut copies = Vec::new();
        let mut content_changed = false;

        for file in &resolution.files {
            let stored_pages = book.pages_at(&file.logical_name);

            if !stored_pages.is_empty() {
                let new_digest = self
                    .hasher
                    .digest(&file.path)
                    .map_err(|e| ImportError::student_io(student_id, "hash resolved file", &e))?;
                let stored_path = book.storage_dir.join(&file.logical_name);
                match self.hasher.digest(&stored_path) {
                    Ok(stored_digest) if stored_digest == new_digest => continue,
                    Ok(_) => {}
                    Err(e) => warnings.push(ImportWarning::student(
                        student_id,
                        WarningKind::StoredFileUnreadable,
                        format!(
                            "stored {} unreadable ({}); treating as changed",
                            file.logical_name, e
                        ),
                    )),
                }
            }

            let new_pages = match self.split(student_id, file, next_index) {
                Ok(p) => p,
                Err(warning) => {
                    warnings.push(warning);
                    continue;
                }
            };
            next_index += new_pages.len() as i64;

            if !stored_pages.is_empty() {
                delete_page_ids.extend(stored_pages.iter().map(|p| p.id));
                content_changed = true;
            }
            add_pages.extend(new_pages);
            copies.push(PendingCopy {
                source: file.path.clone(),
                file_path: file.logical_name.clone(),
            });
        }

        let action = if add_pages.is_empty() && delete_page_ids.is_empty() {
            if self.policy.advance_unchanged_timestamp {
                PlanAction::AdvanceTimestamp {
                    book_id: book.book_id,
                    submitted_at: resolved_at,
                }
            } else {
                PlanAction::Skip {
                    reason: SkipReason::Unchanged,
                }
            }
        } else {
            PlanAction::Update {
                book_id: book.book_id,
                submitted_at: resolved_at,
                delete_page_ids,
                add_pages,
                invalidate_markings: content_changed,
            }
        };

        Ok(StudentPlan {
            student_id: student_id.clone(),
            action,
            copies,
            warnings,
        })
    }

    /// Expand one file into pages starting at `start_index`
    fn split(
        &self,
        student_id: &StudentId,
        file: &ResolvedFile,
        start_index: i64,
    ) -> std::result::Result<Vec<NewPage>, ImportWarning> {
        if !is_multi_page(&file.logical_name) {
            return Ok(vec![NewPage {
                index: start_index,
                file_path: file.logical_name.clone(),
                file_index: None,
            }]);
        }

        let split_warning = |reason: String| {
            let err = ImportError::DocumentSplit {
                student_id: student_id.clone(),
                file: file.logical_name.clone(),
                reason,
            };
            ImportWarning::student(student_id, WarningKind::DocumentSplit, err.to_string())
        };

        let count = self
            .counter
            .count_pages(&file.path)
            .map_err(|e| split_warning(e.reason))?;
        if count == 0 {
            return Err(split_warning("document has no pages".to_string()));
        }

        Ok((1..=count)
            .map(|n| NewPage {
                index: start_index + i64::from(n) - 1,
                file_path: file.logical_name.clone(),
                file_index: Some(n),
            })
            .collect())
    }
}
