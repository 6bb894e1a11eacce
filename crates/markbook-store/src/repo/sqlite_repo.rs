//! SQLite repository for tasks, books and pages
//!
//! `apply_plan` is the only write path used by import. It runs one
//! student's plan in a single transaction: the whole plan lands or none of
//! it does.

#![allow(clippy::result_large_err)]

use chrono::{DateTime, TimeZone, Utc};
use markbook_core::errors::{ExError, ExErrorKind, ImportError};
use markbook_core::{ExistingBook, NewPage, PageRecord, PlanAction, StudentId, StudentPlan};
use rusqlite::{Connection, OptionalExtension, Transaction};

use crate::errors::{from_rusqlite, is_unique_violation, Result};
use crate::files::BookLayout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: i64,
    pub name: String,
    pub is_locked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRecord {
    pub id: i64,
    pub task_id: i64,
    pub student_id: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// What `apply_plan` wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedPlan {
    pub book_id: i64,
    pub pages_added: usize,
    pub pages_deleted: usize,
    pub markings_deleted: usize,
    pub annotations_deleted: usize,
}

impl AppliedPlan {
    fn untouched(book_id: i64) -> Self {
        Self {
            book_id,
            pages_added: 0,
            pages_deleted: 0,
            markings_deleted: 0,
            annotations_deleted: 0,
        }
    }
}

fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

fn from_micros(us: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_micros(us).single()
}

pub struct SqliteRepo;

impl SqliteRepo {
    // ===== Tasks =====

    pub fn get_task_by_name(conn: &Connection, name: &str) -> Result<Option<TaskRecord>> {
        conn.query_row(
            "SELECT id, name, is_locked FROM tasks WHERE name = ?1",
            [name],
            |row| {
                Ok(TaskRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    is_locked: row.get::<_, i64>(2)? != 0,
                })
            },
        )
        .optional()
        .map_err(from_rusqlite)
    }

    /// Fetch the task named `name`, creating it unlocked if absent
    pub fn ensure_task(conn: &Connection, name: &str) -> Result<TaskRecord> {
        if name.trim().is_empty() {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_op("ensure_task")
                .with_message("task name must not be empty"));
        }
        conn.execute(
            "INSERT INTO tasks (name, is_locked, created_at) VALUES (?1, 0, ?2)
             ON CONFLICT(name) DO NOTHING",
            rusqlite::params![name, Utc::now().timestamp()],
        )
        .map_err(from_rusqlite)?;

        Self::get_task_by_name(conn, name)?.ok_or_else(|| {
            ExError::new(ExErrorKind::Internal)
                .with_op("ensure_task")
                .with_entity_id(name)
                .with_message("task vanished after insert")
        })
    }

    pub fn set_task_locked(conn: &Connection, task_id: i64, locked: bool) -> Result<()> {
        let n = conn
            .execute(
                "UPDATE tasks SET is_locked = ?1 WHERE id = ?2",
                rusqlite::params![locked as i64, task_id],
            )
            .map_err(from_rusqlite)?;
        if n == 0 {
            return Err(ExError::new(ExErrorKind::NotFound)
                .with_op("set_task_locked")
                .with_entity_id(task_id.to_string())
                .with_message("task not found"));
        }
        Ok(())
    }

    // ===== Books =====

    pub fn find_book(
        conn: &Connection,
        task_id: i64,
        student_id: &StudentId,
    ) -> Result<Option<BookRecord>> {
        conn.query_row(
            "SELECT id, task_id, student_id, submitted_at_us FROM books
             WHERE task_id = ?1 AND student_id = ?2",
            rusqlite::params![task_id, student_id.as_str()],
            |row| {
                Ok(BookRecord {
                    id: row.get(0)?,
                    task_id: row.get(1)?,
                    student_id: row.get(2)?,
                    submitted_at: row.get::<_, Option<i64>>(3)?.and_then(from_micros),
                })
            },
        )
        .optional()
        .map_err(from_rusqlite)
    }

    pub fn list_books(conn: &Connection, task_id: i64) -> Result<Vec<BookRecord>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, task_id, student_id, submitted_at_us FROM books
                 WHERE task_id = ?1 ORDER BY student_id",
            )
            .map_err(from_rusqlite)?;
        let books = stmt
            .query_map([task_id], |row| {
                Ok(BookRecord {
                    id: row.get(0)?,
                    task_id: row.get(1)?,
                    student_id: row.get(2)?,
                    submitted_at: row.get::<_, Option<i64>>(3)?.and_then(from_micros),
                })
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(books)
    }

    pub fn list_pages(conn: &Connection, book_id: i64) -> Result<Vec<PageRecord>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, idx, file_path, file_index FROM pages
                 WHERE book_id = ?1 ORDER BY idx",
            )
            .map_err(from_rusqlite)?;
        let pages = stmt
            .query_map([book_id], |row| {
                Ok(PageRecord {
                    id: row.get(0)?,
                    index: row.get(1)?,
                    file_path: row.get(2)?,
                    file_index: row.get::<_, Option<i64>>(3)?.map(|n| n as u32),
                })
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(pages)
    }

    /// Load the planner's view of a student's book, if one exists
    pub fn load_existing_book(
        conn: &Connection,
        layout: &BookLayout,
        task_id: i64,
        student_id: &StudentId,
    ) -> Result<Option<ExistingBook>> {
        let Some(book) = Self::find_book(conn, task_id, student_id)? else {
            return Ok(None);
        };
        let pages = Self::list_pages(conn, book.id)?;
        Ok(Some(ExistingBook {
            book_id: book.id,
            submitted_at: book.submitted_at,
            pages,
            storage_dir: layout.book_dir(book.id),
        }))
    }

    // ===== Markings and annotations =====

    pub fn add_marking(
        conn: &Connection,
        book_id: i64,
        question: &str,
        marks: Option<f64>,
        remarks: Option<&str>,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO markings (book_id, question, marks, remarks) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![book_id, question, marks, remarks],
        )
        .map_err(from_rusqlite)?;
        Ok(conn.last_insert_rowid())
    }

    pub fn add_annotation(conn: &Connection, page_id: i64, data: &str) -> Result<i64> {
        conn.execute(
            "INSERT INTO annotations (page_id, data) VALUES (?1, ?2)",
            rusqlite::params![page_id, data],
        )
        .map_err(from_rusqlite)?;
        Ok(conn.last_insert_rowid())
    }

    pub fn count_markings(conn: &Connection, book_id: i64) -> Result<usize> {
        conn.query_row(
            "SELECT COUNT(*) FROM markings WHERE book_id = ?1",
            [book_id],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as usize)
        .map_err(from_rusqlite)
    }

    pub fn count_annotations(conn: &Connection, book_id: i64) -> Result<usize> {
        conn.query_row(
            "SELECT COUNT(*) FROM annotations
             WHERE page_id IN (SELECT id FROM pages WHERE book_id = ?1)",
            [book_id],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as usize)
        .map_err(from_rusqlite)
    }

    // ===== Import =====

    /// Apply one student's plan in its own transaction
    ///
    /// Returns `None` for skip plans, which touch nothing. Restore plans
    /// touch nothing either but return the book their copies belong to.
    ///
    /// # Errors
    ///
    /// Student-scoped `ImportError`s: `DuplicateBook` when another book for
    /// the student appeared since planning, `Reconciliation` when the task
    /// is locked, the book moved, or SQLite fails.
    pub fn apply_plan(
        conn: &mut Connection,
        task: &TaskRecord,
        plan: &StudentPlan,
    ) -> std::result::Result<Option<AppliedPlan>, ImportError> {
        if let PlanAction::RestoreFiles { book_id } = plan.action {
            return Ok(Some(AppliedPlan::untouched(book_id)));
        }
        if !plan.action.is_mutation() {
            return Ok(None);
        }

        let sid = &plan.student_id;
        let db_err = |e: rusqlite::Error| ImportError::Reconciliation {
            student_id: sid.clone(),
            reason: e.to_string(),
        };
        let reject = |reason: &str| ImportError::Reconciliation {
            student_id: sid.clone(),
            reason: reason.to_string(),
        };

        let tx = conn.transaction().map_err(db_err)?;

        let locked: Option<i64> = tx
            .query_row("SELECT is_locked FROM tasks WHERE id = ?1", [task.id], |row| {
                row.get(0)
            })
            .optional()
            .map_err(db_err)?;
        match locked {
            None => return Err(reject("task not found")),
            Some(n) if n != 0 => return Err(reject("task has been locked")),
            Some(_) => {}
        }

        let now = Utc::now().timestamp();
        let applied = match &plan.action {
            PlanAction::Create {
                submitted_at,
                pages,
            } => {
                let inserted = tx.execute(
                    "INSERT INTO books (task_id, student_id, submitted_at_us, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    rusqlite::params![task.id, sid.as_str(), to_micros(*submitted_at), now],
                );
                match inserted {
                    Ok(_) => {}
                    Err(e) if is_unique_violation(&e) => {
                        return Err(ImportError::DuplicateBook {
                            task: task.name.clone(),
                            student_id: sid.clone(),
                        })
                    }
                    Err(e) => return Err(db_err(e)),
                }
                let book_id = tx.last_insert_rowid();
                insert_pages(&tx, book_id, pages).map_err(db_err)?;
                AppliedPlan {
                    book_id,
                    pages_added: pages.len(),
                    pages_deleted: 0,
                    markings_deleted: 0,
                    annotations_deleted: 0,
                }
            }

            PlanAction::Update {
                book_id,
                submitted_at,
                delete_page_ids,
                add_pages,
                invalidate_markings,
            } => {
                advance_submitted_at(&tx, *book_id, task.id, *submitted_at, now)
                    .map_err(db_err)?
                    .then_some(())
                    .ok_or_else(|| reject("book changed since planning"))?;

                let (markings_deleted, annotations_deleted) = if *invalidate_markings {
                    invalidate_book(&tx, *book_id).map_err(db_err)?
                } else {
                    (0, 0)
                };

                let mut pages_deleted = 0;
                for page_id in delete_page_ids {
                    pages_deleted += tx
                        .execute(
                            "DELETE FROM pages WHERE id = ?1 AND book_id = ?2",
                            rusqlite::params![page_id, book_id],
                        )
                        .map_err(db_err)?;
                }
                if pages_deleted != delete_page_ids.len() {
                    return Err(reject("page set changed since planning"));
                }

                insert_pages(&tx, *book_id, add_pages).map_err(db_err)?;
                AppliedPlan {
                    book_id: *book_id,
                    pages_added: add_pages.len(),
                    pages_deleted,
                    markings_deleted,
                    annotations_deleted,
                }
            }

            PlanAction::AdvanceTimestamp {
                book_id,
                submitted_at,
            } => {
                advance_submitted_at(&tx, *book_id, task.id, *submitted_at, now)
                    .map_err(db_err)?
                    .then_some(())
                    .ok_or_else(|| reject("book changed since planning"))?;
                AppliedPlan::untouched(*book_id)
            }

            PlanAction::RestoreFiles { .. } | PlanAction::Skip { .. } => return Ok(None),
        };

        tx.commit().map_err(db_err)?;
        Ok(Some(applied))
    }

    // ===== Administration =====

    /// Delete a book with its pages, markings and annotations
    ///
    /// Returns the distinct file paths (relative to the book directory) the
    /// caller should remove from disk and from the mirror.
    pub fn delete_book(conn: &mut Connection, book_id: i64) -> Result<Vec<String>> {
        let tx = conn.transaction().map_err(from_rusqlite)?;

        let locked: Option<i64> = tx
            .query_row(
                "SELECT t.is_locked FROM books b JOIN tasks t ON t.id = b.task_id WHERE b.id = ?1",
                [book_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(from_rusqlite)?;
        match locked {
            None => {
                return Err(ExError::new(ExErrorKind::NotFound)
                    .with_op("delete_book")
                    .with_entity_id(book_id.to_string())
                    .with_message("book not found"))
            }
            Some(n) if n != 0 => {
                return Err(ExError::new(ExErrorKind::TaskLocked)
                    .with_op("delete_book")
                    .with_entity_id(book_id.to_string())
                    .with_message("task has been locked"))
            }
            Some(_) => {}
        }

        let mut stmt = tx
            .prepare("SELECT DISTINCT file_path FROM pages WHERE book_id = ?1 ORDER BY file_path")
            .map_err(from_rusqlite)?;
        let paths = stmt
            .query_map([book_id], |row| row.get::<_, String>(0))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        drop(stmt);

        invalidate_book(&tx, book_id).map_err(from_rusqlite)?;
        tx.execute("DELETE FROM pages WHERE book_id = ?1", [book_id])
            .map_err(from_rusqlite)?;
        tx.execute("DELETE FROM books WHERE id = ?1", [book_id])
            .map_err(from_rusqlite)?;

        tx.commit().map_err(from_rusqlite)?;
        Ok(paths)
    }
}

fn insert_pages(tx: &Transaction, book_id: i64, pages: &[NewPage]) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO pages (book_id, idx, file_path, file_index) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for page in pages {
        stmt.execute(rusqlite::params![
            book_id,
            page.index,
            page.file_path,
            page.file_index.map(i64::from)
        ])?;
    }
    Ok(())
}

/// Move `submitted_at` forward; false if the book is gone, belongs to
/// another task, or already holds this or a later version
fn advance_submitted_at(
    tx: &Transaction,
    book_id: i64,
    task_id: i64,
    submitted_at: DateTime<Utc>,
    now: i64,
) -> rusqlite::Result<bool> {
    let us = to_micros(submitted_at);
    let n = tx.execute(
        "UPDATE books SET submitted_at_us = ?1, updated_at = ?2
         WHERE id = ?3 AND task_id = ?4
           AND (submitted_at_us IS NULL OR submitted_at_us < ?1)",
        rusqlite::params![us, now, book_id, task_id],
    )?;
    Ok(n == 1)
}

/// Remove every marking and annotation on a book
fn invalidate_book(tx: &Transaction, book_id: i64) -> rusqlite::Result<(usize, usize)> {
    let annotations = tx.execute(
        "DELETE FROM annotations WHERE page_id IN (SELECT id FROM pages WHERE book_id = ?1)",
        [book_id],
    )?;
    let markings = tx.execute("DELETE FROM markings WHERE book_id = ?1", [book_id])?;
    Ok((markings, annotations))
}
