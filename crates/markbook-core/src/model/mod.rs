pub mod book;
pub mod required;
pub mod snapshot;
pub mod student;

pub use book::{ExistingBook, NewPage, PageRecord};
pub use required::RequiredFileSet;
pub use snapshot::{SnapshotSource, StudentSubmission, SubmissionSnapshot};
pub use student::StudentId;
