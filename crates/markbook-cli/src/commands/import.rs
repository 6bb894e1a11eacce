//! Archive import command

use std::path::PathBuf;

use clap::Args;
use markbook_core::logging_facility::init;
use markbook_core::{ExError, ImportSummary, NoopReplicator, OverwrittenPolicy, Replicator, RequiredFileSet};
use markbook_engine::{
    apply_engine_command, AppConfig, EngineCommand, EngineCommandResult, ImportContext,
    ImportRequest, ReplicationQueue,
};
use markbook_ingest::ImportFormat;
use markbook_store::mirror::build_provider;
use markbook_store::{db, BookLayout, PdfInfoPageCounter, Sha256Hasher};

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Task (assignment) name; created on first import
    #[arg(long)]
    pub task: String,

    /// Submission archive (zip, tar or tar.gz)
    #[arg(long)]
    pub archive: PathBuf,

    /// Comma-separated required file names, e.g. a.pdf,b.txt
    #[arg(long)]
    pub files: String,

    /// Archive layout: log, tar, folder or single
    #[arg(long, default_value = "log")]
    pub format: ImportFormat,

    /// Config file (defaults to $MARKBOOK_CONFIG, then ./markbook.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Book storage root
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Overwritten-archive policy: compact or audit
    #[arg(long)]
    pub overwritten: Option<OverwrittenPolicy>,
}

/// Run the import; `Ok(false)` means the batch finished with failures
pub fn execute(args: ImportArgs) -> Result<bool, ExError> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(db_path) = args.db {
        config.db_path = db_path;
    }
    if let Some(data) = args.data {
        config.data_folder = data;
    }
    if let Some(policy) = args.overwritten {
        config.import.overwritten_policy = policy;
    }
    init(config.log_profile);

    let required = RequiredFileSet::parse_csv(&args.files)?;
    let mut conn = db::open_and_migrate(&config.db_path)?;
    let layout = BookLayout::new(&config.data_folder);
    let counter = PdfInfoPageCounter::new(&config.pdfinfo);

    let queue = config
        .mirror
        .clone()
        .map(|mirror| ReplicationQueue::start(build_provider(mirror), &config.data_folder));
    let replicator: &dyn Replicator = match &queue {
        Some(queue) => queue,
        None => &NoopReplicator,
    };

    let ctx = ImportContext {
        layout: &layout,
        policy: &config.import,
        hasher: &Sha256Hasher,
        counter: &counter,
        replicator,
        scratch_parent: config.scratch_dir.clone(),
    };
    let cmd = EngineCommand::ImportArchive(ImportRequest {
        task: args.task,
        archive: args.archive,
        required,
        format: args.format,
    });
    let result = apply_engine_command(cmd, &mut conn, &ctx);

    if let Some(queue) = queue {
        let stats = queue.shutdown();
        println!("replicated: {} ({} failed)", stats.uploaded, stats.failed);
    }

    let EngineCommandResult::ImportArchive(summary) = result?;
    print_summary(&summary);
    Ok(summary.is_complete())
}

fn print_summary(summary: &ImportSummary) {
    println!("request: {}", summary.request_id);
    println!("created: {}", summary.created);
    println!("updated: {}", summary.updated);
    println!("skipped: {}", summary.skipped);
    println!("copied: {}", summary.copied);

    for warning in &summary.warnings {
        println!("warning: {}", warning);
    }
    for failure in &summary.failures {
        let err = failure.to_ex_error();
        println!("failed: {} [{}] {}", failure.student_id, err.code(), err);
        if let Some(detail) = err.detail() {
            println!("  {}", detail);
        }
    }
    for copy in &summary.copy_failures {
        println!(
            "copy failed: {} book {} {}: {}",
            copy.student_id, copy.book_id, copy.file_path, copy.reason
        );
    }
}
