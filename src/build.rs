use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use walkdir::WalkDir;

use crate::bib::{backup_file, AddOutcome, Bibliography, ImportPolicy};
use crate::config::{RunContext, NO_DUP_VAR, PDF_DIR_VAR};
use crate::doi::Resolver;
use crate::error::Result;
use crate::pdf::PageTextSource;

/// Settings for one `build` run, already resolved against directives and environment.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub bib_file: PathBuf,
    pub pdf_dir: PathBuf,
    pub prune: bool,
    pub no_backup: bool,
    pub no_duplicates: bool,
    /// Only rewrite home directories in `file` fields; import nothing.
    pub update_home_dir: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub added: Vec<String>,
    pub skipped: usize,
    /// Documents that could not be imported, with the reason.
    pub failed: Vec<(PathBuf, String)>,
    pub pruned: Vec<String>,
}

/// Open the store at `path`, or start an empty one if there is no file yet.
///
/// An existing file is copied to `<path>.bak` first unless `no_backup`.
pub fn init_bib_database(path: &Path, no_backup: bool, update_home: bool) -> Result<Bibliography> {
    if !path.is_file() {
        info!("{} does not exist, starting a new bibliography", path.display());
        return Ok(Bibliography::with_label(path.display().to_string()));
    }

    if !no_backup {
        backup_file(path)?;
    }
    let mut bibliography = Bibliography::load(path)?;
    if update_home {
        if let Some(home) = dirs::home_dir() {
            let changed = bibliography.update_home_dir(&home);
            info!("Updated the home directory of {} file paths", changed);
        }
    }
    Ok(bibliography)
}

/// Every `.pdf` below `root`, as absolute paths sorted by file name.
pub fn pdf_files(root: &Path) -> Result<Vec<PathBuf>> {
    let root = fs::canonicalize(root)?;
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let is_pdf = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if entry.file_type().is_file() && is_pdf {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Import every PDF below `root` into `bibliography`.
///
/// Per-document failures are logged and recorded in the report; anything
/// else stops the walk.
pub fn update_database_from_folder(
    bibliography: &mut Bibliography,
    root: &Path,
    policy: &ImportPolicy,
    pdf_source: &dyn PageTextSource,
    resolver: &dyn Resolver,
) -> Result<BuildReport> {
    let mut report = BuildReport::default();
    for pdf_file in pdf_files(root)? {
        match bibliography.add_entry_by_file(&pdf_file, policy, pdf_source, resolver) {
            Ok(AddOutcome::Added(key)) => report.added.push(key),
            Ok(AddOutcome::SkippedFile | AddOutcome::SkippedDoi(_)) => report.skipped += 1,
            Err(err) if err.is_recoverable() => {
                warn!("{}", err);
                report.failed.push((pdf_file, err.to_string()));
            }
            Err(err) => return Err(err),
        }
    }
    info!(
        "Added {} entries, skipped {}, failed {}",
        report.added.len(),
        report.skipped,
        report.failed.len()
    );
    Ok(report)
}

/// Full `build` command: open, optionally prune, import, record settings, save.
///
/// With `update_home_dir` the import step is skipped.
pub fn build_bibliography(
    options: &BuildOptions,
    ctx: &RunContext,
    pdf_source: &dyn PageTextSource,
    resolver: &dyn Resolver,
) -> Result<BuildReport> {
    let mut bibliography =
        init_bib_database(&options.bib_file, options.no_backup, options.update_home_dir)?;

    let pruned = if options.prune {
        bibliography.prune_missing_files()
    } else {
        Vec::new()
    };

    let policy = ImportPolicy {
        skip_if_doi_exists: options.no_duplicates,
        ..ImportPolicy::default()
    };
    let mut report = if options.update_home_dir {
        BuildReport::default()
    } else {
        update_database_from_folder(&mut bibliography, &options.pdf_dir, &policy, pdf_source, resolver)?
    };
    report.pruned = pruned;

    bibliography.set_directive(PDF_DIR_VAR, options.pdf_dir.display().to_string());
    bibliography.set_directive(
        NO_DUP_VAR,
        if options.no_duplicates { "True" } else { "False" },
    );
    bibliography.save(&options.bib_file)?;
    ctx.report(&format!(
        "{}: {} added, {} skipped, {} failed, {} pruned",
        options.bib_file.display(),
        report.added.len(),
        report.skipped,
        report.failed.len(),
        report.pruned.len()
    ));
    Ok(report)
}
