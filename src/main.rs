use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use bibbuilder::build::{build_bibliography, BuildOptions};
use bibbuilder::config::{
    resolve_flag_setting, resolve_path_setting, resolve_setting, RunContext, BIB_FILE_VAR,
    NO_DUP_VAR, PDF_DIR_VAR,
};
use bibbuilder::doi::DoiOrgResolver;
use bibbuilder::logging::{init_logging, log_file_for};
use bibbuilder::merge::{merge_files, Clobber, ConflictPolicy, MergeRequest};
use bibbuilder::pdf::LopdfTextSource;
use bibbuilder::prompt::TerminalPrompter;
use bibbuilder::web::{render_web_bibliography, WebOptions, BIB_END, BIB_START};
use bibbuilder::BibError;

/// Build, merge and publish BibTeX bibliographies
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build or update a BibTeX file from the PDF files under a directory
    Build(BuildArgs),
    /// Merge several BibTeX files into one
    Merge(MergeArgs),
    /// Insert a bibliography into a web page
    #[command(after_help = format!(
        "The HTML file must contain the lines {} and {}; anything between them is replaced.",
        BIB_START, BIB_END
    ))]
    Web(WebArgs),
}

#[derive(Args)]
struct Verbosity {
    /// Increase logging to the console (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,
    /// Suppress logging to the console
    #[arg(short, long)]
    quiet: bool,
}

impl Verbosity {
    fn level(&self) -> i8 {
        if self.quiet {
            -1
        } else {
            self.verbose.min(i8::MAX as u8) as i8
        }
    }
}

#[derive(Args)]
struct BuildArgs {
    /// The BibTeX file to create or update (default: $BIBBUILDER_BIB_FILE)
    bib_file: Option<PathBuf>,
    /// Top directory to search for PDF files (default: directive, $BIBBUILDER_PDF_DIR, or .)
    #[arg(long)]
    pdf_top_dir: Option<PathBuf>,
    /// Remove entries whose file no longer exists
    #[arg(long)]
    prune: bool,
    /// Do not back up the .bib file before modifying it
    #[arg(long)]
    no_backup: bool,
    /// Skip documents whose DOI is already in the bibliography
    #[arg(long)]
    no_duplicates: bool,
    /// Only update the home directory in the file field of each entry
    #[arg(short, long)]
    update_home_dir: bool,
    /// Do not append to the automatic log file
    #[arg(long)]
    no_log_file: bool,
    /// Change to this directory first
    #[arg(long)]
    working_dir: Option<PathBuf>,
    #[command(flatten)]
    verbosity: Verbosity,
}

#[derive(Args)]
struct MergeArgs {
    /// The .bib files to merge; the first one is the base
    #[arg(required = true)]
    bib_files: Vec<PathBuf>,
    /// Where to write the merged file
    #[arg(short, long = "output-file", default_value = "merged.bib")]
    output: PathBuf,
    /// A .bib file whose keys are removed from the merged file (repeatable)
    #[arg(short, long)]
    exclude: Vec<PathBuf>,
    /// How to resolve conflicting keys
    #[arg(short = 'x', long, value_enum, default_value_t = ConflictPolicy::Ask)]
    conflict_mode: ConflictPolicy,
    /// Ask before removing keys listed in --exclude files
    #[arg(short, long)]
    interactive_remove: bool,
    /// Overwrite the output file if it exists
    #[arg(short, long, conflicts_with = "no_clobber")]
    clobber: bool,
    /// Never overwrite an existing output file
    #[arg(short, long)]
    no_clobber: bool,
    #[command(flatten)]
    verbosity: Verbosity,
}

#[derive(Args)]
struct WebArgs {
    /// The .bib file to read citations from
    bib_file: PathBuf,
    /// The .html file to insert the bibliography into
    html_file: PathBuf,
    /// Last name of an author to set in bold (repeatable)
    #[arg(short, long = "author-bold")]
    author_bold: Vec<String>,
    /// Entry type to include, e.g. article (repeatable; default: all)
    #[arg(short = 't', long = "entry-type")]
    entry_type: Vec<String>,
    /// Year header: "std", "bootstrap", or a template with {0} for the year
    #[arg(short, long, default_value = "std")]
    year_fmt: String,
    /// Do not keep a backup of the old HTML file
    #[arg(short = 'b', long)]
    no_backup: bool,
}

fn run_build(args: BuildArgs) -> Result<()> {
    if let Some(dir) = &args.working_dir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("Failed to change directory to {:?}", dir))?;
    }

    let bib_file = resolve_setting(
        args.bib_file.map(|p| p.display().to_string()),
        BIB_FILE_VAR,
        None,
        None,
    )
    .map(PathBuf::from)
    .with_context(|| {
        format!(
            "Positional argument BIB_FILE must be given or the environment variable {} must be set",
            BIB_FILE_VAR
        )
    })?;

    let pdf_dir = resolve_path_setting(args.pdf_top_dir, PDF_DIR_VAR, Some(&bib_file), ".");
    let no_duplicates =
        resolve_flag_setting(args.no_duplicates.then_some(true), NO_DUP_VAR, Some(&bib_file));

    let mut ctx = RunContext::new(args.verbosity.level());
    if !args.no_log_file {
        ctx = ctx.with_log_file(log_file_for(&bib_file));
    }
    init_logging(&ctx, Some(&bib_file)).context("Failed to set up logging")?;

    let options = BuildOptions {
        bib_file,
        pdf_dir,
        prune: args.prune,
        no_backup: args.no_backup,
        no_duplicates,
        update_home_dir: args.update_home_dir,
    };
    build_bibliography(&options, &ctx, &LopdfTextSource, &DoiOrgResolver::new())?;
    Ok(())
}

fn run_merge(args: MergeArgs) -> Result<()> {
    let ctx = RunContext::new(args.verbosity.level());
    init_logging(&ctx, None).context("Failed to set up logging")?;

    let clobber = if args.clobber {
        Clobber::Overwrite
    } else if args.no_clobber {
        Clobber::Refuse
    } else {
        Clobber::Ask
    };
    let request = MergeRequest {
        bib_files: args.bib_files,
        output: args.output,
        exclude_files: args.exclude,
        policy: args.conflict_mode,
        interactive_remove: args.interactive_remove,
        clobber,
    };
    merge_files(&request, &ctx, TerminalPrompter::stdio())?;
    Ok(())
}

fn run_web(args: WebArgs) -> Result<()> {
    init_logging(&RunContext::default(), None).context("Failed to set up logging")?;
    let options = WebOptions {
        bold_authors: args.author_bold,
        entry_types: (!args.entry_type.is_empty()).then_some(args.entry_type),
        year_fmt: args.year_fmt,
        backup: !args.no_backup,
    };
    render_web_bibliography(&args.bib_file, &args.html_file, &options)
        .with_context(|| format!("Failed to update {:?}", args.html_file))?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Build(args) => run_build(args),
        Command::Merge(args) => run_merge(args),
        Command::Web(args) => run_web(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            match err.downcast_ref::<BibError>() {
                Some(BibError::UserAbort) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}
