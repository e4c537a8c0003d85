use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use env_logger::{Env, Target};
use log::debug;

use crate::config::RunContext;

/// Log sink writing to stderr (unless quiet) and to the log file, if any.
struct LogSink {
    console: bool,
    file: Option<File>,
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.console {
            io::stderr().write_all(buf)?;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.console {
            io::stderr().flush()?;
        }
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// `<stem>.log` next to the `.bib` file.
pub fn log_file_for(bib_file: &Path) -> std::path::PathBuf {
    bib_file.with_extension("log")
}

/// Install the global logger described by `ctx`.
///
/// With a log file, a banner naming `subject` and the current time is appended
/// first so runs can be told apart. `RUST_LOG` overrides the verbosity.
pub fn init_logging(ctx: &RunContext, subject: Option<&Path>) -> io::Result<()> {
    let file = match &ctx.log_file {
        Some(path) => {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            let name = subject
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let msg = format!(
                "# BibBuilder: operating on {} at {} #",
                name,
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            );
            let banner = "#".repeat(msg.len());
            writeln!(file, "\n{0}\n{1}\n{0}\n", banner, msg)?;
            Some(file)
        }
        None => None,
    };

    let sink = LogSink {
        console: !ctx.quiet(),
        file,
    };
    let default_level = ctx.level_filter().to_string().to_lowercase();
    if let Err(err) = env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .target(Target::Pipe(Box::new(sink)))
        .try_init()
    {
        debug!("Keeping the logger already installed: {}", err);
    }
    Ok(())
}
