//! Run settings.
//!
//! Each setting is taken from, in order of preference: the command line, a
//! `%NAME=value` directive at the top of the `.bib` file, the environment
//! variable `NAME`, and finally a built-in default.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use once_cell::sync::Lazy;
use regex::Regex;

pub const BIB_FILE_VAR: &str = "BIBBUILDER_BIB_FILE";
pub const PDF_DIR_VAR: &str = "BIBBUILDER_PDF_DIR";
pub const NO_DUP_VAR: &str = "BIBBUILDER_NO_DUP";

static HOME_PREFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:/home|/Users)/[^/]+(/|$)").expect("Invalid home directory regex pattern")
});

/// Per-run state threaded through the build and merge drivers.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// -1 quiet, 0 default, 1 verbose, 2+ debug.
    pub verbosity: i8,
    /// Where log records are appended in addition to the console.
    pub log_file: Option<PathBuf>,
}

impl RunContext {
    pub fn new(verbosity: i8) -> Self {
        Self {
            verbosity,
            log_file: None,
        }
    }

    pub fn with_log_file(mut self, log_file: impl Into<PathBuf>) -> Self {
        self.log_file = Some(log_file.into());
        self
    }

    pub fn quiet(&self) -> bool {
        self.verbosity < 0
    }

    /// Announce the end-of-run summary.
    ///
    /// At default verbosity it is also printed on stdout; with `-v` the
    /// logger already shows it and `-q` keeps the console silent.
    pub fn report(&self, summary: &str) {
        info!("{}", summary);
        if self.verbosity == 0 {
            println!("{}", summary);
        }
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        match self.verbosity {
            v if v <= 0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    }
}

/// Value of the `%name=...` directive in `bib_file`, if there is one.
pub fn read_directive(bib_file: &Path, name: &str) -> Option<String> {
    let content = fs::read_to_string(bib_file).ok()?;
    content.lines().find_map(|line| {
        let (directive, value) = line.strip_prefix('%')?.split_once('=')?;
        (directive.trim() == name).then(|| value.trim().to_string())
    })
}

/// Resolve one setting: argument, then directive, then environment, then default.
pub fn resolve_setting(
    arg: Option<String>,
    name: &str,
    bib_file: Option<&Path>,
    default: Option<&str>,
) -> Option<String> {
    if arg.is_some() {
        return arg;
    }
    if let Some(value) = bib_file.and_then(|file| read_directive(file, name)) {
        return Some(value);
    }
    std::env::var(name)
        .ok()
        .or_else(|| default.map(str::to_string))
}

/// Resolve a path setting. Paths read from the `.bib` file are moved into the
/// current user's home directory, since the file may come from another machine.
pub fn resolve_path_setting(
    arg: Option<PathBuf>,
    name: &str,
    bib_file: Option<&Path>,
    default: &str,
) -> PathBuf {
    if let Some(path) = arg {
        return path;
    }
    if let Some(value) = bib_file.and_then(|file| read_directive(file, name)) {
        if !value.is_empty() {
            return match dirs::home_dir() {
                Some(home) => PathBuf::from(change_home_dir(&value, &home)),
                None => PathBuf::from(value),
            };
        }
    }
    PathBuf::from(std::env::var(name).unwrap_or_else(|_| default.to_string()))
}

/// Resolve a boolean setting; only the string `True` counts as set.
pub fn resolve_flag_setting(arg: Option<bool>, name: &str, bib_file: Option<&Path>) -> bool {
    if let Some(flag) = arg {
        return flag;
    }
    resolve_setting(None, name, bib_file, Some("False")).as_deref() == Some("True")
}

/// Replace a `/home/<user>` or `/Users/<user>` prefix of `path` with `home`.
pub fn change_home_dir(path: &str, home: &Path) -> String {
    let home = home.display().to_string();
    let home = home.trim_end_matches('/');
    HOME_PREFIX_REGEX
        .replace(path, |caps: &regex::Captures| format!("{}{}", home, &caps[1]))
        .into_owned()
}
