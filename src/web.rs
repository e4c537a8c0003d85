//! Render a bibliography as an HTML citation list.
//!
//! The list replaces whatever sits between the `<!--START BIB-->` and
//! `<!--END BIB-->` lines of an existing page. The page is written to
//! `<page>.new` first and then moved into place.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::bib::names::{split_authors, split_name, PersonName};
use crate::bib::{backup_name, BibEntry, Bibliography};
use crate::error::{BibError, Result};

pub const BIB_START: &str = "<!--START BIB-->";
pub const BIB_END: &str = "<!--END BIB-->";

/// Named year header templates; `{0}` is replaced by the year.
pub const YEAR_HEADER_FORMATS: [(&str, &str); 2] = [
    ("std", "<h3>{0}</h3>"),
    ("bootstrap", r#"<h3><span class="badge badge-dark">{0}</span></h3>"#),
];

const STANDARD_FORMAT: [&str; 7] = [
    "{author}",
    "{title}",
    "<i>{journal}</i>",
    "<i>{volume}</i>",
    "{pages}",
    "{doi}",
    "{year}",
];

static FIELD_PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("Invalid placeholder regex pattern"));

static SUBSCRIPT_OPEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$_\{?").expect("Invalid subscript regex pattern"));

static PAGE_DASH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^\s-])\s*(?:--|\x{2013})\s*([^\s-])").expect("Invalid page range regex pattern"));

/// Turns one entry into a line of HTML.
///
/// The format is a list of pieces, each holding one `{field}` placeholder.
/// Pieces whose field the entry lacks are dropped; the rest are joined with
/// the connector and closed with the terminator.
#[derive(Debug, Clone)]
pub struct EntryFormatter {
    format_spec: Vec<String>,
    connector: String,
    terminator: String,
    bold_authors: Vec<String>,
}

impl Default for EntryFormatter {
    fn default() -> Self {
        Self::standard()
    }
}

impl EntryFormatter {
    pub fn new<I, S>(format_spec: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let format_spec: Vec<String> = format_spec.into_iter().map(Into::into).collect();
        if let Some(piece) = format_spec
            .iter()
            .find(|piece| !FIELD_PLACEHOLDER_REGEX.is_match(piece))
        {
            return Err(BibError::InvalidFormat(format!(
                "\"{}\" has no {{field}} placeholder",
                piece
            )));
        }
        Ok(Self {
            format_spec,
            connector: ", ".to_string(),
            terminator: ".".to_string(),
            bold_authors: Vec::new(),
        })
    }

    /// Author, title, journal, volume, pages, DOI and year.
    pub fn standard() -> Self {
        Self {
            format_spec: STANDARD_FORMAT.iter().map(|s| s.to_string()).collect(),
            connector: ", ".to_string(),
            terminator: ".".to_string(),
            bold_authors: Vec::new(),
        }
    }

    pub fn with_connector(mut self, connector: impl Into<String>) -> Self {
        self.connector = connector.into();
        self
    }

    pub fn with_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.terminator = terminator.into();
        self
    }

    /// Authors whose last name is in this list are set in bold.
    pub fn add_bold_authors<I, S>(&mut self, authors: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bold_authors.extend(authors.into_iter().map(Into::into));
    }

    pub fn format_entry(&self, entry: &BibEntry) -> String {
        let values = self.preprocess(entry);
        let pieces: Vec<String> = self
            .format_spec
            .iter()
            .filter(|piece| {
                FIELD_PLACEHOLDER_REGEX
                    .captures(piece)
                    .is_some_and(|caps| values.contains_key(&caps[1]))
            })
            .map(|piece| {
                FIELD_PLACEHOLDER_REGEX
                    .replace_all(piece, |caps: &regex::Captures| {
                        values.get(&caps[1]).cloned().unwrap_or_default()
                    })
                    .into_owned()
            })
            .collect();
        format!("{}{}", pieces.join(&self.connector), self.terminator)
    }

    fn preprocess(&self, entry: &BibEntry) -> HashMap<String, String> {
        let mut values: HashMap<String, String> = entry
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        if let Some(author) = entry.author() {
            values.insert("author".to_string(), self.format_authors(author));
        }
        if let Some(title) = entry.title() {
            values.insert("title".to_string(), format_title(title));
        }
        if let Some(pages) = entry.pages() {
            values.insert("pages".to_string(), format_pages(pages));
        }
        if let Some(doi) = entry.doi() {
            values.insert("doi".to_string(), format_doi(doi));
        }
        if let Some(url) = entry.url() {
            let link = format_url(url);
            values.entry("doi".to_string()).or_insert_with(|| link.clone());
            values.insert("url".to_string(), link);
        }
        values
    }

    fn format_author(&self, name: &PersonName, first_author: bool) -> String {
        let surname = [name.von_joined(), name.last_joined(), name.jr_joined()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let first = name.first_joined();
        let text = if first_author {
            if first.is_empty() {
                surname
            } else {
                format!("{}, {}", surname, first)
            }
        } else if first.is_empty() {
            surname
        } else {
            format!("{} {}", first, surname)
        };

        let bold = name
            .last
            .first()
            .is_some_and(|last| self.bold_authors.iter().any(|b| b == last));
        if bold {
            format!("<strong>{}</strong>", text)
        } else {
            text
        }
    }

    fn format_authors(&self, authors: &str) -> String {
        let names = split_authors(authors);
        let mut out = String::new();
        for (idx, author) in names.iter().enumerate() {
            out.push_str(&self.format_author(&split_name(author), idx == 0));
            if idx + 1 < names.len() {
                out.push_str(", ");
            }
            if idx + 2 == names.len() {
                out.push_str("and ");
            }
        }
        strip_braces(&out)
    }
}

fn strip_braces(s: &str) -> String {
    s.replace(['{', '}'], "")
}

/// `$_2$` and `$_{long}$` become `<sub>` runs; other braces are dropped.
fn format_title(title: &str) -> String {
    let opened = SUBSCRIPT_OPEN_REGEX.replace_all(title, "<sub>");
    strip_braces(&opened.replace('$', "</sub>"))
}

fn format_pages(pages: &str) -> String {
    PAGE_DASH_REGEX
        .replace_all(pages, "${1}&mdash;${2}")
        .into_owned()
}

fn format_doi(doi: &str) -> String {
    let bare = doi.strip_prefix("doi:").unwrap_or(doi);
    if !bare.starts_with("10") {
        warn!("{} does not look like a DOI, leaving it unlinked", doi);
        return doi.to_string();
    }
    format!(
        r#"<a href="https://doi.org/{0}" target="_blank">doi:{0}</a>"#,
        bare
    )
}

fn format_url(url: &str) -> String {
    format!(r#"<a href="{}" target="_blank">Link</a>"#, url)
}

/// Entries grouped by year, newest first. Entries without a year are left out.
///
/// With `entry_types`, only entries of those types are kept.
pub fn sort_entries_by_year(
    bibliography: &Bibliography,
    entry_types: Option<&[String]>,
) -> Vec<(String, Vec<BibEntry>)> {
    let mut by_year: BTreeMap<String, Vec<BibEntry>> = BTreeMap::new();
    for entry in bibliography.iter() {
        let wanted = entry_types.map_or(true, |types| {
            types.iter().any(|t| t.eq_ignore_ascii_case(&entry.entry_type))
        });
        if !wanted {
            continue;
        }
        match entry.year() {
            Some(year) => by_year.entry(year.to_string()).or_default().push(entry.clone()),
            None => warn!("{} has no year", entry.key),
        }
    }
    by_year.into_iter().rev().collect()
}

/// The template registered under `name`, or `name` itself.
pub fn year_header_format(name: &str) -> &str {
    YEAR_HEADER_FORMATS
        .iter()
        .find(|(key, _)| *key == name)
        .map_or(name, |(_, format)| *format)
}

pub fn new_html_name(html_file: &Path) -> PathBuf {
    let mut name = html_file.as_os_str().to_owned();
    name.push(".new");
    PathBuf::from(name)
}

/// Render `entries` into the page's bibliography block.
///
/// Writes `<html_file>.new` and returns its path; the original is untouched.
pub fn insert_bib(
    html_file: &Path,
    entries: &[(String, Vec<BibEntry>)],
    formatter: &EntryFormatter,
    year_fmt: &str,
) -> Result<PathBuf> {
    let html = fs::read_to_string(html_file)?;
    for marker in [BIB_START, BIB_END] {
        if !html.lines().any(|line| line.trim().starts_with(marker)) {
            return Err(BibError::MissingMarker {
                path: html_file.to_path_buf(),
                marker,
            });
        }
    }

    let header = year_header_format(year_fmt);
    let mut out = String::with_capacity(html.len());
    let mut in_bib = false;
    for line in html.split_inclusive('\n') {
        let trimmed = line.trim();
        if !in_bib {
            out.push_str(line);
        }
        if trimmed.starts_with(BIB_START) {
            in_bib = true;
            for (year, year_entries) in entries {
                out.push_str(&format!("<a name={}></a>", year));
                out.push_str(&header.replace("{0}", year));
                out.push_str("\n\n");
                for entry in year_entries {
                    out.push_str(&format!("<p>{}</p>\n\n", formatter.format_entry(entry)));
                }
            }
        } else if trimmed.starts_with(BIB_END) {
            in_bib = false;
            out.push_str(line);
        }
    }

    let new_file = new_html_name(html_file);
    fs::write(&new_file, out)?;
    Ok(new_file)
}

/// Move `<html_file>.new` over `html_file`, keeping the old page as `.bak` if asked.
pub fn move_files(html_file: &Path, backup: bool) -> Result<()> {
    if backup {
        fs::rename(html_file, backup_name(html_file))?;
    }
    fs::rename(new_html_name(html_file), html_file)?;
    Ok(())
}

/// Settings for the `web` command.
#[derive(Debug, Clone)]
pub struct WebOptions {
    pub bold_authors: Vec<String>,
    pub entry_types: Option<Vec<String>>,
    pub year_fmt: String,
    pub backup: bool,
}

impl Default for WebOptions {
    fn default() -> Self {
        Self {
            bold_authors: Vec::new(),
            entry_types: None,
            year_fmt: "std".to_string(),
            backup: true,
        }
    }
}

/// Full `web` command. Returns the number of entries written.
pub fn render_web_bibliography(bib_file: &Path, html_file: &Path, options: &WebOptions) -> Result<usize> {
    let bibliography = Bibliography::load(bib_file)?;
    let mut formatter = EntryFormatter::standard();
    formatter.add_bold_authors(options.bold_authors.iter().cloned());

    let entries = sort_entries_by_year(&bibliography, options.entry_types.as_deref());
    insert_bib(html_file, &entries, &formatter, &options.year_fmt)?;
    move_files(html_file, options.backup)?;

    let count = entries.iter().map(|(_, e)| e.len()).sum();
    info!("Wrote {} citations to {}", count, html_file.display());
    Ok(count)
}
