use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::NamedTempFile;

use crate::bib::normalize::normalize;
use crate::bib::parser::{self, entry_to_bibtex, parse_single_entry};
use crate::bib::BibEntry;
use crate::config::change_home_dir;
use crate::doi::{extract_identifier, Resolver};
use crate::error::{BibError, Result};
use crate::pdf::PageTextSource;

/// Duplicate-avoidance switches for importing documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportPolicy {
    /// Skip a document whose path is already the `file` of some entry.
    pub skip_if_file_exists: bool,
    /// Skip a document whose DOI is already the `doi` of some entry.
    pub skip_if_doi_exists: bool,
}

impl Default for ImportPolicy {
    fn default() -> Self {
        Self {
            skip_if_file_exists: true,
            skip_if_doi_exists: false,
        }
    }
}

/// What happened to a document handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(String),
    SkippedFile,
    SkippedDoi(String),
}

/// Ordered collection of entries with unique keys.
///
/// `entries` is the only source of truth; `index` is rebuilt from it after
/// every mutation.
#[derive(Default, Clone)]
pub struct Bibliography {
    entries: Vec<BibEntry>,
    index: HashMap<String, usize>,
    label: String,
    directives: BTreeMap<String, String>,
}

impl fmt::Debug for Bibliography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bibliography")
            .field("label", &self.label)
            .field("entries_count", &self.entries.len())
            .field("entries", &self.entries)
            .finish()
    }
}

/// Stores compare by content; the label only names where a store came from.
impl PartialEq for Bibliography {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries && self.directives == other.directives
    }
}

impl Bibliography {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn from_entries(
        label: impl Into<String>,
        entries: impl IntoIterator<Item = BibEntry>,
    ) -> Result<Self> {
        let mut bibliography = Self::with_label(label);
        for entry in entries {
            bibliography.add(entry)?;
        }
        Ok(bibliography)
    }

    /// Name used for this store in messages, normally the file it was read from.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.key.clone(), position))
            .collect();
    }

    fn position(&self, key: &str) -> Result<usize> {
        self.index
            .get(key)
            .copied()
            .ok_or_else(|| BibError::KeyNotFound(key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BibEntry> {
        self.entries.iter()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Keys in store order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key.clone()).collect()
    }

    /// Every `file` reference currently stored.
    pub fn files(&self) -> HashSet<String> {
        self.entries
            .iter()
            .filter_map(|entry| entry.file().map(str::to_string))
            .collect()
    }

    /// Every DOI currently stored, lower-cased.
    pub fn dois(&self) -> HashSet<String> {
        self.entries
            .iter()
            .filter_map(|entry| entry.doi().map(str::to_lowercase))
            .collect()
    }

    pub fn contains_doi(&self, doi: &str) -> bool {
        let wanted = doi.to_lowercase();
        self.entries
            .iter()
            .any(|entry| entry.doi().is_some_and(|d| d.to_lowercase() == wanted))
    }

    pub fn get(&self, key: &str) -> Result<&BibEntry> {
        let position = self.position(key)?;
        Ok(&self.entries[position])
    }

    /// Append an entry.
    pub fn add(&mut self, entry: BibEntry) -> Result<()> {
        entry.validate()?;
        if self.contains_key(&entry.key) {
            return Err(BibError::DuplicateKey(entry.key));
        }
        self.entries.push(entry);
        self.reindex();
        Ok(())
    }

    /// Swap the entry stored under `key` for `new_entry`, keeping its position.
    pub fn replace(&mut self, key: &str, new_entry: BibEntry) -> Result<()> {
        new_entry.validate()?;
        let position = self.position(key)?;
        if new_entry.key != key && self.contains_key(&new_entry.key) {
            return Err(BibError::DuplicateKey(new_entry.key));
        }
        self.entries[position] = new_entry;
        self.reindex();
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Result<BibEntry> {
        let position = self.position(key)?;
        let removed = self.entries.remove(position);
        self.reindex();
        Ok(removed)
    }

    /// Give the entry stored under `key` a new key.
    pub fn rename(&mut self, key: &str, new_key: &str) -> Result<()> {
        let mut entry = self.get(key)?.clone();
        entry.key = new_key.to_string();
        self.replace(key, entry)
    }

    pub fn directives(&self) -> &BTreeMap<String, String> {
        &self.directives
    }

    pub fn directive(&self, name: &str) -> Option<&str> {
        self.directives.get(name).map(String::as_str)
    }

    pub fn set_directive(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.directives.insert(name.into(), value.into());
    }

    /// Parse BibTeX text into a store labelled `label`.
    pub fn parse(content: &str, label: &str) -> Result<Self> {
        let parsed = parser::parse_bibtex(content, label)?;
        let mut bibliography = Self::from_entries(label, parsed.entries)?;
        bibliography.directives = parsed.directives;
        Ok(bibliography)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let bibliography = Self::parse(&content, &path.display().to_string())?;
        debug!("Loaded {} entries from {}", bibliography.len(), path.display());
        Ok(bibliography)
    }

    pub fn to_bibtex_string(&self) -> String {
        parser::to_bibtex_string(&self.entries, &self.directives)
    }

    /// One entry rendered as BibTeX, for showing to the user.
    pub fn entry_as_string(&self, key: &str) -> Result<String> {
        Ok(entry_to_bibtex(self.get(key)?))
    }

    /// Write the store to `path`.
    ///
    /// The text goes to a temporary file next to `path` that is then renamed
    /// over it, so an interrupted save leaves the previous file intact.
    pub fn save(&self, path: &Path) -> Result<()> {
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut temp = NamedTempFile::new_in(&directory)?;
        temp.write_all(self.to_bibtex_string().as_bytes())?;
        temp.flush()?;
        temp.persist(path).map_err(|e| BibError::Io(e.error))?;
        info!("Wrote {} entries to {}", self.len(), path.display());
        Ok(())
    }

    fn normalized_entry(&self, bib_string: &str, source_name: &str) -> Result<BibEntry> {
        let raw = parse_single_entry(bib_string, source_name)?;
        let existing: HashSet<String> = self.index.keys().cloned().collect();
        normalize(raw, &existing)
    }

    /// Parse a registry record, normalize it, and append it.
    ///
    /// Returns the key the entry was stored under.
    pub fn add_entry_by_string(&mut self, bib_string: &str, file: Option<&str>) -> Result<String> {
        let mut entry = self.normalized_entry(bib_string, file.unwrap_or("registry record"))?;
        if let Some(file) = file {
            entry.set("file", file);
        }
        let key = entry.key.clone();
        self.add(entry)?;
        Ok(key)
    }

    /// Find the DOI in a document's text, resolve it and store the result.
    pub fn add_entry_by_text(
        &mut self,
        text: &str,
        file: Option<&str>,
        policy: &ImportPolicy,
        resolver: &dyn Resolver,
    ) -> Result<AddOutcome> {
        let source_name = file.unwrap_or("document text");
        if policy.skip_if_file_exists {
            if let Some(file) = file {
                if self.files().contains(file) {
                    info!("{} is already in the bibliography, skipping", file);
                    return Ok(AddOutcome::SkippedFile);
                }
            }
        }

        let doi = extract_identifier(text, source_name)?;
        info!("Looking up DOI {}", doi);
        let bib_string = resolver
            .resolve(&doi)
            .ok_or_else(|| BibError::Retrieval {
                doi: doi.clone(),
                source_name: source_name.to_string(),
            })?;

        let mut entry = self.normalized_entry(&bib_string, source_name)?;
        if entry.doi().is_none() {
            entry.set("doi", doi.as_str());
        }
        if policy.skip_if_doi_exists {
            if let Some(existing) = entry.doi().filter(|d| self.contains_doi(d)) {
                info!(
                    "DOI {} from {} is already in the bibliography, skipping",
                    existing, source_name
                );
                return Ok(AddOutcome::SkippedDoi(existing.to_string()));
            }
        }
        if let Some(file) = file {
            entry.set("file", file);
        }

        let key = entry.key.clone();
        self.add(entry)?;
        info!("Added {} as {}", source_name, key);
        Ok(AddOutcome::Added(key))
    }

    /// Import one PDF: first-page text, then [`Bibliography::add_entry_by_text`].
    pub fn add_entry_by_file(
        &mut self,
        pdf_file: &Path,
        policy: &ImportPolicy,
        pdf_source: &dyn PageTextSource,
        resolver: &dyn Resolver,
    ) -> Result<AddOutcome> {
        let file = pdf_file.display().to_string();
        if policy.skip_if_file_exists && self.files().contains(&file) {
            info!("{} is already in the bibliography, skipping", file);
            return Ok(AddOutcome::SkippedFile);
        }
        let text = pdf_source.first_page_text(pdf_file)?;
        self.add_entry_by_text(&text, Some(&file), policy, resolver)
    }

    /// Drop entries whose `file` no longer exists. Returns the removed keys.
    pub fn prune_missing_files(&mut self) -> Vec<String> {
        let (kept, removed): (Vec<BibEntry>, Vec<BibEntry>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| entry.file().map_or(true, |file| Path::new(file).exists()));
        self.entries = kept;
        self.reindex();
        removed
            .into_iter()
            .map(|entry| {
                info!(
                    "Removing {}: file {} no longer exists",
                    entry.key,
                    entry.file().unwrap_or_default()
                );
                entry.key
            })
            .collect()
    }

    /// Point every `file` field at `home` instead of another user's home directory.
    /// Returns how many entries changed.
    pub fn update_home_dir(&mut self, home: &Path) -> usize {
        let mut changed = 0;
        for entry in &mut self.entries {
            if let Some(file) = entry.file() {
                let updated = change_home_dir(file, home);
                if updated != file {
                    entry.set("file", updated);
                    changed += 1;
                }
            }
        }
        changed
    }
}

pub fn backup_name(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Copy `path` to `<path>.bak`. Returns the backup path, or `None` if there was nothing to copy.
pub fn backup_file(path: &Path) -> Result<Option<PathBuf>> {
    if !path.is_file() {
        return Ok(None);
    }
    let backup = backup_name(path);
    fs::copy(path, &backup)?;
    debug!("Backed up {} to {}", path.display(), backup.display());
    Ok(Some(backup))
}
