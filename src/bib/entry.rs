use std::collections::BTreeMap;

use crate::error::{BibError, Result};

/// A single BibTeX record.
///
/// `key` and `entry_type` are mandatory; every other field lives in `fields`,
/// keyed by its lower-case name. The well-known fields get accessors below.
/// Equality compares type, key and every field value exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
    pub key: String,
    pub entry_type: String,
    pub fields: BTreeMap<String, String>,
}

/// Incremental construction of a [`BibEntry`].
pub struct BibEntryBuilder {
    key: String,
    entry_type: String,
    fields: BTreeMap<String, String>,
}

impl BibEntryBuilder {
    /// Start an entry of `entry_type` under `key`.
    pub fn new(key: impl Into<String>, entry_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entry_type: entry_type.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Set `field`, replacing any earlier value.
    pub fn field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into().to_lowercase(), value.into());
        self
    }

    /// Set every `(field, value)` pair in order.
    pub fn fields<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (field, value) in fields {
            self.fields.insert(field.into().to_lowercase(), value.into());
        }
        self
    }

    pub fn build(self) -> BibEntry {
        BibEntry {
            key: self.key,
            entry_type: self.entry_type.to_lowercase(),
            fields: self.fields,
        }
    }
}

impl BibEntry {
    pub fn new(key: impl Into<String>, entry_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entry_type: entry_type.into().to_lowercase(),
            fields: BTreeMap::new(),
        }
    }

    /// Shorthand for [`BibEntryBuilder::new`].
    pub fn builder(key: impl Into<String>, entry_type: impl Into<String>) -> BibEntryBuilder {
        BibEntryBuilder::new(key, entry_type)
    }

    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        self.fields.insert(field.to_lowercase(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&String> {
        self.fields.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.fields.remove(field)
    }

    pub fn author(&self) -> Option<&str> {
        self.get("author").map(String::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.get("title").map(String::as_str)
    }

    pub fn year(&self) -> Option<&str> {
        self.get("year").map(String::as_str)
    }

    pub fn journal(&self) -> Option<&str> {
        self.get("journal").map(String::as_str)
    }

    pub fn pages(&self) -> Option<&str> {
        self.get("pages").map(String::as_str)
    }

    pub fn doi(&self) -> Option<&str> {
        self.get("doi").map(String::as_str)
    }

    /// Path of the document this entry was built from.
    pub fn file(&self) -> Option<&str> {
        self.get("file").map(String::as_str)
    }

    pub fn url(&self) -> Option<&str> {
        self.get("url").map(String::as_str)
    }

    /// Check the two mandatory fields.
    pub fn validate(&self) -> Result<()> {
        if self.entry_type.trim().is_empty() {
            return Err(BibError::InvalidRecord(format!(
                "entry \"{}\" has no entry type",
                self.key
            )));
        }
        if self.key.trim().is_empty() {
            return Err(BibError::InvalidRecord(format!(
                "@{} entry has no key",
                self.entry_type
            )));
        }
        Ok(())
    }
}
