//! Reading and writing the BibTeX store format.
//!
//! A store file is a sequence of `@type{key, field = {value}, ...}` records.
//! Lines of the form `%NAME=value` outside of records are in-file directives
//! (see [`crate::config`]); any other text outside records is ignored, as are
//! `@comment`, `@preamble` and `@string` blocks. A stray `@` that does not
//! open a record is plain text. Bare month macros are expanded to the month
//! name, since the writer always braces values.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::bib::BibEntry;
use crate::error::{BibError, Result};

static ENTRY_HEADER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@\s*([A-Za-z]+)\s*([{(])").expect("Invalid BibTeX entry regex pattern")
});
static FIELD_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9_\-:.+]*)\s*=").expect("Invalid BibTeX field regex pattern")
});
static DIRECTIVE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^%\s*([A-Za-z_][A-Za-z0-9_]*)\s*=(.*)$").expect("Invalid directive regex pattern")
});

/// Entries and directives read from one BibTeX source.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedBibtex {
    pub entries: Vec<BibEntry>,
    pub directives: BTreeMap<String, String>,
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    source_name: &'a str,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn advance(&mut self, bytes: usize) {
        let end = self.pos + bytes;
        while self.pos < end {
            self.bump();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, message: impl Into<String>) -> BibError {
        BibError::Parse {
            source_name: self.source_name.to_string(),
            line: self.line,
            message: message.into(),
        }
    }

    /// Read up to the matching closing delimiter; the opening one is already consumed.
    fn read_balanced(&mut self, close: char) -> Result<String> {
        let start_line = self.line;
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => {
                    return Err(BibError::Parse {
                        source_name: self.source_name.to_string(),
                        line: start_line,
                        message: "unbalanced braces".to_string(),
                    })
                }
                Some('{') => depth += 1,
                Some('}') if depth > 0 => depth -= 1,
                Some(c) if c == close && depth == 0 => {
                    let value = self.src[start..self.pos].to_string();
                    self.bump();
                    return Ok(value);
                }
                _ => {}
            }
            self.bump();
        }
    }

    fn read_bare_token(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && !matches!(c, ',' | '}' | ')' | '#'))
        {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    /// A field value: one or more `#`-joined pieces, each braced, quoted or bare.
    fn read_value(&mut self) -> Result<String> {
        let mut value = String::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('{') => {
                    self.bump();
                    value.push_str(&self.read_balanced('}')?);
                }
                Some('"') => {
                    self.bump();
                    value.push_str(&self.read_balanced('"')?);
                }
                Some(_) => {
                    let token = self.read_bare_token();
                    if token.is_empty() {
                        return Err(self.error("missing field value"));
                    }
                    match month_macro(&token) {
                        Some(month) => value.push_str(month),
                        None => value.push_str(&token),
                    }
                }
                None => return Err(self.error("unexpected end of input in field value")),
            }
            self.skip_whitespace();
            if self.peek() == Some('#') {
                self.bump();
                continue;
            }
            return Ok(value.trim().to_string());
        }
    }

    fn read_entry(&mut self, entry_type: &str, close: char) -> Result<BibEntry> {
        self.skip_whitespace();
        let key_start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c != ',' && c != close && !c.is_whitespace())
        {
            self.bump();
        }
        let key = self.src[key_start..self.pos].to_string();
        if key.is_empty() {
            return Err(self.error(format!("@{} entry without a key", entry_type)));
        }
        let mut entry = BibEntry::new(key, entry_type);

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(c) if c == close => {
                    self.bump();
                    return Ok(entry);
                }
                Some(_) => {
                    let Some(captures) = FIELD_NAME_REGEX.captures(self.rest()) else {
                        return Err(self.error(format!(
                            "malformed field in entry \"{}\"",
                            entry.key
                        )));
                    };
                    let name = captures[1].to_lowercase();
                    let consumed = captures[0].len();
                    self.advance(consumed);
                    let value = self.read_value()?;
                    entry.set(&name, value);
                    self.skip_whitespace();
                    match self.peek() {
                        Some(',') => {
                            self.bump();
                        }
                        Some(c) if c == close => {}
                        Some(c) => {
                            return Err(self.error(format!(
                                "expected ',' or '{}' after field \"{}\", found '{}'",
                                close, name, c
                            )))
                        }
                        None => return Err(self.error("unexpected end of input in entry")),
                    }
                }
                None => {
                    return Err(self.error(format!("entry \"{}\" is not closed", entry.key)))
                }
            }
        }
    }
}

/// Expansion of the predefined month macros (`jan` .. `dec`).
fn month_macro(token: &str) -> Option<&'static str> {
    let month = match token.to_ascii_lowercase().as_str() {
        "jan" => "January",
        "feb" => "February",
        "mar" => "March",
        "apr" => "April",
        "may" => "May",
        "jun" => "June",
        "jul" => "July",
        "aug" => "August",
        "sep" => "September",
        "oct" => "October",
        "nov" => "November",
        "dec" => "December",
        _ => return None,
    };
    Some(month)
}

/// Parse BibTeX text. `source_name` only labels parse errors.
pub fn parse_bibtex(content: &str, source_name: &str) -> Result<ParsedBibtex> {
    let mut parsed = ParsedBibtex::default();
    let mut cursor = Cursor {
        src: content,
        pos: 0,
        line: 1,
        source_name,
    };
    let mut at_line_start = true;

    while let Some(c) = cursor.peek() {
        if c == '%' && at_line_start {
            let line_end = cursor.rest().find('\n').unwrap_or(cursor.rest().len());
            let line = &cursor.rest()[..line_end];
            if let Some(captures) = DIRECTIVE_REGEX.captures(line.trim_end()) {
                parsed
                    .directives
                    .entry(captures[1].to_string())
                    .or_insert_with(|| captures[2].trim().to_string());
            }
            cursor.advance(line_end);
            continue;
        }

        if c == '@' {
            let Some(captures) = ENTRY_HEADER_REGEX.captures(cursor.rest()) else {
                at_line_start = false;
                cursor.bump();
                continue;
            };
            let entry_type = captures[1].to_lowercase();
            let close = if &captures[2] == "(" { ')' } else { '}' };
            let consumed = captures[0].len();
            cursor.advance(consumed);

            match entry_type.as_str() {
                "comment" | "preamble" | "string" => {
                    cursor.read_balanced(close)?;
                }
                _ => {
                    let entry = cursor.read_entry(&entry_type, close)?;
                    parsed.entries.push(entry);
                }
            }
            at_line_start = false;
            continue;
        }

        at_line_start = c == '\n' || (at_line_start && c.is_whitespace());
        cursor.bump();
    }

    Ok(parsed)
}

/// Parse text expected to hold exactly one record, as returned by the DOI registry.
pub fn parse_single_entry(content: &str, source_name: &str) -> Result<BibEntry> {
    parse_bibtex(content, source_name)?
        .entries
        .into_iter()
        .next()
        .ok_or_else(|| BibError::Parse {
            source_name: source_name.to_string(),
            line: 1,
            message: "no BibTeX entry found".to_string(),
        })
}

/// Render one record; fields are written in alphabetical order.
pub fn entry_to_bibtex(entry: &BibEntry) -> String {
    let mut output = format!("@{}{{{}", entry.entry_type, entry.key);
    for (field, value) in &entry.fields {
        output.push_str(&format!(",\n {} = {{{}}}", field, value));
    }
    output.push_str("\n}\n");
    output
}

/// Render a whole store: directives first, then records in the given order.
pub fn to_bibtex_string<'a>(
    entries: impl IntoIterator<Item = &'a BibEntry>,
    directives: &BTreeMap<String, String>,
) -> String {
    let mut output = String::new();
    for (name, value) in directives {
        output.push_str(&format!("%{}={}\n", name, value));
    }
    if !directives.is_empty() {
        output.push('\n');
    }
    let rendered: Vec<String> = entries.into_iter().map(entry_to_bibtex).collect();
    output.push_str(&rendered.join("\n"));
    output
}
