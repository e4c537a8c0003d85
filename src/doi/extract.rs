//! Finding the DOI of a paper in the text of its first page.
//!
//! Publishers lay out the first page differently, and the first DOI-looking
//! string on a page is often the wrong one (a copyright notice, a cited
//! dataset). Each strategy below targets one layout; they are tried in
//! order and the first strategy that matches anywhere in the text wins.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{BibError, Result};

/// One layout-specific way of locating the DOI.
pub struct Strategy {
    pub name: &'static str,
    pattern: &'static str,
    regex: Lazy<Regex>,
}

macro_rules! strategy {
    ($name:expr, $pattern:expr) => {
        Strategy {
            name: $name,
            pattern: $pattern,
            regex: Lazy::new(|| Regex::new($pattern).expect("Invalid DOI strategy regex pattern")),
        }
    };
}

/// The ordered strategy table. Capture groups, when present, are joined to
/// form the DOI, so anchor text around them is not part of the result.
pub static STRATEGIES: [Strategy; 6] = [
    // AGU journals (GRL): the DOI follows the article-type banner and the
    // "Key Points" heading is glued onto its end by the text extraction.
    strategy!(
        "agu_research_letter",
        r"RESEARCH\s*LETTER\s*(10\.1029/\d{4}[A-Z]{2}\d{6})"
    ),
    strategy!("agu_key_points", r"(10\.1029/\d{4}[A-Z]{2}\d{6})\s*Key\s*Points"),
    strategy!(
        "doi_url",
        r"(?i)https?://(?:dx\.)?doi\.org/(10\.[\d.]+/\S+?)\.?(?:\s|$)"
    ),
    // "doi:10.xxx/yyy." at the end of a sentence
    strategy!("doi_label", r"(?i)\bdoi:?\s*(10\.[\d.]+/\S+?)\.?(?:\s|$)"),
    strategy!("slash_line_break", r"(10\.[\d.]+/)[ \t]*\r?\n[ \t]*([^\s/]\S*)"),
    strategy!("bare", r"10\.[\d.]+/\S+"),
];

impl Strategy {
    pub fn pattern(&self) -> &'static str {
        self.pattern
    }

    /// The raw match of this strategy alone, before ASCII truncation.
    pub fn find(&self, text: &str) -> Option<String> {
        let captures = self.regex.captures(text)?;
        if captures.len() == 1 {
            return Some(captures[0].to_string());
        }
        let joined: String = captures
            .iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str())
            .collect();
        Some(joined)
    }
}

/// Cut a DOI at its first non-ASCII character; a trailing glyph such as
/// the copyright sign sometimes follows the DOI without a space.
fn truncate_non_ascii(doi: &str) -> &str {
    match doi.char_indices().find(|(_, c)| (*c as u32) > 127) {
        Some((idx, _)) => &doi[..idx],
        None => doi,
    }
}

/// Try every strategy in order; `None` if none matches or the match is empty
/// after truncation.
pub fn find_doi(text: &str) -> Option<String> {
    let (strategy, raw) = STRATEGIES
        .iter()
        .find_map(|strategy| strategy.find(text).map(|raw| (strategy, raw)))?;
    let doi = truncate_non_ascii(&raw);
    debug!("DOI strategy {} matched {:?}", strategy.name, raw);
    if doi.is_empty() {
        None
    } else {
        Some(doi.to_string())
    }
}

/// Like [`find_doi`], but naming `source_name` in the error.
pub fn extract_identifier(text: &str, source_name: &str) -> Result<String> {
    find_doi(text).ok_or_else(|| BibError::IdentifierNotFound {
        source_name: source_name.to_string(),
    })
}
