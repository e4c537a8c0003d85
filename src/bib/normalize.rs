//! Turning a record fresh from the registry into the form kept in the store.
//!
//! The steps run in a fixed order: sanitize every value, fix page ranges and
//! journal names, derive the citation key, and only then escape non-ASCII
//! characters to LaTeX. Key derivation has to see the raw characters, so
//! escaping must come last.

use std::collections::HashSet;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::bib::journals::abbreviate_journal;
use crate::bib::names::{split_authors, split_name};
use crate::bib::BibEntry;
use crate::error::{BibError, Result};

static SUBSCRIPT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        "{}(?P<subscript>.+?){}",
        regex::escape(r"$\less$sub$\greater$"),
        regex::escape(r"$\less$/sub$\greater$")
    ))
    .expect("Invalid subscript regex pattern")
});
static DOUBLE_HYPHEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^\s-])\s*-{2,3}\s*([^\s-])").expect("Invalid page range regex pattern"));
static LATEX_COMMAND_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[A-Za-z]+").expect("Invalid LaTeX command regex pattern"));
static BRACKET_GROUP_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]").expect("Invalid bracket group regex pattern"));

/// Fix quirks left over when the registry converts HTML titles to LaTeX.
///
/// ACP titles arrive as `{NO}$\less$sub$\greater$ 2$\less$/sub$\greater$`,
/// which should read `{NO}$_{2}$`. Some DOIs come back with `%2F` for a slash.
pub fn sanitize_html_strings(value: &str) -> String {
    let value = SUBSCRIPT_REGEX.replace_all(value, |caps: &regex::Captures| {
        format!("$_{{{}}}$", caps["subscript"].trim())
    });
    value.replace("%2F", "/")
}

/// `100--110` becomes `100–110` (en dash).
pub fn fix_page_range(pages: &str) -> String {
    DOUBLE_HYPHEN_REGEX
        .replace_all(pages, "${1}\u{2013}${2}")
        .into_owned()
}

/// Reduce a name fragment to the characters allowed in a key.
fn key_fragment(text: &str) -> String {
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(char::is_ascii)
        .collect();
    let folded = LATEX_COMMAND_REGEX.replace_all(&folded, "");
    let folded = BRACKET_GROUP_REGEX.replace_all(&folded, "");
    folded
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

/// `<Last><F><yy>` from the first author and the year, e.g. `SmithJ20`.
///
/// Entries without an author fall back to the first editor, then to `Anon`.
pub fn derive_base_key(entry: &BibEntry) -> String {
    let names = entry
        .author()
        .or_else(|| entry.get("editor").map(String::as_str))
        .unwrap_or("");
    let first_author = split_authors(names).into_iter().next().unwrap_or_default();
    let person = split_name(&first_author);

    let mut last = key_fragment(&person.last_joined());
    if last.is_empty() {
        last = "Anon".to_string();
    }
    let mut key = String::new();
    let mut last_chars = last.chars();
    if let Some(c) = last_chars.next() {
        key.push(c.to_ascii_uppercase());
        key.push_str(last_chars.as_str());
    }

    if let Some(initial) = key_fragment(&person.first_joined())
        .chars()
        .find(char::is_ascii_alphabetic)
    {
        key.push(initial.to_ascii_uppercase());
    }

    let digits: Vec<char> = entry
        .year()
        .unwrap_or("")
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    let year_suffix = &digits[digits.len().saturating_sub(2)..];
    key.extend(year_suffix);

    key
}

/// Append `A`..`Z` to `base` until `is_taken` says no.
pub fn make_key_unique(base: &str, is_taken: impl Fn(&str) -> bool) -> Result<String> {
    if !is_taken(base) {
        return Ok(base.to_string());
    }
    for suffix in 'A'..='Z' {
        let candidate = format!("{}{}", base, suffix);
        if !is_taken(&candidate) {
            return Ok(candidate);
        }
    }
    Err(BibError::KeySpaceExhausted(base.to_string()))
}

fn latex_special(c: char) -> Option<&'static str> {
    let replacement = match c {
        'ß' => "{\\ss}",
        'æ' => "{\\ae}",
        'Æ' => "{\\AE}",
        'œ' => "{\\oe}",
        'Œ' => "{\\OE}",
        'ø' => "{\\o}",
        'Ø' => "{\\O}",
        'ł' => "{\\l}",
        'Ł' => "{\\L}",
        'ı' => "{\\i}",
        'đ' => "{\\dj}",
        'Đ' => "{\\DJ}",
        'þ' => "{\\th}",
        'Þ' => "{\\TH}",
        '\u{00A0}' => "~",
        '“' => "``",
        '”' => "''",
        '‘' => "`",
        '’' => "'",
        '…' => "{\\ldots}",
        '§' => "{\\S}",
        '©' => "{\\textcopyright}",
        '®' => "{\\textregistered}",
        '°' => "$^\\circ$",
        '±' => "$\\pm$",
        '×' => "$\\times$",
        '·' => "$\\cdot$",
        '≤' => "$\\leq$",
        '≥' => "$\\geq$",
        '≈' => "$\\approx$",
        '∼' => "$\\sim$",
        '→' => "$\\rightarrow$",
        '\u{00B5}' => "$\\mu$",
        'α' => "$\\alpha$",
        'β' => "$\\beta$",
        'γ' => "$\\gamma$",
        'δ' => "$\\delta$",
        'ε' => "$\\epsilon$",
        'ζ' => "$\\zeta$",
        'η' => "$\\eta$",
        'θ' => "$\\theta$",
        'ι' => "$\\iota$",
        'κ' => "$\\kappa$",
        'λ' => "$\\lambda$",
        'μ' => "$\\mu$",
        'ν' => "$\\nu$",
        'ξ' => "$\\xi$",
        'π' => "$\\pi$",
        'ρ' => "$\\rho$",
        'σ' => "$\\sigma$",
        'τ' => "$\\tau$",
        'υ' => "$\\upsilon$",
        'φ' => "$\\phi$",
        'χ' => "$\\chi$",
        'ψ' => "$\\psi$",
        'ω' => "$\\omega$",
        'Γ' => "$\\Gamma$",
        'Δ' => "$\\Delta$",
        'Θ' => "$\\Theta$",
        'Λ' => "$\\Lambda$",
        'Ξ' => "$\\Xi$",
        'Π' => "$\\Pi$",
        'Σ' => "$\\Sigma$",
        'Φ' => "$\\Phi$",
        'Ψ' => "$\\Psi$",
        'Ω' => "$\\Omega$",
        _ => return None,
    };
    Some(replacement)
}

/// LaTeX accent command for a combining mark, and whether it is a letter command.
fn latex_accent(mark: char) -> Option<(&'static str, bool)> {
    let accent = match mark {
        '\u{0300}' => ("`", false),
        '\u{0301}' => ("'", false),
        '\u{0302}' => ("^", false),
        '\u{0303}' => ("~", false),
        '\u{0304}' => ("=", false),
        '\u{0307}' => (".", false),
        '\u{0308}' => ("\"", false),
        '\u{0306}' => ("u", true),
        '\u{030A}' => ("r", true),
        '\u{030B}' => ("H", true),
        '\u{030C}' => ("v", true),
        '\u{0323}' => ("d", true),
        '\u{0327}' => ("c", true),
        '\u{0328}' => ("k", true),
        _ => return None,
    };
    Some(accent)
}

/// Accented letters as LaTeX accent commands; `None` if any part has no mapping.
fn latex_accented(c: char) -> Option<String> {
    let mut decomposed = std::iter::once(c).nfd();
    let base = decomposed.next()?;
    if !base.is_ascii_alphabetic() {
        return None;
    }
    let mut output = base.to_string();
    let mut has_mark = false;
    for mark in decomposed {
        let (command, is_letter) = latex_accent(mark)?;
        output = if is_letter {
            format!("{{\\{}{{{}}}}}", command, output)
        } else {
            format!("{{\\{}{}}}", command, output)
        };
        has_mark = true;
    }
    has_mark.then_some(output)
}

/// Rewrite literal non-ASCII characters as LaTeX markup.
///
/// ASCII text, including existing LaTeX markup, passes through untouched,
/// as do characters with no known LaTeX form.
pub fn latex_escape(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    for c in value.nfc() {
        if c.is_ascii() {
            output.push(c);
        } else if let Some(special) = latex_special(c) {
            output.push_str(special);
        } else if let Some(accented) = latex_accented(c) {
            output.push_str(&accented);
        } else {
            output.push(c);
        }
    }
    output
}

/// Normalize a record from the registry and give it a key not in `existing_keys`.
pub fn normalize(mut entry: BibEntry, existing_keys: &HashSet<String>) -> Result<BibEntry> {
    for value in entry.fields.values_mut() {
        *value = sanitize_html_strings(value);
    }

    if let Some(pages) = entry.get("pages") {
        let fixed = fix_page_range(pages);
        entry.set("pages", fixed);
    }
    if let Some(journal) = entry.get("journal") {
        let abbreviated = abbreviate_journal(journal);
        entry.set("journal", abbreviated);
    }

    let base_key = derive_base_key(&entry);
    let key = make_key_unique(&base_key, |k| existing_keys.contains(k))?;
    debug!("Assigned key {} (base {}) to registry key {}", key, base_key, entry.key);
    entry.key = key;

    for value in entry.fields.values_mut() {
        *value = latex_escape(value);
    }

    Ok(entry)
}
