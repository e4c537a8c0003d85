use std::collections::HashSet;

use bibbuilder::bib::journals::abbreviate_journal;
use bibbuilder::bib::normalize::{derive_base_key, fix_page_range, make_key_unique};
use bibbuilder::bib::{normalize, BibEntry};
use bibbuilder::BibError;

fn registry_record() -> BibEntry {
    BibEntry::builder("Smith_2020", "article")
        .field("author", "Smith, John and Doe, Jane")
        .field("title", "Ozone over the {Arctic}")
        .field("journal", "The Journal of Chemical Physics")
        .field("pages", "100--110")
        .field("year", "2020")
        .field("doi", "10.1063/1.1234567")
        .build()
}

#[test]
fn test_base_key_from_first_author_and_year() {
    assert_eq!(derive_base_key(&registry_record()), "SmithJ20");

    let first_last = BibEntry::builder("x", "article")
        .field("author", "Jane van der Berg and John Smith")
        .field("year", "1999")
        .build();
    assert_eq!(derive_base_key(&first_last), "BergJ99");
}

#[test]
fn test_base_key_without_author() {
    let edited = BibEntry::builder("x", "book")
        .field("editor", "Keller, Anna")
        .field("year", "2011")
        .build();
    assert_eq!(derive_base_key(&edited), "KellerA11");

    let anonymous = BibEntry::builder("x", "misc").field("year", "2005").build();
    assert_eq!(derive_base_key(&anonymous), "Anon05");
}

#[test]
fn test_base_key_folds_accents() {
    let entry = BibEntry::builder("x", "article")
        .field("author", "Müller, Jürgen")
        .field("year", "2018")
        .build();
    assert_eq!(derive_base_key(&entry), "MullerJ18");
}

#[test]
fn test_key_collision_uses_next_suffix() {
    let existing: HashSet<String> = ["SmithJ20", "SmithJ20A"].iter().map(|s| s.to_string()).collect();
    let key = make_key_unique("SmithJ20", |k| existing.contains(k)).unwrap();
    assert_eq!(key, "SmithJ20B");

    let entry = normalize(registry_record(), &existing).unwrap();
    assert_eq!(entry.key, "SmithJ20B");
}

#[test]
fn test_key_space_exhausted() {
    let result = make_key_unique("SmithJ20", |_| true);
    assert!(matches!(result, Err(BibError::KeySpaceExhausted(ref base)) if base == "SmithJ20"));
}

#[test]
fn test_normalize_is_deterministic() {
    let existing = HashSet::new();
    let first = normalize(registry_record(), &existing).unwrap();
    let second = normalize(registry_record(), &existing).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.key, "SmithJ20");
}

#[test]
fn test_normalize_fixes_pages_and_journal() {
    let entry = normalize(registry_record(), &HashSet::new()).unwrap();
    assert_eq!(entry.pages(), Some("100\u{2013}110"));
    assert_eq!(entry.journal(), Some("J. Chem. Phys"));
    assert_eq!(entry.title(), Some("Ozone over the {Arctic}"));
}

#[test]
fn test_normalize_escapes_after_key_derivation() {
    let record = BibEntry::builder("x", "article")
        .field("author", "Ødegaard, Åse")
        .field("year", "2021")
        .build();
    let entry = normalize(record, &HashSet::new()).unwrap();
    assert_eq!(entry.key, "DegaardA21");
    assert_eq!(entry.author(), Some("{\\O}degaard, {\\r{A}}se"));
}

#[test]
fn test_page_range() {
    assert_eq!(fix_page_range("100--110"), "100\u{2013}110");
    assert_eq!(fix_page_range("5 --- 9"), "5\u{2013}9");
    assert_eq!(fix_page_range("e2020GL001234"), "e2020GL001234");
}

#[test]
fn test_page_range_with_article_numbers() {
    assert_eq!(fix_page_range("L01801--L01805"), "L01801\u{2013}L01805");
    assert_eq!(fix_page_range("e1--e10"), "e1\u{2013}e10");
}

#[test]
fn test_journal_abbreviation() {
    assert_eq!(abbreviate_journal("The Journal of Chemical Physics"), "J. Chem. Phys");
    assert_eq!(abbreviate_journal("Atmospheric Chemistry and Physics"), "Atmos. Chem. Phys.");
    assert_eq!(abbreviate_journal("Some Unknown Journal"), "Some Unknown Journal");
}
