use bibbuilder::doi::{extract_identifier, find_doi, STRATEGIES};
use bibbuilder::BibError;

#[test]
fn test_agu_research_letter() {
    let text = "Geophysical Research Letters\nRESEARCHLETTER\n10.1029/2020GL001234 KeyPoints:\n\u{2022} Something";
    assert_eq!(find_doi(text).as_deref(), Some("10.1029/2020GL001234"));
}

#[test]
fn test_agu_key_points_glued() {
    let text = "Journal of Geophysical Research\n10.1029/2019JD031234Key Points:\n";
    assert_eq!(find_doi(text).as_deref(), Some("10.1029/2019JD031234"));
}

#[test]
fn test_strategy_order_beats_text_position() {
    // The dataset DOI comes first in the text, but the labelled DOI wins.
    let text = "Data available at 10.5067/MODIS/MOD04_L2.006\nPublished 2020. doi:10.5194/acp-20-1-2020.\n";
    assert_eq!(find_doi(text).as_deref(), Some("10.5194/acp-20-1-2020"));
}

#[test]
fn test_doi_url() {
    let text = "Cite as https://doi.org/10.1021/acs.est.9b01234. All rights reserved";
    assert_eq!(find_doi(text).as_deref(), Some("10.1021/acs.est.9b01234"));
}

#[test]
fn test_slash_line_break_is_joined() {
    let text = "Atmos. Chem. Phys., 11, 2011\nwww.atmos-chem-phys.net/11/8543/2011/ 10.5194/\nacp-11-8543-2011\n";
    assert_eq!(find_doi(text).as_deref(), Some("10.5194/acp-11-8543-2011"));
}

#[test]
fn test_bare_doi() {
    assert_eq!(
        find_doi("see 10.1016/j.atmosenv.2019.01.001 for details").as_deref(),
        Some("10.1016/j.atmosenv.2019.01.001")
    );
}

#[test]
fn test_truncated_at_non_ascii() {
    let text = "doi:10.1002/2016JD025678\u{00A9}2016 American Geophysical Union";
    assert_eq!(find_doi(text).as_deref(), Some("10.1002/2016JD025678"));
}

#[test]
fn test_no_doi_is_an_error() {
    let result = extract_identifier("A paper with no identifier at all", "paper.pdf");
    match result {
        Err(BibError::IdentifierNotFound { source_name }) => assert_eq!(source_name, "paper.pdf"),
        other => panic!("expected IdentifierNotFound, got {:?}", other),
    }
}

#[test]
fn test_strategy_table_order() {
    let names: Vec<&str> = STRATEGIES.iter().map(|s| s.name).collect();
    assert_eq!(names.first(), Some(&"agu_research_letter"));
    assert_eq!(names.last(), Some(&"bare"));
    assert!(STRATEGIES.iter().all(|s| !s.pattern().is_empty()));
}
