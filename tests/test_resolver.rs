use std::time::Duration;

use bibbuilder::doi::{DoiOrgResolver, Resolver};
use mockito::{Matcher, Server};

const RECORD: &str = r#"@article{Smith_2020,
  title={Ozone over the Arctic},
  author={Smith, John},
  journal={Geophysical Research Letters},
  year={2020},
  doi={10.1029/2020GL001234}
}"#;

fn resolver_for(server: &Server) -> DoiOrgResolver {
    DoiOrgResolver::new()
        .with_base_url(server.url())
        .with_max_elapsed(Duration::from_millis(500))
}

#[test]
fn test_resolves_with_bibtex_content_negotiation() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/10.1029/2020GL001234")
        .match_header("accept", Matcher::Exact("application/x-bibtex".to_string()))
        .with_status(200)
        .with_body(RECORD)
        .create();

    let bibtex = resolver_for(&server).resolve("10.1029/2020GL001234");
    mock.assert();
    assert_eq!(bibtex.as_deref(), Some(RECORD));
}

#[test]
fn test_not_found_fails_without_retry() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/10.1000/missing")
        .with_status(404)
        .expect(1)
        .create();

    assert!(resolver_for(&server).resolve("10.1000/missing").is_none());
    mock.assert();
}

#[test]
fn test_server_errors_are_retried() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/10.1000/flaky")
        .with_status(503)
        .expect_at_least(2)
        .create();

    assert!(resolver_for(&server).resolve("10.1000/flaky").is_none());
    mock.assert();
}

#[test]
fn test_non_bibtex_body_is_a_failure() {
    let mut server = Server::new();
    let _mock = server
        .mock("GET", "/10.1000/html")
        .with_status(200)
        .with_body("<html>DOI Not Found</html>")
        .create();

    assert!(resolver_for(&server).resolve("10.1000/html").is_none());
}
