pub mod extract;
pub mod resolver;

pub use extract::{extract_identifier, find_doi, Strategy, STRATEGIES};
pub use resolver::{DoiOrgResolver, Resolver};
