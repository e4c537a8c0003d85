pub mod bibliography;
pub mod entry;
pub mod journals;
pub mod names;
pub mod normalize;
pub mod parser;

pub use bibliography::{backup_file, backup_name, AddOutcome, Bibliography, ImportPolicy};
pub use entry::{BibEntry, BibEntryBuilder};
pub use normalize::normalize;
pub use parser::{entry_to_bibtex, parse_bibtex};
