pub mod bib;
pub mod build;
pub mod config;
pub mod doi;
pub mod error;
pub mod logging;
pub mod merge;
pub mod pdf;
pub mod prompt;
pub mod web;

pub use bib::{BibEntry, Bibliography};
pub use error::{BibError, Result};
