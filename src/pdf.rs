use std::path::Path;

use lopdf::Document;

use crate::error::{BibError, Result};

/// Source of the plain text of a document's first page.
pub trait PageTextSource {
    fn first_page_text(&self, path: &Path) -> Result<String>;
}

/// Reads the first page with `lopdf`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfTextSource;

impl PageTextSource for LopdfTextSource {
    fn first_page_text(&self, path: &Path) -> Result<String> {
        let parsing_error = |reason: String| BibError::PdfParsing {
            path: path.to_path_buf(),
            reason,
        };

        let document = Document::load(path).map_err(|err| parsing_error(err.to_string()))?;
        let first_page = document
            .get_pages()
            .keys()
            .next()
            .copied()
            .ok_or_else(|| parsing_error("document has no pages".to_string()))?;
        document
            .extract_text(&[first_page])
            .map_err(|err| parsing_error(err.to_string()))
    }
}
