//! EPUB container reading.
//!
//! Opens a book, walks its spine in reading order and collects the raw
//! chapter markup plus the text of every style sheet. No markup is
//! interpreted here; that is the core library's job.

use anyhow::{Context, Result};
use epub::doc::EpubDoc;
use std::path::Path;
use tracing::{debug, info};

const CSS_MIME: &str = "text/css";

/// Raw inputs of one book, ready for conversion.
#[derive(Debug, Clone, Default)]
pub struct BookSource {
    /// Chapter markup in reading order.
    pub chapters: Vec<String>,
    /// All style sheets of the book, concatenated.
    pub stylesheet: String,
}

/// Load an EPUB from disk.
pub fn load_book(path: &Path) -> Result<BookSource> {
    info!(path = %path.display(), "Loading EPUB content");
    let mut doc =
        EpubDoc::new(path).with_context(|| format!("Failed to open EPUB at {}", path.display()))?;

    let mut chapters = Vec::new();
    loop {
        if let Some((chapter, _mime)) = doc.get_current_str() {
            debug!(
                chapter = chapters.len(),
                chars = chapter.len(),
                "Read spine item"
            );
            chapters.push(chapter);
        }
        if !doc.go_next() {
            break;
        }
    }

    // Resource ids are sorted so the concatenated sheet is the same every run.
    let mut css_ids: Vec<String> = doc
        .resources
        .keys()
        .filter(|id| doc.get_resource_mime(id).as_deref() == Some(CSS_MIME))
        .cloned()
        .collect();
    css_ids.sort();

    let mut stylesheet = String::new();
    for id in &css_ids {
        let Some((css, _mime)) = doc.get_resource_str(id) else {
            debug!(%id, "Style sheet listed but unreadable");
            continue;
        };
        stylesheet.push_str(&css);
        stylesheet.push('\n');
    }

    info!(
        chapters = chapters.len(),
        style_sheets = css_ids.len(),
        "Finished loading EPUB content"
    );
    Ok(BookSource {
        chapters,
        stylesheet,
    })
}
