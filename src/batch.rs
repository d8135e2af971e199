//! Batch conversion of a directory tree of EPUB files.
//!
//! Books at the top level of a directory are converted before its
//! sub-directories are visited; the output tree mirrors the input tree.

use crate::epub_loader::load_book;
use crate::interrupt::InterruptFlag;
use anyhow::{Context, Result};
use ebook_text_core::{Conversion, ConvertOptions, convert_book};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Per-run switches.
#[derive(Debug, Clone, Default)]
pub struct BatchSettings {
    /// Rewrite outputs even when their text is unchanged.
    pub force: bool,
    /// Skip books whose output is newer than the book.
    pub quick: bool,
    /// Stop after this many books have been examined.
    pub max: Option<usize>,
    pub options: ConvertOptions,
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub found: usize,
    pub changed: usize,
    pub errors: usize,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn report(&self) -> String {
        let mut report = format!(
            "Files found:   {}\nFiles changed: {}\n",
            self.found, self.changed
        );
        if self.errors > 0 {
            report.push_str(&format!("Errors:        {}\n", self.errors));
        }
        if self.interrupted {
            report.push_str("Interrupted\n");
        }
        report
    }
}

/// What happened to a single book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Written,
    /// Existing output already holds the same text.
    Unchanged,
    /// Output is newer than the book (`--quick`).
    UpToDate,
    /// The book produced no text; nothing was written.
    NoContent,
}

struct Walk<'a> {
    settings: &'a BatchSettings,
    interrupt: &'a InterruptFlag,
    remaining: Option<usize>,
    summary: RunSummary,
}

impl Walk<'_> {
    fn should_stop(&mut self) -> bool {
        if self.interrupt.is_raised() {
            self.summary.interrupted = true;
            return true;
        }
        self.remaining == Some(0)
    }
}

/// Convert every book under `from`, writing text files under `to`.
pub fn convert_tree(
    from: &Path,
    to: &Path,
    settings: &BatchSettings,
    interrupt: &InterruptFlag,
) -> Result<RunSummary> {
    if !from.is_dir() {
        anyhow::bail!("Input directory not found: {}", from.display());
    }
    let mut walk = Walk {
        settings,
        interrupt,
        remaining: settings.max,
        summary: RunSummary::default(),
    };
    if walk.remaining != Some(0) {
        visit(from, to, &mut walk)?;
    }
    Ok(walk.summary)
}

fn visit(from: &Path, to: &Path, walk: &mut Walk<'_>) -> Result<()> {
    fs::create_dir_all(to)
        .with_context(|| format!("Failed to create output dir {}", to.display()))?;
    let (books, dirs) = list_dir(from)?;

    for book in books {
        if walk.should_stop() {
            return Ok(());
        }
        walk.summary.found += 1;
        match convert_file(&book, to, walk.settings) {
            Ok(Outcome::Written) => {
                walk.summary.changed += 1;
                info!(path = %book.display(), "Converted");
            }
            Ok(outcome) => debug!(path = %book.display(), ?outcome, "Nothing written"),
            Err(err) => {
                walk.summary.errors += 1;
                error!(path = %book.display(), "Error converting: {err:#}");
            }
        }
        if let Some(remaining) = walk.remaining.as_mut() {
            *remaining -= 1;
        }
    }

    for dir in dirs {
        if walk.should_stop() {
            return Ok(());
        }
        let Some(name) = dir.file_name() else {
            continue;
        };
        visit(&dir, &to.join(name), walk)?;
    }
    Ok(())
}

/// Books and visible sub-directories of `dir`, each sorted by name.
fn list_dir(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut books = Vec::new();
    let mut dirs = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if path.is_dir() {
            if !hidden {
                dirs.push(path);
            }
        } else if is_epub(&path) {
            books.push(path);
        }
    }
    books.sort();
    dirs.sort();
    Ok((books, dirs))
}

fn is_epub(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("epub"))
}

/// Output file name for a book: extension and `_nodrm` removed, `.txt` added.
pub fn output_name(book: &Path) -> String {
    let stem = book
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}.txt", stem.replace("_nodrm", ""))
}

fn convert_file(book: &Path, out_dir: &Path, settings: &BatchSettings) -> Result<Outcome> {
    let out_path = out_dir.join(output_name(book));
    if settings.quick && is_up_to_date(book, &out_path)? {
        return Ok(Outcome::UpToDate);
    }

    let source = load_book(book)?;
    let conversion = convert_book(&source.chapters, &source.stylesheet, &settings.options)
        .with_context(|| format!("Failed to convert {}", book.display()))?;
    write_output(&out_path, &conversion, settings.force)
}

/// True when `output` exists and was modified after `book`.
fn is_up_to_date(book: &Path, output: &Path) -> Result<bool> {
    let Ok(out_meta) = fs::metadata(output) else {
        return Ok(false);
    };
    let book_modified = fs::metadata(book)
        .and_then(|meta| meta.modified())
        .with_context(|| format!("Failed to read metadata for {}", book.display()))?;
    let out_modified = out_meta
        .modified()
        .with_context(|| format!("Failed to read metadata for {}", output.display()))?;
    Ok(book_modified < out_modified)
}

/// Write converted text unless there is none or it matches what is on disk.
pub fn write_output(out_path: &Path, conversion: &Conversion, force: bool) -> Result<Outcome> {
    let Conversion::Text(text) = conversion else {
        return Ok(Outcome::NoContent);
    };
    if !force {
        if let Ok(existing) = fs::read_to_string(out_path) {
            if existing == *text {
                return Ok(Outcome::Unchanged);
            }
        }
    }
    fs::write(out_path, text)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;
    Ok(Outcome::Written)
}
