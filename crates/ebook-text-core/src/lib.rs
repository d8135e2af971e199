//! E-book markup to plain text conversion.
//!
//! The pipeline runs per book: chapter markup is tokenized, fed through the
//! chapter builder state machine into typed intermediate lines, and the
//! reformatter renders those lines as text. Nothing here touches the file
//! system; the container reader and output handling live in the binary.

pub mod builder;
pub mod error;
pub mod lexer;
pub mod markup;
pub mod options;
pub mod reformat;
pub mod sanitize;
pub mod styles;

pub use builder::{BuildContext, BuildState, Emit, build_chapters};
pub use error::ConvertError;
pub use lexer::{Token, tokenize};
pub use markup::{Chapter, Mark, MarkerLine};
pub use options::{ConvertOptions, TitleRules};
pub use reformat::{Conversion, reformat};
pub use sanitize::sanitize;
pub use styles::{SpanStyle, StyleTable};

use tracing::debug;

/// Convert one book: chapter markup in reading order plus the concatenated
/// text of all its style sheets.
pub fn convert_book<S: AsRef<str>>(
    contents: &[S],
    stylesheet: &str,
    options: &ConvertOptions,
) -> Result<Conversion, ConvertError> {
    let styles = StyleTable::parse(stylesheet)?;
    let chapters = build_chapters(contents, &styles, options);
    debug!(
        content_files = contents.len(),
        chapters = chapters.len(),
        bare = options.bare,
        "Converting book"
    );
    Ok(reformat(&chapters, options))
}
