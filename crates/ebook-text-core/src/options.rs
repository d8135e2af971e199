//! Tunables for a single conversion.
//!
//! Everything here can be deserialized, so the binary can fill it from its
//! TOML config without duplicating the defaults.

use serde::{Deserialize, Serialize};

/// Options threaded through chapter building and reformatting.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Render ASCII-only emphasis instead of pseudo-tags.
    #[serde(default)]
    pub bare: bool,
    #[serde(default)]
    pub titles: TitleRules,
    /// Image file names (basename only) that are never referenced in output.
    #[serde(default = "default_cover_images")]
    pub cover_images: Vec<String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            bare: false,
            titles: TitleRules::default(),
            cover_images: default_cover_images(),
        }
    }
}

impl ConvertOptions {
    pub fn with_bare(mut self, bare: bool) -> Self {
        self.bare = bare;
        self
    }

    pub(crate) fn is_cover_image(&self, file_name: &str) -> bool {
        self.cover_images
            .iter()
            .any(|cover| cover.eq_ignore_ascii_case(file_name))
    }
}

/// Heuristics used to decide whether the first block of a chapter is a
/// heading.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TitleRules {
    /// Longer first blocks are treated as body text under an empty title.
    #[serde(default = "default_max_title_chars")]
    pub max_chars: usize,
    /// Case-insensitive prefixes that always mark a heading, whatever its length.
    #[serde(default = "default_heading_prefixes")]
    pub heading_prefixes: Vec<String>,
    /// A first block starting with a digit is always a heading.
    #[serde(default = "default_digit_is_heading")]
    pub digit_is_heading: bool,
    /// Chapters whose title contains any of these (case-insensitive) are dropped.
    #[serde(default = "default_drop_titles_containing")]
    pub drop_titles_containing: Vec<String>,
}

impl Default for TitleRules {
    fn default() -> Self {
        Self {
            max_chars: default_max_title_chars(),
            heading_prefixes: default_heading_prefixes(),
            digit_is_heading: default_digit_is_heading(),
            drop_titles_containing: default_drop_titles_containing(),
        }
    }
}

impl TitleRules {
    /// True when `text` is certainly a heading regardless of its length.
    pub fn is_forced_heading(&self, text: &str) -> bool {
        if self.digit_is_heading && text.starts_with(|c: char| c.is_ascii_digit()) {
            return true;
        }
        let lower = text.to_lowercase();
        self.heading_prefixes
            .iter()
            .any(|prefix| lower.starts_with(&prefix.to_lowercase()))
    }

    pub fn is_too_long(&self, text: &str) -> bool {
        text.chars().count() > self.max_chars
    }

    pub fn drops_chapter(&self, title: &str) -> bool {
        let lower = title.to_lowercase();
        self.drop_titles_containing
            .iter()
            .any(|needle| lower.contains(&needle.to_lowercase()))
    }
}

fn default_max_title_chars() -> usize {
    100
}

fn default_heading_prefixes() -> Vec<String> {
    vec!["chapter".to_string()]
}

fn default_digit_is_heading() -> bool {
    true
}

fn default_drop_titles_containing() -> Vec<String> {
    vec!["contents".to_string()]
}

fn default_cover_images() -> Vec<String> {
    vec!["cover.jpeg".to_string()]
}
