//! Table defaults, taken from the converter's own defaults so the two never
//! disagree.

use ebook_text_core::{ConvertOptions, TitleRules};

pub(crate) fn default_max_title_chars() -> usize {
    TitleRules::default().max_chars
}

pub(crate) fn default_heading_prefixes() -> Vec<String> {
    TitleRules::default().heading_prefixes
}

pub(crate) fn default_digit_is_heading() -> bool {
    TitleRules::default().digit_is_heading
}

pub(crate) fn default_drop_titles_containing() -> Vec<String> {
    TitleRules::default().drop_titles_containing
}

pub(crate) fn default_cover_names() -> Vec<String> {
    ConvertOptions::default().cover_images
}

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::default()
}
