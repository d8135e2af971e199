use ebook_text_core::{ConvertOptions, TitleRules};
use serde::Deserialize;

/// Flattened converter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bare: bool,
    pub max_title_chars: usize,
    pub heading_prefixes: Vec<String>,
    pub digit_is_heading: bool,
    pub drop_titles_containing: Vec<String>,
    pub cover_names: Vec<String>,
    pub log_level: LogLevel,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bare: false,
            max_title_chars: crate::config::defaults::default_max_title_chars(),
            heading_prefixes: crate::config::defaults::default_heading_prefixes(),
            digit_is_heading: crate::config::defaults::default_digit_is_heading(),
            drop_titles_containing: crate::config::defaults::default_drop_titles_containing(),
            cover_names: crate::config::defaults::default_cover_names(),
            log_level: crate::config::defaults::default_log_level(),
        }
    }
}

impl AppConfig {
    /// Options handed to the conversion pipeline for every book.
    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            bare: self.bare,
            titles: TitleRules {
                max_chars: self.max_title_chars,
                heading_prefixes: self.heading_prefixes.clone(),
                digit_is_heading: self.digit_is_heading,
                drop_titles_containing: self.drop_titles_containing.clone(),
            },
            cover_images: self.cover_names.clone(),
        }
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
