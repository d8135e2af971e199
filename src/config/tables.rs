use super::defaults;
use super::models::{AppConfig, LogLevel};
use serde::Deserialize;

/// On-disk layout of `config.toml`: one table per concern.
#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    output: OutputConfig,
    #[serde(default)]
    titles: TitlesConfig,
    #[serde(default)]
    images: ImagesConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            bare: tables.output.bare,
            max_title_chars: tables.titles.max_chars,
            heading_prefixes: tables.titles.heading_prefixes,
            digit_is_heading: tables.titles.digit_is_heading,
            drop_titles_containing: tables.titles.drop_titles_containing,
            cover_names: tables.images.cover_names,
            log_level: tables.logging.log_level,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OutputConfig {
    #[serde(default)]
    bare: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct TitlesConfig {
    #[serde(default = "defaults::default_max_title_chars")]
    max_chars: usize,
    #[serde(default = "defaults::default_heading_prefixes")]
    heading_prefixes: Vec<String>,
    #[serde(default = "defaults::default_digit_is_heading")]
    digit_is_heading: bool,
    #[serde(default = "defaults::default_drop_titles_containing")]
    drop_titles_containing: Vec<String>,
}

impl Default for TitlesConfig {
    fn default() -> Self {
        TitlesConfig {
            max_chars: defaults::default_max_title_chars(),
            heading_prefixes: defaults::default_heading_prefixes(),
            digit_is_heading: defaults::default_digit_is_heading(),
            drop_titles_containing: defaults::default_drop_titles_containing(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ImagesConfig {
    #[serde(default = "defaults::default_cover_names")]
    cover_names: Vec<String>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        ImagesConfig {
            cover_names: defaults::default_cover_names(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}
