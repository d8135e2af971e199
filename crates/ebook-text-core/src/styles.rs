//! Coarse style-sheet lookup.
//!
//! This is not a CSS engine. Rules are keyed by their selector text and only
//! ever probed for the words `bold`, `italic` and `underline`, which is enough
//! to recover emphasis that books carry through classes instead of tags.

use crate::error::ConvertError;
use std::collections::HashMap;
use tracing::debug;

/// Emphasis carried by a `span`, either inline or through its classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStyle {
    None,
    Bold,
    Italic,
    Underline,
}

impl SpanStyle {
    /// Classify a declaration block (or raw tag text) by keyword presence.
    pub fn from_declarations(text: &str) -> SpanStyle {
        if text.contains("bold") {
            SpanStyle::Bold
        } else if text.contains("italic") {
            SpanStyle::Italic
        } else if text.contains("underline") {
            SpanStyle::Underline
        } else {
            SpanStyle::None
        }
    }
}

/// Selector name to concatenated declaration text.
#[derive(Debug, Clone, Default)]
pub struct StyleTable {
    rules: HashMap<String, String>,
}

impl StyleTable {
    pub fn parse(css: &str) -> Result<Self, ConvertError> {
        let stripped = strip_comments(css)?;
        let mut body = stripped.trim_start();
        if body.starts_with("@charset") {
            body = match body.find(';') {
                Some(end) => &body[end + 1..],
                None => "",
            };
        }

        let mut table = StyleTable::default();
        for block in body.split('}') {
            let Some((selectors, declarations)) = block.split_once('{') else {
                continue;
            };
            for selector in selectors.split(',') {
                let name = selector.trim();
                let name = name.strip_prefix('.').unwrap_or(name).trim();
                if name.is_empty() {
                    continue;
                }
                table.insert(name, declarations.trim());
            }
        }
        debug!(rules = table.len(), "Parsed style sheet");
        Ok(table)
    }

    fn insert(&mut self, selector: &str, declarations: &str) {
        self.rules
            .entry(selector.to_string())
            .and_modify(|existing| {
                existing.push(';');
                existing.push_str(declarations);
            })
            .or_insert_with(|| declarations.to_string());
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn declarations(&self, selector: &str) -> Option<&str> {
        self.rules.get(selector).map(String::as_str)
    }

    /// Emphasis implied by a whitespace-separated `class` attribute value.
    /// The first class with a recognizable emphasis wins.
    pub fn class_style(&self, classes: &str) -> SpanStyle {
        classes
            .split_whitespace()
            .filter_map(|class| self.declarations(class))
            .map(SpanStyle::from_declarations)
            .find(|style| *style != SpanStyle::None)
            .unwrap_or(SpanStyle::None)
    }
}

/// Remove every `/* ... */` span. Comments do not nest.
fn strip_comments(css: &str) -> Result<String, ConvertError> {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    let mut consumed = 0usize;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("*/") else {
            return Err(ConvertError::UnterminatedStyleComment {
                offset: consumed + start,
            });
        };
        let skip = start + 2 + end + 2;
        consumed += skip;
        rest = &rest[skip..];
    }
    out.push_str(rest);
    Ok(out)
}
