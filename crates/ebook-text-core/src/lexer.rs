//! Splits chapter markup into tag and text tokens.
//!
//! Source line wrapping means nothing here: every `<` starts a new record and
//! every `>` ends one, so each tag and each text run becomes exactly one token.

/// One lexical unit of chapter markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// An opening (or self-closing) tag. `raw` is the full tag text,
    /// angle brackets included, used for attribute lookups.
    Open {
        name: String,
        raw: String,
        self_closing: bool,
    },
    Close {
        name: String,
    },
    Text(String),
}

impl Token {
    pub fn open(raw: &str) -> Token {
        let (name, self_closing) = tag_name(raw);
        Token::Open {
            name,
            raw: raw.to_string(),
            self_closing,
        }
    }

    /// Value of attribute `attr` on an opening tag, if present.
    pub fn attribute(&self, attr: &str) -> Option<&str> {
        match self {
            Token::Open { raw, .. } => attribute_value(raw, attr),
            _ => None,
        }
    }
}

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";

/// Tokenize one content file.
pub fn tokenize(content: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut in_comment = false;
    for owned in records(content) {
        let mut record: &str = &owned;
        if in_comment {
            match record.find(COMMENT_CLOSE) {
                Some(end) => {
                    in_comment = false;
                    record = &record[end + COMMENT_CLOSE.len()..];
                }
                None => continue,
            }
        }
        if let Some(start) = record.find(COMMENT_OPEN) {
            let opened = &record[start + COMMENT_OPEN.len()..];
            push_record(&mut tokens, &record[..start]);
            match opened.find(COMMENT_CLOSE) {
                Some(end) => record = &opened[end + COMMENT_CLOSE.len()..],
                None => {
                    in_comment = true;
                    continue;
                }
            }
        }
        push_record(&mut tokens, record);
    }
    tokens
}

/// Break markup into tag and text records. Line breaks become spaces.
fn records(content: &str) -> Vec<String> {
    let mut records = Vec::new();
    let mut current = String::new();
    for c in content.chars() {
        match c {
            '<' => {
                if !current.is_empty() {
                    records.push(std::mem::take(&mut current));
                }
                current.push('<');
            }
            '>' => {
                current.push('>');
                records.push(std::mem::take(&mut current));
            }
            '\r' | '\n' => current.push(' '),
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        records.push(current);
    }
    records
}

fn push_record(tokens: &mut Vec<Token>, record: &str) {
    let trimmed = record.trim();
    if trimmed.is_empty() {
        // Whitespace between inline tags still separates words.
        if !record.is_empty() {
            tokens.push(Token::Text(" ".to_string()));
        }
        return;
    }
    if trimmed.starts_with('<') {
        match trimmed.strip_prefix("</") {
            Some(rest) => {
                let (name, _) = tag_name(&format!("<{rest}"));
                tokens.push(Token::Close { name });
            }
            None => tokens.push(Token::open(trimmed)),
        }
    } else {
        tokens.push(Token::Text(record.to_string()));
    }
}

/// Lower-cased tag name: the text after `<` up to the first space or `>`.
fn tag_name(raw: &str) -> (String, bool) {
    let inner = raw.strip_prefix('<').unwrap_or(raw);
    let end = inner
        .find(|c: char| c.is_whitespace() || c == '>')
        .unwrap_or(inner.len());
    let name = &inner[..end];
    let self_closing = raw.trim_end_matches('>').ends_with('/');
    let name = name.trim_end_matches('/');
    (name.to_ascii_lowercase(), self_closing)
}

/// Find `attr=` in raw tag text and return the (optionally quoted) value.
fn attribute_value<'a>(raw: &'a str, attr: &str) -> Option<&'a str> {
    let lower = raw.to_ascii_lowercase();
    let needle = attr.to_ascii_lowercase();
    let mut from = 0;
    while let Some(found) = lower[from..].find(&needle) {
        let start = from + found;
        from = start + needle.len();
        // Must be a whole attribute name, so `href` does not match `data-href`.
        let boundary = lower[..start]
            .chars()
            .next_back()
            .is_none_or(|c| c.is_whitespace() || c == ':');
        let rest = lower[from..].trim_start();
        if !boundary || !rest.starts_with('=') {
            continue;
        }
        let value_start = raw.len() - rest.len() + 1;
        let value = raw[value_start..].trim_start();
        return Some(match value.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let body = &value[1..];
                &body[..body.find(quote).unwrap_or(body.len())]
            }
            _ => {
                let end = value
                    .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
                    .unwrap_or(value.len());
                &value[..end]
            }
        });
    }
    None
}
