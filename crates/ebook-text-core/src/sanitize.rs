//! Character-level cleanup of raw text runs.
//!
//! Source text is reduced to printable Latin-1 plus a handful of named
//! placeholders. Anything else survives as a numeric character reference,
//! which the reformatter expands again once structure is settled.

/// Placeholder for an em-dash, turned into a glyph by the reformatter.
pub const EM_DASH: &str = "&mdash;";
/// Placeholder for an en-dash, turned into a glyph by the reformatter.
pub const EN_DASH: &str = "&ndash;";

/// Replacement for a single typographic character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fold {
    Char(char),
    Str(&'static str),
    Drop,
}

/// Typographic collapsing shared by the sanitizer and the reformatter's
/// reference expansion.
pub(crate) fn fold_typographic(c: char) -> Option<Fold> {
    let folded = match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => Fold::Char('\''),
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => Fold::Char('"'),
        // C1 code points that really are Windows-1252 punctuation
        '\u{0091}' | '\u{0092}' => Fold::Char('\''),
        '\u{0093}' | '\u{0094}' => Fold::Char('"'),
        '\u{0085}' | '\u{2026}' => Fold::Str("..."),
        '\u{0095}' | '\u{2020}' | '\u{2021}' | '\u{2022}' => Fold::Char('*'),
        '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => {
            Fold::Char(' ')
        }
        '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' => Fold::Drop,
        _ => return None,
    };
    Some(folded)
}

/// Control codes that may never appear literally in output.
pub(crate) fn is_disallowed_control(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{0008}' | '\u{000B}'..='\u{001F}' | '\u{007F}'..='\u{009F}')
}

fn is_printable_latin1(c: char) -> bool {
    matches!(c, ' '..='~' | '\u{00A0}'..='\u{00FF}')
}

/// Sanitize one raw text run from chapter markup.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\t' | '\n' | '\r' => out.push(' '),
            '\u{2013}' | '\u{0096}' => out.push_str(EN_DASH),
            '\u{2014}' | '\u{2015}' | '\u{0097}' => out.push_str(EM_DASH),
            _ => match fold_typographic(c) {
                Some(Fold::Char(folded)) => out.push(folded),
                Some(Fold::Str(folded)) => out.push_str(folded),
                Some(Fold::Drop) => {}
                None if (c as u32) > 0xFFFF => {}
                None if is_printable_latin1(c) => out.push(c),
                None => out.push_str(&format!("&#x{:04X};", c as u32)),
            },
        }
    }
    out
}
