//! Turns built chapters into the final text of a book.
//!
//! Every line is rendered to pseudo-tag text first and cleaned up. Bare mode
//! is a further pass over that text, so both modes share the same cleanup.

use crate::markup::{CellKind, Chapter, Inline, Mark, MarkerLine};
use crate::options::ConvertOptions;
use crate::sanitize::{EM_DASH, EN_DASH, Fold, fold_typographic, is_disallowed_control};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;
use tracing::debug;

/// Result of converting one book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    Text(String),
    /// Nothing but whitespace and pseudo-tags was produced; no file should be
    /// written for this book.
    NoContent,
}

impl Conversion {
    pub fn text(&self) -> Option<&str> {
        match self {
            Conversion::Text(text) => Some(text),
            Conversion::NoContent => None,
        }
    }
}

const EM_DASH_GLYPH: char = '\u{2014}';
const EN_DASH_GLYPH: char = '\u{2013}';

static NUMERIC_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&#(?:[xX]([0-9a-fA-F]{1,6})|([0-9]{1,7}));").expect("valid reference regex")
});

static PSEUDO_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^<>]*>").expect("valid tag regex"));

/// Adjacent-marker artifacts and their replacements, applied until stable.
const CLEANUPS: &[(&str, &str)] = &[
    ("<i></i>", ""),
    ("</i><i>", ""),
    ("<i> </i>", " "),
    ("</i> <i>", " "),
    ("<b></b>", ""),
    ("</b><b>", ""),
    ("<b> </b>", " "),
    ("</b> <b>", " "),
    ("<code> </code>", " "),
    ("<i> ", " <i>"),
    (" </i>", "</i> "),
    ("<b> ", " <b>"),
    (" </b>", "</b> "),
    ("\t ", "\t"),
    ("\u{2014}-", "\u{2014}"),
    ("-\u{2014}", "\u{2014}"),
];

/// Pseudo-tags that have an ASCII rendering in bare mode. Everything else
/// between angle brackets is stripped.
const BARE_REPLACEMENTS: &[(&str, &str)] = &[
    ("<i>", "_"),
    ("</i>", "_"),
    ("<b>", "*"),
    ("</b>", "*"),
    ("<code>", "```"),
    ("</code>", "```"),
    ("<sup>", "["),
    ("</sup>", "]"),
    ("</td>", " "),
    ("</th>", " "),
    ("\u{2014}", "---"),
    ("\u{2013}", "-"),
];

/// Render every chapter and assemble the book text.
pub fn reformat(chapters: &[Chapter], options: &ConvertOptions) -> Conversion {
    let mut rendered = Vec::new();
    for (index, chapter) in chapters.iter().enumerate() {
        if index > 0 {
            rendered.push(String::new());
            rendered.push(String::new());
        }
        rendered.extend(
            chapter
                .lines
                .iter()
                .filter_map(|line| render_line(line, options.bare)),
        );
    }

    let text = assemble(&rendered);
    // Bare text has no pseudo-tags left; angle brackets there are literal.
    let visible = if options.bare {
        Cow::Borrowed(text.as_str())
    } else {
        PSEUDO_TAG.replace_all(&text, "")
    };
    if visible.trim().is_empty() {
        debug!("Book produced no text");
        return Conversion::NoContent;
    }
    debug!(lines = rendered.len(), bytes = text.len(), "Reformatted book");
    Conversion::Text(text)
}

/// Render one intermediate line. `None` drops the line entirely, which only
/// happens for an empty title placeholder.
pub fn render_line(line: &MarkerLine, bare: bool) -> Option<String> {
    let is_title = line.is_title();
    if is_title && line.plain_text().is_empty() {
        return None;
    }

    let mut out = String::new();
    let mut in_code = false;
    let mut has_code = false;
    for mark in line.marks() {
        match mark {
            Mark::Text(run) => push_collapsed(&mut out, &expand_references(run), in_code),
            Mark::Indent | Mark::Quote => out.push('\t'),
            Mark::Title | Mark::ImageAlt(_) => {}
            Mark::Style(Inline::Code, on) => {
                in_code = *on;
                has_code = true;
                out.push_str(if *on { "<code>" } else { "</code>" });
            }
            Mark::Style(inline, on) => {
                if let Some(tag) = style_tag(*inline, *on, bare) {
                    out.push_str(tag);
                }
            }
            Mark::Table(on) => out.push_str(if *on { "<table>" } else { "</table>" }),
            Mark::Row(on) => out.push_str(if *on { "<tr>" } else { "</tr>" }),
            Mark::Cell(kind, on) => out.push_str(match (kind, on) {
                (CellKind::Header, true) => "<th>",
                (CellKind::Header, false) => "</th>",
                (CellKind::Data, true) => "<td>",
                (CellKind::Data, false) => "</td>",
            }),
            Mark::Caption(on) => out.push_str(if *on { "<caption>" } else { "</caption>" }),
            Mark::Image(file) => {
                if !is_title {
                    out.push_str("<image=");
                    out.push_str(file);
                    out.push('>');
                }
            }
            Mark::Rule => out.push_str("* * *"),
            Mark::Passthrough(raw) => out.push_str(raw),
        }
    }

    let mut text = cleanup(out, has_code);
    if bare {
        text = unescape(&cleanup(to_bare(&text), has_code));
    }
    Some(text)
}

/// Pseudo-tag for an inline style. Bold only survives when bare mode will
/// turn it into asterisks.
fn style_tag(inline: Inline, on: bool, bare: bool) -> Option<&'static str> {
    let (open, close) = match inline {
        Inline::Italic => ("<i>", "</i>"),
        Inline::Bold if bare => ("<b>", "</b>"),
        Inline::Sup => ("<sup>", "</sup>"),
        Inline::Sub => ("<sub>", "</sub>"),
        Inline::Code => ("<code>", "</code>"),
        Inline::Bold | Inline::Underline | Inline::Small | Inline::Strike => return None,
    };
    Some(if on { open } else { close })
}

fn push_collapsed(out: &mut String, text: &str, in_code: bool) {
    for c in text.chars() {
        if c == ' ' && !in_code && out.ends_with(' ') {
            continue;
        }
        out.push(c);
    }
}

/// Expand character references left in a text run. `&lt;`, `&gt;` and
/// `&amp;` stay escaped so pseudo-tags remain unambiguous.
pub fn expand_references(text: &str) -> String {
    let expanded = NUMERIC_REFERENCE.replace_all(text, |caps: &Captures<'_>| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            (None, None) => None,
        };
        match code.and_then(char::from_u32) {
            Some(c) => decode_reference(c).unwrap_or_else(|| caps[0].to_string()),
            None => caps[0].to_string(),
        }
    });
    expanded
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace(EM_DASH, &EM_DASH_GLYPH.to_string())
        .replace(EN_DASH, &EN_DASH_GLYPH.to_string())
}

/// Text for a decoded reference, or `None` to keep the reference as is.
fn decode_reference(c: char) -> Option<String> {
    if is_disallowed_control(c) {
        return None;
    }
    let text = match c {
        '<' => "&lt;".to_string(),
        '>' => "&gt;".to_string(),
        '&' => "&amp;".to_string(),
        // Line structure comes from the markup, never from references.
        '\t' | '\n' | '\r' => " ".to_string(),
        '\u{2015}' => EM_DASH_GLYPH.to_string(),
        _ => match fold_typographic(c) {
            Some(Fold::Char(folded)) => folded.to_string(),
            Some(Fold::Str(folded)) => folded.to_string(),
            Some(Fold::Drop) => String::new(),
            None => c.to_string(),
        },
    };
    Some(text)
}

fn cleanup(mut line: String, has_code: bool) -> String {
    // Each rule either shortens the line or moves a space outward past a tag.
    while CLEANUPS.iter().any(|(from, _)| line.contains(from)) {
        for (from, to) in CLEANUPS {
            line = line.replace(from, to);
        }
    }

    let mut line = line.trim_end().to_string();
    if !has_code {
        while line.contains("  ") {
            line = line.replace("  ", " ");
        }
    }
    if line.chars().all(|c| c == '\t') {
        line.clear();
    }
    line
}

fn to_bare(line: &str) -> String {
    let mut text = line.to_string();
    for (from, to) in BARE_REPLACEMENTS {
        text = text.replace(from, to);
    }
    PSEUDO_TAG.replace_all(&text, "").into_owned()
}

/// Undo the escaping that kept pseudo-tags unambiguous. `&amp;` goes last so
/// an escaped reference is not decoded twice.
fn unescape(line: &str) -> String {
    line.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Join rendered lines. Runs of empty lines become one blank line, or two
/// before a line that does not start with an indent. Leading blanks are
/// dropped.
fn assemble(lines: &[String]) -> String {
    let mut out = String::new();
    let mut pending_blank = false;
    for line in lines {
        if line.is_empty() {
            pending_blank = true;
            continue;
        }
        if pending_blank && !out.is_empty() {
            out.push('\n');
            if !line.starts_with('\t') {
                out.push('\n');
            }
        }
        pending_blank = false;
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn text(s: &str) -> Mark {
        Mark::Text(s.to_string())
    }

    fn line(marks: Vec<Mark>) -> MarkerLine {
        MarkerLine::from_marks(marks)
    }

    fn render(marks: Vec<Mark>) -> String {
        render_line(&line(marks), false).unwrap_or_default()
    }

    fn render_bare(marks: Vec<Mark>) -> String {
        render_line(&line(marks), true).unwrap_or_default()
    }

    #[rstest]
    #[case("caf&#233;", "caf\u{00E9}")]
    #[case("&#x0142;&#x00F3;d&#x017A;", "\u{0142}\u{00F3}d\u{017A}")]
    #[case("&#8220;quoted&#8221;", "\"quoted\"")]
    #[case("wait&#x2026;", "wait...")]
    #[case("a&#60;b&#x3E;c&#38;d", "a&lt;b&gt;c&amp;d")]
    #[case("bell&#x0007;", "bell&#x0007;")]
    #[case("&lt;kept&gt; &amp;", "&lt;kept&gt; &amp;")]
    #[case("one&nbsp;two &quot;x&quot; it&apos;s", "one two \"x\" it's")]
    #[case("a&mdash;b&ndash;c", "a\u{2014}b\u{2013}c")]
    #[case("&#99999999;", "&#99999999;")]
    #[case("a&#10;b", "a b")]
    #[case("c&#9;&#x0D;d", "c  d")]
    fn expands_references(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(expand_references(raw), expected);
    }

    #[test]
    fn paragraph_with_emphasis() {
        assert_eq!(
            render(vec![
                Mark::Indent,
                text("It was "),
                Mark::Style(Inline::Italic, true),
                text("very "),
                Mark::Style(Inline::Italic, false),
                text("dark."),
            ]),
            "\tIt was <i>very</i> dark."
        );
    }

    #[test]
    fn bold_is_dropped_by_default_and_starred_when_bare() {
        let marks = vec![
            Mark::Indent,
            Mark::Style(Inline::Bold, true),
            text("text"),
            Mark::Style(Inline::Bold, false),
        ];
        assert_eq!(render(marks.clone()), "\ttext");
        assert_eq!(render_bare(marks), "\t*text*");
    }

    #[test]
    fn italic_artifacts_are_cleaned() {
        assert_eq!(
            render(vec![
                Mark::Indent,
                Mark::Style(Inline::Italic, true),
                Mark::Style(Inline::Italic, false),
                text("a"),
                Mark::Style(Inline::Italic, true),
                text("b"),
                Mark::Style(Inline::Italic, false),
                Mark::Style(Inline::Italic, true),
                text("c "),
                Mark::Style(Inline::Italic, false),
                text("d"),
            ]),
            "\ta<i>bc</i> d"
        );
    }

    #[test]
    fn spaces_collapse_outside_code() {
        assert_eq!(render(vec![Mark::Indent, text("a   b  ")]), "\ta b");
        assert_eq!(
            render(vec![
                Mark::Indent,
                Mark::Style(Inline::Code, true),
                text("x  =  1"),
                Mark::Style(Inline::Code, false),
            ]),
            "\t<code>x  =  1</code>"
        );
        assert_eq!(
            render_bare(vec![
                Mark::Style(Inline::Code, true),
                text("x"),
                Mark::Style(Inline::Code, false),
            ]),
            "```x```"
        );
    }

    #[test]
    fn bare_mode_unescapes_angle_brackets_and_ampersands() {
        let marks = vec![
            Mark::Indent,
            text("x"),
            Mark::Style(Inline::Italic, true),
            text("y &amp; &lt;z&gt; &amp;lt;"),
            Mark::Style(Inline::Italic, false),
        ];
        assert_eq!(render(marks.clone()), "\tx<i>y &amp; &lt;z&gt; &amp;lt;</i>");
        assert_eq!(render_bare(marks), "\tx_y & <z> &lt;_");
    }

    #[test]
    fn line_breaking_references_stay_on_one_line() {
        let rendered = render(vec![Mark::Indent, text("a&#10;&#10;&#10;&#10;b c&#9;&#9;d")]);
        assert_eq!(rendered, "\ta b c d");
    }

    #[test]
    fn dashes() {
        assert_eq!(render(vec![Mark::Indent, text("yes&mdash;-no&ndash;")]), "\tyes\u{2014}no\u{2013}");
        assert_eq!(render_bare(vec![Mark::Indent, text("yes&mdash;no 1&ndash;2")]), "\tyes---no 1-2");
    }

    #[test]
    fn indent_only_line_becomes_empty() {
        assert_eq!(render(vec![Mark::Indent, text(" ")]), "");
        assert_eq!(render(vec![Mark::Indent, Mark::Quote]), "");
    }

    #[test]
    fn titles() {
        assert_eq!(render_line(&line(vec![Mark::Title]), false), None);
        assert_eq!(
            render(vec![Mark::Title, text("Chapter 1"), Mark::Image("fig.png".into())]),
            "Chapter 1"
        );
    }

    #[test]
    fn tables_images_and_passthrough() {
        let row = vec![
            Mark::Row(true),
            Mark::Cell(CellKind::Header, true),
            text("A"),
            Mark::Cell(CellKind::Header, false),
            Mark::Cell(CellKind::Data, true),
            text("B"),
            Mark::Cell(CellKind::Data, false),
            Mark::Row(false),
        ];
        assert_eq!(render(row.clone()), "<tr><th>A</th><td>B</td></tr>");
        assert_eq!(render_bare(row), "A B");

        let image = vec![
            Mark::Indent,
            Mark::Image("fig1.png".into()),
            Mark::ImageAlt("Figure".into()),
            Mark::Passthrough("<blink>".into()),
        ];
        assert_eq!(render(image.clone()), "\t<image=fig1.png><blink>");
        assert_eq!(render_bare(image), "");
    }

    #[test]
    fn superscripts() {
        let marks = vec![
            Mark::Indent,
            text("x"),
            Mark::Style(Inline::Sup, true),
            text("2"),
            Mark::Style(Inline::Sup, false),
            Mark::Style(Inline::Sub, true),
            text("i"),
            Mark::Style(Inline::Sub, false),
        ];
        assert_eq!(render(marks.clone()), "\tx<sup>2</sup><sub>i</sub>");
        assert_eq!(render_bare(marks), "\tx[2]i");
    }

    #[test]
    fn assembly_collapses_blank_runs() {
        let lines: Vec<String> = ["", "Title", "", "\tOne", "", "", "", "\tTwo", "\tThree", "", "", "Next"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            assemble(&lines),
            "Title\n\n\tOne\n\n\tTwo\n\tThree\n\n\nNext\n"
        );
    }

    #[test]
    fn image_only_book_has_no_content() {
        let chapter = Chapter {
            lines: vec![line(vec![Mark::Indent, Mark::Image("fig.png".into())])],
        };
        assert_eq!(reformat(&[chapter], &ConvertOptions::default()), Conversion::NoContent);
        assert_eq!(reformat(&[], &ConvertOptions::default()), Conversion::NoContent);
    }

    #[test]
    fn chapters_are_separated_by_a_gap() {
        let chapters = vec![
            Chapter {
                lines: vec![
                    line(vec![Mark::Title, text("One")]),
                    MarkerLine::new(),
                    line(vec![Mark::Indent, text("a")]),
                ],
            },
            Chapter {
                lines: vec![
                    line(vec![Mark::Title, text("Two")]),
                    MarkerLine::new(),
                    line(vec![Mark::Indent, text("b")]),
                ],
            },
        ];
        assert_eq!(
            reformat(&chapters, &ConvertOptions::default()),
            Conversion::Text("One\n\n\ta\n\n\nTwo\n\n\tb\n".to_string())
        );
    }
}
