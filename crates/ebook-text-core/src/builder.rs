//! Chapter builder: a tag-driven state machine over lexer tokens.
//!
//! [`BuildState`] holds everything one content file needs while it is being
//! read. Each token goes through [`BuildState::step`], which returns the lines
//! (and chapter breaks) that token completed. [`build_chapters`] drives the
//! machine over a whole book and applies per-chapter cleanup.

use crate::lexer::{Token, tokenize};
use crate::markup::{CellKind, Chapter, Inline, Mark, MarkerLine};
use crate::options::{ConvertOptions, TitleRules};
use crate::sanitize::sanitize;
use crate::styles::{SpanStyle, StyleTable};
use tracing::{debug, debug_span, warn};

/// Read-only inputs shared by every step.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub styles: &'a StyleTable,
    pub options: &'a ConvertOptions,
}

/// Output of a single transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emit {
    Line(MarkerLine),
    /// Close the current chapter; following lines start a new one.
    ChapterBreak,
}

/// Tags that carry no meaning of their own here; anything not listed and not
/// otherwise handled is passed through verbatim.
const STRUCTURAL_TAGS: &[&str] = &[
    "html", "head", "title", "meta", "link", "body", "p", "div", "a", "section", "article",
    "nav", "aside", "header", "footer", "main", "figure", "figcaption", "ul", "ol", "dl", "dt",
    "dd", "h1", "h2", "h3", "h4", "h5", "h6", "tbody", "thead", "tfoot", "col", "colgroup", "svg",
    "g", "font", "big", "center", "pre", "abbr", "acronym", "q", "ins", "var", "dfn", "kbd",
    "samp", "label", "wbr", "nobr", "mark", "time", "address", "hgroup", "ruby", "rt", "rp",
    "bdi", "bdo", "object", "param", "picture", "source",
];

/// Closing tags that end a block of text.
const BLOCK_TERMINATORS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "blockquote", "h1", "h2", "h3", "h4", "h5", "h6", "dt", "dd",
    "figcaption",
];

/// Opening tags that start a new block when text is already pending.
const BLOCK_STARTERS: &[&str] = &[
    "p", "div", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "dl", "dt", "dd",
];

#[derive(Debug, Clone, Copy, Default)]
struct TableLevel {
    /// An open-table mark has been emitted for this level.
    has_rows: bool,
    row_open: bool,
}

#[derive(Debug, Clone, Default)]
struct TableState {
    levels: Vec<TableLevel>,
}

impl TableState {
    fn active(&self) -> bool {
        !self.levels.is_empty()
    }

    fn depth(&self) -> usize {
        self.levels.len()
    }
}

/// Where a block ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockEnd<'a> {
    Close(&'a str),
    LineBreak,
    Rule,
}

/// Per content file state of the chapter builder.
#[derive(Debug, Clone)]
pub struct BuildState {
    found_body: bool,
    first_line: bool,
    second_line: bool,
    in_blockquote: bool,
    table: TableState,
    buffer: MarkerLine,
    spans: Vec<SpanStyle>,
    /// Inline styles open in the markup; reopened at the start of each line.
    open_styles: Vec<Inline>,
    list_prefix: Option<String>,
    hidden_depth: usize,
}

impl Default for BuildState {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildState {
    pub fn new() -> Self {
        Self {
            found_body: false,
            first_line: true,
            second_line: false,
            in_blockquote: false,
            table: TableState::default(),
            buffer: MarkerLine::new(),
            spans: Vec::new(),
            open_styles: Vec::new(),
            list_prefix: None,
            hidden_depth: 0,
        }
    }

    pub fn found_body(&self) -> bool {
        self.found_body
    }

    pub fn in_table(&self) -> bool {
        self.table.active()
    }

    pub fn table_depth(&self) -> usize {
        self.table.depth()
    }

    pub fn in_blockquote(&self) -> bool {
        self.in_blockquote
    }

    pub fn span_depth(&self) -> usize {
        self.spans.len()
    }

    pub fn open_styles(&self) -> &[Inline] {
        &self.open_styles
    }

    /// Pending, not yet flushed text and marks.
    pub fn buffer(&self) -> &MarkerLine {
        &self.buffer
    }

    /// Apply one token.
    pub fn step(&mut self, token: &Token, cx: &BuildContext<'_>) -> Vec<Emit> {
        let mut out = Vec::new();
        match token {
            Token::Open { name, .. } if name == "body" => self.found_body = true,
            Token::Close { name } if name == "body" => self.found_body = false,
            _ if !self.found_body => {}
            Token::Text(raw) => self.push_text(raw),
            Token::Open {
                name,
                raw,
                self_closing,
            } => self.open_tag(name, raw, *self_closing, token, cx, &mut out),
            Token::Close { name } => self.close_tag(name, cx, &mut out),
        }
        out
    }

    /// Flush whatever is left at the end of a content file, closing any
    /// structure the markup left open.
    pub fn finish(&mut self, cx: &BuildContext<'_>) -> Vec<Emit> {
        let mut out = Vec::new();
        if !self.open_styles.is_empty() {
            debug!(open = self.open_styles.len(), "Closing styles left open at end of file");
        }
        self.spans.clear();
        while self.table.active() {
            self.close_table(&mut out);
        }
        if self.buffer.has_content() {
            if self.first_line {
                self.emit_title(cx, &mut out);
            } else {
                self.emit_body(&mut out);
            }
        }
        self.open_styles.clear();
        self.buffer.clear();
        out
    }

    fn push_text(&mut self, raw: &str) {
        if self.hidden_depth > 0 {
            return;
        }
        let at_line_start = !self.buffer.has_text() && !self.buffer.has_image();
        let after_indent = self.buffer.last().is_some_and(Mark::is_indent);
        let raw = if at_line_start || after_indent {
            raw.trim_start_matches(|c: char| c.is_ascii_whitespace())
        } else {
            raw
        };
        if raw.is_empty() {
            return;
        }
        let text = sanitize(raw);
        if text.trim().is_empty() {
            if !at_line_start {
                self.buffer.push_text(" ");
            }
            return;
        }
        // Leading non-breaking spaces that survive are deliberate indentation.
        if (at_line_start || after_indent) && text.starts_with(' ') {
            self.buffer.push(Mark::Indent);
            self.buffer.push_text(text.trim_start());
        } else {
            self.buffer.push_text(&text);
        }
    }

    fn open_tag(
        &mut self,
        name: &str,
        raw: &str,
        self_closing: bool,
        token: &Token,
        cx: &BuildContext<'_>,
        out: &mut Vec<Emit>,
    ) {
        match name {
            "br" => self.end_block(BlockEnd::LineBreak, cx, out),
            "hr" => self.end_block(BlockEnd::Rule, cx, out),
            "style" | "script" => {
                if !self_closing {
                    self.hidden_depth += 1;
                }
            }
            "blockquote" => {
                if self.table.active() || self.in_blockquote {
                    return;
                }
                self.soft_break(cx, out);
                self.in_blockquote = true;
            }
            "span" => {
                if self_closing {
                    return;
                }
                let style = classify_span(raw, token, cx.styles);
                self.spans.push(style);
                if let Some(inline) = span_inline(style) {
                    self.open_style(inline);
                }
            }
            "img" | "image" => self.image(name, token, cx),
            "li" => {
                self.soft_break(cx, out);
                let prefix = match token.attribute("value").map(str::trim) {
                    Some(value) if !value.is_empty() => format!("{value}: "),
                    _ => "* ".to_string(),
                };
                self.list_prefix = Some(prefix);
            }
            "table" => self.table.levels.push(TableLevel::default()),
            "tr" => self.open_row(out, cx),
            "th" | "td" => {
                if !self.table.active() {
                    warn!(tag = name, "Table cell outside of a table; ignoring");
                    return;
                }
                self.ensure_table_open(out, cx);
                self.buffer.push(Mark::Cell(cell_kind(name), true));
            }
            "caption" => {
                if !self.table.active() {
                    warn!(tag = name, "Caption outside of a table; ignoring");
                    return;
                }
                self.ensure_table_open(out, cx);
                if self.buffer.has_content() {
                    out.push(Emit::Line(self.take_line()));
                }
                self.buffer.push(Mark::Caption(true));
            }
            _ => {
                if let Some(inline) = Inline::from_tag(name) {
                    if !self_closing {
                        self.open_style(inline);
                    }
                } else if BLOCK_STARTERS.contains(&name) {
                    self.soft_break(cx, out);
                } else if !is_structural(name) {
                    debug!(tag = name, "Passing unhandled tag through");
                    self.buffer.push(Mark::Passthrough(raw.to_string()));
                }
            }
        }
    }

    fn close_tag(&mut self, name: &str, cx: &BuildContext<'_>, out: &mut Vec<Emit>) {
        match name {
            "blockquote" => {
                if self.table.active() {
                    return;
                }
                self.end_block(BlockEnd::Close(name), cx, out);
                self.in_blockquote = false;
            }
            "style" | "script" => self.hidden_depth = self.hidden_depth.saturating_sub(1),
            "span" => match self.spans.pop() {
                Some(style) => {
                    if let Some(inline) = span_inline(style) {
                        self.close_style(inline);
                    }
                }
                None => warn!("Span closed without a matching open; ignoring"),
            },
            "table" => {
                if self.table.active() {
                    self.close_table(out);
                } else {
                    warn!("Table closed without a matching open; ignoring");
                }
            }
            "tr" => self.close_row(out),
            "th" | "td" => {
                if !self.table.active() {
                    warn!(tag = name, "Table cell closed outside of a table; ignoring");
                    return;
                }
                self.buffer.push(Mark::Cell(cell_kind(name), false));
            }
            "caption" => {
                if !self.table.active() {
                    warn!(tag = name, "Caption closed outside of a table; ignoring");
                    return;
                }
                self.buffer.push(Mark::Caption(false));
                out.push(Emit::Line(self.take_line()));
            }
            _ if BLOCK_TERMINATORS.contains(&name) => {
                self.end_block(BlockEnd::Close(name), cx, out)
            }
            _ => {
                if let Some(inline) = Inline::from_tag(name) {
                    if !self.close_style(inline) {
                        debug!(tag = name, "Style closed without a matching open; ignoring");
                    }
                } else if !is_structural(name) {
                    self.buffer.push(Mark::Passthrough(format!("</{name}>")));
                }
            }
        }
    }

    /// Flush the buffer at the end of a block.
    fn end_block(&mut self, end: BlockEnd<'_>, cx: &BuildContext<'_>, out: &mut Vec<Emit>) {
        if self.table.active() {
            // Blocks inside cells only separate words.
            if self.buffer.has_text() && end != BlockEnd::Rule {
                self.buffer.push_text(" ");
            }
            return;
        }

        if self.first_line {
            self.emit_title(cx, out);
            if end == BlockEnd::Rule && !self.first_line {
                out.push(Emit::Line(rule_line()));
            }
            return;
        }

        let closes_heading = matches!(end, BlockEnd::Close("h1" | "h2"));
        if closes_heading
            && self.buffer.has_text()
            && !self.buffer.has_image()
            && !self.second_line
        {
            debug!(title = %self.buffer.plain_text(), "Heading starts a new chapter");
            out.push(Emit::ChapterBreak);
            self.first_line = true;
            self.emit_title(cx, out);
            return;
        }

        let has_content = self.buffer.has_content();
        match end {
            BlockEnd::Rule => {
                if has_content {
                    self.emit_body(out);
                }
                out.push(Emit::Line(rule_line()));
                self.second_line = false;
            }
            BlockEnd::Close("p") | BlockEnd::LineBreak => {
                if has_content || !self.second_line {
                    self.emit_body(out);
                }
            }
            _ => {
                if has_content {
                    self.emit_body(out);
                }
            }
        }
        self.reset_buffer();
    }

    /// Flush pending text before a new block opens.
    fn soft_break(&mut self, cx: &BuildContext<'_>, out: &mut Vec<Emit>) {
        if self.table.active() || !self.buffer.has_text() {
            return;
        }
        if self.first_line {
            self.emit_title(cx, out);
        } else {
            self.emit_body(out);
        }
    }

    /// Turn the buffer into a chapter title, or decide it is body text under
    /// an empty title.
    fn emit_title(&mut self, cx: &BuildContext<'_>, out: &mut Vec<Emit>) {
        let text = self.buffer.plain_text();
        if text.is_empty() {
            self.reset_buffer();
            return;
        }

        let rules: &TitleRules = &cx.options.titles;
        self.first_line = false;
        if rules.is_forced_heading(&text) || !rules.is_too_long(&text) {
            out.push(Emit::Line(title_line(&text)));
            out.push(Emit::Line(MarkerLine::new()));
            self.second_line = true;
            self.reset_buffer();
        } else {
            out.push(Emit::Line(title_line("")));
            out.push(Emit::Line(MarkerLine::new()));
            self.emit_body(out);
        }
        self.list_prefix = None;
    }

    fn emit_body(&mut self, out: &mut Vec<Emit>) {
        let body = self.take_line();
        let mut line = MarkerLine::from_marks(vec![Mark::Indent]);
        if self.in_blockquote {
            line.push(Mark::Quote);
        }
        if body.has_content() {
            if let Some(bullet) = self.list_prefix.take() {
                line.push_text(&bullet);
            }
            self.second_line = false;
        }
        line.append(body);
        out.push(Emit::Line(line));
    }

    fn open_style(&mut self, inline: Inline) {
        self.open_styles.push(inline);
        self.buffer.push(Mark::Style(inline, true));
    }

    /// Close the innermost open `inline`. False when it was never opened.
    fn close_style(&mut self, inline: Inline) -> bool {
        let Some(index) = self.open_styles.iter().rposition(|open| *open == inline) else {
            return false;
        };
        self.open_styles.remove(index);
        self.buffer.push(Mark::Style(inline, false));
        true
    }

    /// Take the buffer as a finished line. Styles still open are closed at
    /// the end of the line and reopened in the new buffer.
    fn take_line(&mut self) -> MarkerLine {
        let mut line = self.buffer.take();
        for inline in self.open_styles.iter().rev() {
            line.push(Mark::Style(*inline, false));
        }
        line.drop_empty_styles();
        self.reset_buffer();
        line
    }

    /// Drop pending text, keeping only the styles still open.
    fn reset_buffer(&mut self) {
        self.buffer = MarkerLine::from_marks(
            self.open_styles
                .iter()
                .map(|inline| Mark::Style(*inline, true))
                .collect(),
        );
    }

    fn image(&mut self, name: &str, token: &Token, cx: &BuildContext<'_>) {
        let attr = if name == "img" { "src" } else { "href" };
        let Some(value) = token.attribute(attr) else {
            debug!(tag = name, "Image without a source");
            return;
        };
        let file = value.rsplit('/').next().unwrap_or(value).trim();
        if file.is_empty() {
            return;
        }
        if cx.options.is_cover_image(file) {
            debug!(file, "Skipping cover image");
            return;
        }
        self.buffer.push(Mark::Image(file.to_string()));
        if name == "img" {
            if let Some(alt) = token.attribute("alt").map(str::trim).filter(|alt| !alt.is_empty()) {
                self.buffer.push(Mark::ImageAlt(alt.to_string()));
            }
        }
    }

    /// Emit open-table marks for every level that has none yet. Called by
    /// the first row, cell or caption of a table.
    fn ensure_table_open(&mut self, out: &mut Vec<Emit>, cx: &BuildContext<'_>) {
        let pending = self.table.levels.iter().filter(|level| !level.has_rows).count();
        if pending == 0 {
            return;
        }
        let outer_row_open = self.table.levels.iter().any(|level| level.row_open);
        if self.buffer.has_content() {
            if outer_row_open {
                out.push(Emit::Line(self.take_line()));
            } else if self.first_line {
                self.emit_title(cx, out);
            } else {
                self.emit_body(out);
            }
        }
        self.reset_buffer();
        // A table before any title leaves the chapter untitled.
        self.first_line = false;
        self.second_line = false;

        let mut line = MarkerLine::new();
        for level in self.table.levels.iter_mut().filter(|level| !level.has_rows) {
            level.has_rows = true;
            line.push(Mark::Table(true));
        }
        out.push(Emit::Line(line));
    }

    fn open_row(&mut self, out: &mut Vec<Emit>, cx: &BuildContext<'_>) {
        if !self.table.active() {
            warn!("Table row outside of a table; ignoring");
            return;
        }
        self.ensure_table_open(out, cx);
        if self.table.levels.last().is_some_and(|level| level.row_open) {
            // Implicitly closed by the next row.
            self.close_row(out);
        }
        self.buffer.push(Mark::Row(true));
        if let Some(level) = self.table.levels.last_mut() {
            level.row_open = true;
        }
    }

    fn close_row(&mut self, out: &mut Vec<Emit>) {
        let Some(level) = self.table.levels.last_mut() else {
            warn!("Table row closed outside of a table; ignoring");
            return;
        };
        if !level.row_open {
            warn!("Table row closed without a matching open; ignoring");
            return;
        }
        level.row_open = false;
        self.buffer.push(Mark::Row(false));
        out.push(Emit::Line(self.take_line()));
    }

    fn close_table(&mut self, out: &mut Vec<Emit>) {
        let Some(level) = self.table.levels.last().copied() else {
            return;
        };
        if level.row_open {
            self.close_row(out);
        } else if self.buffer.has_content() {
            out.push(Emit::Line(self.take_line()));
        }
        self.table.levels.pop();
        if level.has_rows {
            out.push(Emit::Line(MarkerLine::from_marks(vec![Mark::Table(false)])));
        }
    }
}

fn title_line(text: &str) -> MarkerLine {
    let mut line = MarkerLine::from_marks(vec![Mark::Title]);
    line.push_text(text);
    line
}

fn rule_line() -> MarkerLine {
    MarkerLine::from_marks(vec![Mark::Indent, Mark::Rule])
}

fn cell_kind(name: &str) -> CellKind {
    if name == "th" {
        CellKind::Header
    } else {
        CellKind::Data
    }
}

fn is_structural(name: &str) -> bool {
    name.starts_with('!') || name.starts_with('?') || STRUCTURAL_TAGS.contains(&name)
}

fn span_inline(style: SpanStyle) -> Option<Inline> {
    match style {
        SpanStyle::None => None,
        SpanStyle::Bold => Some(Inline::Bold),
        SpanStyle::Italic => Some(Inline::Italic),
        SpanStyle::Underline => Some(Inline::Underline),
    }
}

/// Inline keywords in the tag text win over the class lookup.
fn classify_span(raw: &str, token: &Token, styles: &StyleTable) -> SpanStyle {
    let inline = SpanStyle::from_declarations(&raw.to_ascii_lowercase());
    if inline != SpanStyle::None {
        return inline;
    }
    token
        .attribute("class")
        .map(|classes| styles.class_style(classes))
        .unwrap_or(SpanStyle::None)
}

/// Build every chapter of a book, in reading order.
pub fn build_chapters<S: AsRef<str>>(
    contents: &[S],
    styles: &StyleTable,
    options: &ConvertOptions,
) -> Vec<Chapter> {
    let cx = BuildContext { styles, options };
    let mut chapters = Vec::new();
    for (index, content) in contents.iter().enumerate() {
        let _span = debug_span!("content_file", index).entered();
        let mut state = BuildState::new();
        let mut current = Chapter::default();
        for token in tokenize(content.as_ref()) {
            for emit in state.step(&token, &cx) {
                apply(emit, &mut current, &mut chapters, &options.titles);
            }
        }
        for emit in state.finish(&cx) {
            apply(emit, &mut current, &mut chapters, &options.titles);
        }
        push_chapter(current, &mut chapters, &options.titles);
    }
    debug!(chapters = chapters.len(), "Built chapters");
    chapters
}

fn apply(emit: Emit, current: &mut Chapter, chapters: &mut Vec<Chapter>, rules: &TitleRules) {
    match emit {
        Emit::Line(line) => current.lines.push(line),
        Emit::ChapterBreak => push_chapter(std::mem::take(current), chapters, rules),
    }
}

fn push_chapter(chapter: Chapter, chapters: &mut Vec<Chapter>, rules: &TitleRules) {
    if let Some(chapter) = finalize_chapter(chapter, rules) {
        chapters.push(chapter);
    }
}

/// Per-chapter cleanup. Returns `None` when the chapter should not appear in
/// the output at all.
pub fn finalize_chapter(mut chapter: Chapter, rules: &TitleRules) -> Option<Chapter> {
    if let Some(title) = chapter.title() {
        if rules.drops_chapter(&title) {
            debug!(%title, "Dropping table-of-contents chapter");
            return None;
        }
    }
    if let Some(first) = chapter.lines.first_mut().filter(|line| line.is_title()) {
        first.strip_styles();
    }
    chapter
        .lines
        .dedup_by(|next, prev| prev.is_paragraph_only() && next.is_paragraph_only());
    while chapter.lines.last().is_some_and(MarkerLine::is_blank) {
        chapter.lines.pop();
    }
    if chapter.is_empty() {
        None
    } else {
        Some(chapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Mark {
        Mark::Text(s.to_string())
    }

    fn line(marks: Vec<Mark>) -> MarkerLine {
        MarkerLine::from_marks(marks)
    }

    fn title(s: &str) -> MarkerLine {
        line(vec![Mark::Title, text(s)])
    }

    fn build(content: &str) -> Vec<Chapter> {
        build_with(content, "")
    }

    fn build_with(content: &str, css: &str) -> Vec<Chapter> {
        let styles = StyleTable::parse(css).expect("valid css");
        build_chapters(&[content], &styles, &ConvertOptions::default())
    }

    fn lines(content: &str) -> Vec<MarkerLine> {
        let chapters = build(content);
        assert_eq!(chapters.len(), 1, "expected one chapter: {chapters:#?}");
        chapters.into_iter().next().map(|c| c.lines).unwrap_or_default()
    }

    #[test]
    fn text_outside_body_is_ignored() {
        let lines = lines("<html><head><title>Meta</title></head><body><p>Chapter 1</p><p>Hello</p></body></html>");
        assert_eq!(
            lines,
            vec![title("Chapter 1"), MarkerLine::new(), line(vec![Mark::Indent, text("Hello")])]
        );
    }

    #[test]
    fn step_reports_state_token_by_token() {
        let styles = StyleTable::default();
        let options = ConvertOptions::default();
        let cx = BuildContext {
            styles: &styles,
            options: &options,
        };
        let mut state = BuildState::new();
        assert!(state.step(&Token::Text("head".into()), &cx).is_empty());
        assert!(state.buffer().is_empty());

        state.step(&Token::open("<body>"), &cx);
        assert!(state.found_body());
        state.step(&Token::open("<span class=\"x\" style=\"font-style:italic\">"), &cx);
        assert_eq!(state.span_depth(), 1);
        assert_eq!(state.open_styles(), &[Inline::Italic]);
        state.step(&Token::Text("Title".into()), &cx);
        state.step(&Token::Close { name: "span".into() }, &cx);
        let emitted = state.step(&Token::Close { name: "p".into() }, &cx);
        assert_eq!(
            emitted,
            vec![Emit::Line(title("Title")), Emit::Line(MarkerLine::new())]
        );
        assert_eq!(state.span_depth(), 0);

        state.step(&Token::open("<blockquote>"), &cx);
        assert!(state.in_blockquote());
        state.step(&Token::Close { name: "blockquote".into() }, &cx);
        assert!(!state.in_blockquote());

        state.step(&Token::open("<table>"), &cx);
        state.step(&Token::open("<tr>"), &cx);
        state.step(&Token::open("<td>"), &cx);
        state.step(&Token::open("<table>"), &cx);
        assert!(state.in_table());
        assert_eq!(state.table_depth(), 2);
        state.step(&Token::Close { name: "table".into() }, &cx);
        assert_eq!(state.table_depth(), 1);
        state.step(&Token::Close { name: "table".into() }, &cx);
        assert!(!state.in_table());
    }

    fn style_balance(lines: &[MarkerLine]) -> Vec<(usize, usize)> {
        lines
            .iter()
            .map(|line| {
                let opens = line.marks().iter().filter(|m| matches!(m, Mark::Style(_, true))).count();
                let closes = line.marks().iter().filter(|m| matches!(m, Mark::Style(_, false))).count();
                (opens, closes)
            })
            .collect()
    }

    #[test]
    fn styles_open_across_blocks_close_on_every_line() {
        let lines = lines("<body><p>T</p><p>a <i>c</p><p>d</i> e</p><p>f</p></body>");
        assert_eq!(
            lines[2],
            line(vec![
                Mark::Indent,
                text("a "),
                Mark::Style(Inline::Italic, true),
                text("c"),
                Mark::Style(Inline::Italic, false),
            ])
        );
        assert_eq!(
            lines[3],
            line(vec![
                Mark::Indent,
                Mark::Style(Inline::Italic, true),
                text("d"),
                Mark::Style(Inline::Italic, false),
                text(" e"),
            ])
        );
        assert_eq!(lines[4], line(vec![Mark::Indent, text("f")]));
    }

    #[test]
    fn styles_left_open_at_end_of_file_are_closed() {
        let css = ".it { font-style: italic }";
        let chapters = build_with(
            "<body><p>T</p><p><span class=\"it\">a</p><p></p><p><b>b</body>",
            css,
        );
        let lines = &chapters[0].lines;
        assert!(style_balance(lines).iter().all(|(opens, closes)| opens == closes));
        assert_eq!(lines[3], line(vec![Mark::Indent]));
        assert_eq!(
            lines.last(),
            Some(&line(vec![
                Mark::Indent,
                Mark::Style(Inline::Italic, true),
                Mark::Style(Inline::Bold, true),
                text("b"),
                Mark::Style(Inline::Bold, false),
                Mark::Style(Inline::Italic, false),
            ]))
        );
    }

    #[test]
    fn unmatched_style_close_is_ignored() {
        let lines = lines("<body><p>T</p><p>x</i>y</p></body>");
        assert_eq!(lines[2], line(vec![Mark::Indent, text("xy")]));
    }

    #[test]
    fn title_heuristics() {
        let long = "word ".repeat(30);
        let lines = lines(&format!("<body><p><i>{long}</i></p><p>next</p></body>"));
        assert_eq!(lines[0], line(vec![Mark::Title]));
        assert_eq!(lines[1], MarkerLine::new());
        assert_eq!(
            lines[2],
            line(vec![
                Mark::Indent,
                Mark::Style(Inline::Italic, true),
                text(&long),
                Mark::Style(Inline::Italic, false),
            ])
        );
        assert_eq!(lines[3], line(vec![Mark::Indent, text("next")]));
    }

    #[test]
    fn long_chapter_headings_stay_titles() {
        let heading = format!("Chapter 7: {}", "word ".repeat(30));
        let chapter_lines = lines(&format!("<body><h1>{heading}</h1></body>"));
        assert_eq!(chapter_lines, vec![title(heading.trim())]);
    }

    #[test]
    fn empty_first_block_waits_for_content() {
        let lines = lines("<body><p> </p><p><img src=\"x.png\"/></p><p>Prologue</p><p>Body</p></body>");
        assert_eq!(lines[0], title("Prologue"));
        assert_eq!(lines[2], line(vec![Mark::Indent, text("Body")]));
    }

    #[test]
    fn no_blank_paragraph_right_after_title() {
        let lines = lines("<body><h2>One</h2><p></p><p></p><p>Text</p><p></p><p></p><p>More</p><p></p></body>");
        assert_eq!(
            lines,
            vec![
                title("One"),
                MarkerLine::new(),
                line(vec![Mark::Indent, text("Text")]),
                line(vec![Mark::Indent]),
                line(vec![Mark::Indent, text("More")]),
            ]
        );
    }

    #[test]
    fn headings_split_a_file_into_chapters() {
        let chapters = build(
            "<body><h1>Part One</h1><p>Intro</p><h2>Chapter 2</h2><p>Story</p><h2>Chapter 3</h2></body>",
        );
        let titles: Vec<_> = chapters.iter().map(|c| c.title()).collect();
        assert_eq!(
            titles,
            vec![
                Some("Part One".to_string()),
                Some("Chapter 2".to_string()),
                Some("Chapter 3".to_string())
            ]
        );
        assert_eq!(chapters[1].lines[2], line(vec![Mark::Indent, text("Story")]));
    }

    #[test]
    fn heading_right_after_title_does_not_split() {
        let chapters = build("<body><h1>Part One</h1><h2>The Storm</h2><p>Text</p></body>");
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].lines[2], line(vec![Mark::Indent, text("The Storm")]));
    }

    #[test]
    fn contents_chapter_is_dropped() {
        assert!(build("<body><h1>Table of Contents</h1><p>Chapter 1 ..... 3</p></body>").is_empty());
    }

    #[test]
    fn emphasis_tags_and_spans() {
        let css = ".b1 { font-weight: bold }";
        let chapters = build_with(
            "<body><p>T</p><p><em>a</em> <span class=\"b1\">b</span> <span>c</span><u>d</u></p></body>",
            css,
        );
        assert_eq!(
            chapters[0].lines[2],
            line(vec![
                Mark::Indent,
                Mark::Style(Inline::Italic, true),
                text("a"),
                Mark::Style(Inline::Italic, false),
                text(" "),
                Mark::Style(Inline::Bold, true),
                text("b"),
                Mark::Style(Inline::Bold, false),
                text(" c"),
                Mark::Style(Inline::Underline, true),
                text("d"),
                Mark::Style(Inline::Underline, false),
            ])
        );
    }

    #[test]
    fn unmatched_span_close_is_ignored() {
        let lines = lines("<body><p>T</p><p>x</span>y</p></body>");
        assert_eq!(lines[2], line(vec![Mark::Indent, text("xy")]));
    }

    #[test]
    fn images_and_cover() {
        let lines = lines(
            "<body><p>T</p><p><img src=\"cover.jpeg\"/>a<img alt=\"Map\" src=\"../Images/fig1.png\"/></p>\
             <svg><image xlink:href=\"plate.jpg\"/></svg></body>",
        );
        assert_eq!(
            lines[2],
            line(vec![
                Mark::Indent,
                text("a"),
                Mark::Image("fig1.png".into()),
                Mark::ImageAlt("Map".into()),
            ])
        );
        assert_eq!(lines[3], line(vec![Mark::Indent, Mark::Image("plate.jpg".into())]));
    }

    #[test]
    fn list_items() {
        let lines = lines("<body><p>T</p><ol><li value=\"3\">three</li><li><p>star</p></li></ol></body>");
        assert_eq!(lines[2], line(vec![Mark::Indent, text("3: three")]));
        assert_eq!(lines[3], line(vec![Mark::Indent, text("* star")]));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn blockquote_lines_are_double_indented() {
        let lines = lines(
            "<body><p>T</p><blockquote><blockquote><p>quoted</p></blockquote></blockquote><p>after</p></body>",
        );
        assert_eq!(lines[2], line(vec![Mark::Indent, Mark::Quote, text("quoted")]));
        assert_eq!(lines[3], line(vec![Mark::Indent, text("after")]));
    }

    #[test]
    fn non_breaking_indentation_becomes_an_indent_mark() {
        let lines = lines("<body><p>T</p><p>\n  \u{00A0}\u{00A0}verse</p></body>");
        assert_eq!(lines[2], line(vec![Mark::Indent, Mark::Indent, text("verse")]));
    }

    #[test]
    fn horizontal_rule() {
        let lines = lines("<body><p>T</p>before<hr/><p>after</p></body>");
        assert_eq!(lines[2], line(vec![Mark::Indent, text("before")]));
        assert_eq!(lines[3], rule_line());
        assert_eq!(lines[4], line(vec![Mark::Indent, text("after")]));
    }

    #[test]
    fn simple_table() {
        let lines = lines("<body><p>T</p><table><tr><td>A</td><td><p>B</p></td></tr></table></body>");
        assert_eq!(
            &lines[2..],
            &[
                line(vec![Mark::Table(true)]),
                line(vec![
                    Mark::Row(true),
                    Mark::Cell(CellKind::Data, true),
                    text("A"),
                    Mark::Cell(CellKind::Data, false),
                    Mark::Cell(CellKind::Data, true),
                    text("B "),
                    Mark::Cell(CellKind::Data, false),
                    Mark::Row(false),
                ]),
                line(vec![Mark::Table(false)]),
            ]
        );
    }

    #[test]
    fn table_with_caption_and_header() {
        let lines = lines(
            "<body><p>T</p><table><caption>Totals</caption><tr><th>H</th></tr></table></body>",
        );
        assert_eq!(lines[2], line(vec![Mark::Table(true)]));
        assert_eq!(
            lines[3],
            line(vec![Mark::Caption(true), text("Totals"), Mark::Caption(false)])
        );
        assert_eq!(
            lines[4],
            line(vec![
                Mark::Row(true),
                Mark::Cell(CellKind::Header, true),
                text("H"),
                Mark::Cell(CellKind::Header, false),
                Mark::Row(false),
            ])
        );
        assert_eq!(lines[5], line(vec![Mark::Table(false)]));
    }

    #[test]
    fn cells_outside_tables_are_ignored() {
        let lines = lines("<body><p>T</p><p><td>x</td><tr>y</tr></p></body>");
        assert_eq!(lines[2], line(vec![Mark::Indent, text("xy")]));
    }

    #[test]
    fn nested_tables_stay_flat_and_balanced() {
        let lines = lines(
            "<body><p>T</p><table><tr><td><table><tr><td>i</td></tr></table></td></tr></table></body>",
        );
        let opens = lines
            .iter()
            .flat_map(|l| l.marks())
            .filter(|m| **m == Mark::Table(true))
            .count();
        let closes = lines
            .iter()
            .flat_map(|l| l.marks())
            .filter(|m| **m == Mark::Table(false))
            .count();
        assert_eq!((opens, closes), (2, 2));
    }

    #[test]
    fn unclosed_table_is_closed_at_end_of_file() {
        let lines = lines("<body><p>T</p><table><tr><td>x</body>");
        assert_eq!(lines.last(), Some(&line(vec![Mark::Table(false)])));
    }

    #[test]
    fn unknown_tags_pass_through() {
        let lines = lines("<body><p>T</p><p>a<blink>b</blink></p></body>");
        assert_eq!(
            lines[2],
            line(vec![
                Mark::Indent,
                text("a"),
                Mark::Passthrough("<blink>".into()),
                text("b"),
                Mark::Passthrough("</blink>".into()),
            ])
        );
    }

    #[test]
    fn script_and_style_text_is_hidden() {
        let lines = lines("<body><p>T</p><script>var x = 1;</script><p>seen</p></body>");
        assert_eq!(lines[2], line(vec![Mark::Indent, text("seen")]));
    }

    #[test]
    fn trailing_blank_lines_are_trimmed() {
        let lines = lines("<body><p>T</p><p>x</p><p></p><br/><p></p></body>");
        assert_eq!(lines.last(), Some(&line(vec![Mark::Indent, text("x")])));
    }

    #[test]
    fn each_content_file_is_a_chapter() {
        let styles = StyleTable::default();
        let chapters = build_chapters(
            &["<body><p>One</p></body>", "<body></body>", "<body><p>Two</p></body>"],
            &styles,
            &ConvertOptions::default(),
        );
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[1].title().as_deref(), Some("Two"));
    }
}
