//! Intermediate line model shared by the chapter builder and the reformatter.

/// Inline style toggled by a pair of on/off marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inline {
    Italic,
    Bold,
    Underline,
    Strike,
    Sup,
    Sub,
    Small,
    Code,
}

impl Inline {
    /// Inline style for an HTML tag name, if it is one we track.
    pub fn from_tag(name: &str) -> Option<Inline> {
        let inline = match name {
            "i" | "em" | "cite" => Inline::Italic,
            "b" | "strong" => Inline::Bold,
            "u" => Inline::Underline,
            "s" | "strike" | "del" => Inline::Strike,
            "sup" => Inline::Sup,
            "sub" => Inline::Sub,
            "small" => Inline::Small,
            "tt" | "code" => Inline::Code,
            _ => return None,
        };
        Some(inline)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Header,
    Data,
}

/// One element of an intermediate line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mark {
    Text(String),
    /// Paragraph indent.
    Indent,
    /// Blockquote indent.
    Quote,
    /// Leading marker of a chapter title line.
    Title,
    Style(Inline, bool),
    Table(bool),
    Row(bool),
    Cell(CellKind, bool),
    Caption(bool),
    /// Referenced image, by file name.
    Image(String),
    ImageAlt(String),
    /// Horizontal rule.
    Rule,
    /// Unrecognized tag inside the body, kept verbatim.
    Passthrough(String),
}

impl Mark {
    pub fn is_indent(&self) -> bool {
        matches!(self, Mark::Indent | Mark::Quote)
    }
}

/// An ordered run of text and marks; one line of intermediate output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerLine {
    marks: Vec<Mark>,
}

impl MarkerLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_marks(marks: Vec<Mark>) -> Self {
        Self { marks }
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn push(&mut self, mark: Mark) {
        self.marks.push(mark);
    }

    /// Append text, merging with a preceding text run.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Mark::Text(last)) = self.marks.last_mut() {
            last.push_str(text);
        } else {
            self.marks.push(Mark::Text(text.to_string()));
        }
    }

    /// Append another line, merging adjacent text runs.
    pub fn append(&mut self, other: MarkerLine) {
        for mark in other.marks {
            match mark {
                Mark::Text(text) => self.push_text(&text),
                mark => self.marks.push(mark),
            }
        }
    }

    pub fn last(&self) -> Option<&Mark> {
        self.marks.last()
    }

    pub fn clear(&mut self) {
        self.marks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn take(&mut self) -> MarkerLine {
        std::mem::take(self)
    }

    /// Text of the line with every mark removed, trimmed.
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        for mark in &self.marks {
            if let Mark::Text(run) = mark {
                text.push_str(run);
            }
        }
        text.trim().to_string()
    }

    pub fn has_text(&self) -> bool {
        self.marks
            .iter()
            .any(|mark| matches!(mark, Mark::Text(run) if !run.trim().is_empty()))
    }

    pub fn has_image(&self) -> bool {
        self.marks.iter().any(|mark| matches!(mark, Mark::Image(_)))
    }

    /// Nothing worth a line: no text, images, rules or passthrough tags.
    pub fn has_content(&self) -> bool {
        self.has_text()
            || self.marks.iter().any(|mark| {
                matches!(
                    mark,
                    Mark::Image(_) | Mark::Rule | Mark::Passthrough(_) | Mark::Table(_) | Mark::Row(_)
                )
            })
    }

    pub fn is_title(&self) -> bool {
        matches!(self.marks.first(), Some(Mark::Title))
    }

    /// Empty, or nothing but indent marks and whitespace.
    pub fn is_blank(&self) -> bool {
        self.marks.iter().all(|mark| match mark {
            Mark::Indent | Mark::Quote => true,
            Mark::Text(run) => run.trim().is_empty(),
            _ => false,
        })
    }

    /// A bare paragraph placeholder, as produced by an empty `<p></p>`.
    pub fn is_paragraph_only(&self) -> bool {
        !self.marks.is_empty() && self.is_blank()
    }

    /// Drop inline style marks, keeping everything else.
    pub fn strip_styles(&mut self) {
        self.marks.retain(|mark| !matches!(mark, Mark::Style(..)));
    }

    /// Remove style pairs that enclose nothing.
    pub fn drop_empty_styles(&mut self) {
        let mut kept = MarkerLine::new();
        for mark in std::mem::take(&mut self.marks) {
            match mark {
                Mark::Style(inline, false)
                    if kept.last() == Some(&Mark::Style(inline, true)) =>
                {
                    kept.marks.pop();
                }
                Mark::Text(text) => kept.push_text(&text),
                mark => kept.marks.push(mark),
            }
        }
        *self = kept;
    }
}

/// One chapter of intermediate output. The first line, when present, is the
/// title and the second its (empty) separator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chapter {
    pub lines: Vec<MarkerLine>,
}

impl Chapter {
    pub fn title(&self) -> Option<String> {
        self.lines
            .first()
            .filter(|line| line.is_title())
            .map(MarkerLine::plain_text)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
