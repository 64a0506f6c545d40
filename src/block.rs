use serde::{Serialize, Serializer};

use crate::inline;

/// Inline text spans with formatting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Span {
    Text { content: String },
    Code { content: String },
    Math { latex: String, display: bool },
    /// Children are plain text only; bold never nests.
    Bold { children: Vec<Span> },
}

impl Span {
    pub fn text(content: impl Into<String>) -> Self {
        Span::Text {
            content: content.into(),
        }
    }

    pub fn code(content: impl Into<String>) -> Self {
        Span::Code {
            content: content.into(),
        }
    }

    pub fn inline_math(latex: impl Into<String>) -> Self {
        Span::Math {
            latex: latex.into(),
            display: false,
        }
    }

    pub fn bold(content: impl Into<String>) -> Self {
        Span::Bold {
            children: vec![Span::text(content)],
        }
    }
}

/// A pipe table. Rows keep the cell count they were written with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    #[serde(serialize_with = "resolved_cells")]
    pub header: Vec<String>,
    #[serde(serialize_with = "resolved_rows")]
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Widest row in the table, header included.
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.header.len()))
            .max()
            .unwrap_or(0)
    }
}

/// Block-level elements parsed from Markdown.
///
/// Text-bearing variants keep their raw line; inline spans are resolved on
/// demand with [`Block::spans`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Heading {
        level: u8,
        #[serde(rename = "spans", serialize_with = "resolved")]
        text: String,
    },
    Paragraph {
        #[serde(rename = "spans", serialize_with = "resolved")]
        text: String,
    },
    ListItem {
        ordered: bool,
        /// Literal digits of an ordered item, e.g. `"7"` for `7. Seventh`.
        marker: Option<String>,
        #[serde(rename = "spans", serialize_with = "resolved")]
        text: String,
    },
    BlockQuote {
        #[serde(rename = "spans", serialize_with = "resolved")]
        text: String,
    },
    CodeBlock {
        language: Option<String>,
        lines: Vec<String>,
        /// False when the input ended before the closing fence.
        closed: bool,
    },
    MathBlock {
        latex: String,
        /// False when the input ended before `\]`.
        closed: bool,
    },
    Table(Table),
    BlankLine,
}

impl Block {
    /// Raw inline text of a text-bearing block.
    pub fn text(&self) -> Option<&str> {
        match self {
            Block::Heading { text, .. }
            | Block::Paragraph { text }
            | Block::ListItem { text, .. }
            | Block::BlockQuote { text } => Some(text),
            _ => None,
        }
    }

    /// Resolve the block's inline text into spans.
    pub fn spans(&self) -> Option<Vec<Span>> {
        self.text().map(inline::resolve)
    }
}

// Serialized output carries resolved spans in place of raw inline text.

fn resolved<S: Serializer>(text: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(inline::resolve(text))
}

fn resolved_cells<S: Serializer>(cells: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(cells.iter().map(|cell| inline::resolve(cell)))
}

fn resolved_rows<S: Serializer>(rows: &[Vec<String>], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(
        rows.iter()
            .map(|row| row.iter().map(|cell| inline::resolve(cell)).collect::<Vec<_>>()),
    )
}

/// A generated note: its topic and the parsed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notebook {
    pub topic: String,
    pub blocks: Vec<Block>,
}

impl Notebook {
    pub fn new(topic: impl Into<String>, markdown: &str) -> Self {
        Self {
            topic: topic.into(),
            blocks: crate::parser::parse(markdown),
        }
    }
}
