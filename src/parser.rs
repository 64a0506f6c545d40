use crate::block::{Block, Table};
use crate::table;

const FENCE: &str = "```";
const MATH_OPEN: &str = "\\[";
const MATH_CLOSE: &str = "\\]";

/// Parse markdown text into a list of blocks.
///
/// Never fails: unterminated fences and math blocks are flushed at the end
/// of input with `closed: false`.
pub fn parse(markdown: &str) -> Vec<Block> {
    let mut parser = BlockParser::new(markdown);
    parser.run();
    parser.finish()
}

/// The construct currently being accumulated. Only one is ever open.
#[derive(Debug)]
enum Mode {
    Default,
    CodeFence {
        language: Option<String>,
        lines: Vec<String>,
    },
    Math {
        lines: Vec<String>,
    },
    /// Opened only once a header and its separator were seen.
    Table {
        table: Table,
        leading_pipe: bool,
    },
}

struct BlockParser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
    mode: Mode,
    blocks: Vec<Block>,
}

impl<'a> BlockParser<'a> {
    fn new(markdown: &'a str) -> Self {
        Self {
            lines: markdown.lines().collect(),
            pos: 0,
            mode: Mode::Default,
            blocks: Vec::new(),
        }
    }

    fn next_line(&mut self) -> Option<&'a str> {
        let line = self.lines.get(self.pos).copied();
        self.pos += 1;
        line
    }

    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    fn run(&mut self) {
        while let Some(line) = self.next_line() {
            self.mode = match std::mem::replace(&mut self.mode, Mode::Default) {
                Mode::Default => self.in_default(line),
                Mode::CodeFence { language, lines } => self.in_code_fence(language, lines, line),
                Mode::Math { lines } => self.in_math(lines, line),
                Mode::Table { table, leading_pipe } => self.in_table(table, leading_pipe, line),
            };
        }
    }

    fn finish(mut self) -> Vec<Block> {
        match std::mem::replace(&mut self.mode, Mode::Default) {
            Mode::Default => {}
            Mode::CodeFence { language, lines } => {
                log::debug!("Code fence still open at end of input ({} lines)", lines.len());
                self.blocks.push(Block::CodeBlock {
                    language,
                    lines,
                    closed: false,
                });
            }
            Mode::Math { lines } => {
                log::debug!("Math block still open at end of input ({} lines)", lines.len());
                self.blocks.push(Block::MathBlock {
                    latex: lines.join("\n"),
                    closed: false,
                });
            }
            Mode::Table { table, .. } => self.flush_table(table),
        }
        self.blocks
    }

    fn in_code_fence(&mut self, language: Option<String>, mut lines: Vec<String>, line: &str) -> Mode {
        if line.trim().starts_with(FENCE) {
            self.blocks.push(Block::CodeBlock {
                language,
                lines,
                closed: true,
            });
            return Mode::Default;
        }
        lines.push(line.to_string());
        Mode::CodeFence { language, lines }
    }

    fn in_math(&mut self, mut lines: Vec<String>, line: &str) -> Mode {
        if line.trim() == MATH_CLOSE {
            self.blocks.push(Block::MathBlock {
                latex: lines.join("\n"),
                closed: true,
            });
            return Mode::Default;
        }
        lines.push(line.to_string());
        Mode::Math { lines }
    }

    fn in_table(&mut self, mut table: Table, leading_pipe: bool, line: &str) -> Mode {
        let trimmed = line.trim();
        let continues = if leading_pipe {
            trimmed.starts_with('|')
        } else {
            table::is_row(trimmed)
        };
        if continues {
            table.rows.push(table::split_row(trimmed));
            return Mode::Table {
                table,
                leading_pipe,
            };
        }
        // The line that ends a table is not part of it.
        self.flush_table(table);
        self.in_default(line)
    }

    fn flush_table(&mut self, table: Table) {
        log::debug!(
            "Parsed table: {} columns, {} body rows",
            table.header.len(),
            table.rows.len()
        );
        self.blocks.push(Block::Table(table));
    }

    fn in_default(&mut self, line: &str) -> Mode {
        let trimmed = line.trim();

        if let Some(info) = trimmed.strip_prefix(FENCE) {
            let language = info.trim();
            let language = (!language.is_empty()).then(|| language.to_string());
            log::debug!("Opening code fence at line {} ({:?})", self.pos, language);
            return Mode::CodeFence {
                language,
                lines: Vec::new(),
            };
        }

        if trimmed == MATH_OPEN {
            log::debug!("Opening math block at line {}", self.pos);
            return Mode::Math { lines: Vec::new() };
        }

        if let Some(latex) = single_line_math(trimmed) {
            self.blocks.push(Block::MathBlock {
                latex: latex.to_string(),
                closed: true,
            });
            return Mode::Default;
        }

        if let Some(mode) = self.try_open_table(trimmed) {
            return mode;
        }

        self.blocks.push(parse_line(line));
        Mode::Default
    }

    /// Enter table mode when the next line is a separator row. Both the header
    /// and the separator are consumed.
    fn try_open_table(&mut self, trimmed: &str) -> Option<Mode> {
        if !table::is_row(trimmed) {
            return None;
        }
        let separator = self.peek()?.trim();
        if !table::is_separator(separator) {
            return None;
        }
        self.pos += 1;
        log::debug!("Opening table at line {}", self.pos - 1);
        Some(Mode::Table {
            table: Table {
                header: table::split_row(trimmed),
                rows: Vec::new(),
            },
            leading_pipe: trimmed.starts_with('|'),
        })
    }
}

/// `\[ ... \]` written on one line.
fn single_line_math(trimmed: &str) -> Option<&str> {
    trimmed
        .strip_prefix(MATH_OPEN)?
        .strip_suffix(MATH_CLOSE)
        .map(str::trim)
}

/// Classify a line that opens no multi-line construct.
fn parse_line(line: &str) -> Block {
    for (level, prefix) in [(1, "# "), (2, "## "), (3, "### ")] {
        if let Some(text) = line.strip_prefix(prefix) {
            return Block::Heading {
                level,
                text: text.to_string(),
            };
        }
    }

    let trimmed = line.trim();

    if let Some(text) = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
    {
        return Block::ListItem {
            ordered: false,
            marker: None,
            text: text.to_string(),
        };
    }

    if let Some((marker, text)) = ordered_marker(trimmed) {
        return Block::ListItem {
            ordered: true,
            marker: Some(marker.to_string()),
            text: text.to_string(),
        };
    }

    if let Some(text) = trimmed.strip_prefix("> ") {
        return Block::BlockQuote {
            text: text.to_string(),
        };
    }

    if trimmed.is_empty() {
        return Block::BlankLine;
    }

    Block::Paragraph {
        text: line.to_string(),
    }
}

/// Split `12. text` into `("12", "text")`.
///
/// The marker is only stripped when `". "` follows the digits; otherwise the
/// item keeps the whole line, so `1.5 kg` reads as marker `1`, text `1.5 kg`.
fn ordered_marker(trimmed: &str) -> Option<(&str, &str)> {
    let digits = trimmed.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = trimmed[digits..].strip_prefix('.')?;
    Some((&trimmed[..digits], rest.strip_prefix(' ').unwrap_or(trimmed)))
}
