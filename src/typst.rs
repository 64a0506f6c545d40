use crate::block::{Block, Notebook, Span, Table};
use crate::config::Config;
use crate::math::{self, MathMarkup, MathRenderer, TypstMath};

/// Convert a notebook to Typst markup
pub fn notebook_to_typst(notebook: &Notebook, config: &Config) -> String {
    notebook_to_typst_with_math(notebook, config, &TypstMath)
}

/// Convert a notebook to Typst markup, typesetting math with `math`.
pub fn notebook_to_typst_with_math(
    notebook: &Notebook,
    config: &Config,
    math: &dyn MathRenderer,
) -> String {
    let mut writer = TypstWriter {
        config,
        math,
        out: String::new(),
    };
    writer.preamble();
    writer.title(&notebook.topic);
    writer.blocks(&notebook.blocks);
    writer.footer();
    writer.out
}

struct TypstWriter<'a> {
    config: &'a Config,
    math: &'a dyn MathRenderer,
    out: String,
}

impl TypstWriter<'_> {
    fn preamble(&mut self) {
        self.out.push_str("#set page(paper: ");
        self.out.push_str(&string_literal(&self.config.page.paper));
        if self.config.page.numbers {
            self.out.push_str(", numbering: \"1\"");
        }
        self.out.push_str(")\n");
        // Set up paragraph settings to prevent widows/orphans
        self.out.push_str("#set par(linebreaks: \"optimized\")\n\n");
    }

    fn title(&mut self, topic: &str) {
        if topic.is_empty() {
            return;
        }
        self.out.push_str("#align(center)[\n#text(size: 2.2em, weight: \"bold\")[");
        escape_text(topic, &mut self.out);
        self.out.push_str("]\n");
        let subtitle = &self.config.notebook.subtitle;
        if !subtitle.is_empty() {
            self.out.push_str("\n#text(fill: luma(110))[");
            escape_text(subtitle, &mut self.out);
            self.out.push_str("]\n");
        }
        self.out.push_str("]\n#line(length: 100%)\n\n");
    }

    fn footer(&mut self) {
        let footer = &self.config.notebook.footer;
        if footer.is_empty() {
            return;
        }
        self.out.push_str("#line(length: 100%)\n#align(center)[#text(size: 0.8em, fill: luma(110))[");
        escape_text(footer, &mut self.out);
        self.out.push_str("]]\n");
    }

    fn blocks(&mut self, blocks: &[Block]) {
        let mut i = 0;
        while i < blocks.len() {
            let block = &blocks[i];

            if matches!(block, Block::Heading { .. }) && self.config.layout.keep_heading_with_next {
                // Keep heading with following content using a block that prevents breaks
                self.out.push_str("#block(breakable: false)[\n");
                self.block(block);
                let next = next_content(blocks, i + 1);
                if let Some(next) = next.filter(|&j| !matches!(blocks[j], Block::Heading { .. })) {
                    for j in i + 1..=next {
                        self.block(&blocks[j]);
                        self.end_list(blocks, j);
                    }
                    i = next;
                }
                self.out.push_str("]\n\n");
            } else {
                self.block(block);
                self.end_list(blocks, i);
            }

            i += 1;
        }
    }

    /// A list run needs a blank line after its last item.
    fn end_list(&mut self, blocks: &[Block], i: usize) {
        if matches!(blocks[i], Block::ListItem { .. })
            && !matches!(blocks.get(i + 1), Some(Block::ListItem { .. }))
        {
            self.out.push('\n');
        }
    }

    fn block(&mut self, block: &Block) {
        match block {
            Block::Heading { level, text } => {
                for _ in 0..*level {
                    self.out.push('=');
                }
                self.out.push(' ');
                self.inline(text);
                self.out.push_str("\n\n");
            }
            Block::Paragraph { text } => {
                self.inline(text);
                self.out.push_str("\n\n");
            }
            Block::ListItem { marker, text, .. } => {
                match marker {
                    Some(number) => {
                        self.out.push_str(number);
                        self.out.push('.');
                    }
                    None => self.out.push('-'),
                }
                self.out.push(' ');
                self.inline(text);
                self.out.push('\n');
            }
            Block::BlockQuote { text } => {
                self.out.push_str("#quote(block: true)[");
                self.inline(text);
                self.out.push_str("]\n\n");
            }
            Block::CodeBlock {
                language,
                lines,
                closed,
            } => self.code_block(language.as_deref(), lines, *closed),
            Block::MathBlock { latex, closed: true } => {
                match math::render_or_fallback(self.math, latex, true) {
                    MathMarkup::Rendered(markup) => self.out.push_str(&markup),
                    MathMarkup::Fallback { source, .. } => {
                        self.out.push_str("#text(fill: rgb(");
                        self.out.push_str(&string_literal(&self.config.math.error_color));
                        self.out.push_str("))[#raw(block: true, ");
                        self.out.push_str(&string_literal(&source));
                        self.out.push_str(")]");
                    }
                }
                self.out.push_str("\n\n");
            }
            Block::MathBlock {
                latex,
                closed: false,
            } => {
                self.out.push_str("#block(breakable: false, stroke: 0.5pt + rgb(");
                self.out.push_str(&string_literal(&self.config.math.error_color));
                self.out.push_str("), inset: 6pt)[#text(fill: luma(150))[#raw(block: true, ");
                self.out.push_str(&string_literal(&format!("\\[\n{latex}")));
                self.out.push_str(")]]\n\n");
            }
            Block::Table(table) => {
                // Keep tables together when possible
                self.out.push_str("#block(breakable: false)[\n");
                self.table(table);
                self.out.push_str("]\n\n");
            }
            Block::BlankLine => {
                self.out.push_str("#v(");
                self.out.push_str(&self.config.layout.blank_line_spacing);
                self.out.push_str(")\n");
            }
        }
    }

    fn code_block(&mut self, language: Option<&str>, lines: &[String], closed: bool) {
        let content = lines.join("\n");
        let fence = "`".repeat(longest_backtick_run(&content).max(2) + 1);

        // Keep code blocks together when possible
        if closed {
            self.out.push_str("#block(breakable: false)[\n");
        } else {
            self.out.push_str("#block(breakable: false, stroke: 0.5pt + rgb(");
            self.out.push_str(&string_literal(&self.config.math.error_color));
            self.out.push_str("), inset: 6pt)[\n");
        }
        self.out.push_str(&fence);
        if let Some(lang) = language {
            self.out.push_str(lang);
        }
        self.out.push('\n');
        self.out.push_str(&content);
        if !content.is_empty() {
            self.out.push('\n');
        }
        self.out.push_str(&fence);
        self.out.push_str("\n]\n\n");
    }

    fn table(&mut self, table: &Table) {
        let col_count = table.column_count();
        if col_count == 0 {
            return;
        }

        self.out.push_str("#table(\n");
        self.out.push_str(&format!("  columns: {},\n", col_count));

        // Header cells (bold); short rows are padded so later cells stay in their columns
        for cell in padded(&table.header, col_count) {
            self.out.push_str("  [*");
            self.inline(cell);
            self.out.push_str("*],\n");
        }

        for row in &table.rows {
            for cell in padded(row, col_count) {
                self.out.push_str("  [");
                self.inline(cell);
                self.out.push_str("],\n");
            }
        }

        self.out.push_str(")\n");
    }

    fn inline(&mut self, text: &str) {
        for span in crate::inline::resolve(text) {
            self.span(&span);
        }
    }

    fn span(&mut self, span: &Span) {
        match span {
            Span::Text { content } => escape_text(content, &mut self.out),
            Span::Bold { children } => {
                self.out.push('*');
                for child in children {
                    self.span(child);
                }
                self.out.push('*');
            }
            Span::Code { content } => {
                if content.is_empty() || content.contains('`') {
                    self.out.push_str("#raw(");
                    self.out.push_str(&string_literal(content));
                    self.out.push_str(");");
                } else {
                    self.out.push('`');
                    self.out.push_str(content);
                    self.out.push('`');
                }
            }
            Span::Math { latex, display } => {
                match math::render_or_fallback(self.math, latex, *display) {
                    MathMarkup::Rendered(markup) => self.out.push_str(&markup),
                    MathMarkup::Fallback { source, .. } => {
                        self.out.push_str("#text(fill: rgb(");
                        self.out.push_str(&string_literal(&self.config.math.error_color));
                        self.out.push_str("))[");
                        escape_text(&source, &mut self.out);
                        self.out.push(']');
                    }
                }
            }
        }
    }
}

/// Index of the first non-blank block at or after `from`.
fn next_content(blocks: &[Block], from: usize) -> Option<usize> {
    (from..blocks.len()).find(|&j| blocks[j] != Block::BlankLine)
}

fn padded(cells: &[String], width: usize) -> impl Iterator<Item = &str> {
    cells
        .iter()
        .map(String::as_str)
        .chain(std::iter::repeat(""))
        .take(width.max(cells.len()))
}

fn longest_backtick_run(text: &str) -> usize {
    text.split(|c| c != '`').map(str::len).max().unwrap_or(0)
}

/// Escape special Typst characters in markup text
fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '#' | '*' | '_' | '@' | '$' | '\\' | '`' | '<' | '>' | '[' | ']' | '=' | '+' | '-'
            | '/' | '~' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
}

/// A Typst string literal
fn string_literal(text: &str) -> String {
    let mut literal = String::with_capacity(text.len() + 2);
    literal.push('"');
    for ch in text.chars() {
        match ch {
            '"' => literal.push_str("\\\""),
            '\\' => literal.push_str("\\\\"),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\t' => literal.push_str("\\t"),
            _ => literal.push(ch),
        }
    }
    literal.push('"');
    literal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::MathError;

    const PREAMBLE: &str = "#set page(paper: \"a4\")\n#set par(linebreaks: \"optimized\")\n\n";

    fn render(markdown: &str) -> String {
        notebook_to_typst(&Notebook::new("", markdown), &Config::default())
    }

    struct Failing;

    impl MathRenderer for Failing {
        fn render_math(&self, _latex: &str, _display: bool) -> Result<String, MathError> {
            Err(MathError::Unbalanced)
        }
    }

    #[test]
    fn heading() {
        assert_eq!(
            render("# Hello"),
            format!("{PREAMBLE}#block(breakable: false)[\n= Hello\n\n]\n\n")
        );
    }

    #[test]
    fn heading_with_following_content() {
        // Heading should be grouped with the next non-blank block
        let result = render("## Title\n\nSome text.");
        assert!(result.contains("#block(breakable: false)[\n== Title\n\n#v(0.6em)\nSome text.\n\n]\n\n"));
    }

    #[test]
    fn paragraph() {
        assert_eq!(render("Hello world"), format!("{PREAMBLE}Hello world\n\n"));
    }

    #[test]
    fn bold() {
        assert_eq!(render("**bold** text"), format!("{PREAMBLE}*bold* text\n\n"));
    }

    #[test]
    fn inline_code() {
        assert_eq!(render("`code`"), format!("{PREAMBLE}`code`\n\n"));
        assert_eq!(render("``"), format!("{PREAMBLE}#raw(\"\");\n\n"));
    }

    #[test]
    fn code_block() {
        assert_eq!(
            render("```rust\nlet x = 1;\n```"),
            format!("{PREAMBLE}#block(breakable: false)[\n```rust\nlet x = 1;\n```\n]\n\n")
        );
    }

    #[test]
    fn code_block_keeps_bold_markers() {
        let result = render("```\n**not bold**\n```");
        assert!(result.contains("```\n**not bold**\n```"));
    }

    #[test]
    fn fence_grows_past_content_backticks() {
        let result = render("```md\nquote ```` here\n```");
        assert!(result.contains("`````md\nquote ```` here\n`````"));
    }

    #[test]
    fn unterminated_code_block_is_framed() {
        let result = render("```js\ncode here");
        assert!(result.contains(
            "#block(breakable: false, stroke: 0.5pt + rgb(\"#ef4444\"), inset: 6pt)[\n```js\ncode here\n```\n]"
        ));
    }

    #[test]
    fn lists() {
        assert_eq!(
            render("- one\n- two\n7. seven\nafter"),
            format!("{PREAMBLE}- one\n- two\n7. seven\n\nafter\n\n")
        );
    }

    #[test]
    fn block_quote() {
        assert_eq!(
            render("> wise words"),
            format!("{PREAMBLE}#quote(block: true)[wise words]\n\n")
        );
    }

    #[test]
    fn escapes_special_chars() {
        assert_eq!(render("a # b"), format!("{PREAMBLE}a \\# b\n\n"));
        assert_eq!(render("a_b"), format!("{PREAMBLE}a\\_b\n\n"));
        assert_eq!(render("+ not a list"), format!("{PREAMBLE}\\+ not a list\n\n"));
    }

    #[test]
    fn table() {
        let md = "| A | B |\n|---|---|\n| 1 | 2 |";
        let expected = format!(
            "{PREAMBLE}#block(breakable: false)[\n#table(\n  columns: 2,\n  [*A*],\n  [*B*],\n  [1],\n  [2],\n)\n]\n\n"
        );
        assert_eq!(render(md), expected);
    }

    #[test]
    fn ragged_table_is_padded() {
        let md = "| A | B |\n|---|---|\n| 1 |";
        assert!(render(md).contains("  [*A*],\n  [*B*],\n  [1],\n  [],\n)"));
    }

    #[test]
    fn display_math() {
        assert_eq!(
            render("\\[ \\frac{a}{b} \\]"),
            format!("{PREAMBLE}$ frac(a, b) $\n\n")
        );
    }

    #[test]
    fn inline_math() {
        assert_eq!(
            render("Area \\(\\pi r^2\\)"),
            format!("{PREAMBLE}Area $pi r^(2)$\n\n")
        );
    }

    #[test]
    fn math_falls_back_to_source() {
        let notebook = Notebook::new("", "x \\(x^2\\)\n\\[y\\]");
        let result = notebook_to_typst_with_math(&notebook, &Config::default(), &Failing);
        assert!(result.contains("x #text(fill: rgb(\"#ef4444\"))[\\\\(x^2\\\\)]"));
        assert!(result.contains("#text(fill: rgb(\"#ef4444\"))[#raw(block: true, \"\\\\[y\\\\]\")]"));
    }

    #[test]
    fn unterminated_math_is_framed_and_muted() {
        let result = render("\\[\na^2");
        assert!(result.contains(
            "#block(breakable: false, stroke: 0.5pt + rgb(\"#ef4444\"), inset: 6pt)[#text(fill: luma(150))[#raw(block: true, \"\\\\[\\na^2\")]]"
        ));
    }

    #[test]
    fn title_and_footer() {
        let config = Config::compiled_default();
        let result = notebook_to_typst(&Notebook::new("Optics", "text"), &config);
        assert!(result.starts_with("#set page(paper: \"a4\", numbering: \"1\")\n"));
        assert!(result.contains("#text(size: 2.2em, weight: \"bold\")[Optics]\n\n#text(fill: luma(110))[Study notes]\n]"));
        assert!(result.ends_with("#text(size: 0.8em, fill: luma(110))[Created with notebook]]\n"));
    }
}
