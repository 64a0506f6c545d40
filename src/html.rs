//! Standalone HTML page for a notebook.
//!
//! Math is typeset by KaTeX while the page is written, so the output needs only
//! the KaTeX stylesheet. Expressions KaTeX rejects are shown as literal source
//! in the error colour.

use html_escape::{encode_double_quoted_attribute, encode_text_to_string};

use crate::block::{Block, Notebook, Span, Table};
use crate::config::Config;
use crate::math::{self, KatexMath, MathMarkup, MathRenderer};

/// Render a notebook as a complete HTML document.
pub fn notebook_to_html(notebook: &Notebook, config: &Config) -> String {
    notebook_to_html_with_math(notebook, config, &KatexMath)
}

/// Render a notebook as a complete HTML document, marking up math with `math`.
pub fn notebook_to_html_with_math(
    notebook: &Notebook,
    config: &Config,
    math: &dyn MathRenderer,
) -> String {
    let mut writer = HtmlWriter {
        config,
        math,
        out: String::new(),
    };
    writer.head(&notebook.topic);
    writer.title(&notebook.topic);
    for block in &notebook.blocks {
        writer.block(block);
    }
    writer.tail();
    writer.out
}

const STYLE: &str = "\
body { margin: 0; background: #f8fafc; color: #1e293b; font-family: system-ui, sans-serif; line-height: 1.6; }
main.notebook { max-width: 52rem; margin: 2rem auto; padding: 2.5rem; background: #fff; border-radius: 12px; }
header.title { text-align: center; border-bottom: 1px solid #e2e8f0; margin-bottom: 1.5rem; }
header.title p { color: #64748b; }
h1, h2, h3 { break-after: avoid; }
.list-item { display: flex; gap: 0.5rem; }
.list-item .marker { min-width: 1.5rem; color: #6366f1; font-weight: 600; }
blockquote { border-left: 4px solid #6366f1; margin: 1rem 0; padding: 0.25rem 1rem; color: #475569; }
figure.code { margin: 1rem 0; border-radius: 8px; overflow: hidden; background: #0f172a; break-inside: avoid; }
figure.code figcaption { padding: 0.25rem 1rem; font-size: 0.75rem; color: #94a3b8; background: #1e293b; }
figure.code pre { margin: 0; padding: 1rem; color: #e2e8f0; overflow-x: auto; }
code { font-family: ui-monospace, monospace; }
p code, li code, td code, th code, blockquote code, h1 code, h2 code, h3 code, .list-item code { background: #f1f5f9; padding: 0 0.25rem; border-radius: 4px; }
.math-display { margin: 1rem 0; overflow-x: auto; }
.pending-math { color: #94a3b8; }
.pending-code { border: 1px dashed #94a3b8; padding: 1rem; }
table { border-collapse: collapse; margin: 1rem 0; break-inside: avoid; }
th, td { border: 1px solid #cbd5e1; padding: 0.35rem 0.75rem; }
th { background: #f1f5f9; }
footer { margin-top: 2rem; padding-top: 0.5rem; border-top: 1px solid #e2e8f0; text-align: center; font-size: 0.8rem; color: #64748b; }
@media print {
  body { background: #fff; }
  main.notebook { margin: 0; padding: 0; max-width: none; }
}
";

struct HtmlWriter<'a> {
    config: &'a Config,
    math: &'a dyn MathRenderer,
    out: String,
}

impl HtmlWriter<'_> {
    fn head(&mut self, topic: &str) {
        let base = encode_double_quoted_attribute(self.config.html.katex_base_url.trim_end_matches('/'))
            .into_owned();
        let error_color = encode_double_quoted_attribute(&self.config.math.error_color).into_owned();

        self.out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        self.out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
        self.out.push_str("<title>");
        encode_text_to_string(if topic.is_empty() { "Notebook" } else { topic }, &mut self.out);
        self.out.push_str("</title>\n");
        self.out.push_str(&format!(
            "<link rel=\"stylesheet\" href=\"{base}/katex.min.css\">\n"
        ));
        self.out.push_str("<style>\n");
        self.out.push_str(STYLE);
        self.out.push_str(&format!(".math-error {{ color: {error_color}; }}\n"));
        self.out.push_str(&format!(
            ".spacer {{ height: {}; }}\n",
            encode_double_quoted_attribute(&self.config.layout.blank_line_spacing)
        ));
        self.out.push_str("</style>\n</head>\n<body>\n<main class=\"notebook\">\n");
    }

    fn title(&mut self, topic: &str) {
        if topic.is_empty() {
            return;
        }
        self.out.push_str("<header class=\"title\">\n<h1>");
        encode_text_to_string(topic, &mut self.out);
        self.out.push_str("</h1>\n");
        let subtitle = &self.config.notebook.subtitle;
        if !subtitle.is_empty() {
            self.out.push_str("<p>");
            encode_text_to_string(subtitle, &mut self.out);
            self.out.push_str("</p>\n");
        }
        self.out.push_str("</header>\n");
    }

    fn tail(&mut self) {
        let footer = &self.config.notebook.footer;
        if !footer.is_empty() {
            self.out.push_str("<footer>");
            encode_text_to_string(footer, &mut self.out);
            self.out.push_str("</footer>\n");
        }
        self.out.push_str("</main>\n</body>\n</html>\n");
    }

    fn block(&mut self, block: &Block) {
        match block {
            Block::Heading { level, text } => {
                self.out.push_str(&format!("<h{level}>"));
                self.inline(text);
                self.out.push_str(&format!("</h{level}>\n"));
            }
            Block::Paragraph { text } => {
                self.out.push_str("<p>");
                self.inline(text);
                self.out.push_str("</p>\n");
            }
            Block::ListItem { marker, text, .. } => {
                self.out.push_str("<div class=\"list-item\"><span class=\"marker\">");
                match marker {
                    Some(number) => {
                        encode_text_to_string(number, &mut self.out);
                        self.out.push('.');
                    }
                    None => self.out.push('•'),
                }
                self.out.push_str("</span><span>");
                self.inline(text);
                self.out.push_str("</span></div>\n");
            }
            Block::BlockQuote { text } => {
                self.out.push_str("<blockquote>");
                self.inline(text);
                self.out.push_str("</blockquote>\n");
            }
            Block::CodeBlock {
                language,
                lines,
                closed: true,
            } => {
                let label = language
                    .as_deref()
                    .map(str::to_uppercase)
                    .unwrap_or_else(|| "CODE".to_string());
                self.out.push_str("<figure class=\"code\"><figcaption>");
                encode_text_to_string(&label, &mut self.out);
                self.out.push_str("</figcaption><pre><code>");
                encode_text_to_string(&lines.join("\n"), &mut self.out);
                self.out.push_str("</code></pre></figure>\n");
            }
            Block::CodeBlock {
                lines,
                closed: false,
                ..
            } => {
                self.out.push_str("<pre class=\"pending-code\"><code>");
                encode_text_to_string(&lines.join("\n"), &mut self.out);
                self.out.push_str("</code></pre>\n");
            }
            Block::MathBlock { latex, closed: true } => {
                match math::render_or_fallback(self.math, latex, true) {
                    MathMarkup::Rendered(markup) => self.out.push_str(&markup),
                    MathMarkup::Fallback { source, .. } => {
                        self.out.push_str("<pre class=\"math-error\">");
                        encode_text_to_string(&source, &mut self.out);
                        self.out.push_str("</pre>");
                    }
                }
                self.out.push('\n');
            }
            Block::MathBlock {
                latex,
                closed: false,
            } => {
                self.out.push_str("<pre class=\"pending-math\">\\[\n");
                encode_text_to_string(latex, &mut self.out);
                self.out.push_str("</pre>\n");
            }
            Block::Table(table) => self.table(table),
            Block::BlankLine => self.out.push_str("<div class=\"spacer\"></div>\n"),
        }
    }

    // Rows keep their own cell count; the browser lays out ragged rows.
    fn table(&mut self, table: &Table) {
        self.out.push_str("<table>\n<thead><tr>");
        for cell in &table.header {
            self.out.push_str("<th>");
            self.inline(cell);
            self.out.push_str("</th>");
        }
        self.out.push_str("</tr></thead>\n<tbody>\n");
        for row in &table.rows {
            self.out.push_str("<tr>");
            for cell in row {
                self.out.push_str("<td>");
                self.inline(cell);
                self.out.push_str("</td>");
            }
            self.out.push_str("</tr>\n");
        }
        self.out.push_str("</tbody>\n</table>\n");
    }

    fn inline(&mut self, text: &str) {
        for span in crate::inline::resolve(text) {
            self.span(&span);
        }
    }

    fn span(&mut self, span: &Span) {
        match span {
            Span::Text { content } => {
                encode_text_to_string(content, &mut self.out);
            }
            Span::Code { content } => {
                self.out.push_str("<code>");
                encode_text_to_string(content, &mut self.out);
                self.out.push_str("</code>");
            }
            Span::Bold { children } => {
                self.out.push_str("<strong>");
                for child in children {
                    self.span(child);
                }
                self.out.push_str("</strong>");
            }
            Span::Math { latex, display } => {
                match math::render_or_fallback(self.math, latex, *display) {
                    MathMarkup::Rendered(markup) => self.out.push_str(&markup),
                    MathMarkup::Fallback { source, .. } => {
                        self.out.push_str("<span class=\"math-error\">");
                        encode_text_to_string(&source, &mut self.out);
                        self.out.push_str("</span>");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::MathError;

    struct Failing;

    impl MathRenderer for Failing {
        fn render_math(&self, _latex: &str, _display: bool) -> Result<String, MathError> {
            Err(MathError::Unbalanced)
        }
    }

    fn body(markdown: &str) -> String {
        body_with(markdown, &KatexMath)
    }

    fn body_with(markdown: &str, math: &dyn MathRenderer) -> String {
        let html = notebook_to_html_with_math(&Notebook::new("", markdown), &Config::default(), math);
        let start = html.find("<main class=\"notebook\">\n").unwrap() + "<main class=\"notebook\">\n".len();
        let end = html.find("</main>").unwrap();
        html[start..end].to_string()
    }

    #[test]
    fn headings_and_paragraphs() {
        assert_eq!(
            body("# One\n## Two\n### Three\nplain"),
            "<h1>One</h1>\n<h2>Two</h2>\n<h3>Three</h3>\n<p>plain</p>\n"
        );
    }

    #[test]
    fn text_is_escaped() {
        assert_eq!(body("a < b & **c**"), "<p>a &lt; b &amp; <strong>c</strong></p>\n");
    }

    #[test]
    fn list_items_keep_markers() {
        assert_eq!(
            body("- apple\n3. third"),
            "<div class=\"list-item\"><span class=\"marker\">•</span><span>apple</span></div>\n\
             <div class=\"list-item\"><span class=\"marker\">3.</span><span>third</span></div>\n"
        );
    }

    #[test]
    fn code_block_is_opaque() {
        assert_eq!(
            body("```\n**not bold**\n```"),
            "<figure class=\"code\"><figcaption>CODE</figcaption><pre><code>**not bold**</code></pre></figure>\n"
        );
        assert!(body("```py\nx\n```").contains("<figcaption>PY</figcaption>"));
    }

    #[test]
    fn unterminated_blocks_show_their_source() {
        assert_eq!(
            body("```js\nlet a = 1;"),
            "<pre class=\"pending-code\"><code>let a = 1;</code></pre>\n"
        );
        assert_eq!(
            body("\\[\nx < 1"),
            "<pre class=\"pending-math\">\\[\nx &lt; 1</pre>\n"
        );
    }

    #[test]
    fn math_is_typeset_by_katex() {
        let inline = body("Area \\(\\pi r^2\\)");
        assert!(inline.starts_with("<p>Area <span class=\"math math-inline\"><span class=\"katex\">"));
        assert!(inline.contains("katex-html"));

        let display = body("\\[a+b\\]");
        assert!(display.starts_with("<div class=\"math math-display\">"));
        assert!(display.contains("katex-display"));
    }

    #[test]
    fn katex_rejection_shows_source() {
        assert_eq!(
            body("bad \\(\\frac{a}\\)"),
            "<p>bad <span class=\"math-error\">\\(\\frac{a}\\)</span></p>\n"
        );
    }

    #[test]
    fn failing_math_shows_source() {
        assert_eq!(
            body_with("see \\(x^2\\)", &Failing),
            "<p>see <span class=\"math-error\">\\(x^2\\)</span></p>\n"
        );
        assert_eq!(
            body_with("\\[x^2\\]", &Failing),
            "<pre class=\"math-error\">\\[x^2\\]</pre>\n"
        );
    }

    #[test]
    fn ragged_table() {
        assert_eq!(
            body("| A | B |\n|---|---|\n| 1 |"),
            "<table>\n<thead><tr><th>A</th><th>B</th></tr></thead>\n<tbody>\n<tr><td>1</td></tr>\n</tbody>\n</table>\n"
        );
    }

    #[test]
    fn blank_line_is_spacer() {
        assert_eq!(body("a\n\nb"), "<p>a</p>\n<div class=\"spacer\"></div>\n<p>b</p>\n");
    }

    #[test]
    fn page_loads_katex_and_title() {
        let config = Config::compiled_default();
        let html = notebook_to_html(&Notebook::new("Waves & Sound", "x"), &config);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Waves &amp; Sound</title>"));
        assert!(html.contains("href=\"https://cdn.jsdelivr.net/npm/katex@0.16.11/dist/katex.min.css\""));
        assert!(!html.contains("<script"));
        assert!(html.contains("<header class=\"title\">\n<h1>Waves &amp; Sound</h1>\n<p>Study notes</p>\n</header>"));
        assert!(html.contains("<footer>Created with notebook</footer>"));
    }
}
