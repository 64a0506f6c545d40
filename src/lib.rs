mod block;
mod config;
mod error;
mod generate;
mod html;
mod inline;
mod math;
mod parser;
mod session;
mod table;
mod typst;

pub use block::{Block, Notebook, Span, Table};
pub use config::{Config, ConfigError};
pub use error::RenderError;
pub use generate::{GenerateError, Language, NoteGenerator, NoteRequest};
pub use html::{notebook_to_html, notebook_to_html_with_math};
pub use math::{KatexMath, MathError, MathMarkup, MathRenderer, TypstMath, render_or_fallback};
pub use session::{Session, View};
pub use typst::{notebook_to_typst, notebook_to_typst_with_math};

use typst_as_lib::TypstEngine;
use typst_as_lib::typst_kit_options::TypstKitFontOptions;
use typst_pdf::PdfOptions;

/// Parse markdown text into a vector of blocks.
pub fn parse(markdown: &str) -> Vec<Block> {
    parser::parse(markdown)
}

/// Split one line of text into inline spans.
pub fn resolve_inline(text: &str) -> Vec<Span> {
    inline::resolve(text)
}

/// Convert markdown to Typst markup.
pub fn markdown_to_typst(markdown: &str) -> String {
    markdown_to_typst_with_config(markdown, &Config::compiled_default())
}

pub fn markdown_to_typst_with_config(markdown: &str, config: &Config) -> String {
    notebook_to_typst(&Notebook::new("", markdown), config)
}

/// Convert markdown to a standalone HTML page.
pub fn markdown_to_html(markdown: &str) -> String {
    markdown_to_html_with_config(markdown, &Config::compiled_default())
}

pub fn markdown_to_html_with_config(markdown: &str, config: &Config) -> String {
    notebook_to_html(&Notebook::new("", markdown), config)
}

/// Convert markdown to PDF bytes.
pub fn markdown_to_pdf(markdown: &str) -> Result<Vec<u8>, RenderError> {
    notebook_to_pdf(&Notebook::new("", markdown), &Config::compiled_default())
}

/// Typeset a notebook and export it as PDF bytes.
pub fn notebook_to_pdf(notebook: &Notebook, config: &Config) -> Result<Vec<u8>, RenderError> {
    use typst_library::layout::PagedDocument;

    let typst_content = notebook_to_typst(notebook, config);
    log::debug!("Generated {} bytes of Typst markup", typst_content.len());

    let font_options = TypstKitFontOptions::new()
        .include_embedded_fonts(true)
        .include_system_fonts(false);

    let engine = TypstEngine::builder()
        .main_file(typst_content)
        .search_fonts_with(font_options)
        .build();

    let doc: PagedDocument = engine
        .compile()
        .output
        .map_err(|e| RenderError::Compile(format!("{:?}", e)))?;
    log::info!("Typeset {} page(s)", doc.pages.len());

    typst_pdf::pdf(&doc, &PdfOptions::default()).map_err(|e| RenderError::Pdf(format!("{:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_smoke() {
        let md = "# Motion\n\nSpeed is **distance** over time: \\(v = \\frac{d}{t}\\)\n\n\
                  | Quantity | Unit |\n|---|---|\n| v | m/s |\n\n\\[\n\\frac{1}{2} m v^2\n\\]\n\n\
                  ```rust\nlet v = d / t;\n```";
        let bytes = markdown_to_pdf(md).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn unpaired_delimiters_in_math_still_compile() {
        for md in [
            "Inline \\(\\frac{(a}{b)}\\)",
            "Hat \\(\\hat{[}\\)",
            "\\[\\mathbf{[}a\\]",
            "Unclosed \\(\\sin(x\\)",
        ] {
            let bytes = markdown_to_pdf(md).unwrap();
            assert!(bytes.starts_with(b"%PDF"), "{md}");
        }
    }

    #[test]
    fn typst_uses_bundled_config() {
        let typst = markdown_to_typst("hello");
        assert!(typst.starts_with("#set page(paper: \"a4\", numbering: \"1\")\n"));
        assert!(typst.contains("hello\n\n"));
    }

    #[test]
    fn html_from_markdown() {
        let html = markdown_to_html("**hi**");
        assert!(html.contains("<p><strong>hi</strong></p>"));
    }
}
