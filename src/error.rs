use thiserror::Error;

/// Failure turning Typst markup into a PDF.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Typst compilation failed: {0}")]
    Compile(String),

    #[error("PDF generation failed: {0}")]
    Pdf(String),
}
