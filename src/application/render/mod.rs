//! The rendering transformation chain: source markup → HTML → paginated PDF,
//! plus the two-document overlay merge.

pub mod cleanup;
pub mod compose;
pub mod fetch;
pub mod math;
pub mod pdf;
pub mod transform;

use thiserror::Error;

pub use compose::{ComposeError, merge_with_footer};
pub use math::{MathError, MathRasterizer, RasterFormula, SystemFontRasterizer};
pub use pdf::PdfRenderer;
pub use transform::Transformer;

/// Unrecoverable failure anywhere in the transform or PDF-layout stages.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("markup processing failed: {message}")]
    Markup { message: String },
    #[error("pdf layout failed: {message}")]
    Layout { message: String },
    #[error("pdf assembly failed: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("pdf serialization failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("embedded image could not be decoded: {message}")]
    Image { message: String },
}

impl RenderError {
    pub fn markup(message: impl Into<String>) -> Self {
        Self::Markup {
            message: message.into(),
        }
    }

    pub fn layout(message: impl Into<String>) -> Self {
        Self::Layout {
            message: message.into(),
        }
    }

    pub fn image(message: impl Into<String>) -> Self {
        Self::Image {
            message: message.into(),
        }
    }
}
