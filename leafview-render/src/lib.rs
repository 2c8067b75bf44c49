#[cfg(feature = "pdf")]
mod pdfium;
pub mod text;
pub mod uri;

#[cfg(feature = "pdf")]
pub use pdfium::{PdfiumEngine, PDFIUM_PATH_ENV};
pub use uri::resolve_uri;
