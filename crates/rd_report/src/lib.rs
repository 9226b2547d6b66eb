//! rd_report: offline report model and renderers over pipeline artifacts.
//!
//! The renderer reads the artifacts the pipeline already wrote (run record,
//! verification, swaps, districts after the search, optional screen). It never
//! recomputes winners or margins; numbers are shown as the artifacts carry them.

#![forbid(unsafe_code)]

use std::fmt;

pub mod structure;

#[cfg(feature = "render_json")]
pub mod render_json;
#[cfg(feature = "render_html")]
pub mod render_html;

pub use structure::{build_model, ReportInputs, ReportModel};

#[cfg(feature = "render_json")]
pub use render_json::render_json;
#[cfg(feature = "render_html")]
pub use render_html::render_html;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// Template compile/render failure; payload names the stage.
    Template(&'static str),
    /// Required field absent from an artifact (JSON pointer).
    MissingField(&'static str),
    Serialize(String),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Template(stage) => write!(f, "template error in {stage}"),
            ReportError::MissingField(ptr) => write!(f, "artifact field missing: {ptr}"),
            ReportError::Serialize(msg) => write!(f, "serialize: {msg}"),
        }
    }
}

impl std::error::Error for ReportError {}

/// Output flavour chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Html,
}

impl ReportFormat {
    pub fn file_name(self) -> &'static str {
        match self {
            ReportFormat::Json => "report.json",
            ReportFormat::Html => "report.html",
        }
    }
}

/// Render `model` in the requested format.
pub fn render(model: &ReportModel, format: ReportFormat) -> Result<String, ReportError> {
    match format {
        #[cfg(feature = "render_json")]
        ReportFormat::Json => render_json(model),
        #[cfg(feature = "render_html")]
        ReportFormat::Html => render_html(model),
        #[allow(unreachable_patterns)]
        _ => Err(ReportError::Template("renderer not compiled in")),
    }
}
