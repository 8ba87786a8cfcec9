//! Error types for deck compilation.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::LayoutRole;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while compiling an outline into a deck.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The configured template package does not exist.
    #[error("Template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    /// The layout registry does not map every layout role.
    #[error("Layout registry has no entry for '{0}'")]
    IncompleteLayoutRegistry(LayoutRole),

    /// A colour string could not be parsed.
    #[error("Invalid colour '{0}', expected RRGGBB hex")]
    InvalidColor(String),

    /// The configuration file could not be parsed.
    #[error("Configuration error: {0}")]
    ConfigParse(String),

    /// The outline file could not be parsed.
    #[error("Outline error: {0}")]
    OutlineParse(String),

    /// A visited outline node lacks a field it needs.
    #[error("Outline node {node} is missing required field '{field}'")]
    MissingField { node: String, field: &'static str },

    /// The template has fewer layouts than the registry refers to.
    #[error("Layout index {index} out of range, template has {available} layouts")]
    LayoutNotFound { index: usize, available: usize },

    /// No slide with the given identifier exists.
    #[error("Slide {0} not found")]
    SlideNotFound(u32),

    /// The package is structurally broken (missing parts or relationships).
    #[error("Package error: {0}")]
    PackageError(String),

    /// ZIP archive error.
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing or writing error.
    #[error("XML error: {0}")]
    XmlError(String),

    /// Animation timeline could not be synthesized or attached.
    #[error("Animation error: {0}")]
    Animation(String),
}
