//! View engine error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    /// Embedded template is missing or not UTF-8
    #[error("Template not loadable: {0}")]
    Load(String),

    /// Template rendering error
    #[error("Template error: {0}")]
    Render(String),
}
