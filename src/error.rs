// src/error.rs
use thiserror::Error;
use xdom_selector::SelectorError;
use xdom_xpath1::XPathError;

/// Evaluating a compiled expression failed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Evaluating '{expression}' failed: {source}")]
pub struct EvaluationError {
    pub expression: String,
    #[source]
    pub source: XPathError,
}

/// The error type for selector queries.
#[derive(Error, Debug)]
pub enum XDomError {
    #[error("Invalid selector: {0}")]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("Document parsing failed: {0}")]
    Document(#[from] roxmltree::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
