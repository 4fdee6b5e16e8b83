use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,

    #[error("Unrecognized selector syntax at '{remaining}'")]
    Syntax { remaining: String },

    #[error("Malformed argument for '{pseudo}': '{argument}'")]
    MalformedArgument { pseudo: String, argument: String },

    #[error("Unsupported selector feature: {0}")]
    UnsupportedFeature(String),

    #[error("Unbalanced argument for '{pseudo}' in '{input}'")]
    UnbalancedArgument { pseudo: String, input: String },
}

impl SelectorError {
    pub(crate) fn syntax(remaining: &str) -> Self {
        SelectorError::Syntax {
            remaining: remaining.to_string(),
        }
    }

    pub(crate) fn malformed(pseudo: impl Into<String>, argument: impl Into<String>) -> Self {
        SelectorError::MalformedArgument {
            pseudo: pseudo.into(),
            argument: argument.into(),
        }
    }
}
