use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read model: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Load { line: usize, message: String },

    /// One line per rejected proposition.
    #[error("{0}")]
    Propositions(String),

    #[error("Multiple initial states not supported.")]
    MultipleInitialStates,

    #[error("the model has no initial state")]
    NoInitialState,

    #[error("unknown zone semantics `{0}'")]
    UnknownSemantics(String),

    #[error("cannot format output: {0}")]
    Output(#[from] std::fmt::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
