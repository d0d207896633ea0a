use thiserror::Error;
use std::io;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("The function {function} does not take any arguments, but found {count}")]
    ArgumentCount { function: String, count: usize },
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("cannot copy {expected} state into an instance of {found}")]
    CopyMismatch { expected: String, found: String },
    #[error("invalid value '{value}' for setting '{key}'")]
    InvalidSetting { key: String, value: String },
    #[error("unsupported statement: {0}")]
    Unsupported(String),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type DbResult<T> = Result<T, DbError>;
