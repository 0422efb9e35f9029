//! Crate-wide error aggregation.

use std::fmt;

use crate::config;
use crate::model::ModelError;
use crate::register;
use crate::store;

/// The top-level error type, aggregating every module boundary's own error
/// enum via `From` impls (spec.md §7, Error kinds).
#[derive(Debug)]
pub enum Error {
    Config(config::Error),
    Model(ModelError),
    Store(store::Error),
    Register(register::Error),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "configuration error: {e}"),
            Error::Model(e) => write!(f, "model error: {e}"),
            Error::Store(e) => write!(f, "record store error: {e}"),
            Error::Register(e) => write!(f, "registration error: {e}"),
            Error::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => Some(e),
            Error::Model(e) => Some(e),
            Error::Store(e) => Some(e),
            Error::Register(e) => Some(e),
            Error::Io(e) => Some(e),
        }
    }
}

impl From<config::Error> for Error {
    fn from(e: config::Error) -> Self {
        Error::Config(e)
    }
}

impl From<ModelError> for Error {
    fn from(e: ModelError) -> Self {
        Error::Model(e)
    }
}

impl From<store::Error> for Error {
    fn from(e: store::Error) -> Self {
        Error::Store(e)
    }
}

impl From<register::Error> for Error {
    fn from(e: register::Error) -> Self {
        Error::Register(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
