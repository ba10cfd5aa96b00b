use thirtyfour::error::WebDriverError;

use crate::parse;
use std::fmt::{self, Display, Formatter};

#[derive(Debug)]
pub enum Error {
    Parse(parse::Error),
    Browser(WebDriverError),
    Request(reqwest::Error),
    Csv(csv::Error),
    Io(std::io::Error),
    Json(serde_json::Error),
    Config(String),
    /// An input file does not have the expected shape.
    Format(String),
    /// A retry loop ran out of attempts.
    Exhausted(String),
}

impl Error {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn exhausted(msg: impl Into<String>) -> Self {
        Self::Exhausted(msg.into())
    }
}

impl From<parse::Error> for Error {
    fn from(e: parse::Error) -> Self {
        Error::Parse(e)
    }
}

impl From<WebDriverError> for Error {
    fn from(e: WebDriverError) -> Self {
        Error::Browser(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e)
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Csv(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "Parse error: {}", e),
            Error::Browser(e) => write!(f, "Browser error: {}", e),
            Error::Request(e) => write!(f, "Request error: {}", e),
            Error::Csv(e) => write!(f, "Csv error: {}", e),
            Error::Io(e) => write!(f, "Io error: {}", e),
            Error::Json(e) => write!(f, "Json error: {}", e),
            Error::Config(msg) => write!(f, "Config error: {msg}"),
            Error::Format(msg) => write!(f, "Format error: {msg}"),
            Error::Exhausted(msg) => write!(f, "Gave up: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
