use std::fmt::{self, Display, Formatter};

/// Something on a locator page was not shaped the way the extractors expect.
#[derive(Debug)]
pub enum Error {
    HtmlParse(String),
    TextNodeParse(String),
    /// A container the detail page always has, identified by its element id.
    MissingSection(String),
}

impl Error {
    pub fn missing_section(id: &str) -> Self {
        Self::MissingSection(id.to_owned())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "HTML Parse Error: {msg}"),
            Self::TextNodeParse(msg) => write!(f, "Text Node Parse Error: {msg}"),
            Self::MissingSection(id) => write!(f, "No '{id}' section found"),
        }
    }
}

impl std::error::Error for Error {}
