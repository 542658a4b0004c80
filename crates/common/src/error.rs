use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown service: {0}")]
    UnknownService(String),
}

impl Error {
    #[must_use]
    pub fn unknown_service(name: impl Into<String>) -> Self {
        Self::UnknownService(name.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
