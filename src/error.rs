use thiserror::Error;

/// Sidecar application error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL for {name}: {url}")]
    InvalidUrl { name: String, url: String },
}

impl Error {
    pub fn invalid_url(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::InvalidUrl {
            name: name.into(),
            url: url.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
