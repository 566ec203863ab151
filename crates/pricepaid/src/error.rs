use thiserror::Error;

#[derive(Error, Debug)]
pub enum PricePaidError {
    #[error("Geocode error: {0}")]
    Geocode(#[from] crate::geocode::GeocodeError),
    #[error("Index error: {0}")]
    Index(#[from] crate::index::IndexError),
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PricePaidError>;
