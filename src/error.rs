use thiserror::Error;

/// Fatal problems detected before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MOODLE_URL is missing (set it in .env, pass --url or run `moodle-sync login`)")]
    MissingBaseUrl,

    #[error("MOODLE_TOKEN is missing (set it in .env, pass --token or run `moodle-sync login`)")]
    MissingToken,

    #[error("invalid Moodle URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Moodle answered with an exception payload
    #[error("{message} ({errorcode})")]
    Remote { errorcode: String, message: String },

    /// Transport or decoding failed and the call collapsed to `{}`
    #[error("empty response from {function}")]
    Empty { function: String },
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid file URL {0:?}")]
    InvalidUrl(String),
}

#[derive(Debug, Error)]
pub enum LoginError {
    /// Moodle refused the credentials
    #[error("Moodle error: {0}")]
    Rejected(String),

    #[error("unknown response: {0}")]
    Unexpected(serde_json::Value),

    #[error("connection error: {0}")]
    Http(#[from] reqwest::Error),
}
