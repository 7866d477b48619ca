//! Error types for the weather query pipeline.
//!
//! Query errors never cross the service boundary as `Err` values: their
//! `Display` text is what gets published on the `error` property.

/// Failures of a weather query, surfaced through the `succeeded` / `error`
/// properties.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// Blank city input, detected before any network call.
    #[error("Please select a city.")]
    Validation,

    /// Non-2xx status or underlying transport failure. `status` is 0 when no
    /// HTTP status was received.
    #[error("Http Error: {status}")]
    Transport { status: u16 },

    /// The transport succeeded but delivered an empty body.
    #[error("Unable to retrieve the http response")]
    EmptyResponse,
}

/// Icon download failures. These are logged and swallowed, never published.
#[derive(Debug, thiserror::Error)]
pub enum ImageFetchError {
    #[error("Invalid image URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Image request failed with HTTP {status}: {reason}")]
    Transport { status: u16, reason: String },

    #[error("Image decoding error: {0}")]
    Decode(#[from] image::ImageError),
}

/// Errors raised while assembling the service from its configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingVar(&'static str),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
