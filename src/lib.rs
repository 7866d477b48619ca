//! Live weather for a single city.
//!
//! [`WeatherQueryService`] fetches the current observation for a city from
//! Weather Underground, publishes each field through an observable
//! [`WeatherState`], and chains a download of the condition icon into an
//! [`ImageSink`]. Everything runs on one thread inside a
//! `tokio::task::LocalSet`; observers are notified synchronously after every
//! field write.

pub mod config;
pub mod errors;
pub mod services;
pub mod state;

pub use config::{AppConfig, QueryConfig};
pub use errors::{ConfigError, ImageFetchError, QueryError};
pub use services::http::NetworkReply;
pub use services::icon::{ImageFetcher, ImageHandle, ImageSink};
pub use services::observation::CurrentObservation;
pub use services::query::WeatherQueryService;
pub use state::{
    Property, PropertyChange, PropertyObserver, PropertyValue, SubscriptionId, WeatherReport,
    WeatherState,
};
