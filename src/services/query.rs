//! Weather query orchestration.
//!
//! `Idle → Requesting → {Succeeded, Failed} → Idle`, re-entrant from any
//! state. A request resets the published state, issues one GET and returns;
//! the completion handler validates the reply, publishes the observation and
//! chains the icon download.
//!
//! Requests are never cancelled or tagged. If a second request is issued
//! while the first is outstanding, whichever reply lands last wins, even when
//! it belongs to the older request.

use std::fmt;
use std::rc::Rc;
use tokio::task::JoinHandle;

use crate::config::QueryConfig;
use crate::errors::{ConfigError, QueryError};
use crate::services::http::{self, InFlightCounter, NetworkReply};
use crate::services::icon::{ImageFetcher, ImageSink};
use crate::services::observation::{parse_current_observation, CurrentObservation};
use crate::state::{Property, WeatherState};

/// `{base}{escaped city}{suffix}`. The city is trimmed first.
pub fn build_query_url(base_url: &str, city: &str, suffix: &str) -> String {
    format!("{}{}{}", base_url, urlencoding::encode(city.trim()), suffix)
}

/// Queries live weather for one city at a time and publishes the result
/// through its [`WeatherState`].
///
/// Cloning is cheap and yields a handle to the same service. All methods must
/// run on a single thread inside a `tokio::task::LocalSet`.
#[derive(Clone)]
pub struct WeatherQueryService {
    inner: Rc<Inner>,
}

struct Inner {
    config: QueryConfig,
    client: reqwest::Client,
    state: WeatherState,
    icons: ImageFetcher,
    icon_sink: Rc<dyn ImageSink>,
    in_flight: InFlightCounter,
}

impl fmt::Debug for WeatherQueryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherQueryService")
            .field("config", &self.inner.config)
            .field("state", &self.inner.state)
            .field("in_flight", &self.inner.in_flight.get())
            .finish()
    }
}

impl WeatherQueryService {
    pub fn new(config: QueryConfig, icon_sink: Rc<dyn ImageSink>) -> Result<Self, ConfigError> {
        let client = http::build_client(&config.user_agent)?;
        Ok(Self::with_client(config, client, icon_sink))
    }

    /// Build the service on an existing client. Icon downloads share it.
    pub fn with_client(
        config: QueryConfig,
        client: reqwest::Client,
        icon_sink: Rc<dyn ImageSink>,
    ) -> Self {
        let in_flight = InFlightCounter::default();
        let icons = ImageFetcher::with_counter(Some(client.clone()), in_flight.clone());
        Self {
            inner: Rc::new(Inner {
                config,
                client,
                state: WeatherState::new(),
                icons,
                icon_sink,
                in_flight,
            }),
        }
    }

    /// The observable state handed to the presentation layer.
    pub fn state(&self) -> &WeatherState {
        &self.inner.state
    }

    /// Weather queries and icon downloads not yet fully processed.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.get()
    }

    /// Presentation-facing entry point. The outcome is only observable
    /// through the state's properties.
    ///
    /// # Panics
    ///
    /// Panics when called with a non-blank city outside a
    /// `tokio::task::LocalSet`, like [`request`](Self::request).
    pub fn request_weather_data(&self, city: &str) {
        let _ = self.request(city);
    }

    /// Start a query for `city`.
    ///
    /// A blank city publishes a validation error and returns `None` without
    /// touching the network. Otherwise every field is cleared, `active` is
    /// set and the returned task resolves once the reply has been processed.
    ///
    /// # Panics
    ///
    /// The reply is handled by a `spawn_local` task, so a non-blank city
    /// panics outside a `tokio::task::LocalSet`.
    pub fn request(&self, city: &str) -> Option<JoinHandle<()>> {
        let state = &self.inner.state;

        if city.trim().is_empty() {
            tracing::debug!("Rejecting weather request with blank city");
            state.set_error(QueryError::Validation.to_string());
            state.set_active(false);
            state.set_succeeded(false);
            return None;
        }

        state.reset();
        state.set_active(true);

        let config = &self.inner.config;
        let url = build_query_url(&config.base_url, city, &config.suffix);
        tracing::debug!("Requesting weather for '{}': {}", city.trim(), url);

        let guard = self.inner.in_flight.acquire();
        let service = self.clone();
        Some(tokio::task::spawn_local(async move {
            let _guard = guard;
            let reply = http::get(&service.inner.client, &url).await;
            service.on_response(reply);
        }))
    }

    /// Completion handler for one weather query.
    ///
    /// `succeeded` is published as true up front and then overwritten by any
    /// failure branch, so observers can see `true` followed by `false` within
    /// one reply. A reply with a body clears `error` before extraction.
    pub fn on_response(&self, reply: NetworkReply) {
        let state = &self.inner.state;
        state.set_succeeded(true);

        let response = match reply {
            NetworkReply::Finished { status, body } => {
                tracing::debug!("Weather reply HTTP {} ({} bytes)", status, body.len());
                let response = String::from_utf8_lossy(&body).into_owned();
                if !body.is_empty() {
                    // A failed reply to an earlier request may have left one.
                    state.set_error("");
                    self.extract_weather_data(&response);
                }
                response
            }
            NetworkReply::Failed { status, reason } => {
                tracing::warn!("Weather request failed with HTTP {}: {}", status, reason);
                self.fail(QueryError::Transport { status });
                return;
            }
        };

        // Also fires after a whitespace-only body went through extraction.
        if response.trim().is_empty() {
            self.fail(QueryError::EmptyResponse);
        }
    }

    fn extract_weather_data(&self, response: &str) {
        tracing::trace!("response={}", response);

        let observation = parse_current_observation(response).unwrap_or_else(|e| {
            tracing::warn!("Unreadable weather response, publishing empty fields: {}", e);
            CurrentObservation::default()
        });

        let state = &self.inner.state;
        state.set_text(Property::WeatherDescription, observation.weather);
        state.set_text(Property::Temperature, observation.temp_c);
        state.set_text(Property::TemperatureFeelLike, observation.feelslike_c);
        state.set_text(Property::Humidity, observation.relative_humidity);
        state.set_text(Property::WindDirection, observation.wind_dir);
        state.set_text(Property::WindSpeed, observation.wind_kph);

        if let Err(e) = self
            .inner
            .icons
            .fetch(&observation.icon_url, Rc::clone(&self.inner.icon_sink))
        {
            tracing::debug!("Weather icon not loaded: {}", e);
        }

        state.set_active(false);
    }

    fn fail(&self, error: QueryError) {
        let state = &self.inner.state;
        state.set_error(error.to_string());
        state.set_succeeded(false);
        state.set_active(false);
    }
}
