use crate::errors::ConfigError;

/// Suffix appended to the escaped city name in every weather query.
pub const QUERY_SUFFIX: &str = ".xml";

/// Settings the query pipeline needs. Built by the caller; the library never
/// reads the environment itself.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Everything before the city name, including the trailing `/`.
    pub base_url: String,
    /// Everything after the city name.
    pub suffix: String,
    pub user_agent: String,
}

impl QueryConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            suffix: QUERY_SUFFIX.to_string(),
            user_agent: default_user_agent(),
        }
    }
}

/// Bootstrap configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base: String,
    pub api_key: String,
    /// Wunderground feature path, e.g. `geolookup/conditions/forecast`.
    pub features: String,
    /// Country or state scope the city names are looked up in.
    pub region: String,
    pub user_agent: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: std::env::var("WEATHER_API_BASE")
                .unwrap_or_else(|_| "http://api.wunderground.com/api".to_string()),
            api_key: std::env::var("WEATHER_API_KEY")
                .map_err(|_| ConfigError::MissingVar("WEATHER_API_KEY"))?,
            features: std::env::var("WEATHER_FEATURES")
                .unwrap_or_else(|_| "geolookup/conditions/forecast".to_string()),
            region: std::env::var("WEATHER_REGION").unwrap_or_else(|_| "Germany".to_string()),
            user_agent: std::env::var("WEATHER_USER_AGENT")
                .unwrap_or_else(|_| default_user_agent()),
        })
    }

    /// `{api_base}/{api_key}/{features}/q/{region}/`
    pub fn query_base_url(&self) -> String {
        format!(
            "{}/{}/{}/q/{}/",
            self.api_base.trim_end_matches('/'),
            self.api_key,
            self.features.trim_matches('/'),
            self.region
        )
    }

    pub fn query_config(&self) -> QueryConfig {
        QueryConfig {
            base_url: self.query_base_url(),
            suffix: QUERY_SUFFIX.to_string(),
            user_agent: self.user_agent.clone(),
        }
    }
}

fn default_user_agent() -> String {
    format!("WeatherLive/{}", env!("CARGO_PKG_VERSION"))
}
