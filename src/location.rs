use crate::cache::{TtlCache, GEOCODE_PREFIX, SUGGEST_PREFIX};
use crate::config::{Config, MIN_SUGGEST_DEBOUNCE_MS};
use crate::forecast::types::{Coordinates, NominatimPlace};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const MAX_SUGGESTIONS: usize = 5;
pub const MIN_SUGGEST_CHARS: usize = 3;

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),
    #[error("Rate limited by geocoding provider")]
    RateLimited,
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Provider returned an unreadable coordinate: {0}")]
    InvalidCoordinate(String),
}

/// A geocoded place: display label plus coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Place {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Candidates for `query`, best match first, at most `limit`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Place>, GeocodeError>;
}

pub struct NominatimClient {
    client: Client,
    base_url: String,
}

impl NominatimClient {
    pub fn new(config: &Config) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(config.http_user_agent.clone())
            .timeout(config.http_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.geocoder_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Place>, GeocodeError> {
        let url = format!("{}/search", self.base_url);
        tracing::debug!("Geocoding '{}' (limit {})", query, limit);

        let limit_param = limit.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("limit", limit_param.as_str())])
            .send()
            .await?;

        let places: Vec<NominatimPlace> = match response.status() {
            reqwest::StatusCode::OK => serde_json::from_str(&response.text().await?)?,
            reqwest::StatusCode::TOO_MANY_REQUESTS | reqwest::StatusCode::FORBIDDEN => {
                tracing::warn!("Geocoding provider refused request for '{}'", query);
                return Err(GeocodeError::RateLimited);
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                return Err(GeocodeError::ApiError(format!("HTTP {}: {}", status, error_text)));
            }
        };

        places.into_iter().take(limit).map(Place::try_from).collect()
    }
}

impl TryFrom<NominatimPlace> for Place {
    type Error = GeocodeError;

    fn try_from(place: NominatimPlace) -> Result<Self, Self::Error> {
        let parse = |raw: &str| {
            raw.trim()
                .parse::<f64>()
                .map_err(|_| GeocodeError::InvalidCoordinate(raw.to_string()))
        };
        Ok(Place {
            latitude: parse(&place.lat)?,
            longitude: parse(&place.lon)?,
            address: place.display_name,
        })
    }
}

/// Collapses keystroke bursts: only the last call inside a quiet period wins.
#[derive(Debug)]
pub struct SuggestDebouncer {
    quiet: Duration,
    latest: AtomicU64,
}

impl SuggestDebouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet: quiet.max(Duration::from_millis(MIN_SUGGEST_DEBOUNCE_MS)),
            latest: AtomicU64::new(0),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Invalidates any call still waiting out its quiet period.
    pub fn supersede(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    /// Waits out the quiet period. Returns false if a newer call arrived meanwhile.
    pub async fn settle(&self) -> bool {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.quiet).await;
        self.latest.load(Ordering::SeqCst) == ticket
    }
}

/// Address → coordinates, memoized through the TTL cache.
///
/// Single resolutions and suggestion lists live under separate key families,
/// so the same text can be cached both ways without collisions.
#[derive(Clone)]
pub struct LocationResolver {
    geocoder: Arc<dyn Geocoder>,
    cache: TtlCache,
    debouncer: Arc<SuggestDebouncer>,
}

impl LocationResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>, cache: TtlCache, debounce: Duration) -> Self {
        Self {
            geocoder,
            cache,
            debouncer: Arc::new(SuggestDebouncer::new(debounce)),
        }
    }

    pub fn normalize(text: &str) -> String {
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Top match for `address`, or `None` when the provider knows no such place.
    pub async fn resolve(&self, address: &str) -> Result<Option<Place>, GeocodeError> {
        let key = format!("{}{}", GEOCODE_PREFIX, Self::normalize(address));
        if let Some(place) = self.cache.get::<Place>(&key).await {
            return Ok(Some(place));
        }

        let place = self.geocoder.search(address.trim(), 1).await?.into_iter().next();
        match &place {
            Some(place) => self.cache.set_default(&key, place).await,
            None => tracing::debug!("No geocoding match for '{}'", address),
        }
        Ok(place)
    }

    /// Up to five candidates for autocomplete. Inputs shorter than three
    /// characters return nothing without touching cache or network.
    pub async fn suggest(&self, partial: &str) -> Result<Vec<Place>, GeocodeError> {
        let query = partial.trim();
        if query.chars().count() < MIN_SUGGEST_CHARS {
            return Ok(Vec::new());
        }

        let key = format!("{}{}", SUGGEST_PREFIX, Self::normalize(query));
        if let Some(places) = self.cache.get::<Vec<Place>>(&key).await {
            return Ok(places);
        }

        let mut places = self.geocoder.search(query, MAX_SUGGESTIONS).await?;
        places.truncate(MAX_SUGGESTIONS);
        self.cache.set_default(&key, &places).await;
        Ok(places)
    }

    /// Keystroke entry point. Returns `None` when a later keystroke superseded
    /// this one during the quiet period; no request is made in that case.
    pub async fn suggest_debounced(&self, partial: &str) -> Option<Result<Vec<Place>, GeocodeError>> {
        if partial.trim().chars().count() < MIN_SUGGEST_CHARS {
            // Shortening the input still cancels a pending longer query.
            self.debouncer.supersede();
            return Some(Ok(Vec::new()));
        }
        if !self.debouncer.settle().await {
            tracing::debug!("Suggestion for '{}' superseded", partial);
            return None;
        }
        Some(self.suggest(partial).await)
    }
}
