//! Open-Meteo geocoding client.
//!
//! One client answers both collaborator roles: `/v1/search` backs place
//! completion and text geocoding, `/v1/get` resolves a locator (the numeric
//! location id handed out by search).

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::config::GeocodingConfig;
use crate::lookup::{GeocodeKey, Geocoder, LookupError, PlaceSearch, PlaceSuggestion, Placemark};

/// How many results a text geocode looks at when matching the region hint.
const TEXT_GEOCODE_CANDIDATES: usize = 10;

const USER_AGENT: &str = concat!("tzpick/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Location>,
}

#[derive(Debug, Clone, Deserialize)]
struct Location {
    id: u64,
    name: String,
    #[serde(default)]
    admin1: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
}

impl Location {
    fn subtitle(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for part in [self.admin1.as_deref(), self.country.as_deref()]
            .into_iter()
            .flatten()
        {
            let part = part.trim();
            if part.is_empty() || part == self.name || parts.contains(&part) {
                continue;
            }
            parts.push(part);
        }
        parts.join(", ")
    }

    fn matches_hint(&self, hint: &str) -> bool {
        if self
            .country_code
            .as_deref()
            .is_some_and(|code| code.eq_ignore_ascii_case(hint))
        {
            return true;
        }
        [self.admin1.as_deref(), self.country.as_deref()]
            .into_iter()
            .flatten()
            .map(str::to_lowercase)
            .any(|field| !field.is_empty() && (field.contains(hint) || hint.contains(&field)))
    }

    fn into_placemark(self) -> Placemark {
        Placemark {
            time_zone: self.timezone,
            country_code: self.country_code,
        }
    }
}

/// Pick the result whose region or country matches any comma-separated
/// part of `hint`, falling back to the top-ranked result.
fn pick_location(locations: Vec<Location>, hint: &str) -> Option<Location> {
    let hints: Vec<String> = hint
        .split(',')
        .map(|part| part.trim().to_lowercase())
        .filter(|part| !part.is_empty())
        .collect();

    if !hints.is_empty() {
        if let Some(index) = locations
            .iter()
            .position(|loc| hints.iter().any(|hint| loc.matches_hint(hint)))
        {
            return locations.into_iter().nth(index);
        }
    }
    locations.into_iter().next()
}

/// HTTP client for the Open-Meteo geocoding API.
pub struct OpenMeteo {
    client: reqwest::Client,
    base_url: String,
    language: String,
    result_limit: usize,
}

impl OpenMeteo {
    pub fn new(config: &GeocodingConfig, result_limit: usize) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            result_limit,
        })
    }

    async fn search(&self, name: &str, count: usize) -> Result<Vec<Location>, LookupError> {
        let url = format!("{}/v1/search", self.base_url);
        let count = count.to_string();
        let response = self
            .client
            .get(url)
            .query(&[
                ("name", name),
                ("count", count.as_str()),
                ("language", self.language.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status));
        }
        let body: SearchResponse = response.json().await?;
        debug!(name, results = body.results.len(), "open-meteo search");
        Ok(body.results)
    }

    async fn get(&self, id: u64) -> Result<Location, LookupError> {
        let url = format!("{}/v1/get", self.base_url);
        let response = self
            .client
            .get(url)
            .query(&[("id", id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status));
        }
        Ok(response.json().await?)
    }
}

impl PlaceSearch for OpenMeteo {
    async fn complete(&self, query: &str) -> Result<Vec<PlaceSuggestion>, LookupError> {
        let locations = self.search(query.trim(), self.result_limit).await?;
        Ok(locations
            .into_iter()
            .map(|loc| PlaceSuggestion {
                subtitle: loc.subtitle(),
                locator: loc.id.to_string(),
                title: loc.name,
            })
            .collect())
    }
}

impl Geocoder for OpenMeteo {
    async fn geocode(&self, key: GeocodeKey<'_>) -> Result<Option<Placemark>, LookupError> {
        match key {
            GeocodeKey::Locator(locator) => {
                let id: u64 = locator
                    .trim()
                    .parse()
                    .map_err(|_| LookupError::InvalidLocator(locator.to_string()))?;
                let location = self.get(id).await?;
                Ok(Some(location.into_placemark()))
            }
            GeocodeKey::Text(text) => {
                let (name, hint) = text.split_once(',').unwrap_or((text, ""));
                let name = name.trim();
                if name.is_empty() {
                    return Ok(None);
                }
                let locations = self.search(name, TEXT_GEOCODE_CANDIDATES).await?;
                Ok(pick_location(locations, hint).map(Location::into_placemark))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BERLIN_SEARCH: &str = r#"{
        "results": [
            {"id": 2950159, "name": "Berlin", "latitude": 52.52437, "longitude": 13.41053,
             "country_code": "DE", "timezone": "Europe/Berlin",
             "country": "Germany", "admin1": "State of Berlin"},
            {"id": 5083330, "name": "Berlin", "latitude": 44.46867, "longitude": -71.18508,
             "country_code": "US", "timezone": "America/New_York",
             "country": "United States", "admin1": "New Hampshire"}
        ],
        "generationtime_ms": 0.9
    }"#;

    fn berlin_results() -> Vec<Location> {
        serde_json::from_str::<SearchResponse>(BERLIN_SEARCH)
            .unwrap()
            .results
    }

    #[test]
    fn test_empty_search_response() {
        let body: SearchResponse = serde_json::from_str(r#"{"generationtime_ms": 0.3}"#).unwrap();
        assert!(body.results.is_empty());
    }

    #[test]
    fn test_subtitle_skips_duplicates() {
        let results = berlin_results();
        assert_eq!(results[0].subtitle(), "State of Berlin, Germany");

        let singapore: Location = serde_json::from_str(
            r#"{"id": 1880252, "name": "Singapore", "admin1": "Singapore",
                "country": "Singapore", "country_code": "SG", "timezone": "Asia/Singapore"}"#,
        )
        .unwrap();
        assert_eq!(singapore.subtitle(), "");
    }

    #[test]
    fn test_pick_location_uses_hint() {
        let picked = pick_location(berlin_results(), " New Hampshire, United States").unwrap();
        assert_eq!(picked.id, 5083330);

        let picked = pick_location(berlin_results(), "State of Berlin, Germany").unwrap();
        assert_eq!(picked.id, 2950159);

        // Unknown hint falls back to the top result
        let picked = pick_location(berlin_results(), "Narnia").unwrap();
        assert_eq!(picked.id, 2950159);

        assert!(pick_location(Vec::new(), "Germany").is_none());
    }

    #[test]
    fn test_placemark_from_location() {
        let placemark = berlin_results().remove(0).into_placemark();
        assert_eq!(placemark.time_zone.as_deref(), Some("Europe/Berlin"));
        assert_eq!(placemark.country_code.as_deref(), Some("DE"));
    }

    #[tokio::test]
    async fn test_invalid_locator_fails_before_request() {
        let client = OpenMeteo::new(&GeocodingConfig::default(), 10).unwrap();
        let err = client
            .geocode(GeocodeKey::Locator("not-a-number"))
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::InvalidLocator(ref l) if l == "not-a-number"));
    }
}
