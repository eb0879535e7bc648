//! Place-search and geocoding collaborators.
//!
//! This module provides:
//! - `PlaceSearch` and `Geocoder` traits the search core is written against
//! - `OpenMeteo`, an HTTP implementation of both
//! - the payload types exchanged with them

pub mod open_meteo;

use std::future::Future;

use thiserror::Error;

pub use open_meteo::OpenMeteo;

/// One place-search completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceSuggestion {
    /// Place name
    pub title: String,
    /// Region and/or country
    pub subtitle: String,
    /// Opaque handle that the geocoder can resolve later
    pub locator: String,
}

/// What a geocoder knows about a place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placemark {
    pub time_zone: Option<String>,
    pub country_code: Option<String>,
}

/// Key for a geocoding lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeocodeKey<'a> {
    /// A locator previously handed out by place search
    Locator(&'a str),
    /// Free text, e.g. `"Berlin, Germany"`
    Text(&'a str),
}

/// Transient lookup failure. Callers recover from these locally.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("lookup service answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("invalid locator `{0}`")]
    InvalidLocator(String),
}

/// Free-text place completion.
pub trait PlaceSearch: Send + Sync {
    /// Ordered suggestions for `query`, most relevant first.
    fn complete(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<PlaceSuggestion>, LookupError>> + Send;
}

/// Place -> time zone and country.
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` means the lookup worked but found nothing.
    fn geocode(
        &self,
        key: GeocodeKey<'_>,
    ) -> impl Future<Output = Result<Option<Placemark>, LookupError>> + Send;
}
