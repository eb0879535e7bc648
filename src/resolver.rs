//! Selected candidate -> concrete time zone.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::candidate::Candidate;
use crate::lookup::{GeocodeKey, Geocoder};
use crate::zones::is_known_zone;

/// Final output of a search: a validated IANA identifier, the label shown
/// to the user, and the country (when known) for the flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTimeZone {
    identifier: String,
    label: String,
    country_code: Option<String>,
}

impl ResolvedTimeZone {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// ISO 3166-1 alpha-2, upper case
    pub fn country_code(&self) -> Option<&str> {
        self.country_code.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("could not determine a time zone for \"{label}\"")]
    UnresolvableCandidate { label: String },
}

pub struct CandidateResolver<G> {
    geocoder: G,
}

impl<G: Geocoder> CandidateResolver<G> {
    pub fn new(geocoder: G) -> Self {
        Self { geocoder }
    }

    #[cfg(test)]
    pub fn geocoder(&self) -> &G {
        &self.geocoder
    }

    /// Resolve `candidate`.
    ///
    /// Abbreviations, offsets and cities that already carry an identifier
    /// pass straight through. Other cities are geocoded by locator first,
    /// then by their `"title, subtitle"` label.
    pub async fn resolve(&self, candidate: &Candidate) -> Result<ResolvedTimeZone, ResolveError> {
        let label = candidate.label();
        match candidate {
            Candidate::Abbreviation { identifier, .. }
            | Candidate::UtcOffset { identifier, .. }
            | Candidate::City {
                identifier: Some(identifier),
                ..
            } => pass_through(label, identifier),
            Candidate::City {
                identifier: None,
                locator,
                ..
            } => {
                if !locator.trim().is_empty() {
                    if let Some(resolved) = self.attempt(GeocodeKey::Locator(locator), &label).await {
                        return Ok(resolved);
                    }
                }
                if let Some(resolved) = self.attempt(GeocodeKey::Text(&label), &label).await {
                    return Ok(resolved);
                }
                warn!(label = %label, "every geocoding attempt failed");
                Err(ResolveError::UnresolvableCandidate { label })
            }
        }
    }

    /// One geocoding attempt. Failures of any kind are `None` so the caller
    /// can move on to the next key.
    async fn attempt(&self, key: GeocodeKey<'_>, label: &str) -> Option<ResolvedTimeZone> {
        let placemark = match self.geocoder.geocode(key).await {
            Ok(Some(placemark)) => placemark,
            Ok(None) => {
                debug!(?key, "geocoder found nothing");
                return None;
            }
            Err(err) => {
                debug!(?key, error = %err, "geocoder failed");
                return None;
            }
        };

        let Some(identifier) = placemark.time_zone.filter(|zone| is_known_zone(zone)) else {
            debug!(?key, "geocoder result has no usable time zone");
            return None;
        };

        Some(ResolvedTimeZone {
            identifier,
            label: label.to_string(),
            country_code: placemark.country_code.as_deref().and_then(normalize_country_code),
        })
    }
}

fn pass_through(label: String, identifier: &str) -> Result<ResolvedTimeZone, ResolveError> {
    if !is_known_zone(identifier) {
        warn!(label = %label, identifier, "candidate carries an unknown time zone");
        return Err(ResolveError::UnresolvableCandidate { label });
    }
    Ok(ResolvedTimeZone {
        identifier: identifier.to_string(),
        label,
        country_code: None,
    })
}

fn normalize_country_code(code: &str) -> Option<String> {
    let code = code.trim();
    (code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| code.to_ascii_uppercase())
}
