use crate::lookup::PlaceSuggestion;

/// One selectable search result, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// A place returned by the place-search service. The identifier is
    /// usually absent and has to be geocoded from the locator.
    City {
        title: String,
        subtitle: String,
        identifier: Option<String>,
        locator: String,
    },
    /// A zone abbreviation such as `PST`.
    Abbreviation { title: String, identifier: String },
    /// A typed UTC offset such as `UTC+3`.
    UtcOffset { title: String, identifier: String },
}

impl Candidate {
    pub fn title(&self) -> &str {
        match self {
            Candidate::City { title, .. }
            | Candidate::Abbreviation { title, .. }
            | Candidate::UtcOffset { title, .. } => title,
        }
    }

    /// Secondary line: region/country for cities, the zone otherwise.
    pub fn subtitle(&self) -> &str {
        match self {
            Candidate::City { subtitle, .. } => subtitle,
            Candidate::Abbreviation { identifier, .. } | Candidate::UtcOffset { identifier, .. } => {
                identifier
            }
        }
    }

    #[cfg(test)]
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Candidate::City { identifier, .. } => identifier.as_deref(),
            Candidate::Abbreviation { identifier, .. } | Candidate::UtcOffset { identifier, .. } => {
                Some(identifier)
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Candidate::City { .. } => "city",
            Candidate::Abbreviation { .. } => "abbreviation",
            Candidate::UtcOffset { .. } => "offset",
        }
    }

    /// The caller-visible name: `"title, subtitle"` for cities, the title
    /// for everything else.
    pub fn label(&self) -> String {
        match self {
            Candidate::City { title, subtitle, .. } if !subtitle.trim().is_empty() => {
                format!("{title}, {subtitle}")
            }
            _ => self.title().to_string(),
        }
    }
}

impl From<PlaceSuggestion> for Candidate {
    fn from(place: PlaceSuggestion) -> Self {
        Candidate::City {
            title: place.title,
            subtitle: place.subtitle,
            identifier: None,
            locator: place.locator,
        }
    }
}
