/// Offset from `'A'` to REGIONAL INDICATOR SYMBOL LETTER A.
const REGIONAL_INDICATOR_A: u32 = 0x1F1E6;

/// Flag glyph for an ISO 3166-1 alpha-2 country code, e.g. `"DE"` -> 🇩🇪.
///
/// Case-insensitive. Anything that is not exactly two ASCII letters yields
/// `None`.
pub fn emoji(country_code: &str) -> Option<String> {
    let code = country_code.trim();
    if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    code.bytes()
        .map(|b| char::from_u32(REGIONAL_INDICATOR_A + u32::from(b.to_ascii_uppercase() - b'A')))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_flags() {
        assert_eq!(emoji("DE").as_deref(), Some("🇩🇪"));
        assert_eq!(emoji("us").as_deref(), Some("🇺🇸"));
        assert_eq!(emoji(" jp ").as_deref(), Some("🇯🇵"));
    }

    #[test]
    fn test_rejects_malformed_codes() {
        assert_eq!(emoji(""), None);
        assert_eq!(emoji("D"), None);
        assert_eq!(emoji("DEU"), None);
        assert_eq!(emoji("1A"), None);
        assert_eq!(emoji("ÄÖ"), None);
    }
}
