//! Airport catalog and small formatting helpers

use crate::MarketError;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Australia,
    International,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Airport {
    pub city: &'static str,
    pub code: &'static str,    // IATA code
    pub region: Region,
}

const fn australian(city: &'static str, code: &'static str) -> Airport {
    Airport { city, code, region: Region::Australia }
}

const fn international(city: &'static str, code: &'static str) -> Airport {
    Airport { city, code, region: Region::International }
}

pub const AUSTRALIAN_AIRPORTS: &[Airport] = &[
    australian("Sydney", "SYD"),
    australian("Melbourne", "MEL"),
    australian("Brisbane", "BNE"),
    australian("Perth", "PER"),
    australian("Adelaide", "ADL"),
    australian("Darwin", "DRW"),
    australian("Gold Coast", "OOL"),
    australian("Cairns", "CNS"),
    australian("Canberra", "CBR"),
    australian("Hobart", "HBA"),
];

/// Popular international destinations from Australia
pub const INTERNATIONAL_AIRPORTS: &[Airport] = &[
    international("Auckland", "AKL"),
    international("Singapore", "SIN"),
    international("Bali", "DPS"),
    international("Tokyo", "HND"),
    international("Hong Kong", "HKG"),
    international("Los Angeles", "LAX"),
    international("London", "LHR"),
    international("Dubai", "DXB"),
    international("Bangkok", "BKK"),
    international("Kuala Lumpur", "KUL"),
];

pub fn all_airports() -> impl Iterator<Item = &'static Airport> {
    AUSTRALIAN_AIRPORTS.iter().chain(INTERNATIONAL_AIRPORTS.iter())
}

/// Look up an airport by city name or IATA code, case-insensitively
pub fn resolve_city(query: &str) -> Result<&'static Airport, MarketError> {
    let needle = query.trim();
    all_airports()
        .find(|a| a.code.eq_ignore_ascii_case(needle) || a.city.eq_ignore_ascii_case(needle))
        .ok_or_else(|| MarketError::UnknownCity(query.to_string()))
}

pub fn is_australian(code: &str) -> bool {
    AUSTRALIAN_AIRPORTS.iter().any(|a| a.code == code)
}

pub fn city_for_code(code: &str) -> Option<&'static str> {
    all_airports().find(|a| a.code == code).map(|a| a.city)
}

/// Trim and uppercase an airport code. Malformed codes are logged, not rejected.
pub fn format_airport_code(code: &str) -> String {
    let formatted = code.trim().to_uppercase();

    if !formatted.is_empty()
        && (formatted.len() != 3 || !formatted.chars().all(|c| c.is_ascii_alphabetic()))
    {
        warn!(code = %code, "Invalid airport code");
    }

    formatted
}

fn airport_name_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // "Sydney Airport" -> "Sydney"
            Regex::new(r"^([A-Za-z\s]+)(?:\sAirport|\sInternational|\sDomestic)")
                .expect("airport suffix pattern is valid"),
            // "Sydney (SYD)" -> "Sydney"
            Regex::new(r"^([A-Za-z\s]+)\s\(").expect("parenthesised code pattern is valid"),
        ]
    })
}

fn parenthesised() -> &'static Regex {
    static PAREN: OnceLock<Regex> = OnceLock::new();
    PAREN.get_or_init(|| Regex::new(r"\s*\([^)]*\)").expect("parenthesis pattern is valid"))
}

/// Extract the city from an airport display name, e.g. "Sydney Airport (SYD)" -> "Sydney"
pub fn extract_city_name(airport_name: &str) -> String {
    if airport_name.is_empty() {
        return String::new();
    }

    for pattern in airport_name_patterns() {
        if let Some(city) = pattern.captures(airport_name).and_then(|c| c.get(1)) {
            return city.as_str().trim().to_string();
        }
    }

    let mut result = airport_name.to_string();
    for suffix in [" Airport", " International", " Domestic", " Regional"] {
        result = result.replace(suffix, "");
    }

    parenthesised().replace_all(&result, "").trim().to_string()
}

/// Format an amount as dollars with thousands separators, or "N/A"
pub fn format_currency(value: Option<f64>) -> String {
    let Some(amount) = value.filter(|v| v.is_finite()) else {
        return "N/A".to_string();
    };

    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, cents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_sizes() {
        assert_eq!(AUSTRALIAN_AIRPORTS.len(), 10);
        assert_eq!(INTERNATIONAL_AIRPORTS.len(), 10);
        assert_eq!(all_airports().count(), 20);
    }

    #[test]
    fn test_resolve_city() {
        assert_eq!(resolve_city("Sydney").unwrap().code, "SYD");
        assert_eq!(resolve_city("gold coast").unwrap().code, "OOL");
        assert_eq!(resolve_city(" per ").unwrap().city, "Perth");
        assert_eq!(resolve_city("HND").unwrap().region, Region::International);

        match resolve_city("Atlantis") {
            Err(MarketError::UnknownCity(city)) => assert_eq!(city, "Atlantis"),
            other => panic!("Expected UnknownCity, got {:?}", other),
        }
    }

    #[test]
    fn test_region_lookups() {
        assert!(is_australian("MEL"));
        assert!(!is_australian("LAX"));
        assert!(!is_australian("mel"));
        assert_eq!(city_for_code("DPS"), Some("Bali"));
        assert_eq!(city_for_code("JFK"), None);
    }

    #[test]
    fn test_format_airport_code() {
        assert_eq!(format_airport_code(" syd "), "SYD");
        assert_eq!(format_airport_code("ysSy"), "YSSY");
        assert_eq!(format_airport_code(""), "");
    }

    #[test]
    fn test_extract_city_name() {
        assert_eq!(extract_city_name("Sydney Airport (SYD)"), "Sydney");
        assert_eq!(extract_city_name("Melbourne International"), "Melbourne");
        assert_eq!(extract_city_name("Perth (PER)"), "Perth");
        assert_eq!(extract_city_name("Gold Coast Airport"), "Gold Coast");
        assert_eq!(extract_city_name("Kingsford Smith"), "Kingsford Smith");
        assert_eq!(extract_city_name("Cairns-Regional (CNS)"), "Cairns-Regional");
        assert_eq!(extract_city_name(""), "");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(Some(1234.5)), "$1,234.50");
        assert_eq!(format_currency(Some(999.999)), "$1,000.00");
        assert_eq!(format_currency(Some(12.0)), "$12.00");
        assert_eq!(format_currency(Some(1_000_000.0)), "$1,000,000.00");
        assert_eq!(format_currency(Some(-250.0)), "-$250.00");
        assert_eq!(format_currency(None), "N/A");
        assert_eq!(format_currency(Some(f64::NAN)), "N/A");
    }
}
