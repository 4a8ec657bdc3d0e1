//! # Airline Demand Library
//!
//! Collects airline flight and pricing data for Australian cities and turns it
//! into market demand figures for hostel operators.
//!
//! Live data comes from AviationStack (schedules) and Amadeus (fares). When no
//! credentials are configured, or a live call fails, a seeded synthetic
//! generator fills in records of the same shape so the analysis pipeline always
//! has something to work with.

pub mod airports;
pub mod amadeus;
pub mod collector;
pub mod config;
pub mod insights;
pub mod mock;
pub mod processor;
pub mod weather;

#[cfg(test)]
pub(crate) mod test_support;

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{info, instrument};

// Re-export main types for convenience
pub use airports::{Airport, Region};
pub use amadeus::AmadeusClient;
pub use collector::FlightCollector;
pub use config::{Config, RetryPolicy};
pub use insights::{generate_hostel_insights, HostelInsights};
pub use mock::MockGenerator;
pub use processor::{AnalysisResult, DataProcessor, MarketOpportunity};
pub use weather::{get_weather_data, WeatherClient, WeatherDay};

/// Error types for the airline demand library
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{service} API error: {status} - {message}")]
    ApiError {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("{0} rate limit exceeded")]
    RateLimited(&'static str),

    #[error("{service} authentication failed: {message}")]
    AuthenticationError {
        service: &'static str,
        message: String,
    },

    #[error("No credentials configured for {0}")]
    MissingCredentials(&'static str),

    #[error("Unknown city or airport: {0}")]
    UnknownCity(String),

    #[error("Invalid date format: {0}")]
    DateParseError(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

/// Inclusive start date plus a number of days; `end()` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub days: u32,
}

impl DateRange {
    pub fn new(start: NaiveDate, days: u32) -> Result<Self, MarketError> {
        if days == 0 {
            return Err(MarketError::InvalidRange(
                "date range must cover at least one day".to_string(),
            ));
        }

        Ok(Self { start, days })
    }

    /// Range beginning on today's local date
    pub fn starting_today(days: u32) -> Result<Self, MarketError> {
        Self::new(Local::now().date_naive(), days)
    }

    /// Parse a start date in YYYY-MM-DD format
    pub fn parse(start: &str, days: u32) -> Result<Self, MarketError> {
        let start = NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d")
            .map_err(|_| MarketError::DateParseError(format!("expected YYYY-MM-DD, got {}", start)))?;
        Self::new(start, days)
    }

    pub fn end(&self) -> NaiveDate {
        self.start + Duration::days(i64::from(self.days))
    }

    pub fn last_day(&self) -> NaiveDate {
        self.end() - Duration::days(1)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..self.days).map(move |offset| start + Duration::days(i64::from(offset)))
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.last_day())
    }
}

/// Normalized flight record shared by every data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub date: NaiveDate,
    pub departure_time: Option<NaiveTime>,
    pub origin: String,                 // IATA code
    pub destination: String,            // IATA code
    pub price: Option<f64>,             // None when the source carries no fares
    pub airline: String,
    pub flight_number: Option<String>,
    pub duration_minutes: Option<u32>,
    pub is_domestic: bool,
}

impl FlightRecord {
    pub fn is_weekend(&self) -> bool {
        matches!(self.date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub fn route(&self) -> (&str, &str) {
        (&self.origin, &self.destination)
    }
}

/// Where a dataset came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Live,
    Mock,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Live => write!(f, "live"),
            DataSource::Mock => write!(f, "mock"),
        }
    }
}

/// Flight records for one city and date range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightDataset {
    pub city_code: String,
    pub range: DateRange,
    pub source: DataSource,
    pub records: Vec<FlightRecord>,
}

/// Market analysis request
#[derive(Debug, Clone)]
pub struct MarketRequest {
    pub city: String,        // City name or IATA code
    pub range: DateRange,
    pub top_routes: usize,
}

impl MarketRequest {
    pub fn new(city: impl Into<String>, range: DateRange) -> Self {
        Self {
            city: city.into(),
            range,
            top_routes: 10,
        }
    }
}

/// Everything a caller needs to render one market view
#[derive(Debug, Clone, Serialize)]
pub struct MarketReport {
    pub city: String,
    pub city_code: String,
    pub range: DateRange,
    pub source: DataSource,
    pub analysis: AnalysisResult,
    pub insights: HostelInsights,
}

/// Main public API function: collect, analyze and summarize one market.
pub async fn analyze_market(config: &Config, request: MarketRequest) -> Result<MarketReport, MarketError> {
    let collector = FlightCollector::new(config.clone())?;
    analyze_market_with(&collector, request).await
}

/// Same as [`analyze_market`] but reuses a collector so its response cache
/// survives across calls.
#[instrument(level = "info", skip(collector, request), fields(city = %request.city, range = %request.range))]
pub async fn analyze_market_with(
    collector: &FlightCollector,
    request: MarketRequest,
) -> Result<MarketReport, MarketError> {
    let airport = airports::resolve_city(&request.city)?;

    let dataset = collector.get_flight_data(airport.code, &request.range).await;
    info!(
        source = %dataset.source,
        records = dataset.records.len(),
        "Flight data ready for analysis"
    );

    let analysis = processor::analyze(&dataset, request.top_routes);
    let insights = generate_hostel_insights(&analysis);

    Ok(MarketReport {
        city: airport.city.to_string(),
        city_code: airport.code.to_string(),
        range: request.range,
        source: dataset.source,
        analysis,
        insights,
    })
}
