//! Live flight collection with memoized results and synthetic fallback

use crate::airports;
use crate::config::{Config, RetryPolicy};
use crate::mock::MockGenerator;
use crate::{DataSource, DateRange, FlightDataset, FlightRecord, MarketError};
use chrono::{DateTime, NaiveDate};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

pub(crate) const USER_AGENT: &str = concat!("airline-demand/", env!("CARGO_PKG_VERSION"));

/// Send a request, retrying on 429 and transport failures.
///
/// `build` is called once per attempt since a `RequestBuilder` is consumed by `send`.
pub(crate) async fn send_with_retry<F>(
    service: &'static str,
    retry: &RetryPolicy,
    build: F,
) -> Result<Response, MarketError>
where
    F: Fn() -> RequestBuilder,
{
    let attempts = retry.max_attempts.max(1);
    let mut last_error = MarketError::RateLimited(service);

    for attempt in 0..attempts {
        let start_time = Instant::now();
        match build().send().await {
            Ok(response) => {
                let status = response.status();
                debug!(
                    service,
                    attempt,
                    status = %status,
                    duration_ms = start_time.elapsed().as_millis(),
                    "HTTP request completed"
                );

                if status.is_success() {
                    return Ok(response);
                }

                if status == StatusCode::TOO_MANY_REQUESTS {
                    let wait = retry.rate_limit_delay(attempt);
                    last_error = MarketError::RateLimited(service);
                    if attempt + 1 < attempts {
                        warn!(service, wait_secs = wait.as_secs(), "Rate limited, waiting before retry");
                        tokio::time::sleep(wait).await;
                    }
                    continue;
                }

                return Err(api_error(service, response).await);
            }
            Err(e) => {
                error!(service, attempt, error = %e, "API request failed");
                last_error = MarketError::HttpError(e);
                if attempt + 1 < attempts {
                    tokio::time::sleep(retry.transport_delay).await;
                }
            }
        }
    }

    Err(last_error)
}

fn describe_error(detail: &Value) -> Option<String> {
    match detail {
        Value::String(message) => Some(message.clone()),
        Value::Object(fields) => ["message", "info", "detail", "title"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        Value::Array(items) => items.first().and_then(describe_error),
        _ => None,
    }
}

/// The service's own error text from a response body.
/// Handles `{"error": "..."}`, `{"error": {"message"|"info": ...}}`,
/// `{"errors": [{"detail"|"title": ...}]}` and a top-level `message`.
pub(crate) fn error_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };

    match json
        .get("errors")
        .or_else(|| json.get("error"))
        .or_else(|| json.get("message"))
    {
        Some(detail) => describe_error(detail).unwrap_or_else(|| detail.to_string()),
        None => body.to_string(),
    }
}

/// Turn a non-success response into an `ApiError` carrying the service's message
pub(crate) async fn api_error(service: &'static str, response: Response) -> MarketError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);

    error!(service, status = %status, detail = %message, "API returned an error");

    MarketError::ApiError {
        service,
        status: status.as_u16(),
        message,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AviationStackResponse {
    #[serde(default)]
    data: Vec<AviationStackFlight>,
}

#[derive(Debug, Deserialize)]
struct AviationStackFlight {
    flight_date: Option<String>,
    departure: Option<AviationStackEndpoint>,
    arrival: Option<AviationStackEndpoint>,
    airline: Option<AviationStackAirline>,
    flight: Option<AviationStackFlightIdent>,
}

#[derive(Debug, Deserialize)]
struct AviationStackEndpoint {
    iata: Option<String>,
    scheduled: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AviationStackAirline {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AviationStackFlightIdent {
    iata: Option<String>,
}

/// Convert an AviationStack payload into records, dropping entries without
/// airports or a usable date and anything outside `range`.
pub(crate) fn normalize_aviationstack(response: AviationStackResponse, range: &DateRange) -> Vec<FlightRecord> {
    let mut records = Vec::with_capacity(response.data.len());

    for flight in response.data {
        let departure = flight.departure.as_ref();
        let arrival = flight.arrival.as_ref();

        let origin = departure.and_then(|d| d.iata.as_deref()).map(airports::format_airport_code);
        let destination = arrival.and_then(|a| a.iata.as_deref()).map(airports::format_airport_code);
        let (Some(origin), Some(destination)) = (origin, destination) else {
            debug!("Skipping flight without departure/arrival airport");
            continue;
        };
        if origin.is_empty() || destination.is_empty() {
            continue;
        }

        let scheduled_departure = departure
            .and_then(|d| d.scheduled.as_deref())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok());
        let scheduled_arrival = arrival
            .and_then(|a| a.scheduled.as_deref())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok());

        let date = flight
            .flight_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .or_else(|| scheduled_departure.map(|dt| dt.date_naive()));
        let Some(date) = date else {
            debug!(origin = %origin, destination = %destination, "Skipping flight without a date");
            continue;
        };
        if !range.contains(date) {
            continue;
        }

        let duration_minutes = match (scheduled_departure, scheduled_arrival) {
            (Some(dep), Some(arr)) => u32::try_from((arr - dep).num_minutes()).ok().filter(|m| *m > 0),
            _ => None,
        };

        let is_domestic = airports::is_australian(&origin) && airports::is_australian(&destination);

        records.push(FlightRecord {
            date,
            departure_time: scheduled_departure.map(|dt| dt.time()),
            origin,
            destination,
            price: None, // AviationStack carries schedules, not fares
            airline: flight.airline.and_then(|a| a.name).unwrap_or_default(),
            flight_number: flight.flight.and_then(|f| f.iata),
            duration_minutes,
            is_domestic,
        });
    }

    records
}

struct CachedDataset {
    fetched_at: Instant,
    dataset: FlightDataset,
}

/// Flight data collector: live AviationStack data when configured, mock data otherwise
pub struct FlightCollector {
    config: Config,
    http_client: Client,
    cache: Mutex<HashMap<(String, DateRange), CachedDataset>>,
    mock_seed: Option<u64>,
}

impl FlightCollector {
    /// Create a new collector
    pub fn new(config: Config) -> Result<Self, MarketError> {
        debug!("Creating new flight collector");
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            config,
            http_client,
            cache: Mutex::new(HashMap::new()),
            mock_seed: None,
        })
    }

    /// Seed the synthetic fallback so repeated runs produce the same data
    pub fn with_mock_seed(mut self, seed: u64) -> Self {
        self.mock_seed = Some(seed);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch live departures for `city_code` within `range`
    #[instrument(level = "info", skip(self, range), fields(range = %range))]
    pub async fn collect(&self, city_code: &str, range: &DateRange) -> Result<Vec<FlightRecord>, MarketError> {
        let api_key = self
            .config
            .aviationstack_api_key
            .as_deref()
            .ok_or(MarketError::MissingCredentials("AviationStack"))?;

        let url = format!("{}/flights", self.config.aviationstack_url.trim_end_matches('/'));
        info!(url = %url, "Requesting AviationStack flights");

        let response = send_with_retry("AviationStack", &self.config.retry, || {
            self.http_client
                .get(&url)
                .query(&[("access_key", api_key), ("dep_iata", city_code), ("limit", "100")])
        })
        .await?;

        let body = response.text().await?;
        let payload: AviationStackResponse = serde_json::from_str(&body)?;
        let raw_count = payload.data.len();
        let records = normalize_aviationstack(payload, range);

        info!(raw = raw_count, kept = records.len(), "AviationStack flights normalized");
        Ok(records)
    }

    /// Flight data for a city and range: live when possible, synthetic otherwise.
    /// Results are memoized for the configured cache duration.
    #[instrument(level = "info", skip(self, range), fields(range = %range))]
    pub async fn get_flight_data(&self, city_code: &str, range: &DateRange) -> FlightDataset {
        let key = (city_code.to_string(), *range);

        {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.get(&key) {
                if cached.fetched_at.elapsed() < self.config.cache_ttl {
                    debug!(source = %cached.dataset.source, "Serving flight data from cache");
                    return cached.dataset.clone();
                }
            }
        }

        let dataset = self.fetch_or_mock(city_code, range).await;

        let mut cache = self.cache.lock().await;
        let ttl = self.config.cache_ttl;
        let before = cache.len();
        cache.retain(|_, cached| cached.fetched_at.elapsed() < ttl);
        if cache.len() < before {
            debug!(evicted = before - cache.len(), "Evicted stale flight data");
        }
        cache.insert(
            key,
            CachedDataset {
                fetched_at: Instant::now(),
                dataset: dataset.clone(),
            },
        );

        dataset
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }

    async fn fetch_or_mock(&self, city_code: &str, range: &DateRange) -> FlightDataset {
        if self.config.has_aviationstack() {
            match self.collect(city_code, range).await {
                Ok(records) if !records.is_empty() => {
                    return FlightDataset {
                        city_code: city_code.to_string(),
                        range: *range,
                        source: DataSource::Live,
                        records,
                    };
                }
                Ok(_) => warn!("AviationStack returned no usable flights, falling back to mock data"),
                Err(e) => warn!(error = %e, "Live collection failed, falling back to mock data"),
            }
        } else {
            info!("No AviationStack key configured, using mock data");
        }

        let mut generator = match self.mock_seed {
            Some(seed) => MockGenerator::with_seed(seed),
            None => MockGenerator::new(),
        };

        FlightDataset {
            city_code: city_code.to_string(),
            range: *range,
            source: DataSource::Mock,
            records: generator.generate(Some(city_code), range),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{canned, ScriptedServer};
    use std::time::Duration;

    const SAMPLE: &str = r#"{
        "pagination": {"limit": 100, "offset": 0, "count": 4, "total": 4},
        "data": [
            {
                "flight_date": "2024-03-05",
                "flight_status": "scheduled",
                "departure": {"airport": "Kingsford Smith", "iata": "SYD", "scheduled": "2024-03-05T06:00:00+00:00"},
                "arrival": {"airport": "Tullamarine", "iata": "MEL", "scheduled": "2024-03-05T07:35:00+00:00"},
                "airline": {"name": "Qantas", "iata": "QF"},
                "flight": {"number": "401", "iata": "QF401"}
            },
            {
                "flight_date": "2024-03-06",
                "departure": {"iata": "SYD", "scheduled": "2024-03-06T21:10:00+00:00"},
                "arrival": {"iata": "sin", "scheduled": null},
                "airline": {"name": "Singapore Airlines"},
                "flight": {"iata": "SQ222"}
            },
            {
                "flight_date": "2024-04-20",
                "departure": {"iata": "SYD"},
                "arrival": {"iata": "BNE"},
                "airline": {"name": "Virgin Australia"},
                "flight": {"iata": "VA915"}
            },
            {
                "flight_date": "2024-03-05",
                "departure": {"iata": null},
                "arrival": {"iata": "PER"},
                "airline": {"name": "Jetstar"},
                "flight": null
            }
        ]
    }"#;

    fn range() -> DateRange {
        DateRange::parse("2024-03-01", 30).unwrap()
    }

    #[test]
    fn test_normalize_aviationstack() {
        let payload: AviationStackResponse = serde_json::from_str(SAMPLE).unwrap();
        let records = normalize_aviationstack(payload, &range());

        // Out-of-range and airport-less entries are dropped
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.route(), ("SYD", "MEL"));
        assert_eq!(first.airline, "Qantas");
        assert_eq!(first.flight_number.as_deref(), Some("QF401"));
        assert_eq!(first.duration_minutes, Some(95));
        assert_eq!(first.departure_time.unwrap().format("%H:%M").to_string(), "06:00");
        assert!(first.is_domestic);
        assert!(first.price.is_none());

        let second = &records[1];
        assert_eq!(second.destination, "SIN");
        assert!(!second.is_domestic);
        assert_eq!(second.duration_minutes, None);
    }

    #[test]
    fn test_empty_payload() {
        let payload: AviationStackResponse = serde_json::from_str(r#"{"pagination": {}}"#).unwrap();
        assert!(normalize_aviationstack(payload, &range()).is_empty());
    }

    #[tokio::test]
    async fn test_collect_requires_credentials() {
        let collector = FlightCollector::new(Config::default()).unwrap();
        match collector.collect("SYD", &range()).await {
            Err(MarketError::MissingCredentials(service)) => assert_eq!(service, "AviationStack"),
            other => panic!("Expected MissingCredentials, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fallback_without_credentials() {
        let collector = FlightCollector::new(Config::default()).unwrap().with_mock_seed(21);
        let dataset = collector.get_flight_data("SYD", &range()).await;

        assert_eq!(dataset.source, DataSource::Mock);
        assert_eq!(dataset.city_code, "SYD");
        assert!(!dataset.records.is_empty());
        assert!(dataset.records.iter().all(|r| range().contains(r.date)));
    }

    #[tokio::test]
    async fn test_fallback_when_endpoint_unreachable() {
        let config = Config {
            aviationstack_api_key: Some("test-key".to_string()),
            aviationstack_url: "http://127.0.0.1:9".to_string(),
            request_timeout: Duration::from_secs(2),
            retry: RetryPolicy::immediate(2),
            ..Config::default()
        };
        let collector = FlightCollector::new(config).unwrap().with_mock_seed(3);

        assert!(matches!(
            collector.collect("MEL", &range()).await,
            Err(MarketError::HttpError(_))
        ));

        let dataset = collector.get_flight_data("MEL", &range()).await;
        assert_eq!(dataset.source, DataSource::Mock);
        assert!(!dataset.records.is_empty());
    }

    #[tokio::test]
    async fn test_results_are_memoized() {
        // Unseeded: two independent generations would almost surely differ
        let collector = FlightCollector::new(Config::default()).unwrap();
        let first = collector.get_flight_data("BNE", &range()).await;
        let second = collector.get_flight_data("BNE", &range()).await;
        assert_eq!(first.records, second.records);

        collector.clear_cache().await;
        let third = collector.get_flight_data("BNE", &range()).await;
        assert_ne!(first.records, third.records);
    }

    #[tokio::test]
    async fn test_expired_cache_entries_are_refreshed() {
        let config = Config {
            cache_ttl: Duration::ZERO,
            ..Config::default()
        };
        let collector = FlightCollector::new(config).unwrap();
        let first = collector.get_flight_data("CNS", &range()).await;
        let second = collector.get_flight_data("CNS", &range()).await;
        assert_ne!(first.records, second.records);
    }

    fn config_for(server: &ScriptedServer, retry: RetryPolicy) -> Config {
        Config {
            aviationstack_api_key: Some("test-key".to_string()),
            aviationstack_url: server.url.clone(),
            retry,
            ..Config::default()
        }
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error": {"code": "invalid_access_key", "message": "You have not supplied a valid API Access Key."}}"#),
            "You have not supplied a valid API Access Key."
        );
        assert_eq!(error_message(r#"{"error": {"code": 104, "info": "Monthly limit reached"}}"#), "Monthly limit reached");
        assert_eq!(error_message(r#"{"error": "invalid_client"}"#), "invalid_client");
        assert_eq!(
            error_message(r#"{"errors": [{"status": 400, "title": "INVALID FORMAT", "detail": "departureDate is malformed"}]}"#),
            "departureDate is malformed"
        );
        assert_eq!(error_message(r#"{"errors": [{"code": 38189, "title": "Internal error"}]}"#), "Internal error");
        assert_eq!(error_message(r#"{"cod": 401, "message": "Invalid API key"}"#), "Invalid API key");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(error_message(r#"{"status": "down"}"#), r#"{"status": "down"}"#);
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_retries() {
        let server = ScriptedServer::start(vec![canned(429, r#"{"error": "slow down"}"#)]).await;
        let collector = FlightCollector::new(config_for(&server, RetryPolicy::immediate(3))).unwrap();

        match collector.collect("SYD", &range()).await {
            Err(MarketError::RateLimited(service)) => assert_eq!(service, "AviationStack"),
            other => panic!("Expected RateLimited, got {:?}", other),
        }
        assert_eq!(server.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let server = ScriptedServer::start(vec![canned(429, "{}"), canned(200, SAMPLE)]).await;
        let collector = FlightCollector::new(config_for(&server, RetryPolicy::immediate(3))).unwrap();

        let records = collector.collect("SYD", &range()).await.unwrap();
        assert_eq!(records.len(), 2);

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].starts_with("GET /flights?"));
        assert!(requests[1].contains("dep_iata=SYD"));
    }

    #[tokio::test]
    async fn test_no_wait_after_final_attempt() {
        let server = ScriptedServer::start(vec![canned(429, "{}")]).await;
        // First backoff would be one second
        let retry = RetryPolicy {
            max_attempts: 1,
            transport_delay: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
        };
        let collector = FlightCollector::new(config_for(&server, retry)).unwrap();

        let started = Instant::now();
        assert!(matches!(
            collector.collect("SYD", &range()).await,
            Err(MarketError::RateLimited(_))
        ));
        assert!(started.elapsed() < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_api_error_carries_service_message() {
        let body = r#"{"error": {"code": "invalid_access_key", "message": "You have not supplied a valid API Access Key."}}"#;
        let server = ScriptedServer::start(vec![canned(401, body)]).await;
        let collector = FlightCollector::new(config_for(&server, RetryPolicy::immediate(3))).unwrap();

        match collector.collect("SYD", &range()).await {
            Err(MarketError::ApiError { service, status, message }) => {
                assert_eq!(service, "AviationStack");
                assert_eq!(status, 401);
                assert_eq!(message, "You have not supplied a valid API Access Key.");
            }
            other => panic!("Expected ApiError, got {:?}", other),
        }
        // Other statuses are not retried
        assert_eq!(server.requests().len(), 1);

        let dataset = collector.get_flight_data("SYD", &range()).await;
        assert_eq!(dataset.source, DataSource::Mock);
    }

    #[tokio::test]
    async fn test_live_data_is_used_when_available() {
        let server = ScriptedServer::start(vec![canned(200, SAMPLE)]).await;
        let collector = FlightCollector::new(config_for(&server, RetryPolicy::immediate(1))).unwrap();

        let dataset = collector.get_flight_data("SYD", &range()).await;
        assert_eq!(dataset.source, DataSource::Live);
        assert_eq!(dataset.records.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_entries_are_evicted() {
        let config = Config {
            cache_ttl: Duration::from_millis(500),
            ..Config::default()
        };
        let collector = FlightCollector::new(config).unwrap().with_mock_seed(8);
        collector.get_flight_data("SYD", &range()).await;
        collector.get_flight_data("MEL", &range()).await;
        assert_eq!(collector.cache.lock().await.len(), 2);

        tokio::time::sleep(Duration::from_millis(700)).await;
        collector.get_flight_data("PER", &range()).await;

        let cache = collector.cache.lock().await;
        assert_eq!(cache.len(), 1);
        assert!(cache.contains_key(&("PER".to_string(), range())));
    }
}
