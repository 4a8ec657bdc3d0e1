//! Amadeus for Developers client for priced flight offers
//!
//! Authentication uses the OAuth client-credentials flow. The access token is
//! cached until shortly before it expires, and a 401 from the offers endpoint
//! forces one refresh before giving up.

use crate::airports;
use crate::collector::{send_with_retry, USER_AGENT};
use crate::config::Config;
use crate::{FlightRecord, MarketError};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

const SERVICE: &str = "Amadeus";

/// Tokens are treated as expired this long before the server says so
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OffersResponse {
    #[serde(default)]
    data: Vec<FlightOffer>,
    #[serde(default)]
    dictionaries: Option<Dictionaries>,
}

#[derive(Debug, Deserialize)]
struct Dictionaries {
    #[serde(default)]
    carriers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct FlightOffer {
    #[serde(default)]
    itineraries: Vec<Itinerary>,
    price: OfferPrice,
}

#[derive(Debug, Deserialize)]
struct Itinerary {
    duration: Option<String>,
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Segment {
    departure: SegmentEndpoint,
    arrival: SegmentEndpoint,
    carrier_code: String,
    number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SegmentEndpoint {
    iata_code: String,
    at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfferPrice {
    grand_total: Option<String>,
    total: Option<String>,
}

fn iso_duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)D)?T?(?:(\d+)H)?(?:(\d+)M)?$").expect("ISO-8601 duration pattern is valid")
    })
}

/// Parse ISO-8601 durations such as "PT9H10M" or "P1DT2H" into minutes
pub fn parse_iso_duration(value: &str) -> Option<u32> {
    let captures = iso_duration_pattern().captures(value.trim())?;
    // Absent components count as zero; present but oversized ones reject the value
    let part = |i: usize| -> Option<u32> {
        match captures.get(i) {
            Some(m) => m.as_str().parse::<u32>().ok(),
            None => Some(0),
        }
    };

    let minutes = part(1)?
        .checked_mul(24 * 60)?
        .checked_add(part(2)?.checked_mul(60)?)?
        .checked_add(part(3)?)?;
    (minutes > 0).then_some(minutes)
}

/// Convert Amadeus offers into priced records.
/// Origin/destination come from the first and last segment of the outbound itinerary.
pub(crate) fn normalize_offers(response: OffersResponse) -> Vec<FlightRecord> {
    let carriers = response.dictionaries.map(|d| d.carriers).unwrap_or_default();
    let mut records = Vec::with_capacity(response.data.len());

    for offer in response.data {
        let Some(itinerary) = offer.itineraries.first() else {
            continue;
        };
        let (Some(first), Some(last)) = (itinerary.segments.first(), itinerary.segments.last()) else {
            continue;
        };

        let Ok(departure) = NaiveDateTime::parse_from_str(&first.departure.at, "%Y-%m-%dT%H:%M:%S") else {
            warn!(at = %first.departure.at, "Skipping offer with unparseable departure time");
            continue;
        };

        let price = offer
            .price
            .grand_total
            .as_deref()
            .or(offer.price.total.as_deref())
            .and_then(|p| p.parse::<f64>().ok())
            .filter(|p| p.is_finite() && *p >= 0.0);

        let origin = airports::format_airport_code(&first.departure.iata_code);
        let destination = airports::format_airport_code(&last.arrival.iata_code);
        let is_domestic = airports::is_australian(&origin) && airports::is_australian(&destination);

        let airline = carriers
            .get(&first.carrier_code)
            .cloned()
            .unwrap_or_else(|| first.carrier_code.clone());

        records.push(FlightRecord {
            date: departure.date(),
            departure_time: Some(departure.time()),
            origin,
            destination,
            price,
            airline,
            flight_number: Some(format!("{}{}", first.carrier_code, first.number)),
            duration_minutes: itinerary.duration.as_deref().and_then(parse_iso_duration),
            is_domestic,
        });
    }

    records
}

/// Amadeus flight offers client
pub struct AmadeusClient {
    config: Config,
    http_client: Client,
    token: Mutex<Option<AccessToken>>,
}

impl AmadeusClient {
    pub fn new(config: Config) -> Result<Self, MarketError> {
        if !config.has_amadeus() {
            return Err(MarketError::MissingCredentials(SERVICE));
        }

        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            config,
            http_client,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, MarketError> {
        let mut token = self.token.lock().await;
        if let Some(cached) = token.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *token = Some(fresh);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn request_token(&self) -> Result<AccessToken, MarketError> {
        let url = format!("{}/security/oauth2/token", self.config.amadeus_url.trim_end_matches('/'));
        let client_id = self.config.amadeus_api_key.as_deref().unwrap_or_default();
        let client_secret = self.config.amadeus_api_secret.as_deref().unwrap_or_default();

        debug!(url = %url, "Requesting Amadeus access token");
        let response = send_with_retry(SERVICE, &self.config.retry, || {
            self.http_client.post(&url).form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
        })
        .await
        .map_err(|e| match e {
            MarketError::ApiError { message, .. } => MarketError::AuthenticationError {
                service: SERVICE,
                message,
            },
            other => other,
        })?;

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);

        Ok(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }

    /// Search one-adult offers between two airports on `date`
    #[instrument(level = "info", skip(self))]
    pub async fn search_flight_offers(
        &self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> Result<Vec<FlightRecord>, MarketError> {
        let url = format!("{}/shopping/flight-offers", self.config.amadeus_url.trim_end_matches('/'));
        let departure_date = date.format("%Y-%m-%d").to_string();

        let mut refreshed = false;
        loop {
            let token = self.access_token().await?;
            let result = send_with_retry(SERVICE, &self.config.retry, || {
                self.http_client
                    .get(&url)
                    .bearer_auth(&token)
                    .query(&[
                        ("originLocationCode", origin),
                        ("destinationLocationCode", destination),
                        ("departureDate", departure_date.as_str()),
                        ("adults", "1"),
                        ("max", "20"),
                    ])
            })
            .await;

            match result {
                Ok(response) => {
                    let payload: OffersResponse = response.json().await?;
                    let records = normalize_offers(payload);
                    info!(offers = records.len(), "Amadeus offers normalized");
                    return Ok(records);
                }
                Err(MarketError::ApiError { status, .. })
                    if status == StatusCode::UNAUTHORIZED.as_u16() && !refreshed =>
                {
                    warn!("Amadeus token rejected, refreshing");
                    self.invalidate_token().await;
                    refreshed = true;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
