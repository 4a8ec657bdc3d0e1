//! OpenWeather forecast client with synthetic fallback

use crate::collector::{send_with_retry, USER_AGENT};
use crate::config::Config;
use crate::mock::MockGenerator;
use crate::{DateRange, MarketError};
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// One day of forecast weather for a city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherDay {
    pub date: NaiveDate,
    pub city: String,
    pub temp_day: f64,     // °C
    pub temp_night: f64,   // °C
    pub condition: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ForecastResponse {
    #[serde(default)]
    list: Vec<ForecastPoint>,
}

#[derive(Debug, Deserialize)]
struct ForecastPoint {
    dt_txt: String,
    main: ForecastMain,
    #[serde(default)]
    weather: Vec<ForecastCondition>,
}

#[derive(Debug, Deserialize)]
struct ForecastMain {
    temp_min: f64,
    temp_max: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastCondition {
    main: String,
}

#[derive(Default)]
struct DayAccumulator {
    high: Option<f64>,
    low: Option<f64>,
    conditions: BTreeMap<String, usize>,
}

/// Fold 3-hourly forecast points into one entry per day within `range`.
/// Day/night temperatures are the day's max/min; condition is the most frequent one.
pub(crate) fn summarize_forecast(city: &str, response: ForecastResponse, range: &DateRange) -> Vec<WeatherDay> {
    let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();

    for point in response.list {
        let Ok(timestamp) = NaiveDateTime::parse_from_str(&point.dt_txt, "%Y-%m-%d %H:%M:%S") else {
            continue;
        };
        let date = timestamp.date();
        if !range.contains(date) {
            continue;
        }

        let day = days.entry(date).or_default();
        day.high = Some(day.high.map_or(point.main.temp_max, |h| h.max(point.main.temp_max)));
        day.low = Some(day.low.map_or(point.main.temp_min, |l| l.min(point.main.temp_min)));
        if let Some(condition) = point.weather.into_iter().next() {
            *day.conditions.entry(condition.main).or_insert(0) += 1;
        }
    }

    days.into_iter()
        .filter_map(|(date, day)| {
            let (high, low) = (day.high?, day.low?);

            // Ties go to the alphabetically first condition
            let mut condition = "Unknown";
            let mut best = 0;
            for (name, count) in &day.conditions {
                if *count > best {
                    best = *count;
                    condition = name.as_str();
                }
            }

            Some(WeatherDay {
                date,
                city: city.to_string(),
                temp_day: (high * 10.0).round() / 10.0,
                temp_night: (low * 10.0).round() / 10.0,
                condition: condition.to_string(),
            })
        })
        .collect()
}

pub struct WeatherClient {
    config: Config,
    http_client: Client,
}

impl WeatherClient {
    pub fn new(config: Config) -> Result<Self, MarketError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { config, http_client })
    }

    /// Daily forecast for `city` within `range`
    #[instrument(level = "info", skip(self, range))]
    pub async fn forecast(&self, city: &str, range: &DateRange) -> Result<Vec<WeatherDay>, MarketError> {
        let api_key = self
            .config
            .weather_api_key
            .as_deref()
            .ok_or(MarketError::MissingCredentials("Weather API"))?;

        let url = format!("{}/forecast", self.config.weather_url.trim_end_matches('/'));
        let response = send_with_retry("Weather API", &self.config.retry, || {
            self.http_client
                .get(&url)
                .query(&[("q", city), ("units", "metric"), ("appid", api_key)])
        })
        .await?;

        let payload: ForecastResponse = response.json().await?;
        let days = summarize_forecast(city, payload, range);
        info!(days = days.len(), "Weather forecast summarized");
        Ok(days)
    }
}

/// Weather for a city: live forecast when a key is configured, synthetic otherwise
pub async fn get_weather_data(config: &Config, city: &str, range: &DateRange, seed: Option<u64>) -> Vec<WeatherDay> {
    if config.has_weather() {
        match WeatherClient::new(config.clone()) {
            Ok(client) => match client.forecast(city, range).await {
                Ok(days) if !days.is_empty() => return days,
                Ok(_) => warn!(city, "Weather API returned no forecast, using mock weather"),
                Err(e) => warn!(city, error = %e, "Weather API request failed, using mock weather"),
            },
            Err(e) => warn!(error = %e, "Could not build weather client, using mock weather"),
        }
    }

    let mut generator = match seed {
        Some(seed) => MockGenerator::with_seed(seed),
        None => MockGenerator::new(),
    };
    generator.generate_weather(city, range)
}
