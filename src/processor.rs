//! Flight data cleaning and market analysis
//!
//! [`DataProcessor`] borrows a record list, builds a cleaned copy, and derives
//! the aggregates a market dashboard needs. Nothing here is persisted: every
//! query recomputes its [`AnalysisResult`] from scratch.

use crate::airports;
use crate::{DataSource, DateRange, FlightDataset, FlightRecord};
use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

pub const DAY_NAMES: [&str; 7] = [
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
];

pub const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

/// Weekend fares must exceed weekday fares by this ratio to count as a premium
const WEEKEND_PREMIUM_RATIO: f64 = 1.3;
/// Max/min monthly route price ratio that counts as seasonal variation
const SEASONAL_VARIATION_RATIO: f64 = 1.5;
const MAX_OPPORTUNITIES_PER_KIND: usize = 5;
const TOP_AIRPORTS: usize = 5;

/// Month name for 1-12
pub fn month_name(month: u32) -> &'static str {
    (month as usize)
        .checked_sub(1)
        .and_then(|i| MONTH_NAMES.get(i))
        .copied()
        .unwrap_or("Unknown")
}

/// Day name for 0 (Monday) to 6 (Sunday)
pub fn day_name(day: u32) -> &'static str {
    DAY_NAMES.get(day as usize).copied().unwrap_or("Unknown")
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Linear-interpolated quantile of already sorted values
fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

fn median(values: &[f64]) -> Option<f64> {
    quantile_sorted(&sorted(values), 0.5)
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

fn priced(records: &[FlightRecord]) -> impl Iterator<Item = (&FlightRecord, f64)> {
    records.iter().filter_map(|r| r.price.map(|p| (r, p)))
}

/// Route popularity entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteFrequency {
    pub origin: String,
    pub destination: String,
    pub frequency: usize,
    pub is_domestic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPrice {
    pub date: NaiveDate,
    pub avg_price: f64,
    pub median_price: f64,
    pub flight_count: usize,
}

/// Prices grouped by ISO week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPrice {
    pub year: i32,
    pub week: u32,
    pub avg_price: f64,
    pub median_price: f64,
    pub flight_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTrends {
    pub daily: Vec<DailyPrice>,
    pub weekly: Vec<WeeklyPrice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStats {
    pub month: u32,
    pub month_name: String,
    pub avg_price: Option<f64>,
    pub median_price: Option<f64>,
    pub flight_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayStats {
    pub day_of_week: u32,   // 0 = Monday
    pub day_name: String,
    pub avg_price: Option<f64>,
    pub median_price: Option<f64>,
    pub flight_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalPatterns {
    pub monthly: Vec<MonthlyStats>,
    pub day_of_week: Vec<WeekdayStats>,
    pub peak_months: Vec<u32>,
    pub peak_travel_periods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std: Option<f64>,
    pub q1: f64,
    pub q3: f64,
}

/// Fare bands: (0, 200], (200, 500], (500, 1000], (1000, inf)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceCategory {
    Budget,
    Economy,
    Premium,
    Luxury,
}

impl PriceCategory {
    pub const ALL: [PriceCategory; 4] = [
        PriceCategory::Budget,
        PriceCategory::Economy,
        PriceCategory::Premium,
        PriceCategory::Luxury,
    ];

    pub fn from_price(price: f64) -> Option<Self> {
        if !price.is_finite() || price <= 0.0 {
            None
        } else if price <= 200.0 {
            Some(PriceCategory::Budget)
        } else if price <= 500.0 {
            Some(PriceCategory::Economy)
        } else if price <= 1000.0 {
            Some(PriceCategory::Premium)
        } else {
            Some(PriceCategory::Luxury)
        }
    }
}

impl fmt::Display for PriceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PriceCategory::Budget => "Budget",
            PriceCategory::Economy => "Economy",
            PriceCategory::Premium => "Premium",
            PriceCategory::Luxury => "Luxury",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: PriceCategory,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDistribution {
    pub stats: PriceStats,
    pub categories: Vec<CategoryCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketOpportunity {
    HighDemandHighPrice {
        origin: String,
        destination: String,
        frequency: usize,
        median_price: f64,
    },
    WeekendPremium {
        origin: String,
        destination: String,
        weekday_price: f64,
        weekend_price: f64,
        price_difference: f64,
    },
    SeasonalVariation {
        origin: String,
        destination: String,
        high_price_month: String,
        low_price_month: String,
        price_ratio: f64,
    },
}

impl MarketOpportunity {
    pub fn description(&self) -> String {
        match self {
            MarketOpportunity::HighDemandHighPrice { .. } => {
                "High demand route with above-average prices".to_string()
            }
            MarketOpportunity::WeekendPremium { .. } => "Significant price premium on weekends".to_string(),
            MarketOpportunity::SeasonalVariation { price_ratio, .. } => {
                format!("Significant seasonal price variation (ratio: {:.2}x)", price_ratio)
            }
        }
    }

    pub fn route(&self) -> (&str, &str) {
        match self {
            MarketOpportunity::HighDemandHighPrice { origin, destination, .. }
            | MarketOpportunity::WeekendPremium { origin, destination, .. }
            | MarketOpportunity::SeasonalVariation { origin, destination, .. } => {
                (origin.as_str(), destination.as_str())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirportCount {
    pub code: String,
    pub city: String,
    pub count: usize,
}

/// Headline figures for a market
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryInsights {
    pub total_flights: usize,
    pub domestic_flights: usize,
    pub international_flights: usize,
    pub domestic_percentage: Option<f64>,
    pub avg_price: Option<f64>,
    pub median_price: Option<f64>,
    pub avg_domestic_price: Option<f64>,
    pub avg_international_price: Option<f64>,
    pub top_origins: Vec<AirportCount>,
    pub top_destinations: Vec<AirportCount>,
    pub busiest_day: Option<String>,
    pub weekend_price_premium: Option<f64>,   // percent
    pub busiest_month: Option<String>,
}

/// All derived aggregates for one city and date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub city_code: String,
    pub range: DateRange,
    pub source: DataSource,
    pub raw_records: usize,
    pub cleaned_records: usize,
    pub popular_routes: Vec<RouteFrequency>,
    pub price_trends: Option<PriceTrends>,
    pub seasonal: Option<SeasonalPatterns>,
    pub price_distribution: Option<PriceDistribution>,
    pub opportunities: Vec<MarketOpportunity>,
    pub summary: SummaryInsights,
}

/// Negative or non-finite fares are treated as missing
fn sanitize_prices(records: &mut [FlightRecord]) {
    for record in records.iter_mut() {
        if let Some(price) = record.price {
            if !price.is_finite() || price < 0.0 {
                warn!(origin = %record.origin, destination = %record.destination, price, "Discarding invalid price");
                record.price = None;
            }
        }
    }
}

/// Missing prices take the route median, then the overall median
fn fill_missing_prices(records: &mut [FlightRecord]) {
    if records.iter().all(|r| r.price.is_some()) {
        return;
    }

    let mut by_route: HashMap<(String, String), Vec<f64>> = HashMap::new();
    let mut all_prices = Vec::new();
    for (record, price) in priced(records) {
        by_route
            .entry((record.origin.clone(), record.destination.clone()))
            .or_default()
            .push(price);
        all_prices.push(price);
    }

    let route_medians: HashMap<(String, String), f64> = by_route
        .into_iter()
        .filter_map(|(route, prices)| median(&prices).map(|m| (route, m)))
        .collect();
    let overall_median = median(&all_prices);

    let mut filled = 0usize;
    for record in records.iter_mut().filter(|r| r.price.is_none()) {
        let key = (record.origin.clone(), record.destination.clone());
        record.price = route_medians.get(&key).copied().or(overall_median);
        if record.price.is_some() {
            filled += 1;
        }
    }
    debug!(filled, "Filled missing prices");
}

/// Keep the first record for each (date, time, origin, destination, airline)
fn drop_duplicates(records: Vec<FlightRecord>) -> Vec<FlightRecord> {
    let mut seen: HashSet<(NaiveDate, Option<NaiveTime>, String, String, String)> = HashSet::new();
    records
        .into_iter()
        .filter(|r| {
            seen.insert((
                r.date,
                r.departure_time,
                r.origin.clone(),
                r.destination.clone(),
                r.airline.clone(),
            ))
        })
        .collect()
}

/// Drop priced records outside Q1 - 1.5*IQR ..= Q3 + 1.5*IQR. Unpriced records are kept.
fn remove_price_outliers(records: Vec<FlightRecord>) -> Vec<FlightRecord> {
    let prices: Vec<f64> = sorted(&priced(&records).map(|(_, p)| p).collect::<Vec<_>>());
    let (Some(q1), Some(q3)) = (quantile_sorted(&prices, 0.25), quantile_sorted(&prices, 0.75)) else {
        return records;
    };

    let iqr = q3 - q1;
    let lower = q1 - 1.5 * iqr;
    let upper = q3 + 1.5 * iqr;

    records
        .into_iter()
        .filter(|r| r.price.map_or(true, |p| p >= lower && p <= upper))
        .collect()
}

fn top_airports<'r>(codes: impl Iterator<Item = &'r str>) -> Vec<AirportCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for code in codes {
        *counts.entry(code).or_insert(0) += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    ranked
        .into_iter()
        .take(TOP_AIRPORTS)
        .map(|(code, count)| AirportCount {
            code: code.to_string(),
            city: airports::city_for_code(code).unwrap_or(code).to_string(),
            count,
        })
        .collect()
}

/// Cleans flight records and runs the market analyses over the cleaned copy
pub struct DataProcessor<'a> {
    raw: &'a [FlightRecord],
    processed: Option<Vec<FlightRecord>>,
}

impl<'a> DataProcessor<'a> {
    pub fn new(raw: &'a [FlightRecord]) -> Self {
        Self { raw, processed: None }
    }

    /// Cleaned records, if `clean` has run
    pub fn processed(&self) -> Option<&[FlightRecord]> {
        self.processed.as_deref()
    }

    fn data(&self, analysis: &'static str) -> Option<&[FlightRecord]> {
        let data = self.processed.as_deref();
        if data.is_none() {
            warn!(analysis, "No processed data available, run clean() first");
        }
        data
    }

    /// Sanitize and fill prices, drop duplicates and price outliers
    pub fn clean(&mut self) -> &mut Self {
        if self.raw.is_empty() {
            warn!("No data to clean");
            self.processed = Some(Vec::new());
            return self;
        }

        let mut records = self.raw.to_vec();
        sanitize_prices(&mut records);
        fill_missing_prices(&mut records);
        let records = remove_price_outliers(drop_duplicates(records));

        info!(raw = self.raw.len(), cleaned = records.len(), "Flight data cleaned");
        self.processed = Some(records);
        self
    }

    /// Most frequent routes, descending; ties keep route order
    pub fn popular_routes(&self, top_n: usize) -> Vec<RouteFrequency> {
        let Some(data) = self.data("popular_routes") else {
            return Vec::new();
        };

        let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
        for record in data {
            *counts.entry(record.route()).or_insert(0) += 1;
        }

        let mut routes: Vec<RouteFrequency> = counts
            .into_iter()
            .map(|((origin, destination), frequency)| RouteFrequency {
                origin: origin.to_string(),
                destination: destination.to_string(),
                frequency,
                is_domestic: airports::is_australian(origin) && airports::is_australian(destination),
            })
            .collect();
        routes.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        routes.truncate(top_n);
        routes
    }

    /// Daily and ISO-weekly price series
    pub fn price_trends(&self) -> Option<PriceTrends> {
        let data = self.data("price_trends")?;

        let mut daily: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
        let mut weekly: BTreeMap<(i32, u32), Vec<f64>> = BTreeMap::new();
        for (record, price) in priced(data) {
            daily.entry(record.date).or_default().push(price);
            let iso = record.date.iso_week();
            weekly.entry((iso.year(), iso.week())).or_default().push(price);
        }

        if daily.is_empty() {
            warn!("No price data available for trend analysis");
            return None;
        }

        let daily = daily
            .into_iter()
            .filter_map(|(date, prices)| {
                Some(DailyPrice {
                    date,
                    avg_price: mean(&prices)?,
                    median_price: median(&prices)?,
                    flight_count: prices.len(),
                })
            })
            .collect();

        let weekly = weekly
            .into_iter()
            .filter_map(|((year, week), prices)| {
                Some(WeeklyPrice {
                    year,
                    week,
                    avg_price: mean(&prices)?,
                    median_price: median(&prices)?,
                    flight_count: prices.len(),
                })
            })
            .collect();

        Some(PriceTrends { daily, weekly })
    }

    /// Monthly and day-of-week volumes and prices, plus the two peak months
    pub fn seasonal_patterns(&self) -> Option<SeasonalPatterns> {
        let data = self.data("seasonal_patterns")?;
        if data.is_empty() {
            warn!("No records available for seasonal analysis");
            return None;
        }

        let mut months: BTreeMap<u32, (usize, Vec<f64>)> = BTreeMap::new();
        let mut weekdays: BTreeMap<u32, (usize, Vec<f64>)> = BTreeMap::new();
        for record in data {
            let month = months.entry(record.date.month()).or_default();
            let day = weekdays
                .entry(record.date.weekday().num_days_from_monday())
                .or_default();
            month.0 += 1;
            day.0 += 1;
            if let Some(price) = record.price {
                month.1.push(price);
                day.1.push(price);
            }
        }

        let monthly: Vec<MonthlyStats> = months
            .into_iter()
            .map(|(month, (flight_count, prices))| MonthlyStats {
                month,
                month_name: month_name(month).to_string(),
                avg_price: mean(&prices),
                median_price: median(&prices),
                flight_count,
            })
            .collect();

        let day_of_week = weekdays
            .into_iter()
            .map(|(day, (flight_count, prices))| WeekdayStats {
                day_of_week: day,
                day_name: day_name(day).to_string(),
                avg_price: mean(&prices),
                median_price: median(&prices),
                flight_count,
            })
            .collect();

        let mut by_volume: Vec<&MonthlyStats> = monthly.iter().collect();
        by_volume.sort_by(|a, b| b.flight_count.cmp(&a.flight_count));
        let peak_months: Vec<u32> = by_volume.iter().take(2).map(|m| m.month).collect();
        let peak_travel_periods = peak_months.iter().map(|m| month_name(*m).to_string()).collect();

        Some(SeasonalPatterns {
            monthly,
            day_of_week,
            peak_months,
            peak_travel_periods,
        })
    }

    /// Summary statistics and fare band counts
    pub fn price_distribution(&self) -> Option<PriceDistribution> {
        let data = self.data("price_distribution")?;
        let prices: Vec<f64> = sorted(&priced(data).map(|(_, p)| p).collect::<Vec<_>>());
        if prices.is_empty() {
            warn!("No price data available for distribution analysis");
            return None;
        }

        let stats = PriceStats {
            min: prices[0],
            max: prices[prices.len() - 1],
            mean: mean(&prices)?,
            median: quantile_sorted(&prices, 0.5)?,
            std: sample_std(&prices),
            q1: quantile_sorted(&prices, 0.25)?,
            q3: quantile_sorted(&prices, 0.75)?,
        };

        let mut categories: Vec<CategoryCount> = PriceCategory::ALL
            .iter()
            .map(|category| CategoryCount {
                category: *category,
                count: prices
                    .iter()
                    .filter(|p| PriceCategory::from_price(**p) == Some(*category))
                    .count(),
            })
            .collect();
        categories.sort_by(|a, b| b.count.cmp(&a.count));

        Some(PriceDistribution { stats, categories })
    }

    /// Routes that look attractive for hostel capacity planning
    pub fn market_opportunities(&self) -> Vec<MarketOpportunity> {
        let Some(data) = self.data("market_opportunities") else {
            return Vec::new();
        };

        let mut opportunities = Vec::new();
        opportunities.extend(high_demand_high_price(data));
        opportunities.extend(weekend_premiums(data));
        opportunities.extend(seasonal_variations(data));

        debug!(count = opportunities.len(), "Market opportunities identified");
        opportunities
    }

    pub fn summary(&self) -> SummaryInsights {
        let Some(data) = self.data("summary") else {
            return SummaryInsights::default();
        };
        if data.is_empty() {
            return SummaryInsights::default();
        }

        let total = data.len();
        let domestic = data.iter().filter(|r| r.is_domestic).count();

        let all_prices: Vec<f64> = priced(data).map(|(_, p)| p).collect();
        let domestic_prices: Vec<f64> = priced(data).filter(|(r, _)| r.is_domestic).map(|(_, p)| p).collect();
        let international_prices: Vec<f64> = priced(data).filter(|(r, _)| !r.is_domestic).map(|(_, p)| p).collect();
        let weekend_prices: Vec<f64> = priced(data).filter(|(r, _)| r.is_weekend()).map(|(_, p)| p).collect();
        let weekday_prices: Vec<f64> = priced(data).filter(|(r, _)| !r.is_weekend()).map(|(_, p)| p).collect();

        let mut day_counts = [0usize; 7];
        let mut month_counts: BTreeMap<u32, usize> = BTreeMap::new();
        for record in data {
            day_counts[record.date.weekday().num_days_from_monday() as usize] += 1;
            *month_counts.entry(record.date.month()).or_insert(0) += 1;
        }

        // First maximum wins so ties resolve to the earlier day/month
        let mut busiest_day = 0;
        for (day, count) in day_counts.iter().enumerate() {
            if *count > day_counts[busiest_day] {
                busiest_day = day;
            }
        }
        let mut busiest_month: Option<(u32, usize)> = None;
        for (month, count) in &month_counts {
            if busiest_month.map_or(true, |(_, best)| *count > best) {
                busiest_month = Some((*month, *count));
            }
        }

        let weekend_price_premium = match (mean(&weekend_prices), mean(&weekday_prices)) {
            (Some(weekend), Some(weekday)) if weekday > 0.0 => Some(round_to((weekend / weekday - 1.0) * 100.0, 1)),
            _ => None,
        };

        SummaryInsights {
            total_flights: total,
            domestic_flights: domestic,
            international_flights: total - domestic,
            domestic_percentage: Some(round_to(domestic as f64 / total as f64 * 100.0, 1)),
            avg_price: mean(&all_prices).map(|v| round_to(v, 2)),
            median_price: median(&all_prices).map(|v| round_to(v, 2)),
            avg_domestic_price: mean(&domestic_prices).map(|v| round_to(v, 2)),
            avg_international_price: mean(&international_prices).map(|v| round_to(v, 2)),
            top_origins: top_airports(data.iter().map(|r| r.origin.as_str())),
            top_destinations: top_airports(data.iter().map(|r| r.destination.as_str())),
            busiest_day: Some(day_name(busiest_day as u32).to_string()),
            weekend_price_premium,
            busiest_month: busiest_month.map(|(m, _)| month_name(m).to_string()),
        }
    }

    /// Clean, then run every analysis
    pub fn run_all(&mut self, city_code: &str, range: DateRange, source: DataSource, top_routes: usize) -> AnalysisResult {
        self.clean();

        AnalysisResult {
            city_code: city_code.to_string(),
            range,
            source,
            raw_records: self.raw.len(),
            cleaned_records: self.processed.as_ref().map_or(0, Vec::len),
            popular_routes: self.popular_routes(top_routes),
            price_trends: self.price_trends(),
            seasonal: self.seasonal_patterns(),
            price_distribution: self.price_distribution(),
            opportunities: self.market_opportunities(),
            summary: self.summary(),
        }
    }
}

/// Analyze a collected dataset
pub fn analyze(dataset: &FlightDataset, top_routes: usize) -> AnalysisResult {
    DataProcessor::new(&dataset.records).run_all(&dataset.city_code, dataset.range, dataset.source, top_routes)
}

/// Busier-than-median routes whose median fare is above the median of those routes
fn high_demand_high_price(data: &[FlightRecord]) -> Vec<MarketOpportunity> {
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    let mut prices: BTreeMap<(&str, &str), Vec<f64>> = BTreeMap::new();
    for record in data {
        *counts.entry(record.route()).or_insert(0) += 1;
        if let Some(price) = record.price {
            prices.entry(record.route()).or_default().push(price);
        }
    }

    let frequencies: Vec<f64> = counts.values().map(|c| *c as f64).collect();
    let Some(median_frequency) = median(&frequencies) else {
        return Vec::new();
    };

    let high_demand: Vec<((&str, &str), usize, f64)> = counts
        .iter()
        .filter(|(_, count)| **count as f64 > median_frequency)
        .filter_map(|(route, count)| {
            let route_median = prices.get(route).and_then(|p| median(p))?;
            Some((*route, *count, route_median))
        })
        .collect();

    let route_medians: Vec<f64> = high_demand.iter().map(|(_, _, price)| *price).collect();
    let Some(price_threshold) = median(&route_medians) else {
        return Vec::new();
    };

    high_demand
        .into_iter()
        .filter(|(_, _, price)| *price > price_threshold)
        .take(MAX_OPPORTUNITIES_PER_KIND)
        .map(|((origin, destination), frequency, median_price)| MarketOpportunity::HighDemandHighPrice {
            origin: origin.to_string(),
            destination: destination.to_string(),
            frequency,
            median_price,
        })
        .collect()
}

/// Routes whose weekend median fare beats the weekday median by the premium ratio
fn weekend_premiums(data: &[FlightRecord]) -> Vec<MarketOpportunity> {
    let mut split: BTreeMap<(&str, &str), (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for (record, price) in priced(data) {
        let entry = split.entry(record.route()).or_default();
        if record.is_weekend() {
            entry.1.push(price);
        } else {
            entry.0.push(price);
        }
    }

    let mut premiums: Vec<(&str, &str, f64, f64)> = split
        .into_iter()
        .filter_map(|((origin, destination), (weekday, weekend))| {
            let weekday_price = median(&weekday)?;
            let weekend_price = median(&weekend)?;
            (weekday_price > 0.0 && weekend_price / weekday_price > WEEKEND_PREMIUM_RATIO)
                .then_some((origin, destination, weekday_price, weekend_price))
        })
        .collect();
    premiums.sort_by(|a, b| (b.3 - b.2).total_cmp(&(a.3 - a.2)));

    premiums
        .into_iter()
        .take(MAX_OPPORTUNITIES_PER_KIND)
        .map(|(origin, destination, weekday_price, weekend_price)| MarketOpportunity::WeekendPremium {
            origin: origin.to_string(),
            destination: destination.to_string(),
            weekday_price,
            weekend_price,
            price_difference: weekend_price - weekday_price,
        })
        .collect()
}

/// Per origin, compare monthly route medians and flag wide max/min spreads
fn seasonal_variations(data: &[FlightRecord]) -> Vec<MarketOpportunity> {
    let mut monthly: BTreeMap<(&str, &str, u32), Vec<f64>> = BTreeMap::new();
    for (record, price) in priced(data) {
        monthly
            .entry((record.origin.as_str(), record.destination.as_str(), record.date.month()))
            .or_default()
            .push(price);
    }

    let mut by_origin: BTreeMap<&str, Vec<(&str, u32, f64)>> = BTreeMap::new();
    for ((origin, destination, month), prices) in &monthly {
        if let Some(m) = median(prices) {
            by_origin.entry(*origin).or_default().push((*destination, *month, m));
        }
    }

    let mut variations = Vec::new();
    for (origin, rows) in by_origin {
        if rows.len() < 2 {
            continue;
        }

        let mut highest = rows[0];
        let mut lowest = rows[0];
        for row in &rows[1..] {
            if row.2 > highest.2 {
                highest = *row;
            }
            if row.2 < lowest.2 {
                lowest = *row;
            }
        }

        let price_ratio = if lowest.2 > 0.0 { highest.2 / lowest.2 } else { 1.0 };
        if price_ratio > SEASONAL_VARIATION_RATIO {
            variations.push(MarketOpportunity::SeasonalVariation {
                origin: origin.to_string(),
                destination: highest.0.to_string(),
                high_price_month: month_name(highest.1).to_string(),
                low_price_month: month_name(lowest.1).to_string(),
                price_ratio: round_to(price_ratio, 2),
            });
        }
    }

    variations
}
