//! CLI interface for airline-demand

use airline_demand::{
    airports::{self, format_currency, Region},
    analyze_market_with,
    config::Config,
    get_weather_data, AmadeusClient, DateRange, FlightCollector, MarketRequest,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "airline-demand")]
#[command(about = "Airline booking market demand analysis for hostel operators")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze flight demand for a city
    Analyze {
        /// City name or airport code
        #[arg(short, long)]
        city: Option<String>,
        /// Number of days to analyze
        #[arg(short, long)]
        days: Option<u32>,
        /// First day of the range (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        start: Option<String>,
        /// Seed for synthetic data
        #[arg(long)]
        seed: Option<u64>,
        /// Ignore API credentials and use synthetic data only
        #[arg(long)]
        offline: bool,
        /// Number of popular routes to report
        #[arg(long, default_value = "10")]
        top_routes: usize,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<String>,
    },
    /// List supported cities
    Cities,
    /// Show the weather forecast for a city
    Weather {
        /// City name or airport code
        #[arg(short, long)]
        city: String,
        /// Number of days to forecast
        #[arg(short, long, default_value = "5")]
        days: u32,
        /// Seed for synthetic weather
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Search Amadeus flight offers between two airports
    Offers {
        /// Origin airport code or city
        #[arg(short, long)]
        from: String,
        /// Destination airport code or city
        #[arg(short, long)]
        to: String,
        /// Departure date (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,
    },
    /// Show which API credentials are configured
    Keys,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            city,
            days,
            start,
            seed,
            offline,
            top_routes,
            output,
        } => {
            let config = if offline { Config::default() } else { Config::from_env() };
            let city = city.unwrap_or_else(|| config.default_city.clone());
            let days = days.unwrap_or(config.default_days);
            let range = match start {
                Some(start) => DateRange::parse(&start, days)?,
                None => DateRange::starting_today(days)?,
            };

            let mut collector = FlightCollector::new(config)?;
            if let Some(seed) = seed {
                collector = collector.with_mock_seed(seed);
            }

            let mut request = MarketRequest::new(city, range);
            request.top_routes = top_routes;

            println!("Analyzing market...");
            match analyze_market_with(&collector, request).await {
                Ok(report) => {
                    let json = serde_json::to_string_pretty(&report)?;

                    if let Some(output_file) = output {
                        fs::write(&output_file, &json)?;
                        println!("Results saved to {}", output_file);
                    } else {
                        println!("{}", json);
                    }

                    let summary = &report.analysis.summary;
                    println!("\nSummary:");
                    println!("{} ({}), {} [{} data]", report.city, report.city_code, report.range, report.source);
                    println!("Flights analyzed: {}", summary.total_flights);
                    println!("Average price: {}", format_currency(summary.avg_price));
                    if let Some(pct) = summary.domestic_percentage {
                        println!("Domestic share: {:.1}%", pct);
                    }
                    if let Some(route) = report.analysis.popular_routes.first() {
                        println!(
                            "Most popular route: {} -> {} ({} flights)",
                            route.origin, route.destination, route.frequency
                        );
                    }
                    println!("Market opportunities: {}", report.analysis.opportunities.len());
                    if !report.insights.trend_summary.is_empty() {
                        println!("\n{}", report.insights.trend_summary);
                    }
                }
                Err(e) => {
                    eprintln!("Error analyzing market: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Cities => {
            for (title, region) in [("Australia", Region::Australia), ("International", Region::International)] {
                println!("{}:", title);
                for airport in airports::all_airports().filter(|a| a.region == region) {
                    println!("  {:<4} {}", airport.code, airport.city);
                }
            }
        }
        Commands::Weather { city, days, seed } => {
            let config = Config::from_env();
            let range = DateRange::starting_today(days)?;
            let forecast = get_weather_data(&config, &city, &range, seed).await;

            println!("{}", serde_json::to_string_pretty(&forecast)?);
            println!("\nSummary:");
            println!("{} days of weather for {}", forecast.len(), city);
        }
        Commands::Offers { from, to, date } => {
            let origin = airports::resolve_city(&from)?;
            let destination = airports::resolve_city(&to)?;
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")?;

            let client = AmadeusClient::new(Config::from_env())?;
            println!("Searching for offers...");
            match client.search_flight_offers(origin.code, destination.code, date).await {
                Ok(offers) => {
                    println!("{}", serde_json::to_string_pretty(&offers)?);

                    println!("\nSummary:");
                    println!("Found {} offers", offers.len());
                    let cheapest = offers
                        .iter()
                        .filter_map(|o| o.price.map(|p| (o, p)))
                        .min_by(|a, b| a.1.total_cmp(&b.1));
                    if let Some((offer, price)) = cheapest {
                        println!("Cheapest offer: {} - {}", offer.airline, format_currency(Some(price)));
                    }
                }
                Err(e) => {
                    eprintln!("Error searching for offers: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Keys => {
            let config = Config::from_env();
            for (service, configured) in config.credential_status() {
                let status = if configured { "configured" } else { "missing (mock data will be used)" };
                println!("{:<14} {}", service, status);
            }
        }
    }

    Ok(())
}
