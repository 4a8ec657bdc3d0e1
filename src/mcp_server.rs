// src/mcp_server.rs

use airline_demand::{
    airports::{self, Region},
    analyze_market_with,
    config::Config,
    DateRange, FlightCollector, MarketReport, MarketRequest,
};
use anyhow::Result;
use rmcp::{
    model::{ServerCapabilities, ServerInfo},
    schemars, tool,
    transport::stdio,
    ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_TOP_ROUTES: usize = 10;

/// Market analysis MCP server
#[derive(Clone)]
pub struct MarketServer {
    collector: Arc<FlightCollector>,
}

impl MarketServer {
    pub fn new(collector: FlightCollector) -> Self {
        Self {
            collector: Arc::new(collector),
        }
    }

    /// Initialize logging to file
    fn init_logging() -> Result<()> {
        let log_dir = PathBuf::from("logs");
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = tracing_appender::rolling::daily(&log_dir, "airline-demand-mcp.log");

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info"))
            .add_directive("airline_demand=debug".parse()?);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json(),
            )
            .init();

        info!("Logging initialized - logs will be written to logs/airline-demand-mcp.log.*");
        Ok(())
    }
}

/// Market analysis parameters
#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct AnalyzeMarketParams {
    #[schemars(description = "City name or IATA airport code (e.g., Sydney, MEL)")]
    pub city: String,
    #[schemars(description = "Number of days to analyze (default: 30)")]
    pub days: Option<u32>,
    #[schemars(description = "First day of the range in YYYY-MM-DD format (default: today)")]
    pub start_date: Option<String>,
    #[schemars(description = "Seed for synthetic fallback data, for reproducible results")]
    pub seed: Option<u64>,
    #[schemars(description = "Number of popular routes to return (default: 10)")]
    pub top_routes: Option<usize>,
}

#[derive(Debug, Serialize, Clone)]
pub struct CityInfo {
    pub city: String,
    pub code: String,
    pub region: String,
}

fn build_request(params: &AnalyzeMarketParams, default_days: u32) -> Result<MarketRequest, String> {
    let days = params.days.unwrap_or(default_days);
    let range = match params.start_date.as_deref() {
        Some(start) => DateRange::parse(start, days),
        None => DateRange::starting_today(days),
    }
    .map_err(|e| e.to_string())?;

    let mut request = MarketRequest::new(params.city.clone(), range);
    request.top_routes = params.top_routes.unwrap_or(DEFAULT_TOP_ROUTES);
    Ok(request)
}

fn error_json(message: impl std::fmt::Display) -> String {
    serde_json::json!({ "error": message.to_string() }).to_string()
}

fn format_report_json(report: &MarketReport) -> String {
    serde_json::to_string_pretty(report)
        .unwrap_or_else(|e| error_json(format!("Failed to serialize results: {}", e)))
}

#[tool(tool_box)]
impl MarketServer {
    /// Collect and analyze flight demand for one city
    #[tool(description = "Analyze airline booking demand for an Australian city: popular routes, price trends, seasonal patterns, price distribution, market opportunities and hostel insights. Falls back to synthetic data when no live API credentials are configured.")]
    async fn analyze_market(&self, #[tool(aggr)] params: AnalyzeMarketParams) -> String {
        info!(
            city = params.city,
            days = params.days,
            start_date = params.start_date.as_deref(),
            seed = params.seed,
            "Market analysis request received"
        );

        let request = match build_request(&params, self.collector.config().default_days) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Invalid market analysis parameters");
                return error_json(e);
            }
        };

        // Seeded requests get their own collector so the seed actually applies
        let result = match params.seed {
            Some(seed) => match FlightCollector::new(self.collector.config().clone()) {
                Ok(collector) => analyze_market_with(&collector.with_mock_seed(seed), request).await,
                Err(e) => Err(e),
            },
            None => analyze_market_with(&self.collector, request).await,
        };

        match result {
            Ok(report) => {
                info!(
                    city_code = report.city_code,
                    source = %report.source,
                    flights = report.analysis.cleaned_records,
                    opportunities = report.analysis.opportunities.len(),
                    "Market analysis completed successfully"
                );
                format_report_json(&report)
            }
            Err(e) => {
                error!("Market analysis failed: {}", e);
                error_json(format!("Market analysis failed: {}", e))
            }
        }
    }

    /// List the cities the server knows about
    #[tool(description = "List supported cities with their IATA airport codes and region (australia or international).")]
    async fn list_cities(&self) -> String {
        let cities: Vec<CityInfo> = airports::all_airports()
            .map(|airport| CityInfo {
                city: airport.city.to_string(),
                code: airport.code.to_string(),
                region: match airport.region {
                    Region::Australia => "australia".to_string(),
                    Region::International => "international".to_string(),
                },
            })
            .collect();
        debug!(count = cities.len(), "Listing supported cities");

        serde_json::to_string_pretty(&cities).unwrap_or_else(|e| error_json(e))
    }
}

#[tool(tool_box)]
impl ServerHandler for MarketServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("An airline market demand server for Australian hostel operators. analyze_market returns structured JSON with route popularity, price trends, seasonal patterns, market opportunities and hostel insights. list_cities returns the supported cities.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = MarketServer::init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!("Starting MCP Market Server");

    let config = Config::from_env();
    info!(credentials = ?config.credential_status(), "Configuration loaded");

    let server = MarketServer::new(FlightCollector::new(config)?);
    let transport = stdio();

    let service = server.serve(transport).await?;
    info!("MCP service started, waiting for requests");

    service.waiting().await?;

    info!("MCP service shutting down");
    Ok(())
}
