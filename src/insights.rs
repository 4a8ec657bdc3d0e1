//! Rule-based hostel market insights derived from an analysis

use crate::processor::{AnalysisResult, MarketOpportunity};
use serde::{Deserialize, Serialize};
use tracing::debug;

const DOMINANT_DOMESTIC_PERCENTAGE: f64 = 70.0;
const OBSERVED_ROUTES: usize = 5;
const RECOMMENDED_OPPORTUNITIES: usize = 3;

const SHOULDER_SEASON_STRATEGY: &str =
    "Consider offering package deals with local attractions during shoulder seasons to boost occupancy rates.";

/// Narrative insights for hostel operators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostelInsights {
    pub trend_summary: String,
    pub market_observations: Vec<String>,
    pub hostel_recommendations: Vec<String>,
    pub seasonal_strategies: Vec<String>,
}

/// Turn an analysis into plain-language insights. Sections with no backing data stay empty.
pub fn generate_hostel_insights(analysis: &AnalysisResult) -> HostelInsights {
    let summary = &analysis.summary;
    let mut trend_summary = String::new();

    if let Some(pct) = summary.domestic_percentage {
        if pct > DOMINANT_DOMESTIC_PERCENTAGE {
            trend_summary.push_str(&format!(
                "The market is predominantly domestic ({:.1}% of flights), suggesting strong intra-Australian travel demand. ",
                pct
            ));
        } else {
            trend_summary.push_str(&format!(
                "There's a healthy mix of domestic ({:.1}%) and international flights, indicating diverse travel patterns. ",
                pct
            ));
        }
    }

    if let (Some(day), Some(month)) = (&summary.busiest_day, &summary.busiest_month) {
        trend_summary.push_str(&format!(
            "{} is the most popular day for flights, and {} shows the highest travel activity. ",
            day, month
        ));
    }

    if let Some(premium) = summary.weekend_price_premium {
        trend_summary.push_str(&format!(
            "Weekend flights command a {:.1}% price premium over weekday flights. ",
            premium
        ));
    }

    let market_observations = analysis
        .popular_routes
        .iter()
        .take(OBSERVED_ROUTES)
        .map(|route| {
            format!(
                "High demand observed between {} and {}, suggesting strong traveler interest in this route.",
                route.origin, route.destination
            )
        })
        .collect();

    // Weekend premiums count toward the limit but carry no hostel recommendation
    let hostel_recommendations = analysis
        .opportunities
        .iter()
        .take(RECOMMENDED_OPPORTUNITIES)
        .filter_map(|opportunity| match opportunity {
            MarketOpportunity::HighDemandHighPrice { destination, .. } => Some(format!(
                "Consider expanding hostel capacity near {} airport due to high demand and premium pricing in this market.",
                destination
            )),
            MarketOpportunity::SeasonalVariation {
                destination,
                high_price_month,
                ..
            } => Some(format!(
                "Implement dynamic pricing for hostels near {} during {} to capitalize on peak travel season pricing.",
                destination, high_price_month
            )),
            MarketOpportunity::WeekendPremium { .. } => None,
        })
        .collect();

    let mut seasonal_strategies = Vec::new();
    if let Some(seasonal) = &analysis.seasonal {
        for month in &seasonal.peak_travel_periods {
            seasonal_strategies.push(format!(
                "Increase hostel capacity and rates during {}, which shows significantly higher travel volume.",
                month
            ));
        }
        seasonal_strategies.push(SHOULDER_SEASON_STRATEGY.to_string());
    }

    let insights = HostelInsights {
        trend_summary: trend_summary.trim_end().to_string(),
        market_observations,
        hostel_recommendations,
        seasonal_strategies,
    };
    debug!(
        observations = insights.market_observations.len(),
        recommendations = insights.hostel_recommendations.len(),
        "Hostel insights generated"
    );
    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{RouteFrequency, SeasonalPatterns, SummaryInsights};
    use crate::{DataSource, DateRange};

    fn empty_analysis() -> AnalysisResult {
        AnalysisResult {
            city_code: "SYD".to_string(),
            range: DateRange::parse("2024-01-01", 30).unwrap(),
            source: DataSource::Mock,
            raw_records: 0,
            cleaned_records: 0,
            popular_routes: Vec::new(),
            price_trends: None,
            seasonal: None,
            price_distribution: None,
            opportunities: Vec::new(),
            summary: SummaryInsights::default(),
        }
    }

    fn route(origin: &str, destination: &str, frequency: usize) -> RouteFrequency {
        RouteFrequency {
            origin: origin.to_string(),
            destination: destination.to_string(),
            frequency,
            is_domestic: true,
        }
    }

    #[test]
    fn test_empty_analysis_gives_empty_insights() {
        assert_eq!(generate_hostel_insights(&empty_analysis()), HostelInsights::default());
    }

    #[test]
    fn test_trend_summary() {
        let mut analysis = empty_analysis();
        analysis.summary.domestic_percentage = Some(82.4);
        analysis.summary.busiest_day = Some("Friday".to_string());
        analysis.summary.busiest_month = Some("December".to_string());
        analysis.summary.weekend_price_premium = Some(18.0);

        let insights = generate_hostel_insights(&analysis);
        assert_eq!(
            insights.trend_summary,
            "The market is predominantly domestic (82.4% of flights), suggesting strong intra-Australian travel demand. \
             Friday is the most popular day for flights, and December shows the highest travel activity. \
             Weekend flights command a 18.0% price premium over weekday flights."
        );

        analysis.summary.domestic_percentage = Some(70.0);
        analysis.summary.weekend_price_premium = None;
        let insights = generate_hostel_insights(&analysis);
        assert!(insights
            .trend_summary
            .starts_with("There's a healthy mix of domestic (70.0%) and international flights"));
        assert!(!insights.trend_summary.contains("Weekend flights"));
    }

    #[test]
    fn test_market_observations_use_top_five_routes() {
        let mut analysis = empty_analysis();
        analysis.popular_routes = ["MEL", "BNE", "PER", "ADL", "OOL", "CNS"]
            .iter()
            .enumerate()
            .map(|(i, dest)| route("SYD", dest, 10 - i))
            .collect();

        let insights = generate_hostel_insights(&analysis);
        assert_eq!(insights.market_observations.len(), 5);
        assert_eq!(
            insights.market_observations[0],
            "High demand observed between SYD and MEL, suggesting strong traveler interest in this route."
        );
        assert!(insights.market_observations.iter().all(|o| !o.contains("CNS")));
    }

    #[test]
    fn test_recommendations_from_first_three_opportunities() {
        let mut analysis = empty_analysis();
        analysis.opportunities = vec![
            MarketOpportunity::WeekendPremium {
                origin: "SYD".to_string(),
                destination: "OOL".to_string(),
                weekday_price: 200.0,
                weekend_price: 300.0,
                price_difference: 100.0,
            },
            MarketOpportunity::HighDemandHighPrice {
                origin: "SYD".to_string(),
                destination: "MEL".to_string(),
                frequency: 40,
                median_price: 310.0,
            },
            MarketOpportunity::SeasonalVariation {
                origin: "SYD".to_string(),
                destination: "CNS".to_string(),
                high_price_month: "July".to_string(),
                low_price_month: "February".to_string(),
                price_ratio: 1.8,
            },
            MarketOpportunity::HighDemandHighPrice {
                origin: "SYD".to_string(),
                destination: "PER".to_string(),
                frequency: 30,
                median_price: 450.0,
            },
        ];

        let insights = generate_hostel_insights(&analysis);
        assert_eq!(
            insights.hostel_recommendations,
            vec![
                "Consider expanding hostel capacity near MEL airport due to high demand and premium pricing in this market.",
                "Implement dynamic pricing for hostels near CNS during July to capitalize on peak travel season pricing.",
            ]
        );
    }

    #[test]
    fn test_seasonal_strategies() {
        let mut analysis = empty_analysis();
        analysis.seasonal = Some(SeasonalPatterns {
            monthly: Vec::new(),
            day_of_week: Vec::new(),
            peak_months: vec![12, 1],
            peak_travel_periods: vec!["December".to_string(), "January".to_string()],
        });

        let insights = generate_hostel_insights(&analysis);
        assert_eq!(insights.seasonal_strategies.len(), 3);
        assert_eq!(
            insights.seasonal_strategies[0],
            "Increase hostel capacity and rates during December, which shows significantly higher travel volume."
        );
        assert_eq!(insights.seasonal_strategies[2], SHOULDER_SEASON_STRATEGY);
    }
}
