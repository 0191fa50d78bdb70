use chrono::{Datelike, Utc};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

use temperature_anomaly_service::analysis::comparison::{compare_trends, TrendSortKey};
use temperature_anomaly_service::analysis::profile::{seasonal_profile, summarize_city};
use temperature_anomaly_service::analysis::{AnalysisSnapshot, DEFAULT_WINDOW};
use temperature_anomaly_service::fetcher::{OpenWeatherFetcher, DEFAULT_ENDPOINT};
use temperature_anomaly_service::importers::CsvImporter;
use temperature_anomaly_service::models::Season;
use temperature_anomaly_service::services::{FetchMode, MonitoringService};

#[derive(Parser)]
#[command(name = "temperature-report")]
#[command(about = "Analyse a temperature history CSV and optionally check live readings", long_about = None)]
struct Cli {
    /// CSV file with city, timestamp and temperature columns
    #[arg(long)]
    file: PathBuf,

    /// Rolling window width in observations
    #[arg(long, default_value_t = DEFAULT_WINDOW)]
    window: usize,

    /// Print a detailed summary for this city
    #[arg(long)]
    city: Option<String>,

    /// Fetch current weather for every city and score it
    #[arg(long)]
    live: bool,

    /// Issue live fetches concurrently instead of one after another
    #[arg(long)]
    concurrent: bool,

    /// Maximum in-flight live fetches in concurrent mode
    #[arg(long, default_value = "5")]
    parallel: usize,

    /// Month (1-12) whose season is the live baseline (default: current month)
    #[arg(long)]
    month: Option<u32>,

    /// OpenWeatherMap API key
    #[arg(long, env = "OPENWEATHER_API_KEY")]
    api_key: Option<String>,

    /// Current-weather endpoint
    #[arg(long, env = "OPENWEATHER_URL", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// ISO country code appended to every city query
    #[arg(long, env = "OPENWEATHER_COUNTRY_CODE")]
    country_code: Option<String>,

    /// Per-request timeout for live fetches, in seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value = "10")]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!("Analysing {}...", cli.file.display()));

    let started = Instant::now();
    let file = cli.file.clone();
    let history = tokio::task::spawn_blocking(move || CsvImporter::new(file).import()).await??;
    let snapshot = AnalysisSnapshot::build(history, cli.window)?;

    let summary = snapshot.summary();
    pb.finish_with_message(format!(
        "✓ {} observations across {} cities in {:.2?}",
        summary.total_observations,
        summary.cities.len(),
        started.elapsed()
    ));

    print_trends(&snapshot);

    if let Some(city) = &cli.city {
        print_city(&snapshot, city);
    }

    if cli.live {
        let api_key = cli
            .api_key
            .clone()
            .ok_or("--live needs an API key (--api-key or OPENWEATHER_API_KEY)")?;
        run_live(&cli, &snapshot, api_key).await?;
    }

    Ok(())
}

fn print_trends(snapshot: &AnalysisSnapshot) {
    let comparison = compare_trends(snapshot.trends(), TrendSortKey::Slope, false);

    println!();
    println!(
        "{:<20} {:>12} {:>10} {:>10}  {}",
        "City", "°C/year", "Avg °C", "Range °C", "Classification"
    );
    for trend in &comparison.trends {
        println!(
            "{:<20} {:>12.4} {:>10.2} {:>10.2}  {}",
            trend.city,
            trend.trend_slope,
            trend.avg_temperature,
            trend.temperature_range,
            trend.trend_class
        );
    }
    for excluded in &comparison.excluded {
        println!(
            "{:<20} excluded: {} distinct year(s)",
            excluded.city, excluded.distinct_years
        );
    }

    if let Some(stats) = &comparison.stats {
        println!();
        println!("Mean slope:        {:+.4} °C/year", stats.mean_slope);
        println!(
            "Strongest warming: {} ({:+.4})",
            stats.strongest_warming.city, stats.strongest_warming.value
        );
        println!(
            "Strongest cooling: {} ({:+.4})",
            stats.strongest_cooling.city, stats.strongest_cooling.value
        );
        println!(
            "Hottest city:      {} ({:.2} °C)",
            stats.hottest_city.city, stats.hottest_city.value
        );
    }
}

fn print_city(snapshot: &AnalysisSnapshot, city: &str) {
    let Some(rows) = snapshot.city_rows(city) else {
        eprintln!("City {city} is not in the dataset");
        return;
    };
    let Some(summary) = summarize_city(rows) else {
        return;
    };

    println!();
    println!("== {} ==", summary.city);
    println!(
        "{} observations, {} to {}",
        summary.observations, summary.first_timestamp, summary.last_timestamp
    );
    println!(
        "Mean {:.2} °C, min {:.2} °C, max {:.2} °C",
        summary.mean_temperature, summary.min_temperature, summary.max_temperature
    );
    println!(
        "Anomalies: {} ({} above, {} below)",
        summary.total_anomalies, summary.positive_anomalies, summary.negative_anomalies
    );
    for count in &summary.anomalies_by_season {
        println!("  {:<8} {}", count.season, count.count);
    }

    println!(
        "{:<8} {:>6} {:>8} {:>8} {:>8} {:>8}",
        "Season", "Count", "Mean", "Q1", "Median", "Q3"
    );
    for profile in seasonal_profile(rows) {
        println!(
            "{:<8} {:>6} {:>8.2} {:>8.2} {:>8.2} {:>8.2}",
            profile.season, profile.count, profile.mean, profile.q1, profile.median, profile.q3
        );
    }

    if let Some(trend) = snapshot.trends().for_city(city) {
        println!(
            "Trend: {:+.4} °C/year ({})",
            trend.trend_slope, trend.trend_class
        );
    }
}

async fn run_live(
    cli: &Cli,
    snapshot: &AnalysisSnapshot,
    api_key: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let month = cli.month.unwrap_or_else(|| Utc::now().month());
    let season = Season::from_month(month)?;
    let mode = if cli.concurrent {
        FetchMode::Concurrent
    } else {
        FetchMode::Sequential
    };

    let fetcher = OpenWeatherFetcher::new(
        cli.endpoint.clone(),
        api_key,
        cli.country_code.clone(),
        Duration::from_secs(cli.timeout_secs),
    )?;
    let monitoring = MonitoringService::new(fetcher, cli.parallel);

    let cities: Vec<String> = snapshot.cities().map(str::to_string).collect();
    info!("Checking {} cities against {} baselines", cities.len(), season);

    let pb = ProgressBar::new(cities.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );
    pb.set_message("Fetching live readings...");

    let started = Instant::now();
    let report = monitoring
        .check_cities_with(snapshot, &cities, month, mode, |city| {
            pb.set_message(city.to_string());
            pb.inc(1);
        })
        .await?;
    pb.finish_with_message(format!("✓ Done in {:.2?}", started.elapsed()));

    println!();
    println!(
        "{:<20} {:>8} {:>8} {:>17}  {}",
        "City", "Now °C", "Mean °C", "Normal range", "Verdict"
    );
    for check in &report.checks {
        let verdict = &check.verdict;
        let label = match verdict.anomaly_type {
            Some(kind) => format!("ANOMALY ({kind})"),
            None => verdict.temperature_zone.to_string(),
        };
        println!(
            "{:<20} {:>8.2} {:>8.2} {:>8.2}..{:<7.2}  {} [{}]",
            verdict.city,
            verdict.current_temperature,
            verdict.historical_mean,
            verdict.normal_range.low,
            verdict.normal_range.high,
            label,
            check.description
        );
    }
    for failure in &report.failures {
        println!("{:<20} failed: {}", failure.city, failure.reason);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_live_fetch_options() {
        let cli = Cli::try_parse_from([
            "temperature-report",
            "--file",
            "history.csv",
            "--live",
            "--country-code",
            "NO",
            "--timeout-secs",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.country_code.as_deref(), Some("NO"));
        assert_eq!(cli.timeout_secs, 3);
    }
}
