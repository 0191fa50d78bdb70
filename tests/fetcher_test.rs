// Tests for OpenWeatherFetcher against a mocked current-weather endpoint
// Uses mockito for HTTP mocking

use mockito::{Matcher, Server};
use std::time::Duration;
use temperature_anomaly_service::analysis::AnalysisSnapshot;
use temperature_anomaly_service::fetch_error::FetchError;
use temperature_anomaly_service::fetcher::{OpenWeatherFetcher, WeatherReadingSource};
use temperature_anomaly_service::importers::CsvImporter;
use temperature_anomaly_service::models::LiveReading;
use temperature_anomaly_service::services::monitoring_service::FailureKind;
use temperature_anomaly_service::services::{FetchMode, MonitoringService};
use tokio::net::TcpListener;

const WEATHER_PATH: &str = "/data/2.5/weather";

fn create_test_fetcher(base_url: String, country_code: Option<&str>) -> OpenWeatherFetcher {
    OpenWeatherFetcher::new(
        base_url + WEATHER_PATH,
        "test-key",
        country_code.map(str::to_string),
        Duration::from_secs(5),
    )
    .expect("Failed to build fetcher")
}

fn weather_body(temp: f64, description: &str) -> String {
    serde_json::json!({
        "weather": [{"id": 800, "main": "Clear", "description": description, "icon": "01d"}],
        "main": {"temp": temp, "feels_like": temp - 1.0, "humidity": 55},
        "name": "Paris",
        "cod": 200
    })
    .to_string()
}

#[tokio::test]
async fn test_fetch_success_sends_metric_query() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", WEATHER_PATH)
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "Paris".into()),
            Matcher::UrlEncoded("appid".into(), "test-key".into()),
            Matcher::UrlEncoded("units".into(), "metric".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(weather_body(21.5, "clear sky"))
        .create_async()
        .await;

    let fetcher = create_test_fetcher(server.url(), None);
    let reading = fetcher.fetch("Paris").await.unwrap();

    assert_eq!(reading.city, "Paris");
    assert_eq!(reading.temperature, 21.5);
    assert_eq!(reading.description, "clear sky");
    assert_eq!(reading.status_code, 200);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_appends_country_code() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", WEATHER_PATH)
        .match_query(Matcher::UrlEncoded("q".into(), "Paris,FR".into()))
        .with_status(200)
        .with_body(weather_body(12.0, "light rain"))
        .create_async()
        .await;

    let fetcher = create_test_fetcher(server.url(), Some("FR"));
    let reading = fetcher.fetch_reading("Paris").await.unwrap();
    assert_eq!(reading.description, "light rain");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_unauthorized() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", WEATHER_PATH)
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"cod": 401, "message": "Invalid API key."}"#)
        .create_async()
        .await;

    let fetcher = create_test_fetcher(server.url(), None);
    let err = fetcher.fetch("Paris").await.unwrap_err();

    assert!(matches!(err, FetchError::Unauthorized));
    assert!(err.is_authentication_failure());
    assert_eq!(err.status_code(), Some(401));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_server_error() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", WEATHER_PATH)
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let fetcher = create_test_fetcher(server.url(), None);
    let err = fetcher.fetch("Paris").await.unwrap_err();

    assert!(!err.is_authentication_failure());
    match err {
        FetchError::Status(code) => assert_eq!(code, 500),
        other => panic!("Expected Status error, got {other:?}"),
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_city_not_found() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", WEATHER_PATH)
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"cod": "404", "message": "city not found"}"#)
        .create_async()
        .await;

    let fetcher = create_test_fetcher(server.url(), None);
    let err = fetcher.fetch("Atlantis").await.unwrap_err();
    assert_eq!(err.status_code(), Some(404));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_ok_without_temperature_is_parse_error() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", WEATHER_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"weather": [{"description": "mist"}], "main": {"humidity": 90}}"#)
        .create_async()
        .await;

    let fetcher = create_test_fetcher(server.url(), None);
    let err = fetcher.fetch("Paris").await.unwrap_err();
    assert!(matches!(err, FetchError::Parse(_)));
    assert_eq!(err.status_code(), None);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_unreachable_endpoint() {
    // Nothing listens on port 1
    let fetcher = OpenWeatherFetcher::new(
        "http://127.0.0.1:1/data/2.5/weather",
        "test-key",
        None,
        Duration::from_secs(2),
    )
    .unwrap();

    let err = fetcher.fetch("Paris").await.unwrap_err();
    assert!(matches!(err, FetchError::Request(_)));
    assert_eq!(err.status_code(), None);
}

/// Base URL of a server that accepts connections and never answers.
async fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{addr}")
}

fn create_fetcher_with_timeout(base_url: String, timeout: Duration) -> OpenWeatherFetcher {
    OpenWeatherFetcher::new(base_url + WEATHER_PATH, "test-key", None, timeout)
        .expect("Failed to build fetcher")
}

#[tokio::test]
async fn test_fetch_times_out_on_silent_server() {
    let fetcher = create_fetcher_with_timeout(silent_server().await, Duration::from_millis(200));

    let err = fetcher.fetch("Paris").await.unwrap_err();
    match &err {
        FetchError::Request(e) => assert!(e.is_timeout(), "Expected a timeout, got {e}"),
        other => panic!("Expected a request error, got {other:?}"),
    }
    assert_eq!(err.status_code(), None);
}

/// Sends one city to a stalled endpoint and every other city to a live one.
struct SplitSource {
    live: OpenWeatherFetcher,
    stalled: OpenWeatherFetcher,
    stalled_city: &'static str,
}

impl WeatherReadingSource for SplitSource {
    async fn fetch_reading(&self, city: &str) -> Result<LiveReading, FetchError> {
        if city == self.stalled_city {
            self.stalled.fetch(city).await
        } else {
            self.live.fetch(city).await
        }
    }
}

#[tokio::test]
async fn test_timed_out_city_does_not_sink_the_batch() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", WEATHER_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(weather_body(1.0, "clear sky"))
        .create_async()
        .await;

    let timeout = Duration::from_millis(200);
    let source = SplitSource {
        live: create_fetcher_with_timeout(server.url(), timeout),
        stalled: create_fetcher_with_timeout(silent_server().await, timeout),
        stalled_city: "Bergen",
    };
    let monitoring = MonitoringService::new(source, 3);

    let csv = "city,timestamp,temperature\n\
        Oslo,2020-01-01,-4.0\nOslo,2020-01-02,0.0\n\
        Bergen,2020-01-01,2.0\nBergen,2020-01-02,4.0\n\
        Tromso,2020-01-01,-8.0\nTromso,2020-01-02,-6.0\n";
    let snapshot = AnalysisSnapshot::build(CsvImporter::parse_str(csv).unwrap(), 2).unwrap();
    let cities: Vec<String> = ["Oslo", "Bergen", "Tromso"].map(String::from).to_vec();

    for mode in [FetchMode::Sequential, FetchMode::Concurrent] {
        let report = monitoring
            .check_cities(&snapshot, &cities, 1, mode)
            .await
            .unwrap();

        let checked: Vec<&str> = report
            .checks
            .iter()
            .map(|c| c.verdict.city.as_str())
            .collect();
        assert_eq!(checked, vec!["Oslo", "Tromso"]);
        assert!(report.checks.iter().all(|c| c.verdict.current_temperature == 1.0));

        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert_eq!(failure.city, "Bergen");
        assert_eq!(failure.kind, FailureKind::FetchFailure);
        assert_eq!(failure.status_code, None);
    }
}
