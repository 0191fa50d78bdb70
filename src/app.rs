use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::{create_router, AppState};
use crate::config::Config;
use crate::fetcher::OpenWeatherFetcher;
use crate::services::{AnalysisService, MonitoringService};

/// Running application: the HTTP server task plus the state it serves.
pub struct Application {
    pub server_handle: JoinHandle<Result<(), std::io::Error>>,
    pub state: AppState,
}

impl Application {
    /// Build services, load the startup dataset if one is configured and
    /// spawn the HTTP server.
    ///
    /// A missing API key disables live checks but not the historical views.
    pub async fn build(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing application components");

        let analysis = AnalysisService::new(config.rolling_window);
        if let Some(path) = &config.history_csv_path {
            info!("Loading startup dataset from {}", path.display());
            let snapshot = analysis.load_path(path.clone()).await?;
            info!(
                "Startup dataset ready: {} observations",
                snapshot.history().len()
            );
        } else {
            info!("No HISTORY_CSV_PATH set; waiting for PUT /api/v1/dataset");
        }

        let monitoring = match &config.openweather_api_key {
            Some(key) => {
                let fetcher = OpenWeatherFetcher::new(
                    config.openweather_url.clone(),
                    key.clone(),
                    config.openweather_country_code.clone(),
                    Duration::from_secs(config.fetch_timeout_secs),
                )?;
                info!(
                    "Live checks enabled (concurrency {})",
                    config.fetch_concurrency
                );
                Some(MonitoringService::new(fetcher, config.fetch_concurrency))
            }
            None => {
                warn!("OPENWEATHER_API_KEY not set; live endpoints will answer 503");
                None
            }
        };

        let state = AppState {
            analysis,
            monitoring,
        };
        let app = create_router(state.clone()).layer(TraceLayer::new_for_http());

        let addr = config.server_addr();
        info!("Starting HTTP server on {}", addr);

        let server_handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app).await
        });

        info!("Application initialized successfully");

        Ok(Self {
            server_handle,
            state,
        })
    }

    pub async fn run_until_stopped(self) -> Result<(), Box<dyn std::error::Error>> {
        self.server_handle.await??;
        Ok(())
    }
}
