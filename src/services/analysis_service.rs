use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::analysis::{AnalysisError, AnalysisSnapshot};
use crate::importers::{CsvImporter, ImportError};
use crate::models::TemperatureHistory;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Malformed input: {0}")]
    Import(#[from] ImportError),
    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("Analysis task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Holds the current analysis snapshot.
///
/// Readers get an `Arc` to the snapshot that was current when they asked and
/// keep using it even if a new dataset is swapped in meanwhile. A failed load
/// leaves the previous snapshot untouched.
#[derive(Clone)]
pub struct AnalysisService {
    current: Arc<RwLock<Option<Arc<AnalysisSnapshot>>>>,
    window: usize,
}

impl AnalysisService {
    pub fn new(window: usize) -> Self {
        Self {
            current: Arc::new(RwLock::new(None)),
            window,
        }
    }

    pub async fn snapshot(&self) -> Option<Arc<AnalysisSnapshot>> {
        self.current.read().await.clone()
    }

    /// Parse CSV text, analyse it and make it the current dataset.
    #[instrument(skip(self, csv), fields(bytes = csv.len()))]
    pub async fn load_csv(&self, csv: String) -> Result<Arc<AnalysisSnapshot>, DatasetError> {
        let history =
            tokio::task::spawn_blocking(move || CsvImporter::parse_str(&csv)).await??;
        self.replace(history).await
    }

    /// Import a CSV file from disk and make it the current dataset.
    #[instrument(skip(self))]
    pub async fn load_path(&self, path: PathBuf) -> Result<Arc<AnalysisSnapshot>, DatasetError> {
        let history = tokio::task::spawn_blocking(move || CsvImporter::new(path).import()).await??;
        self.replace(history).await
    }

    /// Analyse a history and swap it in as the current snapshot.
    pub async fn replace(
        &self,
        history: TemperatureHistory,
    ) -> Result<Arc<AnalysisSnapshot>, DatasetError> {
        let window = self.window;
        let snapshot = Arc::new(
            tokio::task::spawn_blocking(move || AnalysisSnapshot::build(history, window)).await??,
        );

        *self.current.write().await = Some(snapshot.clone());
        info!(
            "Dataset replaced: {} observations across {} cities",
            snapshot.history().len(),
            snapshot.cities().count()
        );
        Ok(snapshot)
    }
}
