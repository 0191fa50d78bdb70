pub mod analysis_service;
pub mod monitoring_service;

pub use analysis_service::{AnalysisService, DatasetError};
pub use monitoring_service::{BatchReport, FetchMode, LiveCheck, MonitorError, MonitoringService};
