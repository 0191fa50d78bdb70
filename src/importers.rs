//! Historical temperature table importers

pub mod csv_importer;

pub use csv_importer::{CsvImporter, ImportError};
