// Tests for CsvImporter reading history files from disk

use std::io::Write;
use tempfile::NamedTempFile;
use temperature_anomaly_service::importers::{CsvImporter, ImportError};
use temperature_anomaly_service::models::Season;

fn write_csv(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write temp file");
    file
}

#[test]
fn test_import_file() {
    let file = write_csv(
        "city,timestamp,temperature\n\
         Madrid,2023-07-01,31.5\n\
         Madrid,2023-07-02,33.0\n\
         Lisbon,2023-12-24,14.2\n",
    );

    let history = CsvImporter::new(file.path()).import().unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history.cities(), vec!["Madrid", "Lisbon"]);

    let lisbon = &history.observations()[2];
    assert_eq!(lisbon.year, 2023);
    assert_eq!(lisbon.month, 12);
    assert_eq!(lisbon.season, Season::Winter);
}

#[test]
fn test_import_reordered_columns_and_timestamp_formats() {
    let file = write_csv(
        "Temperature,Station Id,City,Timestamp\n\
         21.0,7,Athens,2022-05-01T14:30:00Z\n\
         22.5,7,Athens,2022-05-02 09:15\n\
         19.0,7,Athens,2022-05-03T06:00:00.250\n\
         18.0,7,Athens,2022-09-04\n",
    );

    let history = CsvImporter::new(file.path()).import().unwrap();
    let seasons: Vec<Season> = history.observations().iter().map(|o| o.season).collect();
    assert_eq!(
        seasons,
        vec![Season::Spring, Season::Spring, Season::Spring, Season::Autumn]
    );
    assert_eq!(history.observations()[0].temperature, 21.0);
}

#[test]
fn test_import_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = CsvImporter::new(dir.path().join("absent.csv")).import();
    assert!(matches!(result, Err(ImportError::Io(_))));
}

#[test]
fn test_import_rejects_bad_rows() {
    let bad_temperature = write_csv(
        "city,timestamp,temperature\n\
         Madrid,2023-07-01,31.5\n\
         Madrid,2023-07-02,hot\n",
    );
    match CsvImporter::new(bad_temperature.path()).import() {
        Err(ImportError::InvalidTemperature { line, value }) => {
            assert_eq!(line, 3);
            assert_eq!(value, "hot");
        }
        other => panic!("Expected InvalidTemperature, got {other:?}"),
    }

    let non_finite = write_csv("city,timestamp,temperature\nMadrid,2023-07-01,NaN\n");
    assert!(matches!(
        CsvImporter::new(non_finite.path()).import(),
        Err(ImportError::InvalidTemperature { .. })
    ));

    let no_city = write_csv("city,timestamp,temperature\n,2023-07-01,20.0\n");
    assert!(matches!(
        CsvImporter::new(no_city.path()).import(),
        Err(ImportError::EmptyCity { line: 2 })
    ));

    let header_only = write_csv("city,timestamp,temperature\n");
    assert!(matches!(
        CsvImporter::new(header_only.path()).import(),
        Err(ImportError::Empty)
    ));
}
