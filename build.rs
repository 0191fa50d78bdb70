use std::fs;
use std::path::Path;

fn main() -> std::io::Result<()> {
    println!("cargo:rerun-if-changed=src/api.rs");
    println!("cargo:rerun-if-changed=src/models.rs");
    println!("cargo:rerun-if-changed=src/services/monitoring_service.rs");

    // The real spec is written by the generate-openapi binary
    let openapi_path = Path::new("openapi.json");
    if !openapi_path.exists() {
        let placeholder = r#"{
  "note": "Run 'cargo run --bin generate-openapi' to generate the OpenAPI spec"
}"#;
        fs::write(openapi_path, placeholder)?;
    }
    Ok(())
}
