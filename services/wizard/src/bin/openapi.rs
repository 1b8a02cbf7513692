//! services/wizard/src/bin/openapi.rs
//!
//! Writes the OpenAPI document of the pipeline REST surface to `openapi.json`,
//! or to the path given as the first argument.

use utoipa::OpenApi;
use wizard_lib::web::ApiDoc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    let spec_json = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&path, spec_json)?;
    println!("OpenAPI specification written to {}", path);
    Ok(())
}
