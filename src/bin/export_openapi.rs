//! Dump the API document as pretty JSON.
//!
//! Usage: `export_openapi [PATH | -]`. Defaults to `docs/openapi/placement.json`; `-`
//! writes to stdout.

use rust_placement_server::openapi::ApiDoc;
use std::io::Write;
use std::path::PathBuf;
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "docs/openapi/placement.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let document = ApiDoc::openapi().to_pretty_json()?;

    let target = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
    if target == "-" {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(document.as_bytes())?;
        stdout.write_all(b"\n")?;
        return Ok(());
    }

    let path = PathBuf::from(target);
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&path, document)?;
    eprintln!("openapi document written to {}", path.display());

    Ok(())
}
