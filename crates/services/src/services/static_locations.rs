//! Province/district dataset shipped inside the binary, used when the
//! directory API cannot be reached.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rust_embed::RustEmbed;
use serde::Deserialize;
use thiserror::Error;
use tracing::error;

use super::province::Province;

const DATASET_FILE: &str = "vietnam_locations.json";

#[derive(RustEmbed)]
#[folder = "data/"]
struct LocationAssets;

#[derive(Debug, Error)]
pub enum StaticLocationsError {
    #[error("bundled dataset {0} is missing")]
    Missing(&'static str),
    #[error("bundled dataset is invalid: {0}")]
    Invalid(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticDirectory {
    pub provinces: Vec<String>,
    pub districts: HashMap<String, Vec<String>>,
}

static BUNDLED: Lazy<StaticDirectory> = Lazy::new(|| {
    load_bundled().unwrap_or_else(|e| {
        error!(error = %e, "Falling back to province names without districts");
        StaticDirectory {
            provinces: Province::all().map(|p| p.to_string()).collect(),
            districts: HashMap::new(),
        }
    })
});

/// The bundled dataset, parsed once per process.
pub fn bundled() -> &'static StaticDirectory {
    &BUNDLED
}

fn load_bundled() -> Result<StaticDirectory, StaticLocationsError> {
    let file =
        LocationAssets::get(DATASET_FILE).ok_or(StaticLocationsError::Missing(DATASET_FILE))?;
    Ok(serde_json::from_slice(&file.data)?)
}
